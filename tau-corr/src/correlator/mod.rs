pub mod level;

pub use level::Level;

use log::debug;
use validator::Validate;

use crate::config::CorrelatorConfig;
use crate::error::Result;

/// Streaming multi-tau autocorrelator for one scalar signal.
///
/// Level 0 sees every sample; each higher level sees block averages of `m`
/// samples of the level below, so level `k` resolves lags in units of `m^k`.
/// Every level keeps only `p` samples, and levels above 0 skip lag bins below
/// `p / m` since the level underneath already covers them at finer resolution.
///
/// Memory is O(numcorrelators × p) and each level-0 sample costs amortized
/// O(p) work, independent of how long the stream runs.
#[derive(Debug, Clone)]
pub struct Correlator {
    config: CorrelatorConfig,
    d_min: usize,
    levels: Vec<Level>,
    /// Deepest level reached by the cascade since the last reset.
    kmax: usize,
    /// Sum of all level-0 samples.
    accval: f64,
    t: Vec<f64>,
    f: Vec<f64>,
}

impl Correlator {
    /// Allocate a hierarchy for `config`, ready to receive samples.
    pub fn new(config: CorrelatorConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            "allocating correlator: {} levels x {} bins, decimation {}",
            config.numcorrelators, config.p, config.m
        );
        let capacity = config.capacity();
        Ok(Self {
            config,
            d_min: config.d_min(),
            levels: (0..config.numcorrelators)
                .map(|_| Level::new(config.p))
                .collect(),
            kmax: 0,
            accval: 0.0,
            t: Vec::with_capacity(capacity),
            f: Vec::with_capacity(capacity),
        })
    }

    /// Reset all buffers, sums and outputs to their starting state without
    /// reallocating.
    pub fn initialize(&mut self) {
        for level in self.levels.iter_mut() {
            level.reset();
        }
        self.kmax = 0;
        self.accval = 0.0;
        self.t.clear();
        self.f.clear();
    }

    /// Insert one raw sample at level 0.
    pub fn add(&mut self, value: f64) {
        self.add_at(value, 0);
    }

    /// Insert one sample at `level`, cascading block averages upwards.
    ///
    /// Samples aimed at or decimated past the deepest level are dropped.
    pub fn add_at(&mut self, mut value: f64, level: usize) {
        let mut k = level;
        while k < self.levels.len() {
            self.kmax = self.kmax.max(k);
            if k == 0 {
                self.accval += value;
            }
            let lag_start = if k == 0 { 0 } else { self.d_min };
            match self.levels[k].insert(value, self.config.m, lag_start) {
                Some(avg) => {
                    value = avg;
                    k += 1;
                }
                None => break,
            }
        }
    }

    /// Assemble the correlation curve from all evaluated levels.
    ///
    /// With `normalize`, the square of the mean of the whole level-0 stream is
    /// subtracted from every value. Level 0 and levels `1..kmax` are emitted;
    /// the deepest level reached is not. Accumulated sums are left untouched,
    /// so this can be called at any point in the stream.
    pub fn evaluate(&mut self, normalize: bool) {
        let aux = if normalize {
            let mean = self.accval / self.levels[0].counts()[0] as f64;
            mean * mean
        } else {
            0.0
        };

        self.t.clear();
        self.f.clear();

        for (lag, avg) in self.levels[0].averages(0) {
            self.t.push(lag as f64);
            self.f.push(avg - aux);
        }

        for k in 1..self.kmax {
            let scale = self.config.level_scale(k);
            for (lag, avg) in self.levels[k].averages(self.d_min) {
                self.t.push(lag as f64 * scale);
                self.f.push(avg - aux);
            }
        }
    }

    /// Number of points produced by the last [`evaluate`](Self::evaluate).
    pub fn npcorr(&self) -> usize {
        self.t.len()
    }

    /// Lags of the last evaluation, in base sample units.
    pub fn t(&self) -> &[f64] {
        &self.t
    }

    /// Correlation values aligned with [`t`](Self::t).
    pub fn f(&self) -> &[f64] {
        &self.f
    }

    /// `(lag, value)` pairs of the last evaluation.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.t.iter().copied().zip(self.f.iter().copied())
    }

    pub fn kmax(&self) -> usize {
        self.kmax
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    pub fn level(&self, k: usize) -> Option<&Level> {
        self.levels.get(k)
    }

    /// Number of raw samples seen since the last reset.
    pub fn samples(&self) -> u64 {
        self.levels[0].counts()[0]
    }

    /// Mean of all raw samples, or `None` before the first one.
    pub fn mean(&self) -> Option<f64> {
        match self.samples() {
            0 => None,
            n => Some(self.accval / n as f64),
        }
    }
}
