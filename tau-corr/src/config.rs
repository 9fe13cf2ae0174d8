use std::collections::HashSet;

use validator::{Validate, ValidationError};

/// Shape of a multi-tau hierarchy.
///
/// `numcorrelators` levels, each keeping `p` lag bins; every `m` samples at
/// one level are averaged into a single sample of the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Validate)]
pub struct CorrelatorConfig {
    #[validate(range(min = 1, message = "numcorrelators must be >= 1"))]
    pub numcorrelators: usize,
    #[validate(range(min = 1, message = "p must be >= 1"))]
    pub p: usize,
    #[validate(range(min = 1, message = "m must be >= 1"))]
    pub m: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            numcorrelators: 32,
            p: 16,
            m: 2,
        }
    }
}

impl CorrelatorConfig {
    pub fn new(numcorrelators: usize, p: usize, m: usize) -> Self {
        Self {
            numcorrelators,
            p,
            m,
        }
    }

    /// Smallest lag bin evaluated on levels above 0.
    pub fn d_min(&self) -> usize {
        self.p / self.m
    }

    /// Capacity of the output sequences.
    pub fn capacity(&self) -> usize {
        self.numcorrelators * self.p
    }

    /// Time scale of one sample at `level`, in base sample units.
    pub fn level_scale(&self, level: usize) -> f64 {
        (self.m as f64).powi(level as i32)
    }

    /// Largest lag an evaluation can ever emit.
    ///
    /// The deepest level is never evaluated, so the last populated level is
    /// `numcorrelators - 2`.
    pub fn max_lag(&self) -> f64 {
        let top = self.numcorrelators.saturating_sub(2);
        self.p.saturating_sub(1) as f64 * self.level_scale(top)
    }

    /// Number of level-0 samples after which every level has seen a full
    /// window, or `None` when that count does not fit in a `usize`.
    pub fn min_samples_to_fill(&self) -> Option<usize> {
        let depth = u32::try_from(self.numcorrelators.saturating_sub(1)).ok()?;
        self.m.checked_pow(depth)?.checked_mul(self.p)
    }
}

fn validate_autocorrelate_config(cfg: &AutocorrelateConfig) -> Result<(), ValidationError> {
    if cfg.quantities.is_empty() {
        return Err(ValidationError::new("quantities must not be empty"));
    }
    let mut seen = HashSet::with_capacity(cfg.quantities.len());
    for q in &cfg.quantities {
        if q.is_empty() {
            return Err(ValidationError::new("quantity names must not be empty"));
        }
        if !seen.insert(q.as_str()) {
            return Err(ValidationError::new("quantities must be unique"));
        }
    }
    Ok(())
}

/// Settings for the scheduled [`Autocorrelate`](crate::Autocorrelate) action.
#[derive(Debug, Clone, Validate)]
#[validate(schema(function = "validate_autocorrelate_config"))]
pub struct AutocorrelateConfig {
    /// Names of the scalar quantities to correlate, one engine each.
    pub quantities: Vec<String>,
    #[validate]
    pub correlator: CorrelatorConfig,
    /// Evaluate and write every `eval_period` timesteps; 0 disables writing.
    pub eval_period: u64,
    /// Subtract the squared stream mean from every correlation value.
    pub normalize: bool,
    /// Evaluate engines on the current thread instead of the rayon pool.
    pub sequential: bool,
}

impl AutocorrelateConfig {
    pub fn new(quantities: Vec<String>) -> Self {
        Self {
            quantities,
            correlator: CorrelatorConfig::default(),
            eval_period: 0,
            normalize: false,
            sequential: false,
        }
    }
}
