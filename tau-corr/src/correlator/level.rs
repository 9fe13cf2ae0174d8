/// State of one level of the hierarchy.
///
/// `shift` is a ring buffer of the last `p` samples seen at this level, with
/// `None` marking slots that have not been written since the last reset.
/// `correlation[j]` sums products of samples `j` slots apart and
/// `ncorrelation[j]` counts how many products went into it.
#[derive(Debug, Clone)]
pub struct Level {
    shift: Vec<Option<f64>>,
    correlation: Vec<f64>,
    ncorrelation: Vec<u64>,
    accumulator: f64,
    naccumulator: usize,
    insert_index: usize,
}

impl Level {
    pub(crate) fn new(p: usize) -> Self {
        Self {
            shift: vec![None; p],
            correlation: vec![0.0; p],
            ncorrelation: vec![0; p],
            accumulator: 0.0,
            naccumulator: 0,
            insert_index: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.shift.fill(None);
        self.correlation.fill(0.0);
        self.ncorrelation.fill(0);
        self.accumulator = 0.0;
        self.naccumulator = 0;
        self.insert_index = 0;
    }

    /// Insert `value`, correlate it against lags `lag_start..p`, and return
    /// the block average once `m` samples have accumulated.
    pub(crate) fn insert(&mut self, value: f64, m: usize, lag_start: usize) -> Option<f64> {
        let p = self.shift.len();
        let current = self.insert_index;
        self.shift[current] = Some(value);

        self.accumulator += value;
        self.naccumulator += 1;
        let decimated = if self.naccumulator == m {
            let avg = self.accumulator / m as f64;
            self.accumulator = 0.0;
            self.naccumulator = 0;
            Some(avg)
        } else {
            None
        };

        for lag in lag_start..p {
            if let Some(past) = self.shift[(current + p - lag) % p] {
                self.correlation[lag] += value * past;
                self.ncorrelation[lag] += 1;
            }
        }

        self.insert_index = (current + 1) % p;
        decimated
    }

    /// Next write position in the ring buffer.
    pub fn insert_index(&self) -> usize {
        self.insert_index
    }

    /// Samples accumulated towards the next decimated value.
    pub fn pending(&self) -> usize {
        self.naccumulator
    }

    /// Raw product sums, indexed by lag bin.
    pub fn correlation(&self) -> &[f64] {
        &self.correlation
    }

    /// Product counts, indexed by lag bin.
    pub fn counts(&self) -> &[u64] {
        &self.ncorrelation
    }

    /// Averaged correlation per lag bin in `lag_start..p`, skipping empty bins.
    pub(crate) fn averages(&self, lag_start: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.correlation
            .iter()
            .zip(self.ncorrelation.iter())
            .enumerate()
            .skip(lag_start)
            .filter(|&(_, (_, &n))| n > 0)
            .map(|(lag, (&sum, &n))| (lag, sum / n as f64))
    }
}
