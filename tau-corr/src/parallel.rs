use rayon::prelude::*;

use crate::correlator::Correlator;

/// Apply `body` to every correlator, optionally on the rayon pool.
///
/// When `sequential` is true the correlators are visited in order on the
/// current thread, which avoids pool overhead when the caller is already
/// running inside a parallel region.
pub fn par_over_correlators(
    correlators: &mut [Correlator],
    sequential: bool,
    body: impl Fn(&mut Correlator) + Send + Sync,
) {
    if sequential {
        correlators.iter_mut().for_each(body);
    } else {
        correlators.par_iter_mut().for_each(body);
    }
}
