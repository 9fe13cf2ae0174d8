//! Streaming multi-tau autocorrelation for scalar simulation signals.
//!
//! [`Correlator`] computes the time autocorrelation of one signal without
//! storing its history, using a hierarchy of ring buffers at successively
//! coarser time resolution. [`Autocorrelate`] drives one correlator per
//! quantity from a running simulation and writes the curves to disk.

pub mod action;
pub mod config;
pub mod correlator;
pub mod error;

mod parallel;

pub use action::{Autocorrelate, QuantitySource};
pub use config::{AutocorrelateConfig, CorrelatorConfig};
pub use correlator::{Correlator, Level};
pub use error::{CorrelatorError, Result};
