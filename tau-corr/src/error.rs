use thiserror::Error;

/// Failures surfaced by engine construction and the scheduled action.
///
/// The engine's per-sample operations never fail; only configuration and
/// the action's quantity lookup and file output do.
#[derive(Error, Debug)]
pub enum CorrelatorError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("quantity '{name}' not found in source")]
    QuantityNotFound { name: String },

    #[error("quantity '{name}' missing at timestep {timestep}")]
    MissingValue { name: String, timestep: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CorrelatorError>;

impl From<validator::ValidationErrors> for CorrelatorError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::InvalidConfig(format!("{e}"))
    }
}
