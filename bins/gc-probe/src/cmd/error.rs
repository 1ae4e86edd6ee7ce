use probe_api::{AdminError, BusError};
use probe_engine::ProbeError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Probe(#[from] ProbeError),

    #[error("{0}")]
    Admin(#[from] AdminError),

    #[error("{0}")]
    Bus(#[from] BusError),

    #[error("{failed} of {total} scenario variants failed")]
    VariantsFailed { failed: usize, total: usize },
}
