use std::time::Duration;

use probe_api::{AdminError, BusError};

use crate::oracle::Presence;

/// Ошибки workflow. Все, кроме `FixtureConflict`, фатальны для сценария.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("admin endpoint unavailable: {0}")]
    AdminUnavailable(String),

    /// Tenant / namespace уже есть. Fixture setup гасит её локально.
    #[error("{0} already exists")]
    FixtureConflict(String),

    /// 4xx и прочие отказы admin API, кроме 409.
    #[error("{0}")]
    AdminRejected(AdminError),

    #[error("produce to '{topic}' failed after {sent} of {count} messages: {source}")]
    ProduceFailed {
        topic: String,
        sent: usize,
        count: usize,
        #[source]
        source: BusError,
    },

    #[error("no message received on '{topic}' within {waited:?}")]
    NoMessageReceived { topic: String, waited: Duration },

    #[error("timed out after {elapsed:?} ({attempts} polls) waiting for {what}; last observed: {last}")]
    TimedOut {
        what: String,
        elapsed: Duration,
        attempts: u32,
        last: String,
    },

    #[error("topic '{topic}' expected {expected}, admin reports {observed}")]
    UnexpectedTopicState {
        topic: String,
        expected: Presence,
        observed: Presence,
    },

    #[error("data plane: {0}")]
    Bus(#[from] BusError),

    #[error("config: {0}")]
    Config(String),
}

impl From<AdminError> for ProbeError {
    fn from(e: AdminError) -> Self {
        match e {
            AdminError::Unavailable(detail) => ProbeError::AdminUnavailable(detail),
            AdminError::Conflict(what) => ProbeError::FixtureConflict(what),
            other => ProbeError::AdminRejected(other),
        }
    }
}
