use std::fmt;

use crate::context::ContextError;

/// Errors a [`Fetcher`](crate::Fetcher) reports for a single address.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// The address answered but does not hold the key.
    #[error("key {key:?} not found")]
    NotFound { key: String },

    /// The address could not be reached.
    #[error("address {address} unreachable: {reason}")]
    Unreachable { address: String, reason: String },

    /// The attempt was abandoned because its context finished.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Any other transport or backend fault.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FetchError {
    /// Returns true when the attempt stopped because its context was canceled
    /// or timed out.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, FetchError::Context(_))
    }
}

/// One address that failed during a race.
#[derive(Debug)]
pub struct AttemptFailure {
    pub address: String,
    pub error: FetchError,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.address, self.error)
    }
}

/// Errors that can end a race.
#[derive(thiserror::Error, Debug)]
pub enum RaceError {
    /// The address list was empty and the config rejects empty lists.
    #[error("no addresses supplied")]
    NoAddresses,

    /// Every unique address failed before any succeeded.
    ///
    /// Failures are kept in completion order.
    #[error("all {} addresses failed: [{}]", .failures.len(), join(.failures))]
    AllFailed { failures: Vec<AttemptFailure> },

    /// The caller's context was canceled or timed out before any address
    /// succeeded.
    #[error("race abandoned: {0}")]
    Canceled(#[source] ContextError),
}

impl RaceError {
    /// Returns true when the race ended because the caller's context finished.
    ///
    /// Equivalent to finding a [`ContextError`] in the
    /// [`source`](std::error::Error::source) chain.
    pub fn is_cancellation(&self) -> bool {
        self.context_error().is_some()
    }

    pub fn context_error(&self) -> Option<ContextError> {
        match self {
            RaceError::Canceled(err) => Some(*err),
            _ => None,
        }
    }

    /// Per-address failures, empty unless every address failed.
    pub fn failures(&self) -> &[AttemptFailure] {
        match self {
            RaceError::AllFailed { failures } => failures,
            _ => &[],
        }
    }
}

fn join(failures: &[AttemptFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
