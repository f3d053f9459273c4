use std::time::Duration;

/// What a race does when it is handed no addresses after deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyAddresses {
    /// Succeed with the default value. Nothing was asked, so nothing failed.
    #[default]
    Vacuous,
    /// Fail with [`RaceError::NoAddresses`](crate::RaceError::NoAddresses).
    Reject,
}

/// Race configuration for a [`RaceClient`](crate::RaceClient).
#[derive(Debug, Clone)]
pub struct RaceConfig {
    /// Deadline applied by [`RaceClient::get_with_timeout`](crate::RaceClient::get_with_timeout).
    ///
    /// Calls that pass their own context are bounded by that context alone.
    pub overall_timeout: Duration,

    /// Behavior for an empty address list.
    pub empty_addresses: EmptyAddresses,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            overall_timeout: Duration::from_secs(2),
            empty_addresses: EmptyAddresses::Vacuous,
        }
    }
}

impl RaceConfig {
    /// Short deadline for latency-sensitive reads:
    /// - 500ms timeout
    /// - empty lists succeed vacuously
    pub fn low_latency() -> Self {
        Self {
            overall_timeout: Duration::from_millis(500),
            ..Self::default()
        }
    }

    /// Generous deadline for slow or distant replicas:
    /// - 5 second timeout
    /// - empty lists succeed vacuously
    pub fn conservative() -> Self {
        Self {
            overall_timeout: Duration::from_secs(5),
            ..Self::default()
        }
    }

    /// Default timeout, but an empty address list is an error.
    pub fn strict() -> Self {
        Self {
            empty_addresses: EmptyAddresses::Reject,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }
}
