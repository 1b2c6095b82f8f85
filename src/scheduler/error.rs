//! Allocation failures.

use thiserror::Error;

/// Why an allocation could not be satisfied.
///
/// The scheduler never retries on its own; the caller picks a retry policy
/// from the kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// No enabled channel exists in the scope. Queueing cannot help.
    #[error("no channels configured for scope '{scope}'")]
    NoChannelsConfigured { scope: String },

    /// Every enabled channel was quarantined when the wait expired.
    #[error("all channels in scope '{scope}' are quarantined")]
    AllQuarantined { scope: String },

    /// Channels were healthy but full for the whole wait.
    #[error("all channels in scope '{scope}' are at capacity")]
    AllAtCapacity { scope: String },
}

impl SchedulerError {
    /// Stable machine-readable name, also used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerError::NoChannelsConfigured { .. } => "no_channels_configured",
            SchedulerError::AllQuarantined { .. } => "all_quarantined",
            SchedulerError::AllAtCapacity { .. } => "all_at_capacity",
        }
    }

    /// Whether retrying the whole request later can succeed without a
    /// configuration change.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SchedulerError::NoChannelsConfigured { .. })
    }

    pub fn scope(&self) -> &str {
        match self {
            SchedulerError::NoChannelsConfigured { scope }
            | SchedulerError::AllQuarantined { scope }
            | SchedulerError::AllAtCapacity { scope } => scope,
        }
    }
}
