use std::time::Duration;

/// Every sleep and ceiling the workflows use, passed explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pacing {
    /// Max wait for the stack to reach CREATE_COMPLETE.
    pub stack_create_timeout: Duration,
    /// Between readiness probes of a new gateway.
    pub readiness_interval: Duration,
    /// Give up on a gateway that never answers after this long.
    pub readiness_timeout: Duration,
    /// Between stopping and starting a project during an upgrade.
    pub restart_delay: Duration,
    /// Before the first fetch of a remote command's result.
    pub command_settle: Duration,
    pub status_attempts: usize,
    pub status_interval: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            stack_create_timeout: Duration::from_secs(60 * 60),
            readiness_interval: Duration::from_secs(100),
            readiness_timeout: Duration::from_secs(2 * 60 * 60),
            restart_delay: Duration::from_secs(240),
            command_settle: Duration::from_secs(1),
            status_attempts: 20,
            status_interval: Duration::from_secs(5),
        }
    }
}

impl Pacing {
    /// No sleeps at all; readiness still gives up after a few seconds.
    pub fn immediate() -> Self {
        Self {
            stack_create_timeout: Duration::ZERO,
            readiness_interval: Duration::ZERO,
            readiness_timeout: Duration::from_secs(5),
            restart_delay: Duration::ZERO,
            command_settle: Duration::ZERO,
            status_attempts: 20,
            status_interval: Duration::ZERO,
        }
    }
}
