use std::fmt;

/// Phase of the orchestrator's crawl run
///
/// Transitions are `Idle -> Running -> Stopping -> Idle`, plus
/// `Running -> Idle` when a new run replaces one whose workers all finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// No crawl run has been started, or the last one was stopped
    Idle,

    /// Workers were spawned; some may have finished on their own
    Running,

    /// Cancellation was requested and workers are draining
    Stopping,
}

impl RunPhase {
    /// Whether a new run may start, given whether any worker is still alive
    pub fn can_start(&self, workers_active: bool) -> bool {
        match self {
            Self::Idle => true,
            Self::Running => !workers_active,
            Self::Stopping => false,
        }
    }

    /// Whether a stop request has something to stop
    pub fn can_stop(&self, workers_active: bool) -> bool {
        matches!(self, Self::Running) && workers_active
    }

    /// Whether the orchestrator reports itself as running
    pub fn is_running(&self, workers_active: bool) -> bool {
        match self {
            Self::Idle => false,
            Self::Running => workers_active,
            Self::Stopping => true,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        write!(f, "{}", name)
    }
}
