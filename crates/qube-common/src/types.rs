//! Domain primitive types shared across the Qube workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ledger pid sentinel: the container exited and may be restarted.
pub const PID_EXITED: i32 = -1;

/// Ledger pid sentinel: the container was deliberately stopped.
pub const PID_STOPPED: i32 = -2;

/// Observable lifecycle state of a tracked container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// The recorded pid is alive under `/proc`.
    Running,
    /// The process is gone; the supervisor will restart it.
    Exited,
    /// Deliberately stopped; never restarted.
    Stopped,
}

impl ContainerStatus {
    /// Classifies a ledger pid against the observed liveness of its process.
    #[must_use]
    pub fn classify(pid: i32, alive: bool) -> Self {
        if pid == PID_STOPPED {
            Self::Stopped
        } else if pid > 0 && alive {
            Self::Running
        } else {
            Self::Exited
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Exited => write!(f, "exited"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_alive_pid_is_running() {
        assert_eq!(ContainerStatus::classify(4242, true), ContainerStatus::Running);
    }

    #[test]
    fn positive_dead_pid_is_exited() {
        assert_eq!(ContainerStatus::classify(4242, false), ContainerStatus::Exited);
    }

    #[test]
    fn exited_sentinel_is_exited() {
        assert_eq!(ContainerStatus::classify(PID_EXITED, false), ContainerStatus::Exited);
    }

    #[test]
    fn stopped_sentinel_is_stopped() {
        assert_eq!(ContainerStatus::classify(PID_STOPPED, false), ContainerStatus::Stopped);
    }

    #[test]
    fn status_display_is_lowercase() {
        assert_eq!(ContainerStatus::Running.to_string(), "running");
        assert_eq!(ContainerStatus::Exited.to_string(), "exited");
        assert_eq!(ContainerStatus::Stopped.to_string(), "stopped");
    }
}
