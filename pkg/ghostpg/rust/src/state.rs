// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Never spawned.
    NotStarted,
    /// Child process is alive.
    Running,
    /// Exited on its own after the interrupt, or before it.
    Exited,
    /// Forcibly killed after the grace period.
    Killed,
}

impl ProcessState {
    pub fn is_alive(self) -> bool {
        self == ProcessState::Running
    }

    pub(crate) fn can_transition_to(self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (NotStarted, Running) | (Running, Exited) | (Running, Killed)
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::NotStarted => write!(f, "not-started"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Exited => write!(f, "exited"),
            ProcessState::Killed => write!(f, "killed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProcessState::*;

    #[test]
    fn test_forward_transitions() {
        assert!(NotStarted.can_transition_to(Running));
        assert!(Running.can_transition_to(Exited));
        assert!(Running.can_transition_to(Killed));
    }

    #[test]
    fn test_no_restart() {
        assert!(!Exited.can_transition_to(Running));
        assert!(!Killed.can_transition_to(Running));
        assert!(!NotStarted.can_transition_to(Exited));
        assert!(!Running.can_transition_to(Running));
    }

    #[test]
    fn test_only_running_is_alive() {
        assert!(Running.is_alive());
        for s in [NotStarted, Exited, Killed] {
            assert!(!s.is_alive(), "{s} should not be alive");
        }
    }
}
