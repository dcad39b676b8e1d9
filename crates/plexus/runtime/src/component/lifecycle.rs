// Plexus
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Component lifecycle states and the allowed-transition table.

use std::fmt;

use serde::Serialize;

/// Where a component is in its life.
///
/// A component is never `Started` while a required dependency is
/// unavailable; availability edges drive the transitions between
/// `WaitingForRequired` and `Started` via the transient `Injected` and
/// `Stopping` states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComponentState {
    /// Implementation object constructed, dependencies not yet tracking.
    Instantiated,
    /// Tracking dependencies, at least one required slot unsatisfied.
    WaitingForRequired,
    /// All required dependencies available, injection performed.
    Injected,
    /// Start callback ran; the provided service, if any, is published.
    Started,
    /// Tearing down: unpublished, stop callback running or done.
    Stopping,
    /// Terminal.
    Destroyed,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentState::Instantiated => "INSTANTIATED",
            ComponentState::WaitingForRequired => "WAITING_FOR_REQUIRED",
            ComponentState::Injected => "INJECTED",
            ComponentState::Started => "STARTED",
            ComponentState::Stopping => "STOPPING",
            ComponentState::Destroyed => "DESTROYED",
        };
        f.write_str(name)
    }
}

/// Validates whether a transition from one state to another is allowed.
pub(crate) fn is_valid_transition(from: ComponentState, to: ComponentState) -> bool {
    use ComponentState::*;
    match (from, to) {
        (Instantiated, WaitingForRequired) => true,
        (WaitingForRequired, Injected) => true,
        (Injected, Started) => true,
        // Start failure falls back through Stopping without having started.
        (Injected, Stopping) => true,
        (Started, Stopping) => true,
        (Stopping, WaitingForRequired) => true,
        // Forced teardown is reachable from any non-terminal state.
        (Instantiated | WaitingForRequired | Injected | Stopping, Destroyed) => true,
        // Staying in place is a no-op.
        (a, b) if a == b => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ComponentState::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [Instantiated, WaitingForRequired, Injected, Started, Stopping, WaitingForRequired];
        for pair in path.windows(2) {
            assert!(is_valid_transition(pair[0], pair[1]), "{} -> {} should be valid", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_started_requires_injection_first() {
        assert!(!is_valid_transition(WaitingForRequired, Started));
        assert!(!is_valid_transition(Instantiated, Started));
    }

    #[test]
    fn test_destroyed_is_terminal() {
        for to in [Instantiated, WaitingForRequired, Injected, Started, Stopping] {
            assert!(!is_valid_transition(Destroyed, to));
        }
        assert!(is_valid_transition(Destroyed, Destroyed));
    }

    #[test]
    fn test_started_must_pass_through_stopping() {
        assert!(!is_valid_transition(Started, WaitingForRequired));
        assert!(!is_valid_transition(Started, Destroyed));
    }
}
