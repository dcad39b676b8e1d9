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

use std::collections::HashMap;

use thiserror::Error;

use crate::dependency::tracker::ServiceBinding;

/// Failure reported by a lifecycle callback.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct CallbackError(String);

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Bound values per dependency slot at injection time.
///
/// Every declared slot has an entry: an unsatisfied optional slot maps to an
/// empty vector, so absence is explicit rather than signalled by a dummy
/// placeholder object. Unary slots carry at most one binding, multiple slots
/// carry every match, primary first.
pub type InjectionMap = HashMap<String, Vec<ServiceBinding>>;

/// The user implementation behind a component.
///
/// All methods default to no-ops; implementors override what they need.
/// Bindings handed to `init` and to the per-slot notifications are valid
/// until `stop` returns; implementations must not retain them beyond that.
///
/// Callbacks are serialized per component and must not block indefinitely:
/// a hanging callback stalls every later lifecycle transition of its
/// component.
#[cfg_attr(test, mockall::automock)]
pub trait ComponentInstance: Send {
    /// All required dependencies are available; bound values are handed
    /// over. Runs before `start`.
    fn init(&mut self, _injected: &InjectionMap) {}

    /// Transition into service. An error here aborts the start: the
    /// component falls back to waiting and retries on the next dependency
    /// change.
    fn start(&mut self) -> Result<(), CallbackError> {
        Ok(())
    }

    /// Transition out of service. The provided service, if any, is already
    /// unpublished when this runs.
    fn stop(&mut self) {}

    /// Terminal cleanup; the last callback this instance will ever receive.
    fn destroy(&mut self) {}

    /// A service was bound to `slot` while the component is active.
    fn bind(&mut self, _slot: &str, _binding: &ServiceBinding) {}

    /// A bound service's properties changed.
    fn rebind(&mut self, _slot: &str, _binding: &ServiceBinding) {}

    /// A bound service went away (the component keeps running: either the
    /// slot is optional or other instances remain).
    fn unbind(&mut self, _slot: &str, _binding: &ServiceBinding) {}

    /// A unary slot's primary was replaced. `old` is no longer valid once
    /// this returns.
    fn swap(&mut self, _slot: &str, _old: &ServiceBinding, _new: &ServiceBinding) {}
}
