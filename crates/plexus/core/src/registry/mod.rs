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

//! The service registry: published service instances, their property sets,
//! and synchronous registered/modified/unregistering event dispatch.

pub mod event;
pub mod registration;
pub mod store;

pub use event::{ListenerId, ListenerInterest, ServiceEvent, ServiceEventKind, ServiceListener};
pub use registration::{RegistrationId, ServiceRegistration, ranked_order};
pub use store::{RegistryError, ServiceRegistry};
