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

//! Core service registry substrate for Plexus.
//!
//! This crate provides the building blocks the component runtime is layered
//! on: case-insensitive property maps, LDAP-style filter expressions, the
//! concurrent service registry with synchronous event dispatch, and the
//! filter index family that keeps service-changed handling O(matching)
//! instead of O(registry).

pub mod filter;
pub mod index;
pub mod properties;
pub mod registry;

pub use filter::{FilterError, FilterExpression};
pub use index::{EqualityIndex, FilterIndex, IndexSet, MultiPropertyIndex};
pub use properties::{PropertyMap, PropertyValue, RANKING_PROPERTY};
pub use registry::{
    ListenerId, ListenerInterest, RegistrationId, RegistryError, ServiceEvent, ServiceEventKind,
    ServiceListener, ServiceRegistration, ServiceRegistry,
};
