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

//! The Plexus component runtime.
//!
//! Components declare service dependencies; as matching services appear and
//! disappear in the shared registry, each component is driven through its
//! lifecycle — instantiate, inject, start, handle partial loss, stop,
//! destroy — with the guarantee that a component is fully satisfied before
//! `start` and safely out of service before any of its dependencies
//! vanishes. Lifecycle transitions are serialized per component; teardown of
//! component sets runs in reverse registration order.

pub mod component;
pub mod config;
pub mod dependency;
pub mod diagnostics;
pub mod executor;
pub mod manager;

pub use component::{CallbackError, Component, ComponentBuilder, ComponentError, ComponentInstance, ComponentState, InjectionMap, ProvidedService};
pub use config::{CONFIG_PID_PROPERTY, CONFIG_SERVICE_TYPE, ConfigStore};
pub use dependency::{Cardinality, DependencyDescriptor, ServiceBinding, ServiceDependency, TrackerState};
pub use diagnostics::{ComponentSnapshot, DependencySnapshot};
pub use executor::SerialQueue;
pub use manager::{DependencyManager, ErrorListener, LoggingErrorListener, ManagerError};
