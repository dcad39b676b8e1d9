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

//! Read-only component state snapshots for shell and management tooling.
//! Capturing a snapshot never mutates runtime state.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::component::Component;
use crate::dependency::{Cardinality, ServiceDependency};

/// Point-in-time view of one dependency of a component.
#[derive(Debug, Clone, Serialize)]
pub struct DependencySnapshot {
    pub slot: String,
    pub service_type: String,
    pub filter: Option<String>,
    pub required: bool,
    pub cardinality: Cardinality,
    pub available: bool,
    /// Ids of currently bound registrations, primary first.
    pub bound: Vec<u64>,
}

impl DependencySnapshot {
    fn capture(dependency: &ServiceDependency) -> Self {
        let descriptor = dependency.descriptor();
        Self {
            slot: descriptor.slot.clone(),
            service_type: descriptor.service_type.clone(),
            filter: descriptor.filter.as_ref().map(ToString::to_string),
            required: descriptor.required,
            cardinality: descriptor.cardinality,
            available: dependency.is_available(),
            bound: dependency.bound_snapshot().iter().map(|r| r.id().0).collect(),
        }
    }
}

/// Point-in-time view of one component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentSnapshot {
    pub id: String,
    pub name: String,
    pub state: String,
    /// Registration id of the published service, while Started.
    pub published: Option<u64>,
    pub dependencies: Vec<DependencySnapshot>,
    pub captured_at: DateTime<Utc>,
}

impl ComponentSnapshot {
    pub fn capture(component: &Component) -> Self {
        Self {
            id: component.id().to_string(),
            name: component.name().to_string(),
            state: component.state().to_string(),
            published: component.published_id().map(|id| id.0),
            dependencies: component.dependencies().iter().map(|d| DependencySnapshot::capture(d)).collect(),
            captured_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
