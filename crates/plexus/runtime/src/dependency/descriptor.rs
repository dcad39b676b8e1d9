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

use serde::{Deserialize, Serialize};

use plexus_core::filter::{FilterError, FilterExpression};

use crate::config::{CONFIG_PID_PROPERTY, CONFIG_SERVICE_TYPE};

/// How many bound instances a dependency exposes at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// One bound instance at a time, the highest-ordered match.
    Unary,
    /// Every matching instance.
    Multiple,
}

/// Declarative description of one dependency a component needs.
///
/// Immutable after construction. The `slot` names the injection site: the
/// component instance receives bound values and bind/unbind notifications
/// keyed by this name, which replaces reflective callback lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyDescriptor {
    pub slot: String,
    pub service_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpression>,
    pub required: bool,
    pub cardinality: Cardinality,
    /// Whether a unary dependency emits a swap when a better-ranked arrival
    /// displaces the current primary. Loss of the primary always swaps to
    /// the next candidate.
    pub swap_on_replacement: bool,
}

impl DependencyDescriptor {
    /// A required, unary dependency on `service_type`.
    pub fn new(slot: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            service_type: service_type.into(),
            filter: None,
            required: true,
            cardinality: Cardinality::Unary,
            swap_on_replacement: false,
        }
    }

    /// A dependency on the configuration snapshot with the given persistent
    /// id, published by [`crate::config::ConfigStore`].
    pub fn configuration(slot: impl Into<String>, pid: &str) -> Self {
        Self::new(slot, CONFIG_SERVICE_TYPE).with_filter(FilterExpression::equals(CONFIG_PID_PROPERTY, pid))
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn multiple(mut self) -> Self {
        self.cardinality = Cardinality::Multiple;
        self
    }

    pub fn with_swap(mut self) -> Self {
        self.swap_on_replacement = true;
        self
    }

    pub fn with_filter(mut self, filter: FilterExpression) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Parse and attach a filter string; syntax errors surface here, never
    /// while events are dispatched.
    pub fn with_filter_str(self, filter: &str) -> Result<Self, FilterError> {
        Ok(self.with_filter(filter.parse()?))
    }
}
