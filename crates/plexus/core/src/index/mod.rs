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

//! Filter indexes: accelerating structures that map a (service type, filter)
//! pair straight to the matching registrations.
//!
//! An index is strictly a performance optimization. For every filter an
//! index declares itself applicable to, its results must equal what a full
//! linear scan of the registry would return.

pub(crate) mod buckets;
pub mod equality;
pub mod multi_property;
pub mod set;

pub use equality::EqualityIndex;
pub use multi_property::MultiPropertyIndex;
pub use set::IndexSet;

use std::sync::Arc;

use crate::filter::FilterExpression;
use crate::registry::{ListenerId, ServiceListener, ServiceRegistration, ServiceRegistry};

/// An accelerating lookup structure for one shape of filter.
///
/// `is_applicable` is a pure syntactic check on the filter; it must never
/// consult index contents. Once opened, the index subscribes to the registry
/// directly and keeps its buckets current; listeners added through the index
/// are re-dispatched only those events whose registration is compatible with
/// their filter.
pub trait FilterIndex: ServiceListener + Send + Sync {
    /// Whether this index can answer queries for the given type and filter.
    fn is_applicable(&self, service_type: &str, filter: &FilterExpression) -> bool;

    /// Subscribe to the registry and seed buckets from its current
    /// contents.
    fn open(self: Arc<Self>, registry: &Arc<ServiceRegistry>);

    /// Drop the registry subscription and all bucketed state.
    fn close(&self);

    /// Indexed equivalent of [`ServiceRegistry::find_matching`]. Only valid
    /// for applicable filters.
    fn find_matching(&self, service_type: &str, filter: &FilterExpression) -> Vec<ServiceRegistration>;

    /// Route service-changed events for the given filter to `listener`.
    /// Returns `None` when the filter is not applicable to this index.
    fn add_listener(
        &self,
        service_type: &str,
        filter: &FilterExpression,
        listener: Arc<dyn ServiceListener>,
    ) -> Option<ListenerId>;

    fn remove_listener(&self, id: ListenerId) -> bool;
}
