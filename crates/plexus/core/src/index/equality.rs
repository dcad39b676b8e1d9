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

use std::sync::Arc;

use crate::filter::FilterExpression;
use crate::index::FilterIndex;
use crate::index::buckets::{BucketIndex, BucketKey};
use crate::properties::PropertyMap;
use crate::properties::value::equality_key;
use crate::registry::{ListenerId, ServiceEvent, ServiceEventKind, ServiceListener, ServiceRegistration, ServiceRegistry};

/// Index for filters that are a single equality clause on one configured
/// property, e.g. `(pid=com.example.store)`.
pub struct EqualityIndex {
    property: String,
    buckets: BucketIndex,
}

impl EqualityIndex {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into().to_lowercase(),
            buckets: BucketIndex::new(),
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    fn keys_for(&self, type_names: &[String], properties: &PropertyMap) -> Vec<BucketKey> {
        let Some(value) = properties.get(&self.property) else {
            return Vec::new();
        };
        let value_keys = value.equality_keys();
        type_names
            .iter()
            .flat_map(|type_name| value_keys.iter().map(move |key| (type_name.clone(), key.clone())))
            .collect()
    }

    fn registration_keys(&self, registration: &ServiceRegistration) -> Vec<BucketKey> {
        self.keys_for(registration.type_names(), &registration.properties())
    }

    fn query_key(&self, service_type: &str, filter: &FilterExpression) -> Option<BucketKey> {
        match filter {
            FilterExpression::Equals { attribute, value } if attribute.to_lowercase() == self.property => {
                Some((service_type.to_string(), equality_key(value)))
            }
            _ => None,
        }
    }
}

impl ServiceListener for EqualityIndex {
    fn service_changed(&self, event: &ServiceEvent) {
        let registration = event.registration();
        let current_keys = self.keys_for(registration.type_names(), &event.current_properties());
        match event.kind() {
            ServiceEventKind::Registered => self.buckets.apply(event, Vec::new(), current_keys),
            ServiceEventKind::Modified => {
                let old_keys = event
                    .previous()
                    .map(|old| self.keys_for(registration.type_names(), old))
                    .unwrap_or_default();
                self.buckets.apply(event, old_keys, current_keys);
            }
            ServiceEventKind::Unregistering => self.buckets.apply(event, current_keys, Vec::new()),
        }
    }
}

impl FilterIndex for EqualityIndex {
    fn is_applicable(&self, service_type: &str, filter: &FilterExpression) -> bool {
        !service_type.is_empty() && self.query_key(service_type, filter).is_some()
    }

    fn open(self: Arc<Self>, registry: &Arc<ServiceRegistry>) {
        let me = Arc::clone(&self);
        let listener: Arc<dyn ServiceListener> = me;
        self.buckets.open(registry, listener, |registration| self.registration_keys(registration));
    }

    fn close(&self) {
        self.buckets.close();
    }

    fn find_matching(&self, service_type: &str, filter: &FilterExpression) -> Vec<ServiceRegistration> {
        self.query_key(service_type, filter)
            .map(|key| self.buckets.find(&key))
            .unwrap_or_default()
    }

    fn add_listener(
        &self,
        service_type: &str,
        filter: &FilterExpression,
        listener: Arc<dyn ServiceListener>,
    ) -> Option<ListenerId> {
        let key = self.query_key(service_type, filter)?;
        Some(self.buckets.add_listener(key, listener))
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.buckets.remove_listener(id)
    }
}
