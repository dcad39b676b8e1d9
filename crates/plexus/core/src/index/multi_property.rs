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

/// Separator between per-property keys inside a composite bucket key.
const KEY_SEPARATOR: char = '\u{1f}';

/// Index for conjunctions of equality clauses over a fixed property set,
/// e.g. `(&(objectclass=store)(zone=eu))` for properties
/// `{objectclass, zone}`.
pub struct MultiPropertyIndex {
    // Lowercased, sorted, deduplicated.
    properties: Vec<String>,
    buckets: BucketIndex,
}

impl MultiPropertyIndex {
    pub fn new<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut properties: Vec<String> = properties.into_iter().map(|p| p.into().to_lowercase()).collect();
        properties.sort();
        properties.dedup();
        Self {
            properties,
            buckets: BucketIndex::new(),
        }
    }

    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    /// All composite keys a property map answers to: the cartesian product
    /// of each indexed property's value keys, in configured property order.
    fn value_keys(&self, properties: &PropertyMap) -> Vec<String> {
        let mut composites = vec![String::new()];
        for (position, property) in self.properties.iter().enumerate() {
            let Some(value) = properties.get(property) else {
                return Vec::new();
            };
            let keys = value.equality_keys();
            let mut extended = Vec::with_capacity(composites.len() * keys.len());
            for prefix in &composites {
                for key in &keys {
                    let mut composite = prefix.clone();
                    if position > 0 {
                        composite.push(KEY_SEPARATOR);
                    }
                    composite.push_str(key);
                    extended.push(composite);
                }
            }
            composites = extended;
        }
        composites
    }

    fn keys_for(&self, type_names: &[String], properties: &PropertyMap) -> Vec<BucketKey> {
        let value_keys = self.value_keys(properties);
        type_names
            .iter()
            .flat_map(|type_name| value_keys.iter().map(move |key| (type_name.clone(), key.clone())))
            .collect()
    }

    fn registration_keys(&self, registration: &ServiceRegistration) -> Vec<BucketKey> {
        self.keys_for(registration.type_names(), &registration.properties())
    }

    /// The composite key a query filter selects, when the filter is an And
    /// of equality clauses covering exactly the indexed property set.
    fn query_key(&self, service_type: &str, filter: &FilterExpression) -> Option<BucketKey> {
        let FilterExpression::And(operands) = filter else {
            return None;
        };
        if operands.len() != self.properties.len() {
            return None;
        }

        let mut keys: Vec<Option<String>> = vec![None; self.properties.len()];
        for operand in operands {
            let FilterExpression::Equals { attribute, value } = operand else {
                return None;
            };
            let position = self.properties.iter().position(|p| *p == attribute.to_lowercase())?;
            if keys[position].is_some() {
                // Duplicate attribute: not this index's shape.
                return None;
            }
            keys[position] = Some(equality_key(value));
        }

        let mut composite = String::new();
        for (position, key) in keys.into_iter().enumerate() {
            if position > 0 {
                composite.push(KEY_SEPARATOR);
            }
            composite.push_str(&key?);
        }
        Some((service_type.to_string(), composite))
    }
}

impl ServiceListener for MultiPropertyIndex {
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

impl FilterIndex for MultiPropertyIndex {
    fn is_applicable(&self, service_type: &str, filter: &FilterExpression) -> bool {
        !service_type.is_empty() && !self.properties.is_empty() && self.query_key(service_type, filter).is_some()
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
