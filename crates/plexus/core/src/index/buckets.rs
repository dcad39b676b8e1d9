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

//! Shared bucket machinery behind the concrete filter indexes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::registry::{ListenerId, ListenerInterest, ServiceEvent, ServiceListener, ServiceRegistration, ServiceRegistry, ranked_order};

/// Bucket address: (service type name, canonical value key).
pub(crate) type BucketKey = (String, String);

/// Value-keyed registration buckets plus per-bucket listener routing.
///
/// Buckets hold registrations sorted by ranking then id, so indexed lookups
/// return the same order as a linear registry scan.
pub(crate) struct BucketIndex {
    buckets: DashMap<BucketKey, Vec<ServiceRegistration>>,
    listeners: DashMap<BucketKey, Vec<(ListenerId, Arc<dyn ServiceListener>)>>,
    listener_keys: DashMap<ListenerId, BucketKey>,
    next_listener_id: AtomicU64,
    subscription: Mutex<Option<(Arc<ServiceRegistry>, ListenerId)>>,
}

impl BucketIndex {
    pub(crate) fn new() -> Self {
        Self {
            buckets: DashMap::new(),
            listeners: DashMap::new(),
            listener_keys: DashMap::new(),
            next_listener_id: AtomicU64::new(1),
            subscription: Mutex::new(None),
        }
    }

    /// Subscribe `index_listener` (the owning index) to every registry event
    /// and seed the buckets from the registry's current contents via
    /// `keys_for`.
    pub(crate) fn open(
        &self,
        registry: &Arc<ServiceRegistry>,
        index_listener: Arc<dyn ServiceListener>,
        keys_for: impl Fn(&ServiceRegistration) -> Vec<BucketKey>,
    ) {
        let listener_id = registry.add_listener(ListenerInterest::default(), index_listener);
        *self.subscription.lock() = Some((Arc::clone(registry), listener_id));

        for registration in registry.registrations() {
            if registration.is_unregistered() {
                continue;
            }
            self.insert(&registration, keys_for(&registration));
        }
    }

    pub(crate) fn close(&self) {
        if let Some((registry, listener_id)) = self.subscription.lock().take() {
            registry.remove_listener(listener_id);
        }
        self.buckets.clear();
        self.listeners.clear();
        self.listener_keys.clear();
    }

    pub(crate) fn insert(&self, registration: &ServiceRegistration, keys: Vec<BucketKey>) {
        for key in keys {
            let mut bucket = self.buckets.entry(key).or_default();
            bucket.retain(|r| r.id() != registration.id());
            let position = bucket
                .binary_search_by(|r| ranked_order(r, registration))
                .unwrap_or_else(|insert_at| insert_at);
            bucket.insert(position, registration.clone());
        }
    }

    pub(crate) fn remove(&self, registration: &ServiceRegistration, keys: &[BucketKey]) {
        for key in keys {
            if let Some(mut bucket) = self.buckets.get_mut(key) {
                bucket.retain(|r| r.id() != registration.id());
            }
        }
    }

    /// Update buckets for one event and re-dispatch it to the listeners of
    /// every touched bucket, each at most once.
    pub(crate) fn apply(&self, event: &ServiceEvent, old_keys: Vec<BucketKey>, new_keys: Vec<BucketKey>) {
        let registration = event.registration();
        let stale: Vec<BucketKey> = old_keys.iter().filter(|k| !new_keys.contains(k)).cloned().collect();
        self.remove(registration, &stale);
        if !new_keys.is_empty() {
            self.insert(registration, new_keys.clone());
        }

        let mut touched = old_keys;
        for key in new_keys {
            if !touched.contains(&key) {
                touched.push(key);
            }
        }

        let mut notified: Vec<ListenerId> = Vec::new();
        let mut recipients: Vec<Arc<dyn ServiceListener>> = Vec::new();
        for key in &touched {
            if let Some(entries) = self.listeners.get(key) {
                for (listener_id, listener) in entries.iter() {
                    if !notified.contains(listener_id) {
                        notified.push(*listener_id);
                        recipients.push(Arc::clone(listener));
                    }
                }
            }
        }
        // Bucket shard locks are released before any listener runs.
        for listener in recipients {
            listener.service_changed(event);
        }
    }

    pub(crate) fn find(&self, key: &BucketKey) -> Vec<ServiceRegistration> {
        self.buckets.get(key).map(|bucket| bucket.clone()).unwrap_or_default()
    }

    pub(crate) fn add_listener(&self, key: BucketKey, listener: Arc<dyn ServiceListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, AtomicOrdering::Relaxed));
        self.listeners.entry(key.clone()).or_default().push((id, listener));
        self.listener_keys.insert(id, key);
        id
    }

    pub(crate) fn remove_listener(&self, id: ListenerId) -> bool {
        let Some((_, key)) = self.listener_keys.remove(&id) else {
            return false;
        };
        if let Some(mut entries) = self.listeners.get_mut(&key) {
            entries.retain(|(listener_id, _)| *listener_id != id);
        }
        true
    }
}
