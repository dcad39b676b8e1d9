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

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::filter::FilterExpression;
use crate::properties::PropertyMap;
use crate::registry::event::{ListenerId, ListenerInterest, ServiceEvent, ServiceEventKind, ServiceListener};
use crate::registry::registration::{RegistrationId, ServiceRegistration, ranked_order};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),
    #[error("Registration already unregistered: {0}")]
    AlreadyUnregistered(RegistrationId),
    #[error("Service registry has been dropped")]
    RegistryGone,
}

/// The shared service registry.
///
/// Holds every currently published service with its property set and
/// notifies listeners of register/modify/unregister synchronously on the
/// mutating thread. No registry-wide lock is held while listener code runs;
/// per-registration event ordering comes from the registration's own
/// dispatch mutex.
pub struct ServiceRegistry {
    registrations: RwLock<BTreeMap<RegistrationId, ServiceRegistration>>,
    listeners: RwLock<HashMap<ListenerId, RegisteredListener>>,
    next_registration_id: AtomicU64,
    next_listener_id: AtomicU64,
    self_ref: Weak<ServiceRegistry>,
}

struct RegisteredListener {
    interest: ListenerInterest,
    listener: Arc<dyn ServiceListener>,
}

impl ServiceRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            registrations: RwLock::new(BTreeMap::new()),
            listeners: RwLock::new(HashMap::new()),
            next_registration_id: AtomicU64::new(1),
            next_listener_id: AtomicU64::new(1),
            self_ref: self_ref.clone(),
        })
    }

    /// Publish a service instance under one or more type names.
    ///
    /// Fires Registered synchronously to all listeners whose interest
    /// matches the property snapshot taken at registration time.
    pub fn register(
        &self,
        type_names: Vec<String>,
        instance: Arc<dyn Any + Send + Sync>,
        properties: PropertyMap,
    ) -> Result<ServiceRegistration, RegistryError> {
        if type_names.is_empty() {
            return Err(RegistryError::InvalidRegistration("no service type names given".into()));
        }
        if let Some(blank) = type_names.iter().find(|t| t.trim().is_empty()) {
            return Err(RegistryError::InvalidRegistration(format!("blank service type name {blank:?}")));
        }

        let id = RegistrationId(self.next_registration_id.fetch_add(1, AtomicOrdering::Relaxed));
        let registration = ServiceRegistration::new(id, type_names, instance, properties, self.self_ref.clone());

        self.registrations.write().insert(id, registration.clone());
        info!("Registered service {} as {:?}", id, registration.type_names());

        {
            let _ordering = registration.inner().dispatch_lock.lock();
            self.dispatch(&ServiceEvent::new(ServiceEventKind::Registered, registration.clone(), None));
        }
        Ok(registration)
    }

    /// Replace a registration's property map.
    ///
    /// Fires Modified to listeners whose interest matched either the old or
    /// the new snapshot, so a listener gaining a match and one losing a
    /// match both hear about it.
    pub fn modify(&self, registration: &ServiceRegistration, properties: PropertyMap) -> Result<(), RegistryError> {
        if registration.is_unregistered() {
            return Err(RegistryError::AlreadyUnregistered(registration.id()));
        }

        let _ordering = registration.inner().dispatch_lock.lock();
        let previous = {
            let mut current = registration.inner().properties.write();
            std::mem::replace(&mut *current, properties)
        };
        debug!("Modified properties of service {}", registration.id());
        self.dispatch(&ServiceEvent::new(
            ServiceEventKind::Modified,
            registration.clone(),
            Some(previous),
        ));
        Ok(())
    }

    /// Withdraw a registration.
    ///
    /// Unregistering is dispatched synchronously before the registration is
    /// removed from the store, so holders of required dependencies get a
    /// last chance to release the service while it is still resolvable.
    pub fn unregister(&self, registration: &ServiceRegistration) -> Result<(), RegistryError> {
        if registration
            .inner()
            .unregistered
            .swap(true, AtomicOrdering::AcqRel)
        {
            return Err(RegistryError::AlreadyUnregistered(registration.id()));
        }

        {
            let _ordering = registration.inner().dispatch_lock.lock();
            self.dispatch(&ServiceEvent::new(
                ServiceEventKind::Unregistering,
                registration.clone(),
                None,
            ));
        }
        self.registrations.write().remove(&registration.id());
        info!("Unregistered service {}", registration.id());
        Ok(())
    }

    /// Linear-scan lookup: every live registration of `service_type` whose
    /// properties satisfy `filter`, ordered by ranking descending then
    /// registration id ascending.
    pub fn find_matching(&self, service_type: &str, filter: Option<&FilterExpression>) -> Vec<ServiceRegistration> {
        let mut matching: Vec<ServiceRegistration> = self
            .registrations
            .read()
            .values()
            .filter(|r| r.provides(service_type))
            .filter(|r| filter.is_none_or(|f| f.matches(&r.properties())))
            .cloned()
            .collect();
        matching.sort_by(ranked_order);
        matching
    }

    pub fn get(&self, id: RegistrationId) -> Option<ServiceRegistration> {
        self.registrations.read().get(&id).cloned()
    }

    /// Snapshot of every live registration, in registration order.
    pub fn registrations(&self) -> Vec<ServiceRegistration> {
        self.registrations.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }

    /// Subscribe a listener. Filter syntax problems belong to
    /// [`ListenerInterest`] construction and can never surface here.
    pub fn add_listener(&self, interest: ListenerInterest, listener: Arc<dyn ServiceListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, AtomicOrdering::Relaxed));
        self.listeners.write().insert(id, RegisteredListener { interest, listener });
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.write().remove(&id).is_some()
    }

    /// Deliver an event to every interested listener.
    ///
    /// The listener table lock is released before any callback runs, and a
    /// panicking listener is logged and skipped so it cannot block delivery
    /// to the rest.
    fn dispatch(&self, event: &ServiceEvent) {
        let recipients: Vec<Arc<dyn ServiceListener>> = {
            let listeners = self.listeners.read();
            let type_names = event.registration().type_names();
            let current = event.current_properties();
            listeners
                .values()
                .filter(|entry| {
                    entry.interest.matches(type_names, &current)
                        || event
                            .previous()
                            .is_some_and(|old| entry.interest.matches(type_names, old))
                })
                .map(|entry| Arc::clone(&entry.listener))
                .collect()
        };

        for listener in recipients {
            if catch_unwind(AssertUnwindSafe(|| listener.service_changed(event))).is_err() {
                error!(
                    "Service listener panicked handling {} for service {}",
                    event.kind(),
                    event.registration().id()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        seen: Mutex<Vec<(ServiceEventKind, RegistrationId)>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self { seen: Mutex::new(Vec::new()) })
        }

        fn kinds(&self) -> Vec<ServiceEventKind> {
            self.seen.lock().iter().map(|(k, _)| *k).collect()
        }
    }

    impl ServiceListener for Recorder {
        fn service_changed(&self, event: &ServiceEvent) {
            self.seen.lock().push((event.kind(), event.registration().id()));
        }
    }

    fn props(pairs: &[(&str, i64)]) -> PropertyMap {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_register_requires_type_names() {
        let registry = ServiceRegistry::new();
        let err = registry.register(vec![], Arc::new(()), PropertyMap::new()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRegistration(_)));
        let err = registry.register(vec!["  ".into()], Arc::new(()), PropertyMap::new()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRegistration(_)));
    }

    #[test]
    fn test_event_sequence_for_one_registration() {
        let registry = ServiceRegistry::new();
        let recorder = Recorder::new();
        registry.add_listener(ListenerInterest::for_type("t"), recorder.clone());

        let registration = registry.register(vec!["t".into()], Arc::new(()), props(&[("x", 1)])).unwrap();
        registration.modify(props(&[("x", 2)])).unwrap();
        registration.unregister().unwrap();

        assert_eq!(
            recorder.kinds(),
            vec![
                ServiceEventKind::Registered,
                ServiceEventKind::Modified,
                ServiceEventKind::Unregistering
            ]
        );
    }

    #[test]
    fn test_modify_reaches_listeners_of_either_snapshot() {
        let registry = ServiceRegistry::new();
        let gaining = Recorder::new();
        let losing = Recorder::new();
        registry.add_listener(
            ListenerInterest::for_type("t").with_filter_str("(x=2)").unwrap(),
            gaining.clone(),
        );
        registry.add_listener(
            ListenerInterest::for_type("t").with_filter_str("(x=1)").unwrap(),
            losing.clone(),
        );

        let registration = registry.register(vec!["t".into()], Arc::new(()), props(&[("x", 1)])).unwrap();
        assert_eq!(losing.kinds(), vec![ServiceEventKind::Registered]);
        assert_eq!(gaining.kinds(), vec![]);

        registration.modify(props(&[("x", 2)])).unwrap();
        assert_eq!(losing.kinds(), vec![ServiceEventKind::Registered, ServiceEventKind::Modified]);
        assert_eq!(gaining.kinds(), vec![ServiceEventKind::Modified]);
    }

    #[test]
    fn test_unregister_is_not_repeatable() {
        let registry = ServiceRegistry::new();
        let registration = registry.register(vec!["t".into()], Arc::new(()), PropertyMap::new()).unwrap();
        registration.unregister().unwrap();
        assert!(matches!(registration.unregister(), Err(RegistryError::AlreadyUnregistered(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_find_matching_orders_by_rank_then_id() {
        let registry = ServiceRegistry::new();
        let a = registry.register(vec!["t".into()], Arc::new(()), props(&[("ranking", 0)])).unwrap();
        let b = registry.register(vec!["t".into()], Arc::new(()), props(&[("ranking", 10)])).unwrap();
        let c = registry.register(vec!["t".into()], Arc::new(()), props(&[("ranking", 10)])).unwrap();

        let found = registry.find_matching("t", None);
        let ids: Vec<RegistrationId> = found.iter().map(ServiceRegistration::id).collect();
        assert_eq!(ids, vec![b.id(), c.id(), a.id()]);
    }

    #[test]
    fn test_panicking_listener_does_not_block_delivery() {
        struct Panicker;
        impl ServiceListener for Panicker {
            fn service_changed(&self, _event: &ServiceEvent) {
                panic!("boom");
            }
        }

        let registry = ServiceRegistry::new();
        let recorder = Recorder::new();
        registry.add_listener(ListenerInterest::default(), Arc::new(Panicker));
        registry.add_listener(ListenerInterest::default(), recorder.clone());

        registry.register(vec!["t".into()], Arc::new(()), PropertyMap::new()).unwrap();
        assert_eq!(recorder.kinds(), vec![ServiceEventKind::Registered]);
    }

    #[test]
    fn test_removed_listener_hears_nothing() {
        let registry = ServiceRegistry::new();
        let recorder = Recorder::new();
        let id = registry.add_listener(ListenerInterest::default(), recorder.clone());
        assert!(registry.remove_listener(id));
        assert!(!registry.remove_listener(id));

        registry.register(vec!["t".into()], Arc::new(()), PropertyMap::new()).unwrap();
        assert!(recorder.kinds().is_empty());
    }
}
