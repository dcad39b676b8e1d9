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

//! Integration tests for registry event delivery semantics.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use plexus_core::properties::PropertyMap;
use plexus_core::registry::{
    ListenerInterest, RegistrationId, ServiceEvent, ServiceEventKind, ServiceListener, ServiceRegistry,
};

struct SequenceRecorder {
    events: Mutex<Vec<(RegistrationId, ServiceEventKind)>>,
}

impl SequenceRecorder {
    fn new() -> Arc<Self> {
        Arc::new(Self { events: Mutex::new(Vec::new()) })
    }
}

impl ServiceListener for SequenceRecorder {
    fn service_changed(&self, event: &ServiceEvent) {
        self.events.lock().push((event.registration().id(), event.kind()));
    }
}

fn props(pairs: &[(&str, i64)]) -> PropertyMap {
    pairs.iter().map(|(k, v)| (*k, *v)).collect()
}

#[test]
fn test_per_registration_order_holds_under_concurrency() {
    let registry = ServiceRegistry::new();
    let recorder = SequenceRecorder::new();
    registry.add_listener(ListenerInterest::for_type("t"), recorder.clone());

    let mut handles = Vec::new();
    for worker in 0..8 {
        let registry = Arc::clone(&registry);
        handles.push(thread::spawn(move || {
            for round in 0..20 {
                let registration = registry
                    .register(vec!["t".into()], Arc::new(()), props(&[("worker", worker), ("round", round)]))
                    .unwrap();
                registration.modify(props(&[("worker", worker), ("round", round), ("touched", 1)])).unwrap();
                registration.unregister().unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // Every registration must appear as Registered -> Modified ->
    // Unregistering, in that order, whatever the interleaving across
    // registrations was.
    let events = recorder.events.lock();
    let mut per_registration: std::collections::HashMap<RegistrationId, Vec<ServiceEventKind>> = Default::default();
    for (id, kind) in events.iter() {
        per_registration.entry(*id).or_default().push(*kind);
    }
    assert_eq!(per_registration.len(), 8 * 20);
    for kinds in per_registration.values() {
        assert_eq!(
            kinds,
            &vec![
                ServiceEventKind::Registered,
                ServiceEventKind::Modified,
                ServiceEventKind::Unregistering
            ]
        );
    }
}

#[test]
fn test_unregister_returns_after_listener_callbacks() {
    struct SlowRelease {
        released: Arc<AtomicBool>,
    }

    impl ServiceListener for SlowRelease {
        fn service_changed(&self, event: &ServiceEvent) {
            if event.kind() == ServiceEventKind::Unregistering {
                // Simulate a consumer taking time to let go of the service.
                thread::sleep(Duration::from_millis(50));
                self.released.store(true, Ordering::SeqCst);
            }
        }
    }

    let registry = ServiceRegistry::new();
    let released = Arc::new(AtomicBool::new(false));
    registry.add_listener(
        ListenerInterest::for_type("t"),
        Arc::new(SlowRelease { released: released.clone() }),
    );

    let registration = registry.register(vec!["t".into()], Arc::new(()), PropertyMap::new()).unwrap();
    registration.unregister().unwrap();
    assert!(released.load(Ordering::SeqCst), "unregister returned before consumers released the service");
}

#[test]
fn test_registered_event_sees_registration_snapshot() {
    struct SnapshotCheck {
        hits: Arc<AtomicUsize>,
    }

    impl ServiceListener for SnapshotCheck {
        fn service_changed(&self, event: &ServiceEvent) {
            if event.kind() == ServiceEventKind::Registered {
                assert_eq!(event.current_properties().ranking(), 7);
                self.hits.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    let registry = ServiceRegistry::new();
    let hits = Arc::new(AtomicUsize::new(0));
    registry.add_listener(ListenerInterest::for_type("t"), Arc::new(SnapshotCheck { hits: hits.clone() }));

    registry.register(vec!["t".into()], Arc::new(()), props(&[("ranking", 7)])).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_listener_sees_service_still_resolvable_during_unregistering() {
    struct ResolvesDuringTeardown {
        registry: Arc<ServiceRegistry>,
        observed: Arc<AtomicUsize>,
    }

    impl ServiceListener for ResolvesDuringTeardown {
        fn service_changed(&self, event: &ServiceEvent) {
            if event.kind() == ServiceEventKind::Unregistering {
                // The registration is dispatched before removal, so a
                // consumer can still look it up while releasing.
                let found = self.registry.find_matching("t", None);
                assert_eq!(found.len(), 1);
                assert_eq!(found[0].id(), event.registration().id());
                self.observed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    let registry = ServiceRegistry::new();
    let observed = Arc::new(AtomicUsize::new(0));
    registry.add_listener(
        ListenerInterest::for_type("t"),
        Arc::new(ResolvesDuringTeardown {
            registry: Arc::clone(&registry),
            observed: observed.clone(),
        }),
    );

    let registration = registry.register(vec!["t".into()], Arc::new(()), PropertyMap::new()).unwrap();
    registration.unregister().unwrap();
    assert_eq!(observed.load(Ordering::SeqCst), 1);
    assert!(registry.find_matching("t", None).is_empty());
}
