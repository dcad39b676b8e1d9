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
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use plexus_core::index::{FilterIndex, IndexSet};
use plexus_core::properties::PropertyMap;
use plexus_core::registry::{
    ListenerId, ListenerInterest, RegistrationId, ServiceEvent, ServiceEventKind, ServiceListener,
    ServiceRegistration, ServiceRegistry, ranked_order,
};

use crate::dependency::descriptor::{Cardinality, DependencyDescriptor};

/// A bound service as handed to component callbacks and injection.
#[derive(Clone)]
pub struct ServiceBinding {
    registration: ServiceRegistration,
}

impl ServiceBinding {
    pub(crate) fn new(registration: ServiceRegistration) -> Self {
        Self { registration }
    }

    pub fn id(&self) -> RegistrationId {
        self.registration.id()
    }

    pub fn registration(&self) -> &ServiceRegistration {
        &self.registration
    }

    /// Property snapshot of the bound registration.
    pub fn properties(&self) -> PropertyMap {
        self.registration.properties()
    }

    pub fn instance(&self) -> Arc<dyn Any + Send + Sync> {
        self.registration.instance()
    }

    pub fn typed<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.registration.typed_instance::<T>()
    }
}

impl fmt::Debug for ServiceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServiceBinding").field(&self.registration.id()).finish()
    }
}

/// Tracker lifecycle: not yet subscribed, subscribed, or shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Inactive,
    Tracking,
    Closed,
}

/// What one service event did to a dependency's bound set.
///
/// Availability edges are emitted for required dependencies only; an
/// optional dependency is always available, so only bind-level actions flow
/// from it.
#[derive(Debug)]
pub(crate) enum BindingAction {
    Bound(ServiceBinding),
    Unbound(ServiceBinding),
    Updated(ServiceBinding),
    Swapped { old: ServiceBinding, new: ServiceBinding },
    BecameAvailable,
    BecameUnavailable,
}

type Comparator = Arc<dyn Fn(&ServiceRegistration, &ServiceRegistration) -> Ordering + Send + Sync>;

enum Subscription {
    Registry { registry: Arc<ServiceRegistry>, listener_id: ListenerId },
    Index { index: Arc<dyn FilterIndex>, listener_id: ListenerId },
}

/// The live binding of a [`DependencyDescriptor`] to the registrations that
/// currently match it.
///
/// The tracker owns its own listener registration against the registry or,
/// when one applies, a filter index. Bound-set mutation happens exclusively
/// inside the owning component's serialized region; the tracker itself only
/// guards its collections against concurrent reads.
pub struct ServiceDependency {
    descriptor: DependencyDescriptor,
    comparator: Comparator,
    bound: Mutex<Vec<ServiceRegistration>>,
    state: Mutex<TrackerState>,
    subscription: Mutex<Option<Subscription>>,
}

impl ServiceDependency {
    pub fn new(descriptor: DependencyDescriptor) -> Self {
        Self {
            descriptor,
            comparator: Arc::new(ranked_order),
            bound: Mutex::new(Vec::new()),
            state: Mutex::new(TrackerState::Inactive),
            subscription: Mutex::new(None),
        }
    }

    /// Replace the default ranking-then-age order of the bound set.
    pub fn with_comparator(
        mut self,
        comparator: impl Fn(&ServiceRegistration, &ServiceRegistration) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.comparator = Arc::new(comparator);
        self
    }

    pub fn descriptor(&self) -> &DependencyDescriptor {
        &self.descriptor
    }

    pub fn slot(&self) -> &str {
        &self.descriptor.slot
    }

    pub fn state(&self) -> TrackerState {
        *self.state.lock()
    }

    /// `true` unless this dependency is required and nothing is bound.
    pub fn is_available(&self) -> bool {
        !self.descriptor.required || !self.bound.lock().is_empty()
    }

    /// Current bound registrations, primary first.
    pub fn bound_snapshot(&self) -> Vec<ServiceRegistration> {
        self.bound.lock().clone()
    }

    /// Current bound set as bindings, primary first. Unary dependencies
    /// expose only their primary.
    pub fn bindings(&self) -> Vec<ServiceBinding> {
        let bound = self.bound.lock();
        match self.descriptor.cardinality {
            Cardinality::Unary => bound.first().cloned().map(ServiceBinding::new).into_iter().collect(),
            Cardinality::Multiple => bound.iter().cloned().map(ServiceBinding::new).collect(),
        }
    }

    /// Subscribe to service changes and seed the bound set from the
    /// registry's current contents. The first applicable index is preferred
    /// over a direct registry subscription.
    pub(crate) fn open(&self, registry: &Arc<ServiceRegistry>, indexes: &IndexSet, listener: Arc<dyn ServiceListener>) {
        let descriptor = &self.descriptor;
        let subscription = indexes
            .select(&descriptor.service_type, descriptor.filter.as_ref())
            .and_then(|index| {
                let filter = descriptor.filter.as_ref()?;
                let listener_id = index.add_listener(&descriptor.service_type, filter, Arc::clone(&listener))?;
                debug!("Dependency '{}' tracking via filter index", descriptor.slot);
                Some(Subscription::Index { index, listener_id })
            })
            .unwrap_or_else(|| {
                let mut interest = ListenerInterest::for_type(&descriptor.service_type);
                if let Some(filter) = &descriptor.filter {
                    interest = interest.with_filter(filter.clone());
                }
                let listener_id = registry.add_listener(interest, listener);
                Subscription::Registry {
                    registry: Arc::clone(registry),
                    listener_id,
                }
            });
        *self.subscription.lock() = Some(subscription);
        *self.state.lock() = TrackerState::Tracking;

        let existing = registry.find_matching(&descriptor.service_type, descriptor.filter.as_ref());
        let mut bound = self.bound.lock();
        for registration in existing {
            self.insert_sorted(&mut bound, registration);
        }
    }

    /// Unsubscribe and drop all bound state.
    pub(crate) fn close(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            match subscription {
                Subscription::Registry { registry, listener_id } => {
                    registry.remove_listener(listener_id);
                }
                Subscription::Index { index, listener_id } => {
                    index.remove_listener(listener_id);
                }
            }
        }
        self.bound.lock().clear();
        *self.state.lock() = TrackerState::Closed;
    }

    fn matches(&self, registration: &ServiceRegistration) -> bool {
        registration.provides(&self.descriptor.service_type)
            && self
                .descriptor
                .filter
                .as_ref()
                .is_none_or(|f| f.matches(&registration.properties()))
    }

    fn insert_sorted(&self, bound: &mut Vec<ServiceRegistration>, registration: ServiceRegistration) {
        if bound.iter().any(|r| r.id() == registration.id()) {
            return;
        }
        let position = bound
            .binary_search_by(|other| (self.comparator)(other, &registration))
            .unwrap_or_else(|insert_at| insert_at);
        bound.insert(position, registration);
    }

    /// Fold one service event into the bound set and report what happened.
    ///
    /// Must be called from the owning component's serialized region so that
    /// the resulting callbacks cannot interleave.
    pub(crate) fn apply_event(&self, event: &ServiceEvent) -> Vec<BindingAction> {
        if self.state() != TrackerState::Tracking {
            return Vec::new();
        }

        let registration = event.registration();
        let mut bound = self.bound.lock();
        let was_bound = bound.iter().any(|r| r.id() == registration.id());
        let matches_now = event.kind() != ServiceEventKind::Unregistering && self.matches(registration);

        match (was_bound, matches_now) {
            (false, true) => self.handle_added(&mut bound, registration),
            (true, true) => self.handle_changed(&mut bound, registration),
            (true, false) => self.handle_removed(&mut bound, registration),
            (false, false) => Vec::new(),
        }
    }

    fn handle_added(&self, bound: &mut Vec<ServiceRegistration>, registration: &ServiceRegistration) -> Vec<BindingAction> {
        let previous_primary = bound.first().cloned();
        self.insert_sorted(bound, registration.clone());
        let binding = ServiceBinding::new(registration.clone());

        if bound.len() == 1 {
            let mut actions = vec![BindingAction::Bound(binding)];
            if self.descriptor.required {
                actions.push(BindingAction::BecameAvailable);
            }
            return actions;
        }

        match self.descriptor.cardinality {
            Cardinality::Multiple => vec![BindingAction::Bound(binding)],
            Cardinality::Unary => {
                let displaced_primary = bound.first().is_some_and(|r| r.id() == registration.id());
                match previous_primary {
                    Some(old) if displaced_primary && self.descriptor.swap_on_replacement => {
                        vec![BindingAction::Swapped {
                            old: ServiceBinding::new(old),
                            new: binding,
                        }]
                    }
                    _ => Vec::new(),
                }
            }
        }
    }

    fn handle_changed(&self, bound: &mut Vec<ServiceRegistration>, registration: &ServiceRegistration) -> Vec<BindingAction> {
        let previous_primary = bound.first().cloned();
        // Re-sort: a modified ranking may move this registration.
        bound.retain(|r| r.id() != registration.id());
        self.insert_sorted(bound, registration.clone());
        let binding = ServiceBinding::new(registration.clone());

        match self.descriptor.cardinality {
            Cardinality::Multiple => vec![BindingAction::Updated(binding)],
            Cardinality::Unary => {
                let current_primary = bound.first().cloned();
                let previous_id = previous_primary.as_ref().map(ServiceRegistration::id);
                let current_id = current_primary.as_ref().map(ServiceRegistration::id);
                if previous_id == current_id {
                    if current_id == Some(registration.id()) {
                        vec![BindingAction::Updated(binding)]
                    } else {
                        Vec::new()
                    }
                } else if let (Some(old), Some(new), true) = (previous_primary, current_primary, self.descriptor.swap_on_replacement) {
                    vec![BindingAction::Swapped {
                        old: ServiceBinding::new(old),
                        new: ServiceBinding::new(new),
                    }]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn handle_removed(&self, bound: &mut Vec<ServiceRegistration>, registration: &ServiceRegistration) -> Vec<BindingAction> {
        let was_primary = bound.first().is_some_and(|r| r.id() == registration.id());
        bound.retain(|r| r.id() != registration.id());
        let binding = ServiceBinding::new(registration.clone());

        if bound.is_empty() {
            let mut actions = vec![BindingAction::Unbound(binding)];
            if self.descriptor.required {
                actions.push(BindingAction::BecameUnavailable);
            }
            return actions;
        }

        match self.descriptor.cardinality {
            Cardinality::Multiple => vec![BindingAction::Unbound(binding)],
            Cardinality::Unary => match bound.first().cloned() {
                Some(new_primary) if was_primary => vec![BindingAction::Swapped {
                    old: binding,
                    new: ServiceBinding::new(new_primary),
                }],
                _ => Vec::new(),
            },
        }
    }
}
