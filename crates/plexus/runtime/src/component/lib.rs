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
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use plexus_core::index::IndexSet;
use plexus_core::properties::PropertyMap;
use plexus_core::registry::{RegistrationId, RegistryError, ServiceEvent, ServiceListener, ServiceRegistration, ServiceRegistry};

use crate::component::instance::{ComponentInstance, InjectionMap};
use crate::component::lifecycle::{ComponentState, is_valid_transition};
use crate::dependency::descriptor::DependencyDescriptor;
use crate::dependency::tracker::{BindingAction, ServiceDependency};
use crate::executor::SerialQueue;
use crate::manager::{ErrorListener, ManagerError};

#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("Start callback of component '{component}' failed: {reason}")]
    StartFailed { component: String, reason: String },
    #[error("Callback '{callback}' of component '{component}' panicked")]
    CallbackPanicked { component: String, callback: &'static str },
    #[error("Component '{component}' reached start with required dependency '{slot}' unsatisfied")]
    MissingRequiredDependency { component: String, slot: String },
}

/// The service a component publishes while it is started.
pub struct ProvidedService {
    type_names: Vec<String>,
    properties: PropertyMap,
    object: Arc<dyn Any + Send + Sync>,
}

impl ProvidedService {
    pub fn type_names(&self) -> &[String] {
        &self.type_names
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }
}

/// A managed component: an implementation instance plus its declared
/// dependencies, driven through the lifecycle as availability changes.
///
/// All state transitions and instance callbacks run inside the component's
/// serial queue, so they are linearized no matter which registry thread
/// triggered them.
pub struct Component {
    id: Uuid,
    name: String,
    state: Mutex<ComponentState>,
    instance: Mutex<Box<dyn ComponentInstance>>,
    dependencies: Vec<Arc<ServiceDependency>>,
    provides: Option<ProvidedService>,
    published: Mutex<Option<ServiceRegistration>>,
    queue: SerialQueue,
    registry: Arc<ServiceRegistry>,
    indexes: IndexSet,
    error_listener: Arc<dyn ErrorListener>,
}

impl Component {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ComponentState {
        *self.state.lock()
    }

    pub fn dependencies(&self) -> &[Arc<ServiceDependency>] {
        &self.dependencies
    }

    pub fn dependency_descriptors(&self) -> Vec<DependencyDescriptor> {
        self.dependencies.iter().map(|d| d.descriptor().clone()).collect()
    }

    pub fn provided(&self) -> Option<&ProvidedService> {
        self.provides.as_ref()
    }

    /// Registration id of the published service while Started.
    pub fn published_id(&self) -> Option<RegistrationId> {
        self.published.lock().as_ref().map(ServiceRegistration::id)
    }

    /// Begin tracking dependencies and move toward Started as availability
    /// permits.
    pub(crate) fn activate(self: &Arc<Self>) {
        let component = Arc::clone(self);
        self.queue.execute(move || component.do_activate());
    }

    /// Force Destroyed from whatever state the component is in, waiting for
    /// any in-flight transition to finish first. Safe to call repeatedly.
    pub(crate) fn deactivate(self: &Arc<Self>) {
        let component = Arc::clone(self);
        self.queue.execute_and_wait(move || component.do_teardown());
    }

    fn do_activate(self: &Arc<Self>) {
        self.transition(ComponentState::WaitingForRequired);
        for (index, dependency) in self.dependencies.iter().enumerate() {
            let listener: Arc<dyn ServiceListener> = Arc::new(DependencyListener {
                component: Arc::downgrade(self),
                dependency_index: index,
            });
            dependency.open(&self.registry, &self.indexes, listener);
        }
        self.recompute();
    }

    fn do_teardown(self: &Arc<Self>) {
        if self.state() == ComponentState::Destroyed {
            debug!("Component '{}' already destroyed", self.name);
            return;
        }
        if self.state() == ComponentState::Started {
            self.stop_sequence();
        }
        for dependency in &self.dependencies {
            dependency.close();
        }
        self.call_instance("destroy", |instance| instance.destroy());
        self.transition(ComponentState::Destroyed);
        info!("Component '{}' destroyed", self.name);
    }

    fn process_event(self: &Arc<Self>, dependency_index: usize, event: &ServiceEvent) {
        if self.state() == ComponentState::Destroyed {
            return;
        }
        let dependency = &self.dependencies[dependency_index];
        let actions = dependency.apply_event(event);
        if actions.is_empty() {
            return;
        }

        let lost_required = actions.iter().any(|a| matches!(a, BindingAction::BecameUnavailable));
        let gained_required = actions.iter().any(|a| matches!(a, BindingAction::BecameAvailable));

        // A lost required dependency tears down first: unpublish, then stop,
        // before anything else reacts to this event. The remaining unbind
        // notification is then moot, since the instance is out of service
        // and its injected state void.
        if lost_required {
            self.recompute();
        }

        let slot = dependency.slot().to_string();
        for action in &actions {
            if !self.instance_active() {
                break;
            }
            match action {
                BindingAction::Bound(binding) => self.call_instance("bind", |i| i.bind(&slot, binding)),
                BindingAction::Unbound(binding) => self.call_instance("unbind", |i| i.unbind(&slot, binding)),
                BindingAction::Updated(binding) => self.call_instance("rebind", |i| i.rebind(&slot, binding)),
                BindingAction::Swapped { old, new } => self.call_instance("swap", |i| i.swap(&slot, old, new)),
                BindingAction::BecameAvailable | BindingAction::BecameUnavailable => {}
            }
        }

        if gained_required {
            self.recompute();
        }
    }

    fn recompute(self: &Arc<Self>) {
        let satisfied = self.dependencies.iter().all(|d| d.is_available());
        match (self.state(), satisfied) {
            (ComponentState::WaitingForRequired, true) => self.start_sequence(),
            (ComponentState::Started, false) => self.stop_sequence(),
            _ => {}
        }
    }

    /// Inject, start, publish, in that order: dependents never observe a
    /// published service whose fields are not injected yet.
    fn start_sequence(self: &Arc<Self>) {
        if let Some(unsatisfied) = self.dependencies.iter().find(|d| !d.is_available()) {
            let error = ComponentError::MissingRequiredDependency {
                component: self.name.clone(),
                slot: unsatisfied.slot().to_string(),
            };
            debug_assert!(false, "{error}");
            self.report(error);
            return;
        }

        let injected: InjectionMap = self
            .dependencies
            .iter()
            .map(|d| (d.slot().to_string(), d.bindings()))
            .collect();

        self.transition(ComponentState::Injected);
        self.call_instance("init", |instance| instance.init(&injected));

        if let Err(error) = self.call_start() {
            warn!("Component '{}' failed to start, falling back to waiting", self.name);
            self.report(error);
            self.transition(ComponentState::Stopping);
            self.transition(ComponentState::WaitingForRequired);
            return;
        }

        self.transition(ComponentState::Started);
        self.publish();
    }

    /// Unpublish, stop, in that order: the inverse of startup, so no
    /// consumer can be handed a half-torn-down instance.
    fn stop_sequence(&self) {
        self.unpublish();
        self.transition(ComponentState::Stopping);
        self.call_instance("stop", |instance| instance.stop());
        self.transition(ComponentState::WaitingForRequired);
    }

    fn publish(&self) {
        let Some(provides) = &self.provides else {
            return;
        };
        match self.registry.register(
            provides.type_names.clone(),
            Arc::clone(&provides.object),
            provides.properties.clone(),
        ) {
            Ok(registration) => {
                debug!("Component '{}' published service {}", self.name, registration.id());
                *self.published.lock() = Some(registration);
            }
            // The builder validates the provided service; a failure here
            // means the registry itself is gone.
            Err(error) => error!("Component '{}' failed to publish its service: {}", self.name, error),
        }
    }

    fn unpublish(&self) {
        let registration = self.published.lock().take();
        if let Some(registration) = registration {
            debug!("Component '{}' unpublishing service {}", self.name, registration.id());
            match registration.unregister() {
                Ok(()) | Err(RegistryError::AlreadyUnregistered(_)) => {}
                Err(error) => error!("Component '{}' failed to unpublish: {}", self.name, error),
            }
        }
    }

    fn instance_active(&self) -> bool {
        matches!(self.state(), ComponentState::Injected | ComponentState::Started)
    }

    fn transition(&self, to: ComponentState) {
        let mut state = self.state.lock();
        let from = *state;
        if from == to {
            return;
        }
        if !is_valid_transition(from, to) {
            error!("Component '{}' rejected invalid transition {} -> {}", self.name, from, to);
            debug_assert!(false, "invalid lifecycle transition {from} -> {to}");
            return;
        }
        info!("Component '{}' {} -> {}", self.name, from, to);
        *state = to;
    }

    /// Run a void instance callback, containing any panic so it can never
    /// unwind into the registry's dispatch loop.
    fn call_instance(&self, callback: &'static str, f: impl FnOnce(&mut dyn ComponentInstance)) {
        let panicked = {
            let mut instance = self.instance.lock();
            catch_unwind(AssertUnwindSafe(|| f(&mut **instance))).is_err()
        };
        if panicked {
            self.report(ComponentError::CallbackPanicked {
                component: self.name.clone(),
                callback,
            });
        }
    }

    fn call_start(&self) -> Result<(), ComponentError> {
        let outcome = {
            let mut instance = self.instance.lock();
            catch_unwind(AssertUnwindSafe(|| instance.start()))
        };
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(ComponentError::StartFailed {
                component: self.name.clone(),
                reason: error.to_string(),
            }),
            Err(_) => Err(ComponentError::StartFailed {
                component: self.name.clone(),
                reason: "start callback panicked".into(),
            }),
        }
    }

    fn report(&self, error: ComponentError) {
        error!("{error}");
        self.error_listener.component_failed(&self.name, &error);
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Forwards registry events for one dependency into the owning component's
/// serial queue.
struct DependencyListener {
    component: Weak<Component>,
    dependency_index: usize,
}

impl ServiceListener for DependencyListener {
    fn service_changed(&self, event: &ServiceEvent) {
        let Some(component) = self.component.upgrade() else {
            return;
        };
        let index = self.dependency_index;
        let event = event.clone();
        let task_component = Arc::clone(&component);
        component.queue.execute(move || task_component.process_event(index, &event));
    }
}

/// Assembles a [`Component`] declaration before it is handed to the
/// dependency manager.
pub struct ComponentBuilder {
    name: String,
    instance: Option<Box<dyn ComponentInstance>>,
    dependencies: Vec<ServiceDependency>,
    provides: Option<ProvidedService>,
}

impl ComponentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance: None,
            dependencies: Vec::new(),
            provides: None,
        }
    }

    pub fn instance(mut self, instance: impl ComponentInstance + 'static) -> Self {
        self.instance = Some(Box::new(instance));
        self
    }

    pub fn dependency(mut self, descriptor: DependencyDescriptor) -> Self {
        self.dependencies.push(ServiceDependency::new(descriptor));
        self
    }

    /// Add a dependency with a custom tracker (e.g. a non-default bound-set
    /// comparator).
    pub fn tracked_dependency(mut self, dependency: ServiceDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Publish `object` under `type_names` while the component is Started.
    pub fn provides(mut self, type_names: Vec<String>, properties: PropertyMap, object: Arc<dyn Any + Send + Sync>) -> Self {
        self.provides = Some(ProvidedService {
            type_names,
            properties,
            object,
        });
        self
    }

    pub(crate) fn build(
        self,
        registry: Arc<ServiceRegistry>,
        indexes: IndexSet,
        error_listener: Arc<dyn ErrorListener>,
    ) -> Result<Arc<Component>, ManagerError> {
        let instance = self.instance.ok_or_else(|| ManagerError::MissingInstance(self.name.clone()))?;
        if let Some(provides) = &self.provides {
            if provides.type_names.is_empty() || provides.type_names.iter().any(|t| t.trim().is_empty()) {
                return Err(ManagerError::InvalidProvidedService(
                    self.name.clone(),
                    "provided service needs at least one non-blank type name".into(),
                ));
            }
        }

        Ok(Arc::new(Component {
            id: Uuid::new_v4(),
            name: self.name,
            state: Mutex::new(ComponentState::Instantiated),
            instance: Mutex::new(instance),
            dependencies: self.dependencies.into_iter().map(Arc::new).collect(),
            provides: self.provides,
            published: Mutex::new(None),
            queue: SerialQueue::new(),
            registry,
            indexes,
            error_listener,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::instance::{CallbackError, MockComponentInstance};
    use crate::manager::LoggingErrorListener;

    fn build_component(builder: ComponentBuilder, registry: &Arc<ServiceRegistry>) -> Arc<Component> {
        builder
            .build(Arc::clone(registry), IndexSet::new(), Arc::new(LoggingErrorListener))
            .unwrap()
    }

    #[test]
    fn test_builder_requires_an_instance() {
        let registry = ServiceRegistry::new();
        let result = ComponentBuilder::new("empty").build(registry, IndexSet::new(), Arc::new(LoggingErrorListener));
        assert!(matches!(result, Err(ManagerError::MissingInstance(_))));
    }

    #[test]
    fn test_builder_validates_provided_service() {
        let registry = ServiceRegistry::new();
        let result = ComponentBuilder::new("bad")
            .instance(MockComponentInstance::new())
            .provides(vec![], PropertyMap::new(), Arc::new(()))
            .build(registry, IndexSet::new(), Arc::new(LoggingErrorListener));
        assert!(matches!(result, Err(ManagerError::InvalidProvidedService(..))));
    }

    #[test]
    fn test_component_without_dependencies_starts_immediately() {
        let registry = ServiceRegistry::new();
        let mut instance = MockComponentInstance::new();
        instance.expect_init().times(1).return_const(());
        instance.expect_start().times(1).returning(|| Ok(()));
        instance.expect_stop().times(1).return_const(());
        instance.expect_destroy().times(1).return_const(());

        let component = build_component(ComponentBuilder::new("standalone").instance(instance), &registry);
        component.activate();
        assert_eq!(component.state(), ComponentState::Started);

        component.deactivate();
        assert_eq!(component.state(), ComponentState::Destroyed);
    }

    #[test]
    fn test_start_failure_falls_back_to_waiting() {
        let registry = ServiceRegistry::new();
        let mut instance = MockComponentInstance::new();
        instance.expect_init().times(1).return_const(());
        instance
            .expect_start()
            .times(1)
            .returning(|| Err(CallbackError::new("refusing to start")));
        instance.expect_destroy().times(1).return_const(());

        let component = build_component(ComponentBuilder::new("failing").instance(instance), &registry);
        component.activate();
        // No stop: the component never started.
        assert_eq!(component.state(), ComponentState::WaitingForRequired);
        component.deactivate();
    }

    #[test]
    fn test_deactivate_is_idempotent() {
        let registry = ServiceRegistry::new();
        let mut instance = MockComponentInstance::new();
        instance.expect_init().times(1).return_const(());
        instance.expect_start().times(1).returning(|| Ok(()));
        instance.expect_stop().times(1).return_const(());
        instance.expect_destroy().times(1).return_const(());

        let component = build_component(ComponentBuilder::new("twice").instance(instance), &registry);
        component.activate();
        component.deactivate();
        component.deactivate();
        assert_eq!(component.state(), ComponentState::Destroyed);
    }

    #[test]
    fn test_published_service_appears_and_disappears_with_state() {
        let registry = ServiceRegistry::new();
        let mut instance = MockComponentInstance::new();
        instance.expect_init().return_const(());
        instance.expect_start().returning(|| Ok(()));
        instance.expect_stop().return_const(());
        instance.expect_destroy().return_const(());

        let component = build_component(
            ComponentBuilder::new("provider")
                .instance(instance)
                .provides(vec!["greeter".into()], PropertyMap::new(), Arc::new("hello".to_string())),
            &registry,
        );
        component.activate();
        assert_eq!(registry.find_matching("greeter", None).len(), 1);
        assert!(component.published_id().is_some());

        component.deactivate();
        assert!(registry.find_matching("greeter", None).is_empty());
        assert!(component.published_id().is_none());
    }
}
