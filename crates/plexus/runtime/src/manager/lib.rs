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

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info, warn};

use plexus_core::index::IndexSet;
use plexus_core::registry::ServiceRegistry;

use crate::component::{Component, ComponentBuilder, ComponentError};
use crate::diagnostics::ComponentSnapshot;
use crate::manager::cycles;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Component '{0}' has no implementation instance")]
    MissingInstance(String),
    #[error("Provided service of component '{0}' is invalid: {1}")]
    InvalidProvidedService(String, String),
    #[error("Adding component '{component}' would create a required-dependency cycle among {cycle:?}")]
    DependencyCycle { component: String, cycle: Vec<String> },
}

/// Receives component failures the runtime swallowed to keep the event
/// machinery alive: start errors and panicking callbacks.
pub trait ErrorListener: Send + Sync {
    fn component_failed(&self, component: &str, error: &ComponentError);
}

/// Default error listener: structured logging only.
pub struct LoggingErrorListener;

impl ErrorListener for LoggingErrorListener {
    fn component_failed(&self, component: &str, error: &ComponentError) {
        error!("Component '{component}' reported a failure: {error}");
    }
}

/// Facade over a set of managed components sharing one registry and one
/// index set.
///
/// Components are torn down in reverse registration order at shutdown, so a
/// later-added component that depends on an earlier one stops before its
/// dependency disappears.
pub struct DependencyManager {
    registry: Arc<ServiceRegistry>,
    indexes: IndexSet,
    components: Mutex<Vec<Arc<Component>>>,
    error_listener: Arc<dyn ErrorListener>,
}

impl DependencyManager {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            indexes: IndexSet::new(),
            components: Mutex::new(Vec::new()),
            error_listener: Arc::new(LoggingErrorListener),
        }
    }

    /// Attach a set of filter indexes; they are opened against the
    /// registry immediately.
    pub fn with_indexes(mut self, indexes: IndexSet) -> Self {
        indexes.open_all(&self.registry);
        self.indexes = indexes;
        self
    }

    pub fn with_error_listener(mut self, listener: Arc<dyn ErrorListener>) -> Self {
        self.error_listener = listener;
        self
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Register a component and open its dependency subscriptions,
    /// transitioning it toward Started as availability permits.
    ///
    /// Fails without side effects when the addition would create a
    /// required-dependency cycle.
    pub fn add(&self, builder: ComponentBuilder) -> Result<Arc<Component>, ManagerError> {
        let component = builder.build(Arc::clone(&self.registry), self.indexes.clone(), Arc::clone(&self.error_listener))?;

        {
            let mut components = self.components.lock();
            if let Some(cycle) = cycles::find_required_cycle(&components, &component) {
                warn!(
                    "Rejecting component '{}': required-dependency cycle among {:?}",
                    component.name(),
                    cycle
                );
                return Err(ManagerError::DependencyCycle {
                    component: component.name().to_string(),
                    cycle,
                });
            }
            components.push(Arc::clone(&component));
        }

        info!("Added component '{}'", component.name());
        component.activate();
        Ok(component)
    }

    /// Force a component to Destroyed, whatever its current state. Waits
    /// for any in-flight lifecycle transition; calling again is a no-op.
    pub fn remove(&self, component: &Arc<Component>) {
        self.components.lock().retain(|c| c.id() != component.id());
        component.deactivate();
        info!("Removed component '{}'", component.name());
    }

    /// Tear down every component in reverse registration order.
    pub fn shutdown(&self) {
        let components: Vec<Arc<Component>> = {
            let mut lock = self.components.lock();
            lock.drain(..).collect()
        };
        info!("Shutting down {} components", components.len());
        for component in components.iter().rev() {
            component.deactivate();
        }
    }

    pub fn components(&self) -> Vec<Arc<Component>> {
        self.components.lock().clone()
    }

    /// Read-only state snapshots for diagnostics and shell-style tooling.
    pub fn snapshots(&self) -> Vec<ComponentSnapshot> {
        self.components.lock().iter().map(|c| ComponentSnapshot::capture(c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_core::properties::PropertyMap;

    use crate::component::instance::ComponentInstance;
    use crate::dependency::DependencyDescriptor;

    struct Noop;
    impl ComponentInstance for Noop {}

    fn provider(name: &str, service_type: &str, requires: Option<&str>) -> ComponentBuilder {
        let mut builder = ComponentBuilder::new(name).instance(Noop).provides(
            vec![service_type.to_string()],
            PropertyMap::new(),
            Arc::new(()),
        );
        if let Some(required_type) = requires {
            builder = builder.dependency(DependencyDescriptor::new(required_type, required_type));
        }
        builder
    }

    #[test]
    fn test_mutual_requirement_is_rejected() {
        let manager = DependencyManager::new(ServiceRegistry::new());
        manager.add(provider("a", "type.a", Some("type.b"))).unwrap();
        let result = manager.add(provider("b", "type.b", Some("type.a")));
        assert!(matches!(result, Err(ManagerError::DependencyCycle { .. })));
        // The rejected component left no trace.
        assert_eq!(manager.components().len(), 1);
    }

    #[test]
    fn test_self_requirement_is_rejected() {
        let manager = DependencyManager::new(ServiceRegistry::new());
        let result = manager.add(provider("narcissus", "type.a", Some("type.a")));
        assert!(matches!(result, Err(ManagerError::DependencyCycle { .. })));
    }

    #[test]
    fn test_optional_cycles_are_allowed() {
        let manager = DependencyManager::new(ServiceRegistry::new());
        manager.add(provider("a", "type.a", None)).unwrap();
        let b = ComponentBuilder::new("b")
            .instance(Noop)
            .provides(vec!["type.b".into()], PropertyMap::new(), Arc::new(()))
            .dependency(DependencyDescriptor::new("a", "type.a").optional());
        let a_back = ComponentBuilder::new("a2")
            .instance(Noop)
            .provides(vec!["type.a".into()], PropertyMap::new(), Arc::new(()))
            .dependency(DependencyDescriptor::new("b", "type.b").optional());
        manager.add(b).unwrap();
        manager.add(a_back).unwrap();
        assert_eq!(manager.components().len(), 3);
    }

    #[test]
    fn test_filter_narrowing_avoids_false_cycle() {
        let manager = DependencyManager::new(ServiceRegistry::new());
        // a requires type.b but only in zone eu; b provides zone us, so no
        // edge exists and the pair is fine.
        let a = ComponentBuilder::new("a")
            .instance(Noop)
            .provides(vec!["type.a".into()], PropertyMap::new(), Arc::new(()))
            .dependency(DependencyDescriptor::new("b", "type.b").with_filter_str("(zone=eu)").unwrap());
        let b = ComponentBuilder::new("b")
            .instance(Noop)
            .provides(
                vec!["type.b".into()],
                [("zone", "us")].into_iter().collect(),
                Arc::new(()),
            )
            .dependency(DependencyDescriptor::new("a", "type.a"));
        manager.add(a).unwrap();
        manager.add(b).unwrap();
        assert_eq!(manager.components().len(), 2);
    }
}
