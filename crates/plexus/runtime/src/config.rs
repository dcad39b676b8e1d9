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

//! Configuration snapshots as services.
//!
//! Each persistent id (pid) is published through the registry under the
//! synthetic [`CONFIG_SERVICE_TYPE`] with the configuration entries as the
//! registration's properties. A configuration dependency is therefore just
//! an ordinary service dependency with a `(pid=...)` filter — see
//! [`crate::dependency::DependencyDescriptor::configuration`] — and
//! configuration updates arrive as rebind notifications.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use plexus_core::properties::PropertyMap;
use plexus_core::registry::{RegistryError, ServiceRegistration, ServiceRegistry};

/// Service type name configuration snapshots are published under.
pub const CONFIG_SERVICE_TYPE: &str = "plexus.config";

/// Property carrying the persistent id of a configuration snapshot.
pub const CONFIG_PID_PROPERTY: &str = "pid";

/// Publishes pid-keyed configuration dictionaries into the registry.
pub struct ConfigStore {
    registry: Arc<ServiceRegistry>,
    entries: Mutex<HashMap<String, ServiceRegistration>>,
}

impl ConfigStore {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Create or update the configuration for `pid`.
    ///
    /// The snapshot travels in the registration's properties; consumers read
    /// it from the binding they receive. A first update registers, later
    /// updates modify in place so dependents observe a rebind rather than an
    /// unbind/bind pair.
    pub fn update(&self, pid: &str, mut properties: PropertyMap) -> Result<(), RegistryError> {
        properties.insert(CONFIG_PID_PROPERTY, pid);
        let mut entries = self.entries.lock();
        match entries.get(pid) {
            Some(existing) => {
                debug!("Updating configuration '{pid}'");
                existing.modify(properties)
            }
            None => {
                info!("Creating configuration '{pid}'");
                let registration = self.registry.register(vec![CONFIG_SERVICE_TYPE.into()], Arc::new(()), properties)?;
                entries.insert(pid.to_string(), registration);
                Ok(())
            }
        }
    }

    /// Delete the configuration for `pid`. Dependents with a required
    /// configuration dependency are stopped before this returns.
    pub fn delete(&self, pid: &str) -> bool {
        let registration = self.entries.lock().remove(pid);
        match registration {
            Some(registration) => {
                info!("Deleting configuration '{pid}'");
                registration.unregister().is_ok()
            }
            None => false,
        }
    }

    /// Current snapshot for `pid`, including the pid property itself.
    pub fn get(&self, pid: &str) -> Option<PropertyMap> {
        self.entries.lock().get(pid).map(ServiceRegistration::properties)
    }

    pub fn pids(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_core::properties::PropertyValue;

    #[test]
    fn test_update_registers_then_modifies() {
        let registry = ServiceRegistry::new();
        let store = ConfigStore::new(Arc::clone(&registry));

        store.update("com.example.http", [("port", 8080)].into_iter().collect()).unwrap();
        assert_eq!(registry.find_matching(CONFIG_SERVICE_TYPE, None).len(), 1);

        store.update("com.example.http", [("port", 9090)].into_iter().collect()).unwrap();
        // Still one registration: updates modify in place.
        let found = registry.find_matching(CONFIG_SERVICE_TYPE, None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].properties().get("port").and_then(PropertyValue::as_int), Some(9090));
    }

    #[test]
    fn test_snapshot_carries_pid_property() {
        let registry = ServiceRegistry::new();
        let store = ConfigStore::new(registry);
        store.update("a.pid", PropertyMap::new()).unwrap();
        let snapshot = store.get("a.pid").unwrap();
        assert_eq!(snapshot.get(CONFIG_PID_PROPERTY).and_then(|v| v.as_str().map(String::from)), Some("a.pid".into()));
    }

    #[test]
    fn test_delete_unregisters() {
        let registry = ServiceRegistry::new();
        let store = ConfigStore::new(Arc::clone(&registry));
        store.update("gone.soon", PropertyMap::new()).unwrap();
        assert!(store.delete("gone.soon"));
        assert!(!store.delete("gone.soon"));
        assert!(registry.find_matching(CONFIG_SERVICE_TYPE, None).is_empty());
        assert!(store.get("gone.soon").is_none());
    }
}
