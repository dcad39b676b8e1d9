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
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::properties::PropertyMap;
use crate::registry::store::{RegistryError, ServiceRegistry};

/// Monotonically increasing registration identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegistrationId(pub u64);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to one published service.
///
/// The handle is cheap to clone; identity is the registration id. The
/// service object is owned by the registrant, the registry only holds a
/// shared reference for consumers to borrow while the registration lives.
#[derive(Clone)]
pub struct ServiceRegistration {
    inner: Arc<RegistrationInner>,
}

pub(crate) struct RegistrationInner {
    pub(crate) id: RegistrationId,
    pub(crate) type_names: Vec<String>,
    pub(crate) instance: Arc<dyn Any + Send + Sync>,
    pub(crate) properties: RwLock<PropertyMap>,
    pub(crate) registry: Weak<ServiceRegistry>,
    // Serializes event dispatch for this registration only, so any one
    // listener observes Registered before Modified before Unregistering.
    pub(crate) dispatch_lock: Mutex<()>,
    pub(crate) unregistered: AtomicBool,
}

impl ServiceRegistration {
    pub(crate) fn new(
        id: RegistrationId,
        type_names: Vec<String>,
        instance: Arc<dyn Any + Send + Sync>,
        properties: PropertyMap,
        registry: Weak<ServiceRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistrationInner {
                id,
                type_names,
                instance,
                properties: RwLock::new(properties),
                registry,
                dispatch_lock: Mutex::new(()),
                unregistered: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> RegistrationId {
        self.inner.id
    }

    /// Immutable set of service type names this registration was published
    /// under.
    pub fn type_names(&self) -> &[String] {
        &self.inner.type_names
    }

    pub fn provides(&self, service_type: &str) -> bool {
        self.inner.type_names.iter().any(|t| t == service_type)
    }

    pub fn instance(&self) -> Arc<dyn Any + Send + Sync> {
        Arc::clone(&self.inner.instance)
    }

    /// Downcast the service object to a concrete type.
    pub fn typed_instance<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner.instance).downcast::<T>().ok()
    }

    /// Snapshot of the current property map.
    pub fn properties(&self) -> PropertyMap {
        self.inner.properties.read().clone()
    }

    pub fn ranking(&self) -> i64 {
        self.inner.properties.read().ranking()
    }

    pub fn is_unregistered(&self) -> bool {
        self.inner.unregistered.load(AtomicOrdering::Acquire)
    }

    /// Replace the property map, firing a Modified event to interested
    /// listeners before returning.
    pub fn modify(&self, properties: PropertyMap) -> Result<(), RegistryError> {
        let registry = self.inner.registry.upgrade().ok_or(RegistryError::RegistryGone)?;
        registry.modify(self, properties)
    }

    /// Withdraw this registration, firing Unregistering synchronously. The
    /// call returns only after all listener callbacks have completed.
    pub fn unregister(&self) -> Result<(), RegistryError> {
        let registry = self.inner.registry.upgrade().ok_or(RegistryError::RegistryGone)?;
        registry.unregister(self)
    }

    pub(crate) fn inner(&self) -> &RegistrationInner {
        &self.inner
    }
}

impl fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("id", &self.inner.id)
            .field("type_names", &self.inner.type_names)
            .field("unregistered", &self.is_unregistered())
            .finish()
    }
}

impl PartialEq for ServiceRegistration {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ServiceRegistration {}

impl std::hash::Hash for ServiceRegistration {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

/// Default ordering over registrations: explicit ranking wins, earlier
/// registration breaks ties.
pub fn ranked_order(a: &ServiceRegistration, b: &ServiceRegistration) -> Ordering {
    b.ranking().cmp(&a.ranking()).then_with(|| a.id().cmp(&b.id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranked_order_prefers_rank_then_age() {
        let registry = ServiceRegistry::new();
        let low = registry
            .register(vec!["t".into()], Arc::new(()), [("ranking", 0)].into_iter().collect())
            .unwrap();
        let high = registry
            .register(vec!["t".into()], Arc::new(()), [("ranking", 10)].into_iter().collect())
            .unwrap();
        let tied = registry
            .register(vec!["t".into()], Arc::new(()), [("ranking", 10)].into_iter().collect())
            .unwrap();

        assert_eq!(ranked_order(&high, &low), Ordering::Less);
        assert_eq!(ranked_order(&high, &tied), Ordering::Less);
        assert_eq!(ranked_order(&tied, &low), Ordering::Less);
    }

    #[test]
    fn test_typed_instance_downcast() {
        let registry = ServiceRegistry::new();
        let registration = registry
            .register(vec!["counter".into()], Arc::new(41_u64), PropertyMap::new())
            .unwrap();
        assert_eq!(registration.typed_instance::<u64>().as_deref(), Some(&41));
        assert!(registration.typed_instance::<String>().is_none());
    }
}
