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

use std::fmt;

use crate::filter::{FilterError, FilterExpression};
use crate::properties::PropertyMap;
use crate::registry::registration::ServiceRegistration;

/// The three kinds of service lifecycle events a registry emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceEventKind {
    Registered,
    Modified,
    Unregistering,
}

impl fmt::Display for ServiceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceEventKind::Registered => "REGISTERED",
            ServiceEventKind::Modified => "MODIFIED",
            ServiceEventKind::Unregistering => "UNREGISTERING",
        };
        f.write_str(name)
    }
}

/// A service-changed notification.
///
/// For Modified events, `previous` carries the property snapshot from before
/// the change so consumers can tell a gained match from a lost one.
#[derive(Clone)]
pub struct ServiceEvent {
    kind: ServiceEventKind,
    registration: ServiceRegistration,
    previous: Option<PropertyMap>,
}

impl ServiceEvent {
    pub(crate) fn new(kind: ServiceEventKind, registration: ServiceRegistration, previous: Option<PropertyMap>) -> Self {
        Self {
            kind,
            registration,
            previous,
        }
    }

    pub fn kind(&self) -> ServiceEventKind {
        self.kind
    }

    pub fn registration(&self) -> &ServiceRegistration {
        &self.registration
    }

    /// Pre-modification property snapshot; `None` for Registered and
    /// Unregistering events.
    pub fn previous(&self) -> Option<&PropertyMap> {
        self.previous.as_ref()
    }

    /// Current property snapshot of the affected registration.
    pub fn current_properties(&self) -> PropertyMap {
        self.registration.properties()
    }
}

impl fmt::Debug for ServiceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEvent")
            .field("kind", &self.kind)
            .field("registration", &self.registration.id())
            .finish()
    }
}

/// Identifier of a registered service listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Receiver of service-changed events. Implementations must tolerate being
/// called from arbitrary threads.
pub trait ServiceListener: Send + Sync {
    fn service_changed(&self, event: &ServiceEvent);
}

/// What a listener wants to hear about: an optional service type and an
/// optional filter over the registration's properties. An empty interest
/// receives every event.
#[derive(Debug, Clone, Default)]
pub struct ListenerInterest {
    pub service_type: Option<String>,
    pub filter: Option<FilterExpression>,
}

impl ListenerInterest {
    /// Interest in every registration of one service type.
    pub fn for_type(service_type: impl Into<String>) -> Self {
        Self {
            service_type: Some(service_type.into()),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: FilterExpression) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Parse and attach a filter string. Syntax errors surface here, at
    /// subscribe time, never during event dispatch.
    pub fn with_filter_str(self, filter: &str) -> Result<Self, FilterError> {
        Ok(self.with_filter(filter.parse()?))
    }

    pub(crate) fn matches(&self, type_names: &[String], properties: &PropertyMap) -> bool {
        if let Some(wanted) = &self.service_type {
            if !type_names.iter().any(|t| t == wanted) {
                return false;
            }
        }
        self.filter.as_ref().is_none_or(|f| f.matches(properties))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interest_matching() {
        let types = vec!["http".to_string(), "net".to_string()];
        let props: PropertyMap = [("port", 80)].into_iter().collect();

        assert!(ListenerInterest::default().matches(&types, &props));
        assert!(ListenerInterest::for_type("http").matches(&types, &props));
        assert!(!ListenerInterest::for_type("ftp").matches(&types, &props));
        assert!(
            ListenerInterest::for_type("net")
                .with_filter_str("(port=80)")
                .unwrap()
                .matches(&types, &props)
        );
        assert!(
            !ListenerInterest::default()
                .with_filter_str("(port=81)")
                .unwrap()
                .matches(&types, &props)
        );
    }

    #[test]
    fn test_bad_filter_rejected_at_subscribe_time() {
        assert!(ListenerInterest::default().with_filter_str("(oops").is_err());
    }
}
