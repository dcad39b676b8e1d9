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

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::properties::RANKING_PROPERTY;
use crate::properties::value::PropertyValue;

/// A service property map with unique, case-insensitive keys.
///
/// Lookups normalize the key to lowercase; the original spelling is kept for
/// iteration and serialization. Inserting `"Ranking"` after `"ranking"`
/// replaces the earlier entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "HashMap<String, PropertyValue>", into = "HashMap<String, PropertyValue>")]
pub struct PropertyMap {
    // lowercase key -> (original key, value)
    entries: HashMap<String, (String, PropertyValue)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace a property, returning the previous value if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Option<PropertyValue> {
        let key = key.into();
        self.entries.insert(key.to_lowercase(), (key, value.into())).map(|(_, v)| v)
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(&key.to_lowercase()).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_lowercase())
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.entries.remove(&key.to_lowercase()).map(|(_, v)| v)
    }

    /// Iterate over `(original key, value)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.values().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|(k, _)| k.as_str())
    }

    /// The integer `ranking` property, defaulting to 0 when absent or
    /// non-integer.
    pub fn ranking(&self) -> i64 {
        self.get(RANKING_PROPERTY).and_then(PropertyValue::as_int).unwrap_or(0)
    }
}

impl PartialEq for PropertyMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().all(|(lower, (_, value))| other.entries.get(lower).map(|(_, v)| v) == Some(value))
    }
}

impl<K: Into<String>, V: Into<PropertyValue>> FromIterator<(K, V)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = PropertyMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl From<HashMap<String, PropertyValue>> for PropertyMap {
    fn from(entries: HashMap<String, PropertyValue>) -> Self {
        entries.into_iter().collect()
    }
}

impl From<PropertyMap> for HashMap<String, PropertyValue> {
    fn from(map: PropertyMap) -> Self {
        map.entries.into_values().collect()
    }
}
