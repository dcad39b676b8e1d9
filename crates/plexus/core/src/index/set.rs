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

use crate::filter::FilterExpression;
use crate::index::FilterIndex;
use crate::registry::ServiceRegistry;

/// An explicitly constructed, ordered collection of filter indexes.
///
/// The dependency layer asks the set for the first index applicable to a
/// (service type, filter) pair and falls back to a linear registry scan when
/// none applies. There is no process-wide index registry; whoever builds the
/// runtime decides which indexes exist.
#[derive(Clone, Default)]
pub struct IndexSet {
    indexes: Vec<Arc<dyn FilterIndex>>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, index: Arc<dyn FilterIndex>) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn push(&mut self, index: Arc<dyn FilterIndex>) {
        self.indexes.push(index);
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// First index applicable to the given query shape, if any.
    pub fn select(&self, service_type: &str, filter: Option<&FilterExpression>) -> Option<Arc<dyn FilterIndex>> {
        let filter = filter?;
        self.indexes
            .iter()
            .find(|index| index.is_applicable(service_type, filter))
            .cloned()
    }

    pub fn open_all(&self, registry: &Arc<ServiceRegistry>) {
        for index in &self.indexes {
            Arc::clone(index).open(registry);
        }
    }

    pub fn close_all(&self) {
        for index in &self.indexes {
            index.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{EqualityIndex, MultiPropertyIndex};

    #[test]
    fn test_first_applicable_index_wins() {
        let set = IndexSet::new()
            .with(Arc::new(EqualityIndex::new("pid")))
            .with(Arc::new(MultiPropertyIndex::new(["objectclass", "zone"])));

        let single: FilterExpression = "(pid=a)".parse().unwrap();
        let multi: FilterExpression = "(&(objectclass=store)(zone=eu))".parse().unwrap();
        let neither: FilterExpression = "(other>=1)".parse().unwrap();

        assert!(set.select("t", Some(&single)).is_some());
        assert!(set.select("t", Some(&multi)).is_some());
        assert!(set.select("t", Some(&neither)).is_none());
        assert!(set.select("t", None).is_none());
    }
}
