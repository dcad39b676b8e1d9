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

//! Randomized consistency check: for every applicable filter, an index must
//! return exactly what a full linear scan returns, whatever sequence of
//! register/modify/unregister calls produced the registry contents.

use std::sync::Arc;

use proptest::prelude::*;

use plexus_core::filter::FilterExpression;
use plexus_core::index::{EqualityIndex, FilterIndex, MultiPropertyIndex};
use plexus_core::properties::PropertyMap;
use plexus_core::registry::{ServiceRegistration, ServiceRegistry};

const TYPES: [&str; 2] = ["alpha", "beta"];

#[derive(Debug, Clone)]
enum Op {
    Register { type_index: usize, a: i64, b: i64, rank: i64 },
    Modify { target: usize, a: i64, b: i64, rank: i64 },
    Unregister { target: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..TYPES.len(), 0..3i64, 0..3i64, 0..5i64)
            .prop_map(|(type_index, a, b, rank)| Op::Register { type_index, a, b, rank }),
        2 => (any::<usize>(), 0..3i64, 0..3i64, 0..5i64)
            .prop_map(|(target, a, b, rank)| Op::Modify { target, a, b, rank }),
        1 => any::<usize>().prop_map(|target| Op::Unregister { target }),
    ]
}

fn service_props(a: i64, b: i64, rank: i64) -> PropertyMap {
    [("a", a), ("b", b), ("ranking", rank)].into_iter().collect()
}

proptest! {
    #[test]
    fn test_index_results_equal_linear_scan(ops in proptest::collection::vec(op_strategy(), 1..48)) {
        let registry = ServiceRegistry::new();
        let equality = Arc::new(EqualityIndex::new("a"));
        let multi = Arc::new(MultiPropertyIndex::new(["a", "b"]));
        Arc::clone(&equality).open(&registry);
        Arc::clone(&multi).open(&registry);

        let mut live: Vec<ServiceRegistration> = Vec::new();
        for op in ops {
            match op {
                Op::Register { type_index, a, b, rank } => {
                    let registration = registry
                        .register(vec![TYPES[type_index].to_string()], Arc::new(()), service_props(a, b, rank))
                        .unwrap();
                    live.push(registration);
                }
                Op::Modify { target, a, b, rank } => {
                    if !live.is_empty() {
                        let registration = &live[target % live.len()];
                        registration.modify(service_props(a, b, rank)).unwrap();
                    }
                }
                Op::Unregister { target } => {
                    if !live.is_empty() {
                        let registration = live.remove(target % live.len());
                        registration.unregister().unwrap();
                    }
                }
            }
        }

        for service_type in TYPES {
            for a in 0..3i64 {
                let single: FilterExpression = format!("(a={a})").parse().unwrap();
                prop_assert!(equality.is_applicable(service_type, &single));
                prop_assert_eq!(
                    equality.find_matching(service_type, &single),
                    registry.find_matching(service_type, Some(&single))
                );

                for b in 0..3i64 {
                    let pair: FilterExpression = format!("(&(a={a})(b={b}))").parse().unwrap();
                    prop_assert!(multi.is_applicable(service_type, &pair));
                    prop_assert_eq!(
                        multi.find_matching(service_type, &pair),
                        registry.find_matching(service_type, Some(&pair))
                    );
                }
            }
        }
    }
}
