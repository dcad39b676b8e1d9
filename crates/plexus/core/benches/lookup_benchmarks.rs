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

//! Service lookup benchmarks: full linear scans against the equality index,
//! which is expected to stay flat as the registry grows.

use std::sync::Arc;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use plexus_core::filter::FilterExpression;
use plexus_core::index::{EqualityIndex, FilterIndex};
use plexus_core::properties::{PropertyMap, PropertyValue};
use plexus_core::registry::ServiceRegistry;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const REGISTRY_SIZES: [usize; 3] = [100, 1_000, 10_000];
const PID_SPACE: usize = 64;

fn populate(registry: &Arc<ServiceRegistry>, size: usize) {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..size {
        let pid = format!("pid-{}", rng.gen_range(0..PID_SPACE));
        let props: PropertyMap = [
            ("pid", PropertyValue::from(pid)),
            ("ranking", PropertyValue::from(rng.gen_range(0..10i64))),
        ]
        .into_iter()
        .collect();
        registry.register(vec!["bench.service".into()], Arc::new(()), props).unwrap();
    }
}

fn bench_find_matching(c: &mut Criterion) {
    let query: FilterExpression = "(pid=pid-7)".parse().unwrap();

    let mut group = c.benchmark_group("find_matching");
    group.throughput(Throughput::Elements(1));

    for size in REGISTRY_SIZES {
        let registry = ServiceRegistry::new();
        let index = Arc::new(EqualityIndex::new("pid"));
        Arc::clone(&index).open(&registry);
        populate(&registry, size);

        group.bench_function(format!("linear_scan_{size}"), |b| {
            b.iter(|| registry.find_matching(black_box("bench.service"), black_box(Some(&query))))
        });
        group.bench_function(format!("equality_index_{size}"), |b| {
            b.iter(|| index.find_matching(black_box("bench.service"), black_box(&query)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_find_matching);
criterion_main!(benches);
