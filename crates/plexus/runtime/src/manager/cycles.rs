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

//! Add-time detection of required-dependency cycles between components.
//!
//! Two components that require each other's provided service can never both
//! start, and with per-component serialization a cycle is also a deadlock
//! hazard; the manager rejects such an addition outright instead.

use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::algo::tarjan_scc;

use crate::component::Component;

/// Whether a required dependency of `from` can be satisfied by the service
/// `to` declares it will provide.
fn depends_on(from: &Component, to: &Component) -> bool {
    let Some(provided) = to.provided() else {
        return false;
    };
    from.dependency_descriptors().iter().any(|descriptor| {
        descriptor.required
            && provided.type_names().iter().any(|t| *t == descriptor.service_type)
            && descriptor.filter.as_ref().is_none_or(|f| f.matches(provided.properties()))
    })
}

/// Find a required-dependency cycle among `existing` plus `candidate`,
/// returning the names of the participating components.
pub(crate) fn find_required_cycle(existing: &[Arc<Component>], candidate: &Arc<Component>) -> Option<Vec<String>> {
    let all: Vec<&Arc<Component>> = existing.iter().chain(std::iter::once(candidate)).collect();

    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..all.len()).map(|i| graph.add_node(i)).collect();
    for (i, from) in all.iter().enumerate() {
        for (j, to) in all.iter().enumerate() {
            if depends_on(from, to) {
                graph.add_edge(nodes[i], nodes[j], ());
            }
        }
    }

    // A strongly connected component with more than one node is a cycle; a
    // single node only is when it depends on itself.
    for scc in tarjan_scc(&graph) {
        let cyclic = scc.len() > 1 || (scc.len() == 1 && graph.contains_edge(scc[0], scc[0]));
        if cyclic {
            let mut names: Vec<String> = scc.iter().map(|n| all[graph[*n]].name().to_string()).collect();
            names.sort();
            return Some(names);
        }
    }
    None
}
