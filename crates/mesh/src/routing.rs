//! Route Planner - minimum-hop paths over a topology snapshot.
//!
//! Breadth-first search in the snapshot's enumeration order. Offline nodes
//! are never entered, neither as relays nor as the destination; the source
//! itself is always the starting point. Among equal-hop paths the first one
//! discovered wins, so results are deterministic for a given node order but
//! not geographically optimal.

use crate::topology::RangeModel;
use himesh_core::{Node, NodeId};
use std::collections::VecDeque;

/// Find a minimum-hop path from `source` to `destination`.
///
/// Returns the full path including both endpoints, or `None` when the
/// destination is unknown, offline, or in another component.
pub fn find_path(
    model: &RangeModel,
    source: &NodeId,
    destination: &NodeId,
    nodes: &[Node],
) -> Option<Vec<NodeId>> {
    let start = nodes.iter().position(|n| &n.id == source)?;
    if source == destination {
        return Some(vec![source.clone()]);
    }

    let mut parent: Vec<Option<usize>> = vec![None; nodes.len()];
    let mut visited = vec![false; nodes.len()];
    let mut queue = VecDeque::new();

    visited[start] = true;
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        for (next, candidate) in nodes.iter().enumerate() {
            if visited[next] || candidate.is_offline() || !model.in_range(&nodes[current], candidate) {
                continue;
            }
            visited[next] = true;
            parent[next] = Some(current);

            if &candidate.id == destination {
                return Some(unwind(nodes, &parent, next));
            }
            queue.push_back(next);
        }
    }

    None
}

/// Whether any path exists
pub fn can_reach(model: &RangeModel, source: &NodeId, destination: &NodeId, nodes: &[Node]) -> bool {
    find_path(model, source, destination, nodes).is_some()
}

/// Number of relay nodes on a path; a direct link has zero
pub fn relay_count(path: &[NodeId]) -> u32 {
    path.len().saturating_sub(2) as u32
}

fn unwind(nodes: &[Node], parent: &[Option<usize>], end: usize) -> Vec<NodeId> {
    let mut path = vec![nodes[end].id.clone()];
    let mut cursor = parent[end];
    while let Some(index) = cursor {
        path.push(nodes[index].id.clone());
        cursor = parent[index];
    }
    path.reverse();
    path
}
