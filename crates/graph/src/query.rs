use crate::store::GraphStore;
use serde::{Deserialize, Serialize};
use std::collections::BinaryHeap;
use std::collections::HashMap;
use std::cmp::Reverse;

/// One step of a path, in traversal order. `source`/`target` keep the
/// edge's stored direction even when it was walked backwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathEdge {
    pub source: String,
    pub target: String,
    pub label: String,
    pub confidence: f32,
}

/// Breadth-first shortest path by edge count, bounded by `max_depth`.
/// Among equally short paths the one with the lowest aggregate edge
/// insertion index wins, which makes the result reproducible for a fixed
/// build history. Unreachable within the bound yields `None`, not an error.
pub fn shortest_path(
    store: &GraphStore,
    from_id: &str,
    to_id: &str,
    max_depth: usize,
) -> Option<Vec<PathEdge>> {
    if store.entity(from_id).is_none() || store.entity(to_id).is_none() {
        return None;
    }
    if from_id == to_id {
        return Some(Vec::new());
    }

    // Uniform-cost search over (depth, aggregate insertion index).
    let mut best: HashMap<String, (usize, u64)> = HashMap::new();
    let mut heap: BinaryHeap<Reverse<(usize, u64, String, Vec<(String, String, String)>)>> =
        BinaryHeap::new();

    best.insert(from_id.to_string(), (0, 0));
    heap.push(Reverse((0, 0, from_id.to_string(), Vec::new())));

    while let Some(Reverse((depth, agg, node, path))) = heap.pop() {
        if let Some(&(bd, ba)) = best.get(&node) {
            if (depth, agg) > (bd, ba) {
                continue; // stale entry
            }
        }

        if node == to_id {
            let edges = path
                .iter()
                .filter_map(|(s, t, l)| store.edge(s, t, l))
                .map(|e| PathEdge {
                    source: e.source.clone(),
                    target: e.target.clone(),
                    label: e.label.clone(),
                    confidence: e.confidence(),
                })
                .collect();
            return Some(edges);
        }

        if depth == max_depth {
            continue;
        }

        for edge in store.incident_edges(&node) {
            let neighbor = if edge.source == node {
                edge.target.clone()
            } else {
                edge.source.clone()
            };
            let next = (depth + 1, agg + edge.insertion);

            let improved = match best.get(&neighbor) {
                Some(&(bd, ba)) => next < (bd, ba),
                None => true,
            };
            if improved {
                best.insert(neighbor.clone(), next);
                let mut next_path = path.clone();
                next_path.push((edge.source.clone(), edge.target.clone(), edge.label.clone()));
                heap.push(Reverse((next.0, next.1, neighbor, next_path)));
            }
        }
    }

    None
}
