//! Traversal path through the concept graph connecting retrieved documents.
//!
//! Greedy and one hop deep: each stop links to the current path tail
//! directly, through the best single concept bridge, or not at all.

use papergraph_store::ConceptGraph;

fn push_unique(path: &mut Vec<String>, id: &str) {
    if !path.iter().any(|p| p == id) {
        path.push(id.to_string());
    }
}

/// Concept neighbor of `from` that also touches `to`, maximizing
/// `w(from, bridge) + w(bridge, to)`. Ties go to the earliest neighbor in
/// edge-insertion order.
pub fn best_bridge(graph: &ConceptGraph, from: &str, to: &str) -> Option<String> {
    let mut best: Option<(String, f64)> = None;
    for neighbor in graph.neighbors(from) {
        if !neighbor.node.is_concept() {
            continue;
        }
        let Some(onward) = graph.edge_weight(&neighbor.node.id, to) else {
            continue;
        };
        let combined = neighbor.weight + onward;
        if best.as_ref().map_or(true, |(_, w)| combined > *w) {
            best = Some((neighbor.node.id, combined));
        }
    }
    best.map(|(id, _)| id)
}

/// Stitch ordered document `stops` into a path. Each node appears once.
pub fn stitch_path(graph: &ConceptGraph, stops: &[String]) -> Vec<String> {
    let mut path: Vec<String> = Vec::new();
    let Some(first) = stops.first() else {
        return path;
    };
    path.push(first.clone());

    for stop in &stops[1..] {
        let last = match path.last() {
            Some(last) => last.clone(),
            None => break,
        };
        if graph.has_edge(&last, stop) {
            push_unique(&mut path, &last);
            push_unique(&mut path, stop);
        } else if let Some(bridge) = best_bridge(graph, &last, stop) {
            push_unique(&mut path, &last);
            push_unique(&mut path, &bridge);
            push_unique(&mut path, stop);
        } else {
            push_unique(&mut path, stop);
        }
    }
    path
}
