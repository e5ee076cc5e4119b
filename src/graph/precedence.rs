//! Intra-job ordering as an invalid-transit matrix.
//!
//! Each job's nodes form a chain in ascending task order (head first). A
//! transit into a job node is valid only when it respects that chain; the
//! result is flattened into a dense 0/1 matrix that the routing model
//! attaches as a capacity-0 dimension, so any invalid transit makes a
//! route infeasible outright.

use std::collections::HashMap;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};

use super::expand::{Node, NodeRole};
use crate::matrix::Matrix;
use crate::model::PlaceId;

/// Effective ordering key within a job. A head node whose required task
/// list is empty sorts before every optional-task node.
fn effective_order(node: &Node) -> u32 {
    node.first_task_order().unwrap_or(0)
}

/// Directed graph with one vertex per routing node and a chain of edges
/// through each job's nodes in ascending task order. Reachability in this
/// graph is exactly "may come earlier at the same place".
fn ordering_graph(nodes: &[Node]) -> (DiGraph<usize, ()>, Vec<NodeIndex>) {
    let mut graph = DiGraph::new();
    let indices: Vec<NodeIndex> = nodes.iter().map(|n| graph.add_node(n.id)).collect();

    let mut by_place: HashMap<PlaceId, Vec<&Node>> = HashMap::new();
    for node in nodes.iter().filter(|n| n.role != NodeRole::Hub) {
        by_place.entry(node.place).or_default().push(node);
    }

    for group in by_place.values_mut() {
        group.sort_by_key(|n| effective_order(n));
        for pair in group.windows(2) {
            graph.add_edge(indices[pair[0].id], indices[pair[1].id], ());
        }
    }

    (graph, indices)
}

/// Builds the N×N matrix where entry `(a, b)` is 1 iff the transit a→b
/// violates intra-job task order.
///
/// Transits into hubs and into nodes with no tasks are always valid. A
/// job's head node may only be entered from a different place; an
/// optional-task node only from an earlier node of the same job.
pub fn invalid_transit_matrix(nodes: &[Node]) -> Matrix<i64> {
    let (graph, indices) = ordering_graph(nodes);
    let mut invalid: Matrix<i64> = Matrix::new(nodes.len());

    for b in nodes {
        if b.role == NodeRole::Hub || b.tasks.is_empty() {
            continue;
        }
        for a in nodes {
            let valid = match b.role {
                NodeRole::JobHead => a.place != b.place,
                NodeRole::OptionalTask => {
                    a.id != b.id
                        && a.place == b.place
                        && has_path_connecting(&graph, indices[a.id], indices[b.id], None)
                }
                NodeRole::Hub => unreachable!("hubs handled above"),
            };
            if !valid {
                invalid.set(a.id, b.id, 1);
            }
        }
    }

    invalid
}
