//! The routing node graph.
//!
//! Hubs and jobs expand into an ordered list of [`Node`]s — one node per
//! hub, and for each job a head node carrying the required tasks plus one
//! skippable node per optional task. Intra-job ordering between those
//! nodes is captured as a directed graph and flattened into a dense 0/1
//! invalid-transit matrix.

mod expand;
mod precedence;

pub use expand::{expand_nodes, Node, NodeRole};
pub use precedence::invalid_transit_matrix;
