//! The node/edge model: what a workflow graph *is*, independent of any
//! editing session state.

use indexmap::IndexMap;
use rand::Rng;
use serde_json::Value;

/// Exit point assumed for edges that do not declare one.
pub const DEFAULT_EXIT: &str = "next";

/// A typed step in the workflow with a canvas position and a parameter bag.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub node_type: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub params: IndexMap<String, Value>,
}

/// A directed transition between two nodes, departing from a named exit
/// point of the source node.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub exit_point: Option<String>,
}

impl Edge {
    /// The edge's exit point with the implicit default applied.
    pub fn exit(&self) -> &str {
        self.exit_point.as_deref().unwrap_or(DEFAULT_EXIT)
    }
}

/// Current selection. Selecting a node replaces any edge selection and
/// vice versa, so the two can never be set at once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    Node(String),
    Edge(String),
}

impl Selection {
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Selection::Node(id) => Some(id),
            _ => None,
        }
    }

    pub fn edge_id(&self) -> Option<&str> {
        match self {
            Selection::Edge(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Selection::None)
    }
}

/// Insertion-ordered node and edge collections keyed by id.
///
/// Edge endpoints are expected to reference existing node ids, but the
/// model does not enforce it; imported documents can violate it and the
/// validator reports those edges instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub nodes: IndexMap<String, Node>,
    pub edges: IndexMap<String, Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Edges departing from `id`.
    pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.values().filter(move |e| e.from == id)
    }

    /// Edges arriving at `id`.
    pub fn edges_to<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.values().filter(move |e| e.to == id)
    }

    /// Remove a node together with every edge that references it.
    /// Returns the removed node, or `None` if the id was unknown.
    pub fn remove_node_cascade(&mut self, id: &str) -> Option<Node> {
        let node = self.nodes.shift_remove(id)?;
        self.edges.retain(|_, e| e.from != id && e.to != id);
        Some(node)
    }

    /// A node id not yet present in the graph.
    pub fn fresh_node_id(&self) -> String {
        loop {
            let id = random_id("node");
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    /// An edge id not yet present in the graph.
    pub fn fresh_edge_id(&self) -> String {
        loop {
            let id = random_id("edge");
            if !self.edges.contains_key(&id) {
                return id;
            }
        }
    }
}

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 6;

/// Random id of the form `{prefix}_{6 base-36 chars}`.
pub fn random_id(prefix: &str) -> String {
    let mut rng = rand::rng();
    let mut id = String::with_capacity(prefix.len() + 1 + ID_SUFFIX_LEN);
    id.push_str(prefix);
    id.push('_');
    for _ in 0..ID_SUFFIX_LEN {
        let i = rng.random_range(0..ID_ALPHABET.len());
        id.push(ID_ALPHABET[i] as char);
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            node_type: "action.sms".to_string(),
            label: id.to_string(),
            x: 0.0,
            y: 0.0,
            params: IndexMap::new(),
        }
    }

    fn edge(id: &str, from: &str, to: &str) -> Edge {
        Edge {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            exit_point: None,
        }
    }

    #[test]
    fn remove_node_cascades_to_touching_edges() {
        let mut g = Graph::new();
        for id in ["a", "b", "c"] {
            g.nodes.insert(id.to_string(), node(id));
        }
        g.edges.insert("e1".to_string(), edge("e1", "a", "b"));
        g.edges.insert("e2".to_string(), edge("e2", "b", "c"));
        g.edges.insert("e3".to_string(), edge("e3", "a", "c"));

        let removed = g.remove_node_cascade("b");
        assert_eq!(removed.map(|n| n.id), Some("b".to_string()));
        assert_eq!(g.edges.len(), 1);
        assert!(g.edges.contains_key("e3"));
        assert!(g.edges.values().all(|e| e.from != "b" && e.to != "b"));
    }

    #[test]
    fn remove_unknown_node_is_a_no_op() {
        let mut g = Graph::new();
        g.nodes.insert("a".to_string(), node("a"));
        assert!(g.remove_node_cascade("missing").is_none());
        assert_eq!(g.nodes.len(), 1);
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut g = Graph::new();
        for id in ["z", "a", "m"] {
            g.nodes.insert(id.to_string(), node(id));
        }
        let order: Vec<&str> = g.nodes.keys().map(String::as_str).collect();
        assert_eq!(order, ["z", "a", "m"]);
    }

    #[test]
    fn random_ids_have_prefix_and_length() {
        let id = random_id("node");
        assert!(id.starts_with("node_"));
        assert_eq!(id.len(), "node_".len() + 6);
        assert!(
            id["node_".len()..]
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn edge_exit_defaults_to_next() {
        let mut e = edge("e1", "a", "b");
        assert_eq!(e.exit(), "next");
        e.exit_point = Some("onTrue".to_string());
        assert_eq!(e.exit(), "onTrue");
    }
}
