//! Wire formats for workflow documents.
//!
//! Two JSON shapes exist in the wild. The document format is what the
//! repository stores: nodes carry `position` and `data` objects, edges
//! carry `source`/`target` and an optional `exitPoint`. The flat format
//! is the older hand-off shape: nodes list their successors in a `next`
//! array and may or may not carry coordinates. Import sniffs the shape
//! from the first node and falls back to a synthesized grid layout when
//! no coordinates survive.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::catalog::NodeCatalog;
use crate::error::{WorkflowError, WorkflowResult};
use crate::graph::{Edge, Graph, Node};

// ------------------------------------------------------------------
// Serialization structures
// ------------------------------------------------------------------

/// The stored document shape, one workflow per document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    #[serde(
        default,
        deserialize_with = "id_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<DocumentNode>,
    #[serde(default)]
    pub edges: Vec<DocumentEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<WorkflowMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub position: NodePosition,
    pub data: DocumentNodeData,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NodePosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentNodeData {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<IndexMap<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Always written, `{}` when the edge has no exit point.
    #[serde(default)]
    pub data: DocumentEdgeData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEdgeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_point: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl WorkflowMetadata {
    /// Metadata stamped onto documents produced by this editor.
    pub fn editor_default() -> Self {
        WorkflowMetadata {
            category: Some("user-created".to_string()),
            priority: Some("medium".to_string()),
            author: Some("workflow-designer".to_string()),
            version: Some("1.0".to_string()),
            approved: None,
            tags: None,
        }
    }
}

/// The flat hand-off shape: successor lists instead of an edge table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatWorkflow {
    #[serde(
        default,
        deserialize_with = "id_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub workflow_id: Option<String>,
    #[serde(default = "flat_version")]
    pub version: u32,
    pub nodes: Vec<FlatNode>,
    #[serde(default)]
    pub variables: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<IndexMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default)]
    pub next: Vec<String>,
}

fn flat_version() -> u32 {
    1
}

/// Accept both string and numeric ids; stored ids are strings but
/// upstream systems hand out numbers.
fn id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ------------------------------------------------------------------
// Conversion functions
// ------------------------------------------------------------------

/// Which wire shape an imported value turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    /// Document shape, positions under `position`.
    Document,
    /// Flat shape with `x`/`y` on each node.
    FlatPositioned,
    /// Flat shape without coordinates; a grid layout is synthesized.
    FlatGrid,
}

/// Everything an import yields. Identity fields are `None` when the
/// source format does not carry them.
#[derive(Debug, Clone)]
pub struct ImportedWorkflow {
    pub format: ImportFormat,
    pub graph: Graph,
    pub variables: Option<IndexMap<String, String>>,
    pub metadata: Option<WorkflowMetadata>,
    pub workflow_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

pub fn graph_to_document(
    graph: &Graph,
    catalog: &NodeCatalog,
    name: &str,
    description: Option<&str>,
    variables: &IndexMap<String, String>,
) -> WorkflowDocument {
    let nodes = graph
        .nodes
        .values()
        .map(|node| DocumentNode {
            id: node.id.clone(),
            node_type: node.node_type.clone(),
            position: NodePosition { x: node.x, y: node.y },
            data: DocumentNodeData {
                label: node.label.clone(),
                icon: Some(type_icon(catalog, &node.node_type)),
                params: Some(node.params.clone()),
            },
        })
        .collect();
    let edges = graph
        .edges
        .values()
        .map(|edge| DocumentEdge {
            id: edge.id.clone(),
            source: edge.from.clone(),
            target: edge.to.clone(),
            data: DocumentEdgeData {
                exit_point: edge.exit_point.clone(),
            },
        })
        .collect();

    WorkflowDocument {
        workflow_id: None,
        name: name.to_string(),
        description: description.map(str::to_string),
        nodes,
        edges,
        variables: Some(variables.clone()),
        metadata: Some(WorkflowMetadata::editor_default()),
        created_at: None,
        modified_at: None,
    }
}

pub fn document_to_graph(document: &WorkflowDocument) -> Graph {
    let mut graph = Graph::new();
    for node in &document.nodes {
        graph.nodes.insert(
            node.id.clone(),
            Node {
                id: node.id.clone(),
                node_type: node.node_type.clone(),
                label: node.data.label.clone(),
                x: node.position.x,
                y: node.position.y,
                params: node.data.params.clone().unwrap_or_default(),
            },
        );
    }
    for edge in &document.edges {
        graph.edges.insert(
            edge.id.clone(),
            Edge {
                id: edge.id.clone(),
                from: edge.source.clone(),
                to: edge.target.clone(),
                exit_point: edge.data.exit_point.clone(),
            },
        );
    }
    graph
}

pub fn graph_to_flat(
    graph: &Graph,
    workflow_id: Option<&str>,
    variables: &IndexMap<String, String>,
) -> FlatWorkflow {
    let nodes = graph
        .nodes
        .values()
        .map(|node| FlatNode {
            id: node.id.clone(),
            node_type: node.node_type.clone(),
            label: Some(node.label.clone()),
            params: Some(node.params.clone()),
            x: None,
            y: None,
            next: graph
                .edges_from(&node.id)
                .map(|edge| edge.to.clone())
                .collect(),
        })
        .collect();

    FlatWorkflow {
        workflow_id: Some(workflow_id.unwrap_or("workflow").to_string()),
        version: flat_version(),
        nodes,
        variables: variables.clone(),
    }
}

/// Build a graph from the flat shape. With `positioned` the node
/// coordinates are taken as-is (missing ones land at 100); otherwise
/// nodes are spread over a three-column grid.
pub fn flat_to_graph(flat: &FlatWorkflow, positioned: bool) -> Graph {
    let mut graph = Graph::new();
    for (index, node) in flat.nodes.iter().enumerate() {
        let (x, y) = if positioned {
            (node.x.unwrap_or(100.0), node.y.unwrap_or(100.0))
        } else {
            (
                100.0 + (index % 3) as f64 * 200.0,
                100.0 + (index / 3) as f64 * 150.0,
            )
        };
        graph.nodes.insert(
            node.id.clone(),
            Node {
                id: node.id.clone(),
                node_type: node.node_type.clone(),
                label: flat_label(node),
                x,
                y,
                params: node.params.clone().unwrap_or_default(),
            },
        );
    }
    for node in &flat.nodes {
        for (index, target) in node.next.iter().enumerate() {
            let id = format!("edge_{}_{}_{}", node.id, target, index);
            graph.edges.insert(
                id.clone(),
                Edge {
                    id,
                    from: node.id.clone(),
                    to: target.clone(),
                    exit_point: None,
                },
            );
        }
    }
    graph
}

/// Label fallback chain: given label, last type segment, then "Node".
fn flat_label(node: &FlatNode) -> String {
    if let Some(label) = &node.label
        && !label.is_empty()
    {
        return label.clone();
    }
    match node.node_type.rsplit('.').next() {
        Some(segment) if !segment.is_empty() => segment.to_string(),
        _ => "Node".to_string(),
    }
}

fn type_icon(catalog: &NodeCatalog, node_type: &str) -> String {
    match catalog.config(node_type) {
        Some(config) if !config.icon.is_empty() => config.icon.clone(),
        _ => "\u{2022}".to_string(),
    }
}

/// Sniff the wire shape of a parsed JSON value. A value without a
/// `nodes` array is not a workflow at all; an empty `nodes` array is an
/// empty workflow and goes through the grid path.
pub fn detect_format(value: &Value) -> WorkflowResult<ImportFormat> {
    let nodes = value
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or(WorkflowError::InvalidFormat)?;
    let Some(first) = nodes.first() else {
        return Ok(ImportFormat::FlatGrid);
    };
    let positioned = first
        .get("position")
        .and_then(|p| p.get("x"))
        .is_some_and(Value::is_number);
    if positioned {
        return Ok(ImportFormat::Document);
    }
    let has_xy = first.get("x").is_some_and(Value::is_number)
        && first.get("y").is_some_and(Value::is_number);
    if has_xy {
        return Ok(ImportFormat::FlatPositioned);
    }
    Ok(ImportFormat::FlatGrid)
}

pub fn import_value(value: &Value) -> WorkflowResult<ImportedWorkflow> {
    let format = detect_format(value)?;
    debug!(?format, "importing workflow");
    match format {
        ImportFormat::Document => {
            let document: WorkflowDocument = serde_json::from_value(value.clone())?;
            Ok(ImportedWorkflow {
                format,
                graph: document_to_graph(&document),
                variables: document.variables,
                metadata: document.metadata,
                workflow_id: document.workflow_id,
                name: if document.name.is_empty() {
                    None
                } else {
                    Some(document.name)
                },
                description: document.description,
            })
        }
        ImportFormat::FlatPositioned | ImportFormat::FlatGrid => {
            let flat: FlatWorkflow = serde_json::from_value(value.clone())?;
            let positioned = format == ImportFormat::FlatPositioned;
            let graph = flat_to_graph(&flat, positioned);
            Ok(ImportedWorkflow {
                format,
                graph,
                variables: if flat.variables.is_empty() {
                    None
                } else {
                    Some(flat.variables)
                },
                metadata: None,
                workflow_id: flat.workflow_id,
                name: None,
                description: None,
            })
        }
    }
}

pub fn import_str(text: &str) -> WorkflowResult<ImportedWorkflow> {
    let value: Value = serde_json::from_str(text)?;
    import_value(&value)
}

// ------------------------------------------------------------------
// File I/O operations
// ------------------------------------------------------------------

pub fn save_to_file(document: &WorkflowDocument, path: &Path) -> WorkflowResult<()> {
    let json = serde_json::to_string_pretty(document)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_from_file(path: &Path) -> WorkflowResult<ImportedWorkflow> {
    let text = std::fs::read_to_string(path)?;
    import_str(&text)
}
