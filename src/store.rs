//! The editing session: one workflow graph plus everything a designer
//! surface needs around it (selection, viewport, gestures, history,
//! variables, catalog).
//!
//! Mutations that change the persisted meaning of the workflow commit a
//! history entry and notify commit hooks; transient updates (live drag,
//! keystroke-by-keystroke edits) use the `_silent` variants and commit
//! once when the gesture or edit finishes.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::catalog::NodeCatalog;
use crate::connection::{ClickOutcome, ConnectionState};
use crate::error::WorkflowResult;
use crate::graph::{DEFAULT_EXIT, Edge, Graph, Node, Selection};
use crate::history::{History, HistoryEntry};
use crate::markers::{MarkerContext, MarkerRegistry};
use crate::serialization::{
    self, FlatWorkflow, ImportFormat, WorkflowDocument, WorkflowMetadata,
    document_to_graph, graph_to_document, graph_to_flat,
};
use crate::validate::ValidationReport;
use crate::variables::VariableSet;
use crate::viewport::{PanGesture, Viewport};

/// Optional overrides when adding a node. Anything left unset falls back
/// to the catalog defaults and the position cascade.
#[derive(Debug, Clone, Default)]
pub struct AddNodeOptions {
    pub label: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub params: IndexMap<String, Value>,
}

/// In-progress node drag: which node is held and where inside it the
/// cursor grabbed, in world units.
#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    pub node_id: String,
    pub grab_dx: f64,
    pub grab_dy: f64,
}

type CommitHook = Box<dyn Fn(&Store, &str)>;

pub struct Store {
    pub graph: Graph,
    pub selection: Selection,
    pub viewport: Viewport,
    pub connection: ConnectionState,
    pub catalog: NodeCatalog,
    pub markers: MarkerRegistry,
    pub variables: VariableSet,
    /// Session context handed to marker processors (user, organization).
    pub marker_context: MarkerContext,
    // Workflow identity, set by load and save.
    pub workflow_id: Option<String>,
    pub workflow_name: String,
    pub workflow_description: Option<String>,
    pub metadata: Option<WorkflowMetadata>,
    history: History,
    pan: Option<PanGesture>,
    drag: Option<DragState>,
    commit_hooks: Vec<CommitHook>,
}

impl Store {
    pub fn new() -> Self {
        Self::with_catalog(NodeCatalog::builtin())
    }

    pub fn with_catalog(catalog: NodeCatalog) -> Self {
        let mut store = Store {
            graph: Graph::new(),
            selection: Selection::None,
            viewport: Viewport::new(),
            connection: ConnectionState::Idle,
            catalog,
            markers: MarkerRegistry::builtin(),
            variables: VariableSet::new(),
            marker_context: MarkerContext::default(),
            workflow_id: None,
            workflow_name: String::new(),
            workflow_description: None,
            metadata: None,
            history: History::new(),
            pan: None,
            drag: None,
            commit_hooks: Vec::new(),
        };
        // Baseline entry so the first real action can be undone.
        store
            .history
            .save(&store.graph, &store.selection, "Initial state");
        store
    }

    /// Register an observer called after every committed change with the
    /// entry description.
    pub fn on_commit(&mut self, hook: impl Fn(&Store, &str) + 'static) {
        self.commit_hooks.push(Box::new(hook));
    }

    fn commit(&mut self, description: &str) {
        self.history.save(&self.graph, &self.selection, description);
        let hooks = std::mem::take(&mut self.commit_hooks);
        for hook in &hooks {
            hook(self, description);
        }
        self.commit_hooks = hooks;
    }

    fn node_label_or_default(&self, id: &str) -> String {
        self.graph
            .node(id)
            .map(|n| n.label.clone())
            .unwrap_or_else(|| "node".to_string())
    }

    // ------------------------------------------------------------------
    // Node operations
    // ------------------------------------------------------------------

    /// Add a node of `node_type`. Catalog defaults are marker-processed
    /// and merged under any explicitly provided params; the new node is
    /// selected. Returns a copy of the inserted node.
    pub fn add_node(&mut self, node_type: &str, options: AddNodeOptions) -> Node {
        let id = self.graph.fresh_node_id();
        let count = self.graph.nodes.len();
        let base_x = 120.0 + count as f64 * 24.0;
        let base_y = 80.0 + count as f64 * 16.0;

        let mut context = self.marker_context.clone();
        context.workflow_id = self.workflow_id.clone();
        let mut params = match self.catalog.config(node_type) {
            Some(config) => self
                .markers
                .process_node_defaults(&config.properties, &context),
            None => IndexMap::new(),
        };
        for (key, value) in options.params {
            params.insert(key, value);
        }

        let label = options
            .label
            .filter(|l| !l.is_empty())
            .or_else(|| self.catalog.label_for(node_type).map(str::to_string))
            .unwrap_or_else(|| node_type.to_string());

        let node = Node {
            id: id.clone(),
            node_type: node_type.to_string(),
            label,
            x: options.x.unwrap_or(base_x),
            y: options.y.unwrap_or(base_y),
            params,
        };
        self.graph.nodes.insert(id.clone(), node.clone());
        self.selection = Selection::Node(id);
        self.commit(&format!("Added node: {}", node.label));
        node
    }

    /// Remove a node and every edge touching it. Unknown ids are a
    /// no-op. Returns whether anything was removed.
    pub fn remove_node(&mut self, id: &str) -> bool {
        let Some(node) = self.graph.remove_node_cascade(id) else {
            return false;
        };
        if self.selection.node_id() == Some(id) {
            self.selection = Selection::None;
        }
        self.commit(&format!("Removed node: {}", node.label));
        true
    }

    /// Clone a node with a fresh id, offset on the canvas and a
    /// " (Copy)" label suffix. The copy becomes the selection.
    pub fn duplicate_node(&mut self, id: &str) -> Option<Node> {
        let source = self.graph.node(id)?.clone();
        let new_id = self.graph.fresh_node_id();
        let copy = Node {
            id: new_id.clone(),
            label: format!("{} (Copy)", source.label),
            x: source.x + 150.0,
            y: source.y + 50.0,
            ..source.clone()
        };
        self.graph.nodes.insert(new_id.clone(), copy.clone());
        self.selection = Selection::Node(new_id);
        self.commit(&format!("Duplicated node: {}", source.label));
        Some(copy)
    }

    // ------------------------------------------------------------------
    // Edge operations
    // ------------------------------------------------------------------

    /// Create an edge `from --exit--> to`, subject to edge policy: a
    /// second edge with the same source, target and exit point is
    /// rejected, as is any edge directly reversing an existing one.
    /// Returns the created edge, or `None` when rejected.
    pub fn add_edge(
        &mut self,
        from: &str,
        to: &str,
        exit_point: Option<&str>,
    ) -> Option<Edge> {
        let exit = exit_point.unwrap_or(DEFAULT_EXIT);
        let same_exit_exists = self
            .graph
            .edges
            .values()
            .any(|e| e.from == from && e.to == to && e.exit() == exit);
        let reverse_exists = self
            .graph
            .edges
            .values()
            .any(|e| e.from == to && e.to == from);
        if same_exit_exists || reverse_exists {
            debug!(from, to, exit, "edge rejected by duplicate/reverse policy");
            return None;
        }

        let id = self.graph.fresh_edge_id();
        let edge = Edge {
            id: id.clone(),
            from: from.to_string(),
            to: to.to_string(),
            exit_point: Some(exit.to_string()),
        };
        self.graph.edges.insert(id, edge.clone());
        let from_label = self.node_label_or_default(from);
        let to_label = self.node_label_or_default(to);
        self.commit(&format!("Connected {from_label} ({exit}) → {to_label}"));
        Some(edge)
    }

    /// Remove an edge. Unknown ids are a no-op.
    pub fn remove_edge(&mut self, id: &str) -> bool {
        if self.graph.edges.shift_remove(id).is_none() {
            return false;
        }
        if self.selection.edge_id() == Some(id) {
            self.selection = Selection::None;
        }
        self.commit("Removed connection");
        true
    }

    // ------------------------------------------------------------------
    // Connection drawing
    // ------------------------------------------------------------------

    /// First click of the two-click protocol, on an output port. A
    /// missing exit point name means the port's implicit default exit.
    pub fn begin_connect_from_output(
        &mut self,
        node_id: &str,
        exit_point: Option<&str>,
    ) -> bool {
        self.connection
            .begin_from_output(node_id, exit_point.unwrap_or(DEFAULT_EXIT))
    }

    /// First click on an input port. Such a connection can only be
    /// cancelled; it exists so the UI can show the pending state.
    pub fn begin_connect_from_input(&mut self, node_id: &str) -> bool {
        self.connection.begin_from_input(node_id)
    }

    /// Second click of the protocol. When the state machine completes,
    /// edge policy decides whether an edge actually appears.
    pub fn click_connect_target(&mut self, target: &str) -> Option<Edge> {
        match self.connection.click_target(target) {
            ClickOutcome::Complete { source, exit_point } => {
                self.add_edge(&source, target, Some(&exit_point))
            }
            ClickOutcome::Ignored => None,
        }
    }

    pub fn cancel_connection(&mut self) -> bool {
        self.connection.cancel()
    }

    // ------------------------------------------------------------------
    // Node dragging
    // ------------------------------------------------------------------

    /// Grab a node. The grab offset is the cursor's world-space distance
    /// from the node origin, so the node does not jump to the cursor.
    /// Ignored while panning; an armed connection is discarded.
    pub fn start_drag(&mut self, node_id: &str, grab_dx: f64, grab_dy: f64) -> bool {
        if self.pan.is_some() || !self.graph.nodes.contains_key(node_id) {
            return false;
        }
        self.connection.cancel();
        self.drag = Some(DragState {
            node_id: node_id.to_string(),
            grab_dx,
            grab_dy,
        });
        true
    }

    /// Live position update from cursor screen coordinates. No history
    /// entry; the move commits once on `end_drag`.
    pub fn update_drag(&mut self, screen_x: f64, screen_y: f64) {
        let Some(drag) = &self.drag else {
            return;
        };
        let (world_x, world_y) = self.viewport.screen_to_world(screen_x, screen_y);
        let x = world_x - drag.grab_dx;
        let y = world_y - drag.grab_dy;
        let id = drag.node_id.clone();
        if let Some(node) = self.graph.node_mut(&id) {
            node.x = x;
            node.y = y;
        }
    }

    pub fn end_drag(&mut self) {
        if let Some(drag) = self.drag.take() {
            let label = self.node_label_or_default(&drag.node_id);
            self.commit(&format!("Moved {label}"));
        }
    }

    pub fn drag_state(&self) -> Option<&DragState> {
        self.drag.as_ref()
    }

    /// Direct position write without history, for programmatic layout.
    pub fn update_node_position(&mut self, id: &str, x: f64, y: f64) {
        if let Some(node) = self.graph.node_mut(id) {
            node.x = x;
            node.y = y;
        }
    }

    // ------------------------------------------------------------------
    // Viewport gestures
    // ------------------------------------------------------------------

    /// Begin panning at a cursor position. Ignored while dragging a
    /// node; an armed connection is discarded.
    pub fn start_pan(&mut self, screen_x: f64, screen_y: f64) {
        if self.drag.is_some() {
            return;
        }
        self.connection.cancel();
        self.pan = Some(PanGesture::begin(&self.viewport, screen_x, screen_y));
    }

    pub fn update_pan(&mut self, screen_x: f64, screen_y: f64) {
        if let Some(pan) = &self.pan {
            let (pan_x, pan_y) = pan.pan_for(screen_x, screen_y);
            self.viewport.pan_x = pan_x;
            self.viewport.pan_y = pan_y;
        }
    }

    pub fn stop_pan(&mut self) {
        self.pan = None;
    }

    pub fn is_panning(&self) -> bool {
        self.pan.is_some()
    }

    pub fn zoom_at(&mut self, delta_y: f64, world_x: f64, world_y: f64) {
        self.viewport.zoom_at(delta_y, world_x, world_y);
    }

    pub fn zoom_at_screen(&mut self, delta_y: f64, screen_x: f64, screen_y: f64) {
        self.viewport.zoom_at_screen(delta_y, screen_x, screen_y);
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn select_node(&mut self, id: &str) {
        if self.graph.nodes.contains_key(id) {
            self.selection = Selection::Node(id.to_string());
        }
    }

    pub fn select_edge(&mut self, id: &str) {
        if self.graph.edges.contains_key(id) {
            self.selection = Selection::Edge(id.to_string());
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::None;
    }

    pub fn selected_node(&self) -> Option<&Node> {
        self.graph.node(self.selection.node_id()?)
    }

    pub fn selected_edge(&self) -> Option<&Edge> {
        self.graph.edge(self.selection.edge_id()?)
    }

    // ------------------------------------------------------------------
    // Inspector edits
    // ------------------------------------------------------------------

    pub fn update_label(&mut self, id: &str, label: &str) {
        let Some(node) = self.graph.node_mut(id) else {
            return;
        };
        let old_label = node.label.clone();
        node.label = label.to_string();
        self.commit(&format!("Updated {old_label} label"));
    }

    pub fn update_label_silent(&mut self, id: &str, label: &str) {
        if let Some(node) = self.graph.node_mut(id) {
            node.label = label.to_string();
        }
    }

    pub fn update_param(&mut self, id: &str, key: &str, value: Value) {
        let Some(node) = self.graph.node_mut(id) else {
            return;
        };
        let label = node.label.clone();
        node.params.insert(key.to_string(), value);
        self.commit(&format!("Updated {label} {key}"));
    }

    pub fn update_param_silent(&mut self, id: &str, key: &str, value: Value) {
        if let Some(node) = self.graph.node_mut(id) {
            node.params.insert(key.to_string(), value);
        }
    }

    /// Replace the workflow's variable set in one committed step.
    pub fn update_variables(&mut self, variables: IndexMap<String, String>) {
        self.variables.set_variables(variables);
        self.commit("Updated workflow variables");
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    pub fn validate(&self) -> ValidationReport {
        crate::validate::validate(&self.graph, &self.catalog)
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(entry) => {
                self.restore(entry);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(entry) => {
                self.restore(entry);
                true
            }
            None => false,
        }
    }

    fn restore(&mut self, entry: HistoryEntry) {
        self.graph = entry.graph;
        self.selection = entry.selection;
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    // ------------------------------------------------------------------
    // Workflow lifecycle
    // ------------------------------------------------------------------

    /// Back to a blank unsaved workflow: graph, selection, gestures,
    /// variables, identity and history are all cleared. The viewport is
    /// left where the user put it.
    pub fn reset_all(&mut self) {
        self.graph = Graph::new();
        self.selection = Selection::None;
        self.connection.cancel();
        self.pan = None;
        self.drag = None;
        self.variables.clear();
        self.workflow_id = None;
        self.workflow_name = String::new();
        self.workflow_description = None;
        self.metadata = None;
        self.history.clear();
    }

    /// Replace the session with a stored document, taking over its
    /// identity. History restarts at the loaded state.
    pub fn load_document(&mut self, document: &WorkflowDocument) {
        self.reset_all();
        self.graph = document_to_graph(document);
        match &document.variables {
            Some(variables) => self.variables.set_variables(variables.clone()),
            None => self.variables.clear_variables(),
        }
        self.workflow_id = document.workflow_id.clone();
        self.workflow_name = document.name.clone();
        self.workflow_description = document.description.clone();
        self.metadata = document.metadata.clone();

        let shown = if document.name.is_empty() {
            document.workflow_id.clone().unwrap_or_default()
        } else {
            document.name.clone()
        };
        self.commit(&format!("Loaded workflow: {shown}"));
    }

    /// Import a workflow from any supported JSON shape. Document-shaped
    /// input replaces the graph, variables and metadata but keeps the
    /// current workflow identity; flat input starts a fresh session.
    pub fn import_json(&mut self, value: &Value) -> WorkflowResult<ImportFormat> {
        let imported = serialization::import_value(value)?;
        match imported.format {
            ImportFormat::Document => {
                self.graph = imported.graph;
                match imported.variables {
                    Some(variables) => self.variables.set_variables(variables),
                    None => self.variables.clear_variables(),
                }
                self.metadata = imported.metadata;
                self.commit("Imported workflow from JSON");
            }
            ImportFormat::FlatPositioned => {
                self.reset_all();
                self.graph = imported.graph;
                self.commit("Imported workflow from JSON (legacy format with positions)");
            }
            ImportFormat::FlatGrid => {
                self.reset_all();
                self.graph = imported.graph;
                self.commit("Imported workflow from JSON (legacy format)");
            }
        }
        Ok(imported.format)
    }

    pub fn import_json_str(&mut self, text: &str) -> WorkflowResult<ImportFormat> {
        let value: Value = serde_json::from_str(text)?;
        self.import_json(&value)
    }

    /// The session as a storable document.
    pub fn export_document(&self) -> WorkflowDocument {
        let mut document = graph_to_document(
            &self.graph,
            &self.catalog,
            &self.workflow_name,
            self.workflow_description.as_deref(),
            self.variables.variables(),
        );
        document.workflow_id = self.workflow_id.clone();
        document
    }

    /// The session in the flat hand-off shape.
    pub fn export_flat(&self) -> FlatWorkflow {
        graph_to_flat(
            &self.graph,
            self.workflow_id.as_deref(),
            self.variables.variables(),
        )
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
