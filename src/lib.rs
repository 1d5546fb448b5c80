//! Core engine of the alert workflow designer: the node graph and its
//! mutation API, connection drawing, viewport math, bounded undo
//! history, structural validation and JSON interchange.

pub mod catalog;
pub mod connection;
pub mod error;
pub mod graph;
pub mod history;
pub mod markers;
pub mod repository;
pub mod serialization;
pub mod store;
pub mod validate;
pub mod variables;
pub mod viewport;

pub use catalog::{NodeCatalog, NodeCategory, NodeProperty, NodeTypeConfig};
pub use connection::{ClickOutcome, ConnectionState};
pub use error::{WorkflowError, WorkflowResult};
pub use graph::{DEFAULT_EXIT, Edge, Graph, Node, Selection};
pub use history::{History, HistoryEntry, HistoryInfo, HistoryRow};
pub use markers::{MarkerContext, MarkerRegistry};
pub use repository::{FsWorkflowRepository, WorkflowRepository, WorkflowSummary};
pub use serialization::{
    FlatWorkflow, ImportFormat, ImportedWorkflow, WorkflowDocument, WorkflowMetadata,
};
pub use store::{AddNodeOptions, DragState, Store};
pub use validate::ValidationReport;
pub use variables::VariableSet;
pub use viewport::{PanGesture, Viewport};
