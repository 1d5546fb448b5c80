//! Workflow persistence. One JSON document per workflow, addressed by
//! workflow id.

use chrono::{SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{WorkflowError, WorkflowResult};
use crate::serialization::WorkflowDocument;

/// Listing entry, enough for a picker without parsing full documents
/// again on the caller side.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSummary {
    pub workflow_id: String,
    pub name: String,
    pub description: Option<String>,
    pub node_count: usize,
    pub modified_at: Option<String>,
}

/// Storage abstraction over workflow documents.
pub trait WorkflowRepository {
    /// Persist a document. Assigns a workflow id when the document has
    /// none and refreshes its timestamps; returns the id it was stored
    /// under.
    fn save(&self, document: &mut WorkflowDocument) -> WorkflowResult<String>;

    fn load(&self, id: &str) -> WorkflowResult<WorkflowDocument>;

    /// Summaries of every stored workflow, most recently modified first.
    fn list(&self) -> WorkflowResult<Vec<WorkflowSummary>>;

    /// Remove a stored workflow. Returns whether it existed.
    fn delete(&self, id: &str) -> WorkflowResult<bool>;
}

/// Directory-backed repository: `<root>/<workflow_id>.json`.
#[derive(Debug, Clone)]
pub struct FsWorkflowRepository {
    root: PathBuf,
}

impl FsWorkflowRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl WorkflowRepository for FsWorkflowRepository {
    fn save(&self, document: &mut WorkflowDocument) -> WorkflowResult<String> {
        fs::create_dir_all(&self.root)?;

        let id = match &document.workflow_id {
            Some(id) => id.clone(),
            None => {
                let id = Uuid::new_v4().to_string();
                document.workflow_id = Some(id.clone());
                id
            }
        };
        let now = timestamp();
        if document.created_at.is_none() {
            document.created_at = Some(now.clone());
        }
        document.modified_at = Some(now);

        let path = self.document_path(&id);
        let json = serde_json::to_string_pretty(document)?;
        fs::write(&path, json)?;
        debug!(workflow_id = %id, path = %path.display(), "saved workflow");
        Ok(id)
    }

    fn load(&self, id: &str) -> WorkflowResult<WorkflowDocument> {
        let path = self.document_path(id);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkflowError::NotFound(id.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        let document: WorkflowDocument = serde_json::from_str(&text)?;
        Ok(document)
    }

    fn list(&self) -> WorkflowResult<Vec<WorkflowSummary>> {
        let mut summaries = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(summaries);
            }
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let text = fs::read_to_string(&path)?;
            let document: WorkflowDocument = match serde_json::from_str(&text) {
                Ok(document) => document,
                Err(err) => {
                    warn!(path = %path.display(), %err, "skipping unreadable workflow file");
                    continue;
                }
            };
            let fallback_id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            summaries.push(WorkflowSummary {
                workflow_id: document.workflow_id.unwrap_or(fallback_id),
                name: document.name,
                description: document.description,
                node_count: document.nodes.len(),
                modified_at: document.modified_at,
            });
        }
        // RFC 3339 strings sort chronologically; unstamped files go last.
        summaries.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        Ok(summaries)
    }

    fn delete(&self, id: &str) -> WorkflowResult<bool> {
        let path = self.document_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(workflow_id = %id, "deleted workflow");
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
