//! Special marker processing.
//!
//! Markers are placeholder strings of the shape `{{NAME}}` that appear in
//! catalog-declared property defaults and get replaced with generated or
//! context-sourced values when a node is created.

use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use rand::Rng;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::catalog::NodeProperty;

/// Context available to context-aware markers.
#[derive(Debug, Clone, Default)]
pub struct MarkerContext {
    pub workflow_id: Option<String>,
    pub user_id: Option<String>,
    pub organization_id: Option<String>,
}

type MarkerProcessor = Box<dyn Fn(&MarkerContext) -> Value + Send + Sync>;

/// Registry of marker processors, extensible at runtime.
pub struct MarkerRegistry {
    markers: IndexMap<String, MarkerProcessor>,
}

impl MarkerRegistry {
    /// Registry with the standard marker set.
    pub fn builtin() -> Self {
        let mut registry = Self {
            markers: IndexMap::new(),
        };
        registry.register("AUTO_GENERATE_UUID", |_| {
            json!(format!("/api/workflow/{}", Uuid::new_v4()))
        });
        registry.register("UUID", |_| json!(Uuid::new_v4().to_string()));
        registry.register("CURRENT_TIMESTAMP", |_| {
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
        });
        registry.register("CURRENT_DATE", |_| {
            json!(Utc::now().format("%Y-%m-%d").to_string())
        });
        registry.register("WORKFLOW_ID", |ctx| {
            json!(ctx.workflow_id.clone().unwrap_or_default())
        });
        registry.register("USER_ID", |ctx| {
            json!(ctx.user_id.clone().unwrap_or_default())
        });
        registry.register("ORGANIZATION_ID", |ctx| {
            json!(ctx.organization_id.clone().unwrap_or_default())
        });
        registry.register("RANDOM_NUMBER", |_| {
            json!(rand::rng().random_range(1000..=9999))
        });
        registry.register("EMPTY_STRING", |_| json!(""));
        registry.register("NULL", |_| Value::Null);
        registry
    }

    /// Register a marker processor, replacing any existing one.
    pub fn register<F>(&mut self, name: &str, processor: F)
    where
        F: Fn(&MarkerContext) -> Value + Send + Sync + 'static,
    {
        if self.markers.contains_key(name) {
            warn!(marker = name, "overwriting existing marker");
        }
        self.markers.insert(name.to_string(), Box::new(processor));
    }

    pub fn has_marker(&self, name: &str) -> bool {
        self.markers.contains_key(name)
    }

    /// Names of all registered markers, in registration order.
    pub fn available(&self) -> Vec<&str> {
        self.markers.keys().map(String::as_str).collect()
    }

    /// Whether a value is a marker string (`{{NAME}}`, at least one char
    /// of name).
    pub fn is_marker(value: &Value) -> bool {
        match value {
            Value::String(s) => {
                s.starts_with("{{") && s.ends_with("}}") && s.len() > 4
            }
            _ => false,
        }
    }

    /// Replace a marker value with its processed result. Non-marker
    /// values and unknown markers are returned unchanged.
    pub fn process_value(&self, value: &Value, context: &MarkerContext) -> Value {
        if !Self::is_marker(value) {
            return value.clone();
        }
        let raw = match value {
            Value::String(s) => s,
            _ => return value.clone(),
        };
        let name = raw[2..raw.len() - 2].trim();
        match self.markers.get(name) {
            Some(processor) => {
                let result = processor(context);
                debug!(marker = name, "processed marker");
                result
            }
            None => {
                warn!(marker = name, "unknown marker, keeping original value");
                value.clone()
            }
        }
    }

    /// Processed default values for a node type's properties, keyed by
    /// property key. Properties without a default are skipped.
    pub fn process_node_defaults(
        &self,
        properties: &[NodeProperty],
        context: &MarkerContext,
    ) -> IndexMap<String, Value> {
        let mut defaults = IndexMap::new();
        for property in properties {
            if let Some(default) = &property.default {
                defaults.insert(
                    property.key.clone(),
                    self.process_value(default, context),
                );
            }
        }
        defaults
    }

    /// Recursively process every marker in a JSON object tree.
    pub fn process_object(
        &self,
        object: &Map<String, Value>,
        context: &MarkerContext,
    ) -> Map<String, Value> {
        let mut result = Map::new();
        for (key, value) in object {
            result.insert(key.clone(), self.process_tree(value, context));
        }
        result
    }

    fn process_tree(&self, value: &Value, context: &MarkerContext) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.process_object(map, context)),
            Value::Array(items) => Value::Array(
                items.iter().map(|v| self.process_tree(v, context)).collect(),
            ),
            other => self.process_value(other, context),
        }
    }
}

impl Default for MarkerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_markers_generate_parseable_ids() {
        let registry = MarkerRegistry::builtin();
        let ctx = MarkerContext::default();

        let raw = registry.process_value(&json!("{{UUID}}"), &ctx);
        let raw = raw.as_str().unwrap();
        assert!(Uuid::parse_str(raw).is_ok());

        let endpoint = registry.process_value(&json!("{{AUTO_GENERATE_UUID}}"), &ctx);
        let endpoint = endpoint.as_str().unwrap();
        let suffix = endpoint.strip_prefix("/api/workflow/").unwrap();
        assert!(Uuid::parse_str(suffix).is_ok());
    }

    #[test]
    fn context_markers_read_from_context() {
        let registry = MarkerRegistry::builtin();
        let ctx = MarkerContext {
            workflow_id: Some("wf-7".to_string()),
            ..Default::default()
        };
        assert_eq!(
            registry.process_value(&json!("{{WORKFLOW_ID}}"), &ctx),
            json!("wf-7")
        );
        // Missing context degrades to empty string.
        assert_eq!(registry.process_value(&json!("{{USER_ID}}"), &ctx), json!(""));
    }

    #[test]
    fn non_markers_and_unknown_markers_pass_through() {
        let registry = MarkerRegistry::builtin();
        let ctx = MarkerContext::default();
        assert_eq!(registry.process_value(&json!("Hello"), &ctx), json!("Hello"));
        assert_eq!(registry.process_value(&json!(123), &ctx), json!(123));
        assert_eq!(
            registry.process_value(&json!("{{NO_SUCH_MARKER}}"), &ctx),
            json!("{{NO_SUCH_MARKER}}")
        );
        // Too short to be a marker.
        assert_eq!(registry.process_value(&json!("{{}}"), &ctx), json!("{{}}"));
    }

    #[test]
    fn fixed_value_markers() {
        let registry = MarkerRegistry::builtin();
        let ctx = MarkerContext::default();
        assert_eq!(registry.process_value(&json!("{{EMPTY_STRING}}"), &ctx), json!(""));
        assert_eq!(registry.process_value(&json!("{{NULL}}"), &ctx), Value::Null);
        let n = registry.process_value(&json!("{{RANDOM_NUMBER}}"), &ctx);
        let n = n.as_i64().unwrap();
        assert!((1000..=9999).contains(&n));
        let date = registry.process_value(&json!("{{CURRENT_DATE}}"), &ctx);
        assert_eq!(date.as_str().unwrap().len(), 10);
    }

    #[test]
    fn node_defaults_are_seeded_and_processed() {
        let registry = MarkerRegistry::builtin();
        let ctx = MarkerContext::default();
        let properties = vec![
            NodeProperty {
                key: "endpoint".to_string(),
                label: "Endpoint".to_string(),
                field_type: "text".to_string(),
                required: true,
                placeholder: None,
                default: Some(json!("{{AUTO_GENERATE_UUID}}")),
                options: None,
            },
            NodeProperty {
                key: "method".to_string(),
                label: "Method".to_string(),
                field_type: "select".to_string(),
                required: true,
                placeholder: None,
                default: Some(json!("POST")),
                options: None,
            },
            NodeProperty {
                key: "note".to_string(),
                label: "Note".to_string(),
                field_type: "text".to_string(),
                required: false,
                placeholder: None,
                default: None,
                options: None,
            },
        ];
        let defaults = registry.process_node_defaults(&properties, &ctx);
        assert_eq!(defaults.len(), 2);
        assert!(
            defaults["endpoint"]
                .as_str()
                .unwrap()
                .starts_with("/api/workflow/")
        );
        assert_eq!(defaults["method"], json!("POST"));
        assert!(!defaults.contains_key("note"));
    }

    #[test]
    fn custom_markers_can_be_registered() {
        let mut registry = MarkerRegistry::builtin();
        registry.register("SITE_CODE", |_| json!("OSL-3"));
        assert!(registry.has_marker("SITE_CODE"));
        assert_eq!(
            registry.process_value(&json!("{{SITE_CODE}}"), &MarkerContext::default()),
            json!("OSL-3")
        );
    }

    #[test]
    fn process_object_walks_nested_values() {
        let registry = MarkerRegistry::builtin();
        let ctx = MarkerContext {
            workflow_id: Some("wf-1".to_string()),
            ..Default::default()
        };
        let input = json!({
            "id": "{{WORKFLOW_ID}}",
            "nested": { "cleared": "{{NULL}}" },
            "list": ["{{EMPTY_STRING}}", "plain"]
        });
        let object = input.as_object().unwrap();
        let out = Value::Object(registry.process_object(object, &ctx));
        assert_eq!(out["id"], json!("wf-1"));
        assert_eq!(out["nested"]["cleared"], Value::Null);
        assert_eq!(out["list"], json!(["", "plain"]));
    }
}
