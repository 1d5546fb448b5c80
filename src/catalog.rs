//! Node-type catalog: the palette of step types a workflow can be built
//! from, with their categories, editable properties and declared exit
//! points.
//!
//! The catalog ships with a built-in set mirroring the alert-handling
//! deployment and can alternatively be loaded from a JSON document, so
//! installations can extend the palette without a rebuild.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path;

use crate::error::WorkflowResult;

/// Node-type classification. Triggers start a workflow, terminals end it,
/// the rest sit in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeCategory {
    Trigger,
    Control,
    Action,
    Terminal,
    Utility,
}

impl NodeCategory {
    /// Infer a category from the type-string prefix convention
    /// (`trigger.manual`, `end.terminate`, ...). Used for types the
    /// catalog does not know, so imported documents still classify.
    pub fn infer(node_type: &str) -> Option<NodeCategory> {
        let prefix = node_type.split('.').next()?;
        match prefix {
            "trigger" => Some(NodeCategory::Trigger),
            "control" => Some(NodeCategory::Control),
            "action" => Some(NodeCategory::Action),
            "end" => Some(NodeCategory::Terminal),
            "utility" | "var" | "audit" => Some(NodeCategory::Utility),
            _ => None,
        }
    }

    /// Palette section heading for this category.
    pub fn heading(&self) -> &'static str {
        match self {
            NodeCategory::Trigger => "Triggers",
            NodeCategory::Control => "Controls",
            NodeCategory::Action => "Actions",
            NodeCategory::Terminal => "Terminals",
            NodeCategory::Utility => "Utility",
        }
    }
}

/// One editable property of a node type, as shown by an inspector form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProperty {
    pub key: String,
    pub label: String,
    /// Widget hint (`text`, `number`, `select`, `textarea`, ...); opaque
    /// to the engine.
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Default value seeded into new nodes; may be a `{{MARKER}}` string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Full definition of one node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeConfig {
    #[serde(rename = "type")]
    pub node_type: String,
    pub category: NodeCategory,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub node_color: String,
    #[serde(default)]
    pub properties: Vec<NodeProperty>,
    /// Declared output ports. Empty means either a terminal or a
    /// dynamic-exit type (e.g. switch cases).
    #[serde(default)]
    pub exits: Vec<String>,
}

impl NodeTypeConfig {
    /// Properties a valid node of this type must have a value for.
    pub fn required_properties(&self) -> impl Iterator<Item = &NodeProperty> {
        self.properties.iter().filter(|p| p.required)
    }
}

/// On-disk shape for a catalog configuration document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogDocument {
    node_types: Vec<NodeTypeConfig>,
}

/// Lookup table of node types, in palette declaration order.
#[derive(Debug, Clone)]
pub struct NodeCatalog {
    types: IndexMap<String, NodeTypeConfig>,
}

impl NodeCatalog {
    /// The built-in alert-handling palette.
    pub fn builtin() -> Self {
        Self::from_configs(BUILTIN_TYPES.clone())
    }

    pub fn from_configs(configs: Vec<NodeTypeConfig>) -> Self {
        let mut types = IndexMap::new();
        for config in configs {
            types.insert(config.node_type.clone(), config);
        }
        Self { types }
    }

    /// Parse a catalog from a JSON document of the shape
    /// `{ "nodeTypes": [...] }`.
    pub fn from_json(text: &str) -> WorkflowResult<Self> {
        let doc: CatalogDocument = serde_json::from_str(text)?;
        Ok(Self::from_configs(doc.node_types))
    }

    pub fn from_json_file(path: &Path) -> WorkflowResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn config(&self, node_type: &str) -> Option<&NodeTypeConfig> {
        self.types.get(node_type)
    }

    /// Display label for a type, if the catalog knows it.
    pub fn label_for(&self, node_type: &str) -> Option<&str> {
        self.config(node_type).map(|c| c.label.as_str())
    }

    /// Category for a type: the catalog entry when known, the type-prefix
    /// convention otherwise.
    pub fn category_of(&self, node_type: &str) -> Option<NodeCategory> {
        match self.config(node_type) {
            Some(config) => Some(config.category),
            None => NodeCategory::infer(node_type),
        }
    }

    /// All entries in declaration order.
    pub fn palette(&self) -> impl Iterator<Item = &NodeTypeConfig> {
        self.types.values()
    }

    pub fn by_category(&self, category: NodeCategory) -> Vec<&NodeTypeConfig> {
        self.types.values().filter(|c| c.category == category).collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for NodeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// ------------------------------------------------------------------
// Built-in palette data
// ------------------------------------------------------------------

static BUILTIN_TYPES: Lazy<Vec<NodeTypeConfig>> = Lazy::new(builtin_types);

fn prop(key: &str, label: &str, field_type: &str, required: bool) -> NodeProperty {
    NodeProperty {
        key: key.to_string(),
        label: label.to_string(),
        field_type: field_type.to_string(),
        required,
        placeholder: None,
        default: None,
        options: None,
    }
}

fn cfg(
    node_type: &str,
    category: NodeCategory,
    label: &str,
    description: &str,
    icon: &str,
) -> NodeTypeConfig {
    let (color, node_color) = category_colors(category);
    NodeTypeConfig {
        node_type: node_type.to_string(),
        category,
        label: label.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        color: color.to_string(),
        node_color: node_color.to_string(),
        properties: Vec::new(),
        exits: Vec::new(),
    }
}

fn category_colors(category: NodeCategory) -> (&'static str, &'static str) {
    match category {
        NodeCategory::Trigger => (
            "bg-amber-100 border-amber-300 text-amber-800",
            "bg-amber-50 border-amber-200",
        ),
        NodeCategory::Control => (
            "bg-sky-100 border-sky-300 text-sky-800",
            "bg-sky-50 border-sky-200",
        ),
        NodeCategory::Action => (
            "bg-emerald-100 border-emerald-300 text-emerald-800",
            "bg-emerald-50 border-emerald-200",
        ),
        NodeCategory::Terminal => (
            "bg-slate-100 border-slate-300 text-slate-800",
            "bg-slate-50 border-slate-200",
        ),
        NodeCategory::Utility => (
            "bg-gray-100 border-gray-300 text-gray-800",
            "bg-gray-50 border-gray-200",
        ),
    }
}

fn strings(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| s.to_string()).collect()
}

fn builtin_types() -> Vec<NodeTypeConfig> {
    vec![
        // Triggers
        NodeTypeConfig {
            properties: vec![NodeProperty {
                placeholder: Some("Emergency Alert".to_string()),
                default: Some(json!("Manual Trigger")),
                ..prop("label", "Trigger Name", "text", true)
            }],
            exits: strings(&["next"]),
            ..cfg(
                "trigger.manual",
                NodeCategory::Trigger,
                "Manual Trigger",
                "Started by an operator",
                "play_arrow",
            )
        },
        NodeTypeConfig {
            properties: vec![
                NodeProperty {
                    placeholder: Some("/api/workflow/auto-generated".to_string()),
                    default: Some(json!("{{AUTO_GENERATE_UUID}}")),
                    ..prop("endpoint", "Endpoint Path", "text", true)
                },
                NodeProperty {
                    options: Some(strings(&["GET", "POST", "PUT"])),
                    default: Some(json!("POST")),
                    ..prop("method", "HTTP Method", "select", true)
                },
            ],
            exits: strings(&["next"]),
            ..cfg(
                "trigger.webhook",
                NodeCategory::Trigger,
                "API/Webhook",
                "Started by an incoming HTTP call",
                "webhook",
            )
        },
        NodeTypeConfig {
            properties: vec![NodeProperty {
                placeholder: Some("0 0 8 * * *".to_string()),
                ..prop("cronExpression", "Cron Expression", "text", true)
            }],
            exits: strings(&["next"]),
            ..cfg(
                "trigger.schedule",
                NodeCategory::Trigger,
                "Schedule/Cron",
                "Started on a schedule",
                "schedule",
            )
        },
        // Controls
        NodeTypeConfig {
            properties: vec![NodeProperty {
                placeholder: Some("a > b".to_string()),
                ..prop("condition", "Condition", "text", true)
            }],
            exits: strings(&["onTrue", "onFalse"]),
            ..cfg(
                "control.if",
                NodeCategory::Control,
                "If / Else",
                "Branch on a condition",
                "call_split",
            )
        },
        NodeTypeConfig {
            properties: vec![
                NodeProperty {
                    placeholder: Some("severity".to_string()),
                    ..prop("expression", "Switch Expression", "text", true)
                },
                NodeProperty {
                    placeholder: Some("CRITICAL,HIGH,MEDIUM,LOW".to_string()),
                    ..prop("cases", "Case Values", "switch-cases", true)
                },
            ],
            // Exits come from the configured cases, not the catalog.
            exits: Vec::new(),
            ..cfg(
                "control.switch",
                NodeCategory::Control,
                "Switch",
                "Branch on an expression value",
                "alt_route",
            )
        },
        NodeTypeConfig {
            properties: vec![
                NodeProperty {
                    placeholder: Some("ChargeNurse".to_string()),
                    ..prop("role", "Role", "text", true)
                },
                NodeProperty {
                    placeholder: Some("2".to_string()),
                    ..prop("slaMinutes", "SLA (minutes)", "number", false)
                },
                NodeProperty {
                    default: Some(json!(60)),
                    ..prop("timeoutSeconds", "Timeout (seconds)", "number", false)
                },
            ],
            exits: strings(&["onApproved", "onRejected", "onTimeout"]),
            ..cfg(
                "control.approval",
                NodeCategory::Control,
                "Approval",
                "Wait for a role to approve",
                "approval",
            )
        },
        NodeTypeConfig {
            properties: vec![NodeProperty {
                placeholder: Some("60".to_string()),
                ..prop("seconds", "Seconds", "number", true)
            }],
            exits: strings(&["next"]),
            ..cfg(
                "control.wait",
                NodeCategory::Control,
                "Wait / Timer",
                "Pause before continuing",
                "timer",
            )
        },
        // Actions
        NodeTypeConfig {
            properties: vec![
                prop("smsTemplateId", "SMS Template", "select", true),
                NodeProperty {
                    placeholder: Some("Enter your custom SMS message...".to_string()),
                    ..prop("customMessage", "Custom Message", "textarea", false)
                },
                prop("smsProvider", "SMS Provider", "select", true),
                NodeProperty {
                    default: Some(json!(60)),
                    ..prop("timeoutSeconds", "Timeout (seconds)", "number", false)
                },
            ],
            exits: strings(&["onSuccess", "onTimeout", "onFailure"]),
            ..cfg(
                "action.sms",
                NodeCategory::Action,
                "SMS",
                "Send a text message",
                "sms",
            )
        },
        NodeTypeConfig {
            properties: vec![
                prop("emailTemplateId", "Email Template", "select", true),
                prop("emailProvider", "Email Provider", "select", true),
                NodeProperty {
                    default: Some(json!(60)),
                    ..prop("timeoutSeconds", "Timeout (seconds)", "number", false)
                },
            ],
            exits: strings(&["onSuccess", "onTimeout", "onFailure"]),
            ..cfg(
                "action.email",
                NodeCategory::Action,
                "Email",
                "Send an email",
                "mail",
            )
        },
        NodeTypeConfig {
            properties: vec![
                prop("callTemplateId", "Call Template", "select", true),
                prop("callDialerProvider", "Call Dialer Provider", "select", true),
                NodeProperty {
                    default: Some(json!(60)),
                    ..prop("timeoutSeconds", "Timeout (seconds)", "number", false)
                },
            ],
            exits: strings(&["onSuccess", "onTimeout", "onFailure"]),
            ..cfg(
                "action.ivr",
                NodeCategory::Action,
                "Call Dialer",
                "Place an automated call",
                "phone_in_talk",
            )
        },
        // Terminals
        NodeTypeConfig {
            properties: vec![
                NodeProperty {
                    options: Some(strings(&["success", "failure", "cancelled", "timeout"])),
                    default: Some(json!("success")),
                    ..prop("status", "Exit Status", "select", false)
                },
                NodeProperty {
                    placeholder: Some("Workflow completed successfully".to_string()),
                    ..prop("message", "Exit Message", "text", false)
                },
            ],
            exits: Vec::new(),
            ..cfg(
                "end.terminate",
                NodeCategory::Terminal,
                "End",
                "Terminate workflow execution",
                "stop",
            )
        },
        // Utility
        NodeTypeConfig {
            properties: vec![NodeProperty {
                placeholder: Some("5".to_string()),
                ..prop("duration", "Delay Duration", "number", true)
            }],
            exits: strings(&["next"]),
            ..cfg(
                "utility.delay",
                NodeCategory::Utility,
                "Delay",
                "Add a delay before continuing",
                "hourglass_empty",
            )
        },
        NodeTypeConfig {
            properties: vec![
                NodeProperty {
                    options: Some(strings(&["DEBUG", "INFO", "WARN", "ERROR"])),
                    default: Some(json!("INFO")),
                    ..prop("level", "Log Level", "select", true)
                },
                prop("message", "Log Message", "textarea", true),
            ],
            exits: strings(&["next"]),
            ..cfg(
                "utility.log",
                NodeCategory::Utility,
                "Log Entry",
                "Write a log entry for debugging",
                "article",
            )
        },
    ]
}
