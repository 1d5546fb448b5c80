//! Workflow variables and constants.
//!
//! Both are design-time string key/value sets attached to a workflow.
//! Variables may change while a workflow runs; constants are fixed
//! configuration. Node parameters reference either through `${name}`
//! placeholders.

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;

static REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{(\w+)\}").expect("reference pattern"));

const RESERVED_KEYS: &[&str] = &[
    "if", "else", "switch", "case", "default", "for", "while", "do",
    "function", "return", "var", "let", "const",
];

/// The variable and constant sets of one workflow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableSet {
    variables: IndexMap<String, String>,
    constants: IndexMap<String, String>,
}

impl VariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variables(&self) -> &IndexMap<String, String> {
        &self.variables
    }

    pub fn constants(&self) -> &IndexMap<String, String> {
        &self.constants
    }

    /// Replace all variables at once (workflow load path).
    pub fn set_variables(&mut self, variables: IndexMap<String, String>) {
        self.variables = variables;
    }

    pub fn set_constants(&mut self, constants: IndexMap<String, String>) {
        self.constants = constants;
    }

    pub fn set_variable(&mut self, key: &str, value: &str) {
        self.variables.insert(key.to_string(), value.to_string());
    }

    pub fn set_constant(&mut self, key: &str, value: &str) {
        self.constants.insert(key.to_string(), value.to_string());
    }

    pub fn remove_variable(&mut self, key: &str) -> bool {
        self.variables.shift_remove(key).is_some()
    }

    pub fn remove_constant(&mut self, key: &str) -> bool {
        self.constants.shift_remove(key).is_some()
    }

    pub fn variable(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    pub fn constant(&self, key: &str) -> Option<&str> {
        self.constants.get(key).map(String::as_str)
    }

    pub fn has_variable(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    pub fn has_constant(&self, key: &str) -> bool {
        self.constants.contains_key(key)
    }

    pub fn clear_variables(&mut self) {
        self.variables.clear();
    }

    pub fn clear_constants(&mut self) {
        self.constants.clear();
    }

    pub fn clear(&mut self) {
        self.variables.clear();
        self.constants.clear();
    }

    /// Validate a key for use as a variable or constant name. Returns an
    /// error message, or `None` when the key is acceptable.
    pub fn validate_key(key: &str) -> Option<String> {
        if key.trim().is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        let mut chars = key.chars();
        let head_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !head_ok || !tail_ok {
            return Some(
                "Key must start with a letter or underscore and contain only \
                 letters, numbers, and underscores"
                    .to_string(),
            );
        }
        if RESERVED_KEYS.contains(&key.to_ascii_lowercase().as_str()) {
            return Some(format!("\"{key}\" is a reserved keyword"));
        }
        None
    }

    /// Replace every `${name}` whose name resolves to a variable (or,
    /// when `use_constants` is set, a constant). Unresolved references
    /// are left in place.
    pub fn interpolate(&self, text: &str, use_constants: bool) -> String {
        REFERENCE
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let key = &caps[1];
                if let Some(value) = self.variables.get(key) {
                    value.clone()
                } else if use_constants {
                    match self.constants.get(key) {
                        Some(value) => value.clone(),
                        None => caps[0].to_string(),
                    }
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned()
    }

    /// Distinct `${name}` references in a text, in order of appearance.
    pub fn find_references(text: &str) -> Vec<String> {
        let mut keys = IndexSet::new();
        for caps in REFERENCE.captures_iter(text) {
            keys.insert(caps[1].to_string());
        }
        keys.into_iter().collect()
    }

    /// References in a text that resolve to neither a variable nor a
    /// constant.
    pub fn missing_references(&self, text: &str) -> Vec<String> {
        Self::find_references(text)
            .into_iter()
            .filter(|key| !self.has_variable(key) && !self.has_constant(key))
            .collect()
    }
}
