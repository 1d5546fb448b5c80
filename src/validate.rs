//! Structural validation of a workflow graph.
//!
//! A single pass collects every violation instead of stopping at the
//! first one (the empty-graph check is the one exception). The report's
//! maps exist to drive UI highlighting; `errors` alone decides pass or
//! fail.

use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use crate::catalog::{NodeCatalog, NodeCategory};
use crate::graph::{Graph, Node};

/// The one node type of which a workflow may hold at most one instance.
pub const MANUAL_TRIGGER_TYPE: &str = "trigger.manual";

/// Result of a validation run. Empty `errors` means the workflow passed;
/// on a passing run the highlight collections are empty too.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    /// Node id → required property keys with missing/empty values.
    pub invalid_fields: IndexMap<String, Vec<String>>,
    /// Node id → declared exit points with no edge attached.
    pub unconnected_exits: IndexMap<String, Vec<String>>,
    /// Non-trigger nodes with no incoming edge.
    pub unconnected_inputs: IndexSet<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_field_invalid(&self, node_id: &str, field_key: &str) -> bool {
        self.invalid_fields
            .get(node_id)
            .is_some_and(|fields| fields.iter().any(|f| f == field_key))
    }

    pub fn is_exit_unconnected(&self, node_id: &str, exit_point: &str) -> bool {
        self.unconnected_exits
            .get(node_id)
            .is_some_and(|exits| exits.iter().any(|e| e == exit_point))
    }

    pub fn is_input_unconnected(&self, node_id: &str) -> bool {
        self.unconnected_inputs.contains(node_id)
    }

    /// Drop the input highlight for one node, once the user has wired it.
    pub fn clear_input_highlight(&mut self, node_id: &str) {
        self.unconnected_inputs.shift_remove(node_id);
    }

    /// Drop the highlight for one exit point; the node's entry goes away
    /// with its last exit.
    pub fn clear_exit_highlight(&mut self, node_id: &str, exit_point: &str) {
        if let Some(exits) = self.unconnected_exits.get_mut(node_id) {
            exits.retain(|e| e != exit_point);
            if exits.is_empty() {
                self.unconnected_exits.shift_remove(node_id);
            }
        }
    }

    /// Drop the highlight for one field; the node's entry goes away with
    /// its last field.
    pub fn clear_field_highlight(&mut self, node_id: &str, field_key: &str) {
        if let Some(fields) = self.invalid_fields.get_mut(node_id) {
            fields.retain(|f| f != field_key);
            if fields.is_empty() {
                self.invalid_fields.shift_remove(node_id);
            }
        }
    }
}

/// Validate `graph` against the structural rules, consulting `catalog`
/// for categories, required properties and declared exits.
pub fn validate(graph: &Graph, catalog: &NodeCatalog) -> ValidationReport {
    let mut report = ValidationReport::default();

    let is_trigger =
        |n: &Node| catalog.category_of(&n.node_type) == Some(NodeCategory::Trigger);
    let is_terminal =
        |n: &Node| catalog.category_of(&n.node_type) == Some(NodeCategory::Terminal);

    // Trigger presence and manual-trigger uniqueness.
    let trigger_ids: Vec<&str> = graph
        .nodes
        .values()
        .filter(|n| is_trigger(n))
        .map(|n| n.id.as_str())
        .collect();
    if trigger_ids.is_empty() {
        report.errors.push(
            "No trigger node found. Workflow must start with at least one trigger."
                .to_string(),
        );
    }
    let manual_triggers = graph
        .nodes
        .values()
        .filter(|n| n.node_type == MANUAL_TRIGGER_TYPE)
        .count();
    if manual_triggers > 1 {
        report.errors.push(format!(
            "Multiple manual triggers found ({manual_triggers}). \
             Only one trigger.manual is allowed per workflow."
        ));
    }

    // An empty workflow has nothing further to check.
    if graph.nodes.is_empty() {
        report.errors.push(
            "Workflow is empty. Add at least one node to continue.".to_string(),
        );
        return report;
    }

    // Adjacency over known nodes; edges from unknown sources are left to
    // the dangling-edge rule. Incoming counts and per-source exits are
    // gathered in the same pass.
    let mut adjacency: HashMap<&str, Vec<&str>> = graph
        .nodes
        .keys()
        .map(|id| (id.as_str(), Vec::new()))
        .collect();
    let mut incoming: HashMap<&str, usize> = HashMap::new();
    let mut exits_by_source: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in graph.edges.values() {
        if let Some(targets) = adjacency.get_mut(edge.from.as_str()) {
            targets.push(edge.to.as_str());
        }
        *incoming.entry(edge.to.as_str()).or_insert(0) += 1;
        exits_by_source
            .entry(edge.from.as_str())
            .or_default()
            .push(edge.exit());
    }

    // Reachability from the triggers, breadth first.
    let mut visited: HashSet<&str> = trigger_ids.iter().copied().collect();
    let mut queue: VecDeque<&str> = trigger_ids.iter().copied().collect();
    while let Some(id) = queue.pop_front() {
        for &next in adjacency.get(id).into_iter().flatten() {
            if graph.nodes.contains_key(next) && visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
    let orphans: Vec<&Node> = graph
        .nodes
        .values()
        .filter(|n| !visited.contains(n.id.as_str()) && !is_trigger(n))
        .collect();
    if !orphans.is_empty() {
        let labels: Vec<&str> = orphans.iter().map(|n| n.label.as_str()).collect();
        report.errors.push(format!(
            "Orphan nodes not connected to any trigger: {}",
            labels.join(", ")
        ));
    }
    for node in graph.nodes.values() {
        if !is_trigger(node) && !incoming.contains_key(node.id.as_str()) {
            report.unconnected_inputs.insert(node.id.clone());
        }
    }

    // Required properties must have a value.
    for node in graph.nodes.values() {
        let Some(config) = catalog.config(&node.node_type) else {
            continue;
        };
        for property in config.required_properties() {
            let missing = match node.params.get(&property.key) {
                None => true,
                Some(serde_json::Value::Null) => true,
                Some(serde_json::Value::String(s)) => s.is_empty(),
                Some(_) => false,
            };
            if missing {
                report.errors.push(format!(
                    "Node \"{}\" is missing required field: {}",
                    node.label, property.label
                ));
                report
                    .invalid_fields
                    .entry(node.id.clone())
                    .or_default()
                    .push(property.key.clone());
            }
        }
    }

    // Terminal nodes end the workflow; nothing may leave them.
    for node in graph.nodes.values() {
        if is_terminal(node) && exits_by_source.contains_key(node.id.as_str()) {
            report.errors.push(format!(
                "Terminal node \"{}\" should not have outgoing connections",
                node.label
            ));
        }
    }

    // Every declared exit of a non-terminal, non-trigger node must be
    // wired. Types with no declared exits (terminals aside, e.g. switch
    // with dynamic cases) are exempt.
    for node in graph.nodes.values() {
        if is_terminal(node) || is_trigger(node) {
            continue;
        }
        let expected: &[String] = match catalog.config(&node.node_type) {
            Some(config) => &config.exits,
            None => &[],
        };
        if expected.is_empty() {
            continue;
        }
        let connected: HashSet<&str> = exits_by_source
            .get(node.id.as_str())
            .into_iter()
            .flatten()
            .copied()
            .collect();
        if connected.is_empty() {
            report.errors.push(format!(
                "Node \"{}\" has no outgoing connections",
                node.label
            ));
        }
        let missing: Vec<String> = expected
            .iter()
            .filter(|exit| !connected.contains(exit.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            report.errors.push(format!(
                "Node \"{}\" has unconnected exit points: {}",
                node.label,
                missing.join(", ")
            ));
            report.unconnected_exits.insert(node.id.clone(), missing);
        }
    }

    // Duplicate labels confuse operators; warn but do not block more
    // than any other error does.
    let mut label_counts: IndexMap<&str, usize> = IndexMap::new();
    for node in graph.nodes.values() {
        *label_counts.entry(node.label.as_str()).or_insert(0) += 1;
    }
    for (label, count) in label_counts {
        if count > 1 {
            report.errors.push(format!(
                "Duplicate node label \"{label}\" found {count} times. \
                 Consider using unique labels."
            ));
        }
    }

    // Edges whose endpoints no longer resolve (partial imports).
    for edge in graph.edges.values() {
        if !graph.nodes.contains_key(&edge.from) {
            report
                .errors
                .push(format!("Edge {} has missing source node", edge.id));
        }
        if !graph.nodes.contains_key(&edge.to) {
            report
                .errors
                .push(format!("Edge {} has missing target node", edge.id));
        }
    }

    if has_cycle(graph, &adjacency) {
        report.errors.push(
            "Circular dependency detected. Workflow contains an infinite loop."
                .to_string(),
        );
    }

    if !graph.nodes.values().any(is_terminal) {
        report.errors.push(
            "No terminal/end node found. Workflow should have at least one end point."
                .to_string(),
        );
    }

    debug!(
        errors = report.errors.len(),
        invalid_fields = report.invalid_fields.len(),
        "validation finished"
    );
    report
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Gray,
    Black,
}

/// Depth-first cycle search with an explicit frame stack, so pathological
/// imports cannot exhaust the call stack.
fn has_cycle(graph: &Graph, adjacency: &HashMap<&str, Vec<&str>>) -> bool {
    let mut marks: HashMap<&str, Mark> = graph
        .nodes
        .keys()
        .map(|id| (id.as_str(), Mark::White))
        .collect();

    for start in graph.nodes.keys() {
        if marks.get(start.as_str()) != Some(&Mark::White) {
            continue;
        }
        let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
        marks.insert(start.as_str(), Mark::Gray);

        while let Some(&(node, cursor)) = stack.last() {
            let child = adjacency
                .get(node)
                .and_then(|targets| targets.get(cursor))
                .copied();
            match child {
                Some(child) => {
                    if let Some(frame) = stack.last_mut() {
                        frame.1 += 1;
                    }
                    match marks.get(child) {
                        Some(Mark::Gray) => return true,
                        Some(Mark::White) => {
                            marks.insert(child, Mark::Gray);
                            stack.push((child, 0));
                        }
                        // Finished subtree, or a dangling edge target.
                        Some(Mark::Black) | None => {}
                    }
                }
                None => {
                    marks.insert(node, Mark::Black);
                    stack.pop();
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use indexmap::IndexMap;
    use serde_json::json;

    fn node(id: &str, node_type: &str, label: &str) -> Node {
        Node {
            id: id.to_string(),
            node_type: node_type.to_string(),
            label: label.to_string(),
            x: 0.0,
            y: 0.0,
            params: IndexMap::new(),
        }
    }

    fn add_node(g: &mut Graph, n: Node) {
        g.nodes.insert(n.id.clone(), n);
    }

    fn add_edge(g: &mut Graph, id: &str, from: &str, to: &str, exit: Option<&str>) {
        g.edges.insert(
            id.to_string(),
            Edge {
                id: id.to_string(),
                from: from.to_string(),
                to: to.to_string(),
                exit_point: exit.map(str::to_string),
            },
        );
    }

    fn trigger(id: &str) -> Node {
        let mut n = node(id, "trigger.manual", "Manual Trigger");
        n.params.insert("label".to_string(), json!("Manual Trigger"));
        n
    }

    fn terminal(id: &str) -> Node {
        node(id, "end.terminate", "End")
    }

    #[test]
    fn minimal_trigger_to_end_workflow_passes() {
        let mut g = Graph::new();
        add_node(&mut g, trigger("t"));
        add_node(&mut g, terminal("e"));
        add_edge(&mut g, "e1", "t", "e", Some("next"));

        let report = validate(&g, &NodeCatalog::builtin());
        assert!(report.is_valid(), "unexpected errors: {:?}", report.errors);
        assert!(report.invalid_fields.is_empty());
        assert!(report.unconnected_exits.is_empty());
        assert!(report.unconnected_inputs.is_empty());
    }

    #[test]
    fn empty_graph_short_circuits_the_remaining_rules() {
        let report = validate(&Graph::new(), &NodeCatalog::builtin());
        assert_eq!(
            report.errors,
            vec![
                "No trigger node found. Workflow must start with at least one trigger."
                    .to_string(),
                "Workflow is empty. Add at least one node to continue.".to_string(),
            ]
        );
    }

    #[test]
    fn multiple_manual_triggers_are_rejected() {
        let mut g = Graph::new();
        add_node(&mut g, trigger("t1"));
        let mut second = trigger("t2");
        second.label = "Second Trigger".to_string();
        add_node(&mut g, second);
        add_node(&mut g, terminal("e"));
        add_edge(&mut g, "e1", "t1", "e", None);
        add_edge(&mut g, "e2", "t2", "e", None);

        let report = validate(&g, &NodeCatalog::builtin());
        assert!(report.errors.iter().any(|e| e
            == "Multiple manual triggers found (2). Only one trigger.manual is allowed per workflow."));
    }

    #[test]
    fn orphans_are_reported_with_unconnected_inputs() {
        let mut g = Graph::new();
        add_node(&mut g, trigger("t"));
        add_node(&mut g, terminal("e"));
        add_edge(&mut g, "e1", "t", "e", None);
        let mut stray = node("x", "utility.log", "Stranded Log");
        stray.params.insert("level".to_string(), json!("INFO"));
        stray.params.insert("message".to_string(), json!("hi"));
        add_node(&mut g, stray);
        // Give it an outgoing edge so only reachability fires for it.
        add_edge(&mut g, "e2", "x", "e", None);

        let report = validate(&g, &NodeCatalog::builtin());
        assert!(report.errors.iter().any(|e| e
            == "Orphan nodes not connected to any trigger: Stranded Log"));
        assert!(report.unconnected_inputs.contains("x"));
        assert!(!report.unconnected_inputs.contains("e"));
    }

    #[test]
    fn missing_required_fields_use_property_labels() {
        let mut g = Graph::new();
        add_node(&mut g, trigger("t"));
        let mut sms = node("s", "action.sms", "Page Oncall");
        sms.params.insert("smsProvider".to_string(), json!("twilio"));
        sms.params.insert("smsTemplateId".to_string(), json!(""));
        add_node(&mut g, sms);
        add_node(&mut g, terminal("e"));
        add_edge(&mut g, "e1", "t", "s", None);
        add_edge(&mut g, "e2", "s", "e", Some("onSuccess"));
        add_edge(&mut g, "e3", "s", "e", Some("onTimeout"));
        add_edge(&mut g, "e4", "s", "e", Some("onFailure"));

        let report = validate(&g, &NodeCatalog::builtin());
        assert!(report.errors.iter().any(|e| e
            == "Node \"Page Oncall\" is missing required field: SMS Template"));
        assert_eq!(report.invalid_fields["s"], vec!["smsTemplateId"]);
    }

    #[test]
    fn terminal_nodes_must_not_have_outgoing_edges() {
        let mut g = Graph::new();
        add_node(&mut g, trigger("t"));
        add_node(&mut g, terminal("e"));
        add_edge(&mut g, "e1", "t", "e", None);
        add_edge(&mut g, "e2", "e", "t", None);

        let report = validate(&g, &NodeCatalog::builtin());
        assert!(report.errors.iter().any(|e| e
            == "Terminal node \"End\" should not have outgoing connections"));
    }

    #[test]
    fn partial_exit_coverage_is_recorded() {
        let mut g = Graph::new();
        add_node(&mut g, trigger("t"));
        let mut branch = node("b", "control.if", "Severity Gate");
        branch
            .params
            .insert("condition".to_string(), json!("severity == 'CRITICAL'"));
        add_node(&mut g, branch);
        add_node(&mut g, terminal("e"));
        add_edge(&mut g, "e1", "t", "b", None);
        add_edge(&mut g, "e2", "b", "e", Some("onTrue"));

        let report = validate(&g, &NodeCatalog::builtin());
        assert!(report.errors.iter().any(|e| e
            == "Node \"Severity Gate\" has unconnected exit points: onFalse"));
        assert_eq!(report.unconnected_exits["b"], vec!["onFalse"]);
    }

    #[test]
    fn nodes_without_any_outgoing_edge_are_flagged() {
        let mut g = Graph::new();
        add_node(&mut g, trigger("t"));
        let mut wait = node("w", "control.wait", "Cool Down");
        wait.params.insert("seconds".to_string(), json!(30));
        add_node(&mut g, wait);
        add_node(&mut g, terminal("e"));
        add_edge(&mut g, "e1", "t", "w", None);
        add_edge(&mut g, "e2", "t", "e", None);

        let report = validate(&g, &NodeCatalog::builtin());
        assert!(report.errors.iter().any(|e| e
            == "Node \"Cool Down\" has no outgoing connections"));
        // Every declared exit is missing too, and both findings surface.
        assert!(report.errors.iter().any(|e| e
            == "Node \"Cool Down\" has unconnected exit points: next"));
        assert_eq!(report.unconnected_exits["w"], vec!["next"]);
    }

    #[test]
    fn dynamic_exit_types_are_exempt_from_coverage() {
        let mut g = Graph::new();
        add_node(&mut g, trigger("t"));
        let mut switch = node("sw", "control.switch", "Route Severity");
        switch.params.insert("expression".to_string(), json!("severity"));
        switch.params.insert("cases".to_string(), json!("HIGH,LOW"));
        add_node(&mut g, switch);
        add_node(&mut g, terminal("e"));
        add_edge(&mut g, "e1", "t", "sw", None);
        // The switch routes through case-named exits unknown to the
        // catalog; it must not be told it has no outgoing connections.
        add_edge(&mut g, "e2", "sw", "e", Some("HIGH"));

        let report = validate(&g, &NodeCatalog::builtin());
        assert!(report.is_valid(), "unexpected errors: {:?}", report.errors);
    }

    #[test]
    fn duplicate_labels_are_counted() {
        let mut g = Graph::new();
        add_node(&mut g, trigger("t"));
        let mut a = node("a", "utility.delay", "Pause");
        a.params.insert("duration".to_string(), json!(5));
        let mut b = node("b", "utility.delay", "Pause");
        b.params.insert("duration".to_string(), json!(5));
        add_node(&mut g, a);
        add_node(&mut g, b);
        add_node(&mut g, terminal("e"));
        add_edge(&mut g, "e1", "t", "a", None);
        add_edge(&mut g, "e2", "a", "b", None);
        add_edge(&mut g, "e3", "b", "e", None);

        let report = validate(&g, &NodeCatalog::builtin());
        assert!(report.errors.iter().any(|e| e
            == "Duplicate node label \"Pause\" found 2 times. Consider using unique labels."));
    }

    #[test]
    fn dangling_edges_name_the_missing_side() {
        let mut g = Graph::new();
        add_node(&mut g, trigger("t"));
        add_node(&mut g, terminal("e"));
        add_edge(&mut g, "e1", "t", "e", None);
        add_edge(&mut g, "ghost", "t", "gone", None);
        add_edge(&mut g, "ghost2", "gone", "e", None);

        let report = validate(&g, &NodeCatalog::builtin());
        assert!(report
            .errors
            .iter()
            .any(|e| e == "Edge ghost has missing target node"));
        assert!(report
            .errors
            .iter()
            .any(|e| e == "Edge ghost2 has missing source node"));
    }

    #[test]
    fn cycles_are_detected_iteratively() {
        let mut g = Graph::new();
        add_node(&mut g, trigger("t"));
        let mut a = node("a", "utility.delay", "A");
        a.params.insert("duration".to_string(), json!(1));
        let mut b = node("b", "utility.delay", "B");
        b.params.insert("duration".to_string(), json!(1));
        add_node(&mut g, a);
        add_node(&mut g, b);
        add_node(&mut g, terminal("e"));
        add_edge(&mut g, "e1", "t", "a", None);
        add_edge(&mut g, "e2", "a", "b", None);
        add_edge(&mut g, "e3", "b", "a", None);
        add_edge(&mut g, "e4", "b", "e", None);

        let cyclic = validate(&g, &NodeCatalog::builtin());
        assert!(cyclic.errors.iter().any(|e| e
            == "Circular dependency detected. Workflow contains an infinite loop."));

        // Break the cycle; the chain A -> B -> End is clean.
        g.edges.shift_remove("e3");
        let acyclic = validate(&g, &NodeCatalog::builtin());
        assert!(!acyclic.errors.iter().any(|e| e.contains("Circular")));
    }

    #[test]
    fn a_long_chain_does_not_overflow_the_checker() {
        let mut g = Graph::new();
        add_node(&mut g, trigger("t"));
        let mut prev = "t".to_string();
        for i in 0..5_000 {
            let id = format!("n{i}");
            let mut step = node(&id, "utility.delay", &format!("Step {i}"));
            step.params.insert("duration".to_string(), json!(1));
            add_node(&mut g, step);
            add_edge(&mut g, &format!("c{i}"), &prev, &id, None);
            prev = id;
        }
        add_node(&mut g, terminal("e"));
        add_edge(&mut g, "last", &prev, "e", None);

        let report = validate(&g, &NodeCatalog::builtin());
        assert!(report.is_valid(), "unexpected errors: {:?}", report.errors);
    }

    #[test]
    fn terminal_presence_is_required() {
        let mut g = Graph::new();
        add_node(&mut g, trigger("t"));
        let mut log = node("l", "utility.log", "Log It");
        log.params.insert("level".to_string(), json!("INFO"));
        log.params.insert("message".to_string(), json!("done"));
        add_node(&mut g, log);
        add_edge(&mut g, "e1", "t", "l", None);
        add_edge(&mut g, "e2", "l", "t", None);

        let report = validate(&g, &NodeCatalog::builtin());
        assert!(report.errors.iter().any(|e| e
            == "No terminal/end node found. Workflow should have at least one end point."));
    }

    #[test]
    fn highlight_helpers_query_and_clear_entries() {
        let mut g = Graph::new();
        add_node(&mut g, trigger("t"));
        let mut branch = node("b", "control.if", "Gate");
        branch.params.insert("condition".to_string(), json!("x"));
        add_node(&mut g, branch);
        add_node(&mut g, terminal("e"));
        add_edge(&mut g, "e1", "t", "b", None);
        add_edge(&mut g, "e2", "b", "e", Some("onTrue"));

        let mut report = validate(&g, &NodeCatalog::builtin());
        assert!(report.is_exit_unconnected("b", "onFalse"));
        assert!(!report.is_exit_unconnected("b", "onTrue"));
        assert!(!report.is_input_unconnected("b"));

        report.clear_exit_highlight("b", "onFalse");
        assert!(!report.is_exit_unconnected("b", "onFalse"));
        assert!(!report.unconnected_exits.contains_key("b"));
        // Clearing something absent is harmless.
        report.clear_field_highlight("b", "condition");
        report.clear_input_highlight("zz");
    }

    #[test]
    fn unknown_types_classify_by_prefix_and_skip_field_rules() {
        let mut g = Graph::new();
        // Unknown trigger and terminal types still classify by prefix,
        // and carry no required fields or declared exits.
        add_node(&mut g, node("t", "trigger.sensor", "Sensor"));
        add_node(&mut g, node("e", "end.archive", "Archive"));
        add_edge(&mut g, "e1", "t", "e", None);

        let report = validate(&g, &NodeCatalog::builtin());
        assert!(report.is_valid(), "unexpected errors: {:?}", report.errors);
    }
}
