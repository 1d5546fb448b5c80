//! The two-click connection drawing protocol.
//!
//! A click on a port arms the machine; the next click on a compatible
//! port attempts completion. Every illegal click is a silent no-op, so
//! the machine cannot reach an invalid state from bad input. Whether an
//! attempted edge actually materializes (duplicate and reverse-edge
//! policy) is decided by the store, not here.

use tracing::debug;

/// Connection drawing state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    /// Armed: a source port has been clicked.
    AwaitingTarget {
        source: String,
        /// `None` when the connection was started from an input point;
        /// such a connection can only be cancelled, never completed.
        exit_point: Option<String>,
    },
}

/// Result of a click on a prospective target node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Nothing to do: not armed, armed from an input, or a self-click.
    Ignored,
    /// The protocol finished; the caller should attempt to create the
    /// edge `source --exit_point--> target` and is back at idle.
    Complete { source: String, exit_point: String },
}

impl ConnectionState {
    pub fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Idle)
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            ConnectionState::AwaitingTarget { source, .. } => Some(source),
            ConnectionState::Idle => None,
        }
    }

    pub fn exit_point(&self) -> Option<&str> {
        match self {
            ConnectionState::AwaitingTarget { exit_point, .. } => exit_point.as_deref(),
            ConnectionState::Idle => None,
        }
    }

    /// Armed from an input point, so output clicks must stay disabled.
    pub fn started_from_input(&self) -> bool {
        matches!(
            self,
            ConnectionState::AwaitingTarget { exit_point: None, .. }
        )
    }

    /// Arm from a named output port. Legal only from idle; while armed,
    /// further output clicks are ignored (output→output is not a
    /// connection).
    pub fn begin_from_output(&mut self, node_id: &str, exit_point: &str) -> bool {
        match self {
            ConnectionState::Idle => {
                *self = ConnectionState::AwaitingTarget {
                    source: node_id.to_string(),
                    exit_point: Some(exit_point.to_string()),
                };
                true
            }
            ConnectionState::AwaitingTarget { .. } => {
                debug!(node_id, "ignored output click while already connecting");
                false
            }
        }
    }

    /// Arm from an input point. Legal only from idle.
    pub fn begin_from_input(&mut self, node_id: &str) -> bool {
        match self {
            ConnectionState::Idle => {
                *self = ConnectionState::AwaitingTarget {
                    source: node_id.to_string(),
                    exit_point: None,
                };
                true
            }
            ConnectionState::AwaitingTarget { .. } => {
                debug!(node_id, "ignored input click while already connecting");
                false
            }
        }
    }

    /// A click on `target` while armed. Completes only for a connection
    /// started from an output and aimed at a different node; completion
    /// (successful or not at the edge-policy level) returns to idle.
    pub fn click_target(&mut self, target: &str) -> ClickOutcome {
        match self {
            ConnectionState::AwaitingTarget {
                source,
                exit_point: Some(exit),
            } if source != target => {
                let outcome = ClickOutcome::Complete {
                    source: std::mem::take(source),
                    exit_point: std::mem::take(exit),
                };
                *self = ConnectionState::Idle;
                outcome
            }
            ConnectionState::AwaitingTarget { source, exit_point } => {
                if exit_point.is_none() {
                    debug!(target, "ignored target click for input-started connection");
                } else if source == target {
                    debug!(target, "ignored self-connection click");
                }
                ClickOutcome::Ignored
            }
            ConnectionState::Idle => ClickOutcome::Ignored,
        }
    }

    /// Unconditionally return to idle. Reports whether a pending
    /// connection was discarded.
    pub fn cancel(&mut self) -> bool {
        let was_active = self.is_active();
        *self = ConnectionState::Idle;
        was_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_click_arms_and_target_click_completes() {
        let mut state = ConnectionState::default();
        assert!(state.begin_from_output("a", "onTrue"));
        assert!(state.is_active());
        assert_eq!(state.source(), Some("a"));
        assert_eq!(state.exit_point(), Some("onTrue"));

        let outcome = state.click_target("b");
        assert_eq!(
            outcome,
            ClickOutcome::Complete {
                source: "a".to_string(),
                exit_point: "onTrue".to_string(),
            }
        );
        assert!(!state.is_active());
    }

    #[test]
    fn second_output_click_is_ignored() {
        let mut state = ConnectionState::default();
        state.begin_from_output("a", "next");
        assert!(!state.begin_from_output("b", "next"));
        // Still armed from the first click.
        assert_eq!(state.source(), Some("a"));
    }

    #[test]
    fn self_click_is_ignored_and_stays_armed() {
        let mut state = ConnectionState::default();
        state.begin_from_output("a", "next");
        assert_eq!(state.click_target("a"), ClickOutcome::Ignored);
        assert!(state.is_active());
    }

    #[test]
    fn input_started_connection_never_completes() {
        let mut state = ConnectionState::default();
        assert!(state.begin_from_input("sink"));
        assert!(state.started_from_input());
        assert_eq!(state.exit_point(), None);

        // Neither another input nor any target click completes.
        assert_eq!(state.click_target("other"), ClickOutcome::Ignored);
        assert!(state.is_active());
        assert!(!state.begin_from_input("other"));

        assert!(state.cancel());
        assert!(!state.is_active());
    }

    #[test]
    fn cancel_from_idle_reports_nothing_discarded() {
        let mut state = ConnectionState::default();
        assert!(!state.cancel());
        assert_eq!(state.click_target("a"), ClickOutcome::Ignored);
    }
}
