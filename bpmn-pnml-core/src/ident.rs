//! Deterministic id construction.
//!
//! Several preprocessing passes recognize and reverse these strings, so the
//! exact formats are part of the observable contract.

/// Id of the silent node mediating a same-kind arc from `source` to `target`.
pub fn silent_node_id(source: &str, target: &str) -> String {
    format!("SILENTFROM{source}TO{target}")
}

/// Default arc/flow id between two nodes.
pub fn arc_id(source: &str, target: &str) -> String {
    format!("{source}TO{target}")
}

/// Id of the explicit task extracted from a named operator or AND transition.
pub fn explicit_transition_id(id: &str) -> String {
    format!("EXPLICIT{id}")
}

/// Id of the trigger helper split off a time/message transition.
pub fn trigger_id(id: &str) -> String {
    format!("TRIGGER{id}")
}

/// Id of the place capping a dangling source transition.
pub fn source_id(id: &str) -> String {
    format!("SOURCE{id}")
}

/// Id of the place capping a dangling sink transition.
pub fn sink_id(id: &str) -> String {
    format!("SINK{id}")
}

/// Id of the `i`-th helper transition emitted for workflow operator `gw`.
pub fn operator_helper_id(gw: &str, i: usize) -> String {
    format!("{gw}_op_{i}")
}

/// Id of the central place of an XOR join-split operator.
pub fn center_place_id(gw: &str) -> String {
    format!("P_CENTER_{gw}")
}
