//! Fixture builders for the round-trip corpus: graphs are described as rows
//! of nodes, consecutive row members get a default-named flow/arc.
#![allow(dead_code)]

use bpmn_pnml_core::bpmn::{BpmnDocument, FlowNode};
use bpmn_pnml_core::pnml::{BranchingType, NetElement, PnmlDocument};

pub fn create_bpmn(case: &str, rows: Vec<Vec<FlowNode>>) -> BpmnDocument {
    let mut doc = BpmnDocument::new(case);
    for row in &rows {
        for node in row {
            doc.process.add_node(node.clone());
        }
    }
    for row in &rows {
        for pair in row.windows(2) {
            doc.process
                .add_flow(&pair[0].id, &pair[1].id, None, None)
                .expect("fixture flow");
        }
    }
    doc
}

pub fn create_petri_net(case: &str, rows: Vec<Vec<NetElement>>) -> PnmlDocument {
    let mut doc = PnmlDocument::new(case);
    for row in &rows {
        for element in row {
            doc.net.add_element(element.clone());
        }
    }
    for row in &rows {
        for pair in row.windows(2) {
            doc.net.add_arc(&pair[0].id, &pair[1].id, None).expect("fixture arc");
        }
    }
    doc
}

/// Operator helper transition `{id}_op_{i}` as emitted by the workflow
/// transform.
pub fn operator_transition(id: &str, i: usize, kind: BranchingType, name: Option<&str>) -> NetElement {
    NetElement::transition(format!("{id}_op_{i}"), name).mark_as_workflow_operator(kind, id)
}

/// Central place of an XOR join-split operator.
pub fn operator_place(id: &str, kind: BranchingType) -> NetElement {
    NetElement::place(format!("P_CENTER_{id}")).mark_as_workflow_operator(kind, id)
}

/// Unnamed silent transition between two places.
pub fn silent_transition(source: &str, target: &str) -> NetElement {
    NetElement::transition(bpmn_pnml_core::ident::silent_node_id(source, target), None)
}

/// Unnamed silent place between two transitions.
pub fn silent_place(source: &str, target: &str) -> NetElement {
    NetElement::place(bpmn_pnml_core::ident::silent_node_id(source, target))
}
