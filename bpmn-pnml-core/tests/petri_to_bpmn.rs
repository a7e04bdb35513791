//! Petri-net → BPMN corpus: operator expansion, postprocessing of silent
//! residues, dangling caps and subprocess lifting.

mod common;

use bpmn_pnml_core::bpmn::{FlowNode, FlowNodeKind, Process};
use bpmn_pnml_core::pnml::{BranchingType, Net, NetElement};
use bpmn_pnml_core::{compare_bpmn, pnml_to_bpmn};
use common::{create_bpmn, create_petri_net, operator_place, operator_transition, silent_place, silent_transition};

fn assert_bpmn(pnml: bpmn_pnml_core::PnmlDocument, expected: bpmn_pnml_core::BpmnDocument) {
    let result = pnml_to_bpmn(pnml).expect("transformation succeeds");
    if let Err(diff) = compare_bpmn(&expected, &result) {
        panic!("bpmn differ:\n{diff}");
    }
}

#[test]
fn minimal_linear_net() {
    let net = create_petri_net(
        "Process_05gf0wk",
        vec![vec![
            NetElement::place("StartEvent_1kldrri"),
            NetElement::transition("Activity_16g2nsl", Some("Task")),
            NetElement::place("Event_02tt0ub"),
        ]],
    );
    let bpmn = create_bpmn(
        "Process_05gf0wk",
        vec![vec![
            FlowNode::start("StartEvent_1kldrri"),
            FlowNode::task("Activity_16g2nsl", Some("Task")),
            FlowNode::end("Event_02tt0ub"),
        ]],
    );
    assert_bpmn(net, bpmn);
}

#[test]
fn silent_transitions_and_degenerate_gateways_are_cleaned_up() {
    // start → silent → middle place → named task → end: the silent transition
    // and the middle place (a 1/1 gateway) must both disappear
    let net = create_petri_net(
        "cleanup",
        vec![vec![
            NetElement::place("start"),
            silent_transition("start", "mid"),
            NetElement::place("mid"),
            NetElement::transition("work", Some("work")),
            NetElement::place("end"),
        ]],
    );
    let bpmn = create_bpmn(
        "cleanup",
        vec![vec![
            FlowNode::start("start"),
            FlowNode::task("work", Some("work")),
            FlowNode::end("end"),
        ]],
    );
    assert_bpmn(net, bpmn);
}

#[test]
fn unnamed_operator_groups_become_plain_gateways() {
    let and_split = operator_transition("elem_4", 1, BranchingType::AndSplit, None);
    let and_both = operator_transition("elem_7", 1, BranchingType::AndJoinSplit, None);
    let and_join = operator_transition("elem_5", 1, BranchingType::AndJoin, None);
    let net = create_petri_net(
        "parallel_workflow_elements",
        vec![
            vec![
                NetElement::place("elem_1"),
                and_split.clone(),
                silent_place("elem_4_op_1", "elem_3"),
                NetElement::transition("elem_3", Some("elem_3")),
                silent_place("elem_3", "elem_7_op_1"),
                and_both.clone(),
                silent_place("elem_7_op_1", "elem_30"),
                NetElement::transition("elem_30", Some("elem_30")),
                silent_place("elem_30", "elem_5_op_1"),
                and_join.clone(),
                NetElement::place("elem_2"),
            ],
            vec![
                and_split,
                silent_place("elem_4_op_1", "elem_6"),
                NetElement::transition("elem_6", Some("elem_6")),
                silent_place("elem_6", "elem_7_op_1"),
                and_both.clone(),
            ],
            vec![
                and_both,
                silent_place("elem_7_op_1", "elem_60"),
                NetElement::transition("elem_60", Some("elem_60")),
                silent_place("elem_60", "elem_5_op_1"),
                and_join,
            ],
        ],
    );

    let split = FlowNode::and_gateway("elem_4", None);
    let both = FlowNode::and_gateway("elem_7", None);
    let join = FlowNode::and_gateway("elem_5", None);
    let bpmn = create_bpmn(
        "parallel_workflow_elements",
        vec![
            vec![
                FlowNode::start("elem_1"),
                split.clone(),
                FlowNode::task("elem_3", Some("elem_3")),
                both.clone(),
                FlowNode::task("elem_30", Some("elem_30")),
                join.clone(),
                FlowNode::end("elem_2"),
            ],
            vec![split, FlowNode::task("elem_6", Some("elem_6")), both.clone()],
            vec![both, FlowNode::task("elem_60", Some("elem_60")), join],
        ],
    );
    assert_bpmn(net, bpmn);
}

#[test]
fn xor_join_split_group_with_central_place_collapses_to_one_gateway() {
    let xor_split_1 = operator_transition("elem_4", 1, BranchingType::XorSplit, None);
    let xor_split_2 = operator_transition("elem_4", 2, BranchingType::XorSplit, None);
    let center = operator_place("elem_7", BranchingType::XorJoinSplit);
    let xor_both_in_1 = operator_transition("elem_7", 1, BranchingType::XorJoinSplit, None);
    let xor_both_in_2 = operator_transition("elem_7", 2, BranchingType::XorJoinSplit, None);
    let xor_both_out_1 = operator_transition("elem_7", 3, BranchingType::XorJoinSplit, None);
    let xor_both_out_2 = operator_transition("elem_7", 4, BranchingType::XorJoinSplit, None);
    let xor_join_1 = operator_transition("elem_5", 1, BranchingType::XorJoin, None);
    let xor_join_2 = operator_transition("elem_5", 2, BranchingType::XorJoin, None);

    let start = NetElement::place("elem_1");
    let end = NetElement::place("elem_2");
    let net = create_petri_net(
        "exclusive_workflow_elements",
        vec![
            vec![
                start.clone(),
                xor_split_1,
                silent_place("elem_4_op_1", "elem_3"),
                NetElement::transition("elem_3", Some("elem_3")),
                silent_place("elem_3", "elem_7_op_1"),
                xor_both_in_1,
                center.clone(),
                xor_both_out_1,
                silent_place("elem_7_op_3", "elem_30"),
                NetElement::transition("elem_30", Some("elem_30")),
                silent_place("elem_30", "elem_5_op_1"),
                xor_join_1,
                end.clone(),
            ],
            vec![
                start,
                xor_split_2,
                silent_place("elem_4_op_2", "elem_6"),
                NetElement::transition("elem_6", Some("elem_6")),
                silent_place("elem_6", "elem_7_op_2"),
                xor_both_in_2,
                center,
                xor_both_out_2,
                silent_place("elem_7_op_4", "elem_60"),
                NetElement::transition("elem_60", Some("elem_60")),
                silent_place("elem_60", "elem_5_op_2"),
                xor_join_2,
                end,
            ],
        ],
    );

    let split = FlowNode::xor_gateway("elem_4", None);
    let both = FlowNode::xor_gateway("elem_7", None);
    let join = FlowNode::xor_gateway("elem_5", None);
    let bpmn = create_bpmn(
        "exclusive_workflow_elements",
        vec![
            vec![
                FlowNode::start("elem_1"),
                split.clone(),
                FlowNode::task("elem_3", Some("elem_3")),
                both.clone(),
                FlowNode::task("elem_30", Some("elem_30")),
                join.clone(),
                FlowNode::end("elem_2"),
            ],
            vec![split, FlowNode::task("elem_6", Some("elem_6")), both.clone()],
            vec![both, FlowNode::task("elem_60", Some("elem_60")), join],
        ],
    );
    assert_bpmn(net, bpmn);
}

#[test]
fn named_operator_group_extracts_an_explicit_task() {
    let and_join_1 = operator_transition("gw", 1, BranchingType::AndJoin, Some("collect"));
    let net = create_petri_net(
        "named_join",
        vec![
            vec![
                NetElement::place("p1"),
                and_join_1.clone(),
                NetElement::place("out"),
                silent_transition("out", "end"),
                NetElement::place("end"),
            ],
            vec![NetElement::place("p2"), and_join_1],
        ],
    );

    let result = pnml_to_bpmn(net).expect("transformation succeeds");
    let task = result.process.node("EXPLICITgw").expect("explicit task kept");
    assert!(matches!(task.kind, FlowNodeKind::Task));
    assert_eq!(task.name.as_deref(), Some("collect"));
    let gw = result.process.node("gw").expect("gateway kept");
    assert!(matches!(gw.kind, FlowNodeKind::AndGateway));
    assert!(gw.name.is_none());
    // join → explicit task → end
    assert_eq!(result.process.in_degree("gw"), 2);
    assert_eq!(
        result.process.outgoing_ids("EXPLICITgw"),
        vec![bpmn_pnml_core::ident::arc_id("EXPLICITgw", "end")]
    );
}

#[test]
fn cross_kind_operator_expands_to_two_connected_gateways() {
    let mut doc = bpmn_pnml_core::PnmlDocument::new("combined");
    for id in ["p1", "p2", "q1", "q2"] {
        doc.net.add_element(NetElement::place(id));
    }
    for (i, (src, dst)) in
        [("p1", "q1"), ("p1", "q2"), ("p2", "q1"), ("p2", "q2")].iter().enumerate()
    {
        let id = format!("gw_op_{}", i + 1);
        doc.net.add_element(
            NetElement::transition(&id, None)
                .mark_as_workflow_operator(BranchingType::XorJoinAndSplit, "gw"),
        );
        doc.net.add_arc(src, &id, None).unwrap();
        doc.net.add_arc(&id, dst, None).unwrap();
    }
    // terminal structure so places map to events
    doc.net.add_element(NetElement::transition("pre1", Some("pre1")));
    doc.net.add_element(NetElement::place("start"));
    doc.net.add_arc("start", "pre1", None).unwrap();
    doc.net.add_arc("pre1", "p1", None).unwrap();
    doc.net.add_element(NetElement::transition("pre2", Some("pre2")));
    doc.net.add_arc("start", "pre2", None).unwrap();
    doc.net.add_arc("pre2", "p2", None).unwrap();
    doc.net.add_element(NetElement::transition("post1", Some("post1")));
    doc.net.add_element(NetElement::place("end"));
    doc.net.add_arc("q1", "post1", None).unwrap();
    doc.net.add_arc("post1", "end", None).unwrap();
    doc.net.add_element(NetElement::transition("post2", Some("post2")));
    doc.net.add_arc("q2", "post2", None).unwrap();
    doc.net.add_arc("post2", "end", None).unwrap();

    let result = pnml_to_bpmn(doc).expect("transformation succeeds");
    let xor = result.process.node("XORgw").expect("xor join part");
    assert!(matches!(xor.kind, FlowNodeKind::XorGateway));
    let and = result.process.node("ANDgw").expect("and split part");
    assert!(matches!(and.kind, FlowNodeKind::AndGateway));
    let connecting = result
        .process
        .flow(&bpmn_pnml_core::ident::arc_id("XORgw", "ANDgw"))
        .expect("direct connection for the unnamed group");
    assert_eq!(connecting.source, "XORgw");
    assert_eq!(connecting.target, "ANDgw");
}

#[test]
fn dangling_transitions_are_capped_with_synthetic_events() {
    let net = create_petri_net(
        "dangling",
        vec![vec![
            NetElement::transition("source", Some("source")),
            NetElement::place("p1"),
            NetElement::transition("link", Some("link")),
            NetElement::place("p2"),
            NetElement::transition("sink", Some("sink")),
        ]],
    );
    let bpmn = create_bpmn(
        "dangling",
        vec![vec![
            FlowNode::start("SOURCEsource"),
            FlowNode::task("source", Some("source")),
            FlowNode::task("link", Some("link")),
            FlowNode::task("sink", Some("sink")),
            FlowNode::end("SINKsink"),
        ]],
    );
    assert_bpmn(net, bpmn);
}

#[test]
fn subprocess_page_lifts_into_a_nested_process() {
    let mut doc = bpmn_pnml_core::PnmlDocument::new("root");
    doc.net.add_element(NetElement::place("p_in"));
    doc.net
        .add_element(NetElement::transition("sb", Some("subprocess")).mark_as_workflow_subprocess());
    doc.net.add_element(NetElement::place("p_out"));
    doc.net.add_arc("p_in", "sb", None).unwrap();
    doc.net.add_arc("sb", "p_out", None).unwrap();

    let mut page = Net::default();
    page.add_element(NetElement::place("p_in"));
    page.add_element(NetElement::transition("inner", Some("inner")));
    page.add_element(NetElement::place("p_out"));
    page.add_arc("p_in", "inner", None).unwrap();
    page.add_arc("inner", "p_out", None).unwrap();
    doc.net.add_page("sb", page);

    let mut sub = Process::new("sb");
    sub.name = Some("subprocess".into());
    sub.add_node(FlowNode::start("p_in"))
        .add_node(FlowNode::task("inner", Some("inner")))
        .add_node(FlowNode::end("p_out"));
    sub.add_flow("p_in", "inner", None, None).unwrap();
    sub.add_flow("inner", "p_out", None, None).unwrap();

    let bpmn = create_bpmn(
        "root",
        vec![vec![FlowNode::start("p_in"), FlowNode::subprocess(sub), FlowNode::end("p_out")]],
    );
    assert_bpmn(doc, bpmn);
}
