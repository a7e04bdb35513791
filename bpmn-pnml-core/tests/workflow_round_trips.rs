//! BPMN → workflow-net corpus: WOPED operator groups, triggers, pools and
//! subprocess pages.

mod common;

use bpmn_pnml_core::bpmn::{
    Collaboration, EventKind, FlowNode, Lane, LaneSet, Participant, Process,
};
use bpmn_pnml_core::pnml::{BranchingType, GlobalResources, NetElement};
use bpmn_pnml_core::{bpmn_to_workflow_net, compare_pnml, TransformError};
use common::{create_bpmn, create_petri_net, operator_place, operator_transition, silent_place, silent_transition};

fn assert_workflow_net(bpmn: bpmn_pnml_core::BpmnDocument, expected: bpmn_pnml_core::PnmlDocument) {
    let result = bpmn_to_workflow_net(bpmn).expect("transformation succeeds");
    if let Err(diff) = compare_pnml(&expected.net, &result.net) {
        panic!("nets differ:\n{diff}");
    }
}

fn pool(doc: &mut bpmn_pnml_core::BpmnDocument, organization: &str, lanes: Vec<(&str, Vec<&str>)>) {
    doc.collaboration = Some(Collaboration {
        id: "x".into(),
        participant: Participant {
            id: "xo".into(),
            name: Some(organization.into()),
            process_ref: doc.process.id.clone(),
        },
    });
    doc.process.lane_sets.push(LaneSet {
        id: "ls".into(),
        lanes: lanes
            .into_iter()
            .map(|(name, refs)| Lane {
                id: name.into(),
                name: Some(name.into()),
                flow_node_refs: refs.into_iter().map(str::to_owned).collect(),
            })
            .collect(),
    });
}

#[test]
fn and_split_and_join_of_two_tasks() {
    let split = FlowNode::and_gateway("elem_4", Some("elem_4"));
    let join = FlowNode::and_gateway("elem_5", Some("elem_5"));
    let bpmn = create_bpmn(
        "parallel_workflow",
        vec![
            vec![
                FlowNode::start("elem_1"),
                split.clone(),
                FlowNode::task("elem_3", Some("elem_3")),
                join.clone(),
                FlowNode::end("elem_2"),
            ],
            vec![split, FlowNode::task("elem_6", Some("elem_6")), join],
        ],
    );

    let and_split = operator_transition("elem_4", 1, BranchingType::AndSplit, Some("elem_4"));
    let and_join = operator_transition("elem_5", 1, BranchingType::AndJoin, Some("elem_5"));
    let net = create_petri_net(
        "parallel_workflow",
        vec![
            vec![
                NetElement::place("elem_1"),
                and_split.clone(),
                silent_place("elem_4_op_1", "elem_3"),
                NetElement::transition("elem_3", Some("elem_3")),
                silent_place("elem_3", "elem_5_op_1"),
                and_join.clone(),
                NetElement::place("elem_2"),
            ],
            vec![
                and_split,
                silent_place("elem_4_op_1", "elem_6"),
                NetElement::transition("elem_6", Some("elem_6")),
                silent_place("elem_6", "elem_5_op_1"),
                and_join,
            ],
        ],
    );
    assert_workflow_net(bpmn, net);
}

#[test]
fn and_join_split_collapses_into_one_operator_transition() {
    let split = FlowNode::and_gateway("elem_4", Some("elem_4"));
    let both = FlowNode::and_gateway("elem_7", Some("elem_7"));
    let join = FlowNode::and_gateway("elem_5", Some("elem_5"));
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

    let and_split = operator_transition("elem_4", 1, BranchingType::AndSplit, Some("elem_4"));
    let and_both = operator_transition("elem_7", 1, BranchingType::AndJoinSplit, Some("elem_7"));
    let and_join = operator_transition("elem_5", 1, BranchingType::AndJoin, Some("elem_5"));
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
    assert_workflow_net(bpmn, net);
}

#[test]
fn xor_join_split_builds_per_branch_helpers_around_a_central_place() {
    let split = FlowNode::xor_gateway("elem_4", Some("elem_4"));
    let both = FlowNode::xor_gateway("elem_7", Some("elem_7"));
    let join = FlowNode::xor_gateway("elem_5", Some("elem_5"));
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

    // split: one helper per target, numbered by sorted target id
    let xor_split_1 = operator_transition("elem_4", 1, BranchingType::XorSplit, Some("elem_4"));
    let xor_split_2 = operator_transition("elem_4", 2, BranchingType::XorSplit, Some("elem_4"));
    // join-split: joins numbered by sorted source id, then splits by target
    let center = operator_place("elem_7", BranchingType::XorJoinSplit);
    let xor_both_in_1 = operator_transition("elem_7", 1, BranchingType::XorJoinSplit, Some("elem_7"));
    let xor_both_in_2 = operator_transition("elem_7", 2, BranchingType::XorJoinSplit, Some("elem_7"));
    let xor_both_out_1 = operator_transition("elem_7", 3, BranchingType::XorJoinSplit, Some("elem_7"));
    let xor_both_out_2 = operator_transition("elem_7", 4, BranchingType::XorJoinSplit, Some("elem_7"));
    let xor_join_1 = operator_transition("elem_5", 1, BranchingType::XorJoin, Some("elem_5"));
    let xor_join_2 = operator_transition("elem_5", 2, BranchingType::XorJoin, Some("elem_5"));

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
    assert_workflow_net(bpmn, net);
}

#[test]
fn unnecessary_gateway_is_reduced_away() {
    let bpmn = create_bpmn(
        "reduce_unnecessary_gw",
        vec![vec![
            FlowNode::start("elem_1"),
            FlowNode::and_gateway("gw", None),
            FlowNode::end("elem_2"),
        ]],
    );
    let net = create_petri_net(
        "reduce_unnecessary_gw",
        vec![vec![
            NetElement::place("elem_1"),
            silent_transition("elem_1", "elem_2"),
            NetElement::place("elem_2"),
        ]],
    );
    assert_workflow_net(bpmn, net);
}

#[test]
fn sequential_time_event_keeps_its_id_and_marker() {
    let bpmn = create_bpmn(
        "sequential_time_event",
        vec![vec![
            FlowNode::start("elem_1"),
            FlowNode::catch_event("trigger", EventKind::Time, None),
            FlowNode::task("task", Some("task")),
            FlowNode::end("elem_2"),
        ]],
    );
    let net = create_petri_net(
        "sequential_time_event",
        vec![vec![
            NetElement::place("elem_1"),
            NetElement::transition("trigger", None).mark_as_workflow_time(),
            silent_place("trigger", "task"),
            NetElement::transition("task", Some("task")),
            NetElement::place("elem_2"),
        ]],
    );
    assert_workflow_net(bpmn, net);
}

#[test]
fn sequential_message_event_keeps_its_id_and_marker() {
    let bpmn = create_bpmn(
        "sequential_message_event",
        vec![vec![
            FlowNode::start("elem_1"),
            FlowNode::catch_event("trigger", EventKind::Message, None),
            FlowNode::task("task", Some("task")),
            FlowNode::end("elem_2"),
        ]],
    );
    let net = create_petri_net(
        "sequential_message_event",
        vec![vec![
            NetElement::place("elem_1"),
            NetElement::transition("trigger", None).mark_as_workflow_message(),
            silent_place("trigger", "task"),
            NetElement::transition("task", Some("task")),
            NetElement::place("elem_2"),
        ]],
    );
    assert_workflow_net(bpmn, net);
}

#[test]
fn simple_pool_annotates_user_tasks_with_their_lane() {
    let mut bpmn = create_bpmn(
        "simple_pool",
        vec![vec![
            FlowNode::start("elem_1"),
            FlowNode::user_task("task_lane_1", None),
            FlowNode::service_task("service_task", Some("service_task")),
            FlowNode::user_task("task_lane_2", None),
            FlowNode::end("elem_2"),
        ]],
    );
    pool(
        &mut bpmn,
        "orga",
        vec![
            ("lane1", vec!["elem_1", "task_lane_1"]),
            ("lane2", vec!["task_lane_2", "elem_2"]),
        ],
    );

    let mut net = create_petri_net(
        "simple_pool",
        vec![vec![
            NetElement::place("elem_1"),
            NetElement::transition("task_lane_1", None).mark_as_workflow_resource("lane1", "orga"),
            silent_place("task_lane_1", "service_task"),
            NetElement::transition("service_task", Some("service_task")),
            silent_place("service_task", "task_lane_2"),
            NetElement::transition("task_lane_2", None).mark_as_workflow_resource("lane2", "orga"),
            NetElement::place("elem_2"),
        ]],
    );
    net.net.resources = Some(GlobalResources {
        roles: vec!["lane1".into(), "lane2".into()],
        units: vec!["orga".into()],
    });
    assert_workflow_net(bpmn, net);
}

#[test]
fn subprocess_pool_emits_a_page_with_outer_neighbor_ids() {
    let mut sub = Process::new("elem_3");
    sub.name = Some("subprocess".into());
    sub.add_node(FlowNode::start("elem_sb_1"))
        .add_node(FlowNode::user_task("elem_sb_3", None))
        .add_node(FlowNode::end("elem_sb_2"));
    sub.add_flow("elem_sb_1", "elem_sb_3", None, None).unwrap();
    sub.add_flow("elem_sb_3", "elem_sb_2", None, None).unwrap();

    let mut bpmn = create_bpmn(
        "subprocess_pool",
        vec![vec![
            FlowNode::start("elem_1"),
            FlowNode::subprocess(sub),
            FlowNode::user_task("task_lane_2", None),
            FlowNode::end("elem_2"),
        ]],
    );
    pool(
        &mut bpmn,
        "orga",
        vec![
            ("lane1", vec!["elem_1", "elem_3"]),
            ("lane2", vec!["task_lane_2", "elem_2"]),
        ],
    );

    let mut net = create_petri_net(
        "subprocess_pool",
        vec![vec![
            NetElement::place("elem_1"),
            NetElement::transition("elem_3", Some("subprocess")).mark_as_workflow_subprocess(),
            silent_place("elem_3", "task_lane_2"),
            NetElement::transition("task_lane_2", None).mark_as_workflow_resource("lane2", "orga"),
            NetElement::place("elem_2"),
        ]],
    );
    net.net.resources = Some(GlobalResources {
        roles: vec!["lane1".into(), "lane2".into()],
        units: vec!["orga".into()],
    });
    // page: inner start/end renamed to the outer neighbors' place ids
    let mut page = create_petri_net(
        "",
        vec![vec![
            NetElement::place("elem_1"),
            NetElement::transition("elem_sb_3", None).mark_as_workflow_resource("lane1", "orga"),
            NetElement::place(bpmn_pnml_core::ident::silent_node_id("elem_3", "task_lane_2")),
        ]],
    )
    .net;
    page.id = None;
    net.net.add_page("elem_3", page);

    assert_workflow_net(bpmn, net);
}

#[test]
fn subprocess_with_two_end_events_is_rejected() {
    let mut sub = Process::new("elem_3");
    sub.add_node(FlowNode::start("sb_s"))
        .add_node(FlowNode::task("sb_t", Some("sb_t")))
        .add_node(FlowNode::end("sb_e1"))
        .add_node(FlowNode::end("sb_e2"));
    sub.add_flow("sb_s", "sb_t", None, None).unwrap();
    sub.add_flow("sb_t", "sb_e1", None, None).unwrap();

    let bpmn = create_bpmn(
        "ambiguous_subprocess",
        vec![vec![
            FlowNode::start("elem_1"),
            FlowNode::subprocess(sub),
            FlowNode::end("elem_2"),
        ]],
    );
    assert!(matches!(bpmn_to_workflow_net(bpmn), Err(TransformError::WrongSubprocessDegree)));
}

#[test]
fn trigger_and_pool_combine() {
    let mut bpmn = create_bpmn(
        "trigger_pool_combination",
        vec![vec![
            FlowNode::start("elem_1"),
            FlowNode::catch_event("trigger", EventKind::Time, None),
            FlowNode::user_task("user_task_1", None),
            FlowNode::end("elem_2"),
        ]],
    );
    pool(
        &mut bpmn,
        "orga",
        vec![("lane1", vec!["elem_1", "user_task_1", "elem_2", "trigger"])],
    );

    let mut net = create_petri_net(
        "trigger_pool_combination",
        vec![vec![
            NetElement::place("elem_1"),
            NetElement::transition("trigger", None).mark_as_workflow_time(),
            silent_place("trigger", "user_task_1"),
            NetElement::transition("user_task_1", None).mark_as_workflow_resource("lane1", "orga"),
            NetElement::place("elem_2"),
        ]],
    );
    net.net.resources =
        Some(GlobalResources { roles: vec!["lane1".into()], units: vec!["orga".into()] });
    assert_workflow_net(bpmn, net);
}
