//! Workflow-operator and subprocess emission for the BPMN → Petri-net
//! direction.
//!
//! Gateways become groups of operator-marked transitions sharing the gateway
//! id; subprocesses become subprocess-marked transitions backed by a page.
//! Every arc goes through the same-kind mediator, so place/transition
//! discipline holds without per-case checks.

use crate::bpmn::{FlowNodeKind, Process};
use crate::error::{Result, TransformError};
use crate::ident;
use crate::pnml::{BranchingType, Net, NetElement};

/// Adds the `i`-th helper transition for gateway `gw` and marks it with the
/// operator annotation.
fn add_operator_helper(
    net: &mut Net,
    gw: &str,
    name: Option<&str>,
    i: usize,
    kind: BranchingType,
) -> String {
    let id = ident::operator_helper_id(gw, i);
    net.add_element(NetElement::transition(&id, name).mark_as_workflow_operator(kind, gw));
    id
}

fn add_xor_split(
    net: &mut Net,
    source: &str,
    targets: &[String],
    gw: &str,
    name: Option<&str>,
) -> Result<()> {
    for (i, target) in targets.iter().enumerate() {
        let helper = add_operator_helper(net, gw, name, i + 1, BranchingType::XorSplit);
        net.add_arc_handle_same_type(source, &helper)?;
        net.add_arc_handle_same_type(&helper, target)?;
    }
    Ok(())
}

fn add_xor_join(
    net: &mut Net,
    target: &str,
    sources: &[String],
    gw: &str,
    name: Option<&str>,
) -> Result<()> {
    for (i, source) in sources.iter().enumerate() {
        let helper = add_operator_helper(net, gw, name, i + 1, BranchingType::XorJoin);
        net.add_arc_handle_same_type(source, &helper)?;
        net.add_arc_handle_same_type(&helper, target)?;
    }
    Ok(())
}

fn add_and_split(
    net: &mut Net,
    source: &str,
    targets: &[String],
    gw: &str,
    name: Option<&str>,
) -> Result<()> {
    let helper = add_operator_helper(net, gw, name, 1, BranchingType::AndSplit);
    net.add_arc_handle_same_type(source, &helper)?;
    for target in targets {
        net.add_arc_handle_same_type(&helper, target)?;
    }
    Ok(())
}

fn add_and_join(
    net: &mut Net,
    target: &str,
    sources: &[String],
    gw: &str,
    name: Option<&str>,
) -> Result<()> {
    let helper = add_operator_helper(net, gw, name, 1, BranchingType::AndJoin);
    net.add_arc_handle_same_type(&helper, target)?;
    for source in sources {
        net.add_arc_handle_same_type(source, &helper)?;
    }
    Ok(())
}

/// XOR join-split: one helper per source into a central place, one helper
/// per target out of it. Helpers are numbered continuously starting at 1.
fn add_xor_split_join(
    net: &mut Net,
    sources: &[String],
    targets: &[String],
    gw: &str,
    name: Option<&str>,
) -> Result<()> {
    let center = ident::center_place_id(gw);
    net.add_element(
        NetElement::place(&center).mark_as_workflow_operator(BranchingType::XorJoinSplit, gw),
    );
    for (i, source) in sources.iter().enumerate() {
        let helper = add_operator_helper(net, gw, name, i + 1, BranchingType::XorJoinSplit);
        net.add_arc_handle_same_type(source, &helper)?;
        net.add_arc_handle_same_type(&helper, &center)?;
    }
    for (i, target) in targets.iter().enumerate() {
        let helper =
            add_operator_helper(net, gw, name, i + 1 + sources.len(), BranchingType::XorJoinSplit);
        net.add_arc_handle_same_type(&helper, target)?;
        net.add_arc_handle_same_type(&center, &helper)?;
    }
    Ok(())
}

fn add_and_split_join(
    net: &mut Net,
    sources: &[String],
    targets: &[String],
    gw: &str,
    name: Option<&str>,
) -> Result<()> {
    let helper = add_operator_helper(net, gw, name, 1, BranchingType::AndJoinSplit);
    for source in sources {
        net.add_arc_handle_same_type(source, &helper)?;
    }
    for target in targets {
        net.add_arc_handle_same_type(&helper, target)?;
    }
    Ok(())
}

/// Transforms one gateway into its workflow-operator group. The gateway's
/// incident flows are consumed; predecessors and successors are visited in
/// sorted id order so helper numbering is deterministic.
pub fn handle_gateway(bpmn: &mut Process, net: &mut Net, gw_id: &str) -> Result<()> {
    let node = bpmn.require_node(gw_id)?;
    let is_xor = matches!(node.kind, FlowNodeKind::XorGateway);
    let name = node.name.clone().filter(|n| !n.is_empty());
    let in_degree = bpmn.in_degree(gw_id);
    let out_degree = bpmn.out_degree(gw_id);

    let mut sources: Vec<String> = Vec::new();
    for flow_id in bpmn.incoming_ids(gw_id) {
        sources.push(bpmn.remove_flow(&flow_id)?.source);
    }
    let mut targets: Vec<String> = Vec::new();
    for flow_id in bpmn.outgoing_ids(gw_id) {
        targets.push(bpmn.remove_flow(&flow_id)?.target);
    }
    sources.sort();
    targets.sort();
    for neighbor in sources.iter().chain(&targets) {
        if !net.contains_element(neighbor) {
            return Err(TransformError::internal(format!(
                "gateway {gw_id} neighbor {neighbor} missing from net"
            )));
        }
    }

    let name = name.as_deref();
    if in_degree == 1 {
        if is_xor {
            add_xor_split(net, &sources[0], &targets, gw_id, name)?;
        } else {
            add_and_split(net, &sources[0], &targets, gw_id, name)?;
        }
    } else if out_degree == 1 {
        if is_xor {
            add_xor_join(net, &targets[0], &sources, gw_id, name)?;
        } else {
            add_and_join(net, &targets[0], &sources, gw_id, name)?;
        }
    } else if is_xor {
        add_xor_split_join(net, &sources, &targets, gw_id, name)?;
    } else {
        add_and_split_join(net, &sources, &targets, gw_id, name)?;
    }
    Ok(())
}

/// Emits a subprocess-marked transition plus the page holding the
/// transformed inner process.
///
/// The WOPED contract requires the page's inner start/end place ids to equal
/// the ids of the external predecessor/successor nodes; if the outer
/// neighbor is a transition, the silent place inserted between them owns the
/// id instead.
pub fn handle_subprocess(
    bpmn: &Process,
    net: &mut Net,
    sb_id: &str,
    transform_inner: &mut dyn FnMut(Process) -> Result<Net>,
) -> Result<()> {
    if bpmn.in_degree(sb_id) != 1 || bpmn.out_degree(sb_id) != 1 {
        return Err(TransformError::WrongSubprocessDegree);
    }
    let node = bpmn.require_node(sb_id)?;
    net.add_element(
        NetElement::transition(sb_id, node.name.as_deref()).mark_as_workflow_subprocess(),
    );

    let in_flow = bpmn.incoming_ids(sb_id);
    let out_flow = bpmn.outgoing_ids(sb_id);
    let outer_in_id = bpmn.require_flow(&in_flow[0])?.source.clone();
    let outer_out_id = bpmn.require_flow(&out_flow[0])?.target.clone();

    let outer_in = net.require_element(&outer_in_id)?;
    let in_place_id = if outer_in.kind == crate::pnml::ElementKind::Transition {
        ident::silent_node_id(&outer_in_id, sb_id)
    } else {
        outer_in_id
    };
    let outer_out = net.require_element(&outer_out_id)?;
    let out_place_id = if outer_out.kind == crate::pnml::ElementKind::Transition {
        ident::silent_node_id(sb_id, &outer_out_id)
    } else {
        outer_out_id
    };

    let mut inner = bpmn
        .subprocess(sb_id)
        .ok_or_else(|| TransformError::internal(format!("{sb_id} is not a subprocess")))?
        .clone();
    let (start, end) = super::preprocess::unique_start_and_end(&inner)?;
    inner.change_node_id(&start, &in_place_id)?;
    inner.change_node_id(&end, &out_place_id)?;

    let mut page_net = transform_inner(inner)?;
    page_net.id = None;
    net.add_page(sb_id.to_owned(), page_net);
    Ok(())
}
