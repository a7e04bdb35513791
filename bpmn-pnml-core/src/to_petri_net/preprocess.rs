//! Structure-rewriting passes that normalize a BPMN process before the
//! transform pass.

use std::collections::BTreeSet;

use crate::bpmn::{Flow, FlowNode, FlowNodeKind, Process};
use crate::error::{Result, TransformError};
use crate::ident;

/// Runs every pass on the nested subprocesses first, then on the process
/// itself.
pub fn apply_preprocessing(
    process: &mut Process,
    passes: &[fn(&mut Process) -> Result<()>],
) -> Result<()> {
    for sb_id in process.subprocess_ids() {
        let sub = process
            .subprocess_mut(&sb_id)
            .ok_or_else(|| TransformError::internal(format!("missing subprocess {sb_id}")))?;
        apply_preprocessing(sub, passes)?;
    }
    for pass in passes {
        pass(process)?;
    }
    Ok(())
}

// ─── Subprocess flattening (ST mode) ──────────────────────────

/// Recursively inlines every subprocess into its parent. External incoming
/// flows are reconnected to the unique inner start event, external outgoing
/// flows to the unique inner end event.
pub fn flatten_subprocesses(parent: &mut Process) -> Result<()> {
    for sb_id in parent.subprocess_ids() {
        {
            let sub = parent
                .subprocess_mut(&sb_id)
                .ok_or_else(|| TransformError::internal(format!("missing subprocess {sb_id}")))?;
            flatten_subprocesses(sub)?;
        }

        let sub = parent.subprocess(&sb_id).expect("subprocess id from snapshot");
        let (start, end) = unique_start_and_end(sub)?;

        let external_incoming: Vec<Flow> = parent
            .incoming_ids(&sb_id)
            .iter()
            .filter_map(|id| parent.flow(id).cloned())
            .collect();
        let external_outgoing: Vec<Flow> = parent
            .outgoing_ids(&sb_id)
            .iter()
            .filter_map(|id| parent.flow(id).cloned())
            .collect();
        for flow in external_incoming.iter().chain(&external_outgoing) {
            parent.remove_flow(&flow.id)?;
        }

        let node = parent.remove_node(&sb_id)?;
        let FlowNodeKind::Subprocess(sub) = node.kind else {
            return Err(TransformError::internal(format!("{sb_id} is not a subprocess")));
        };
        let (nodes, flows) = sub.into_parts();
        for inner in nodes {
            parent.add_node(inner);
        }
        for flow in flows {
            parent.add_flow(&flow.source, &flow.target, Some(flow.id), flow.name)?;
        }
        for flow in external_incoming {
            parent.add_flow(&flow.source, &start, Some(flow.id), flow.name)?;
        }
        for flow in external_outgoing {
            parent.add_flow(&end, &flow.target, Some(flow.id), flow.name)?;
        }
    }
    Ok(())
}

/// The subprocess's sole start event with in-degree 0 and sole end event
/// with out-degree 0. Anything else leaves the reconnection points
/// ambiguous.
pub(crate) fn unique_start_and_end(process: &Process) -> Result<(String, String)> {
    let mut starts = process.source_start_events();
    let mut ends = process.sink_end_events();
    if starts.len() != 1 || ends.len() != 1 {
        return Err(TransformError::WrongSubprocessDegree);
    }
    Ok((starts.remove(0), ends.remove(0)))
}

// ─── Inclusive-gateway replacement ────────────────────────────

struct Bridge {
    split: String,
    join: String,
    flow_out_split: String,
    flow_in_join: String,
}

/// Rewrites every OR-split/OR-join pair into an AND pair whose branches each
/// get an XOR-split → silent task → XOR-join bypass, so execution may elect
/// to skip the branch.
pub fn replace_inclusive_gateways(process: &mut Process) -> Result<()> {
    let or_gateways: Vec<String> = process
        .nodes()
        .filter(|n| matches!(n.kind, FlowNodeKind::OrGateway))
        .map(|n| n.id.clone())
        .collect();
    if or_gateways.is_empty() {
        return Ok(());
    }

    let bridges = find_matching_gateways(process, &or_gateways)?;
    let bridges = inclusive_to_parallel(process, bridges)?;
    for bridge in bridges {
        add_xor_bypass(process, &bridge)?;
    }
    Ok(())
}

fn find_matching_gateways(process: &Process, or_gateways: &[String]) -> Result<Vec<Bridge>> {
    let splits: Vec<&String> =
        or_gateways.iter().filter(|id| process.out_degree(id) > 1).collect();
    let joins: BTreeSet<&str> = or_gateways
        .iter()
        .filter(|id| process.in_degree(id) > 1)
        .map(String::as_str)
        .collect();
    let split_ids: BTreeSet<&str> = splits.iter().map(|s| s.as_str()).collect();

    let mut bridges = Vec::new();
    for split in &splits {
        for out_flow in process.outgoing_ids(split.as_str()) {
            let mut stack = vec![split.as_str()];
            let mut visited = BTreeSet::new();
            let hit = traverse_matching_gateway(
                process,
                &mut stack,
                &split_ids,
                &joins,
                &mut visited,
                &out_flow,
            )?;
            let (join_flow, join) = hit.ok_or(TransformError::OrGatewayDetectionIssue)?;
            bridges.push(Bridge {
                split: (*split).clone(),
                join,
                flow_out_split: out_flow,
                flow_in_join: join_flow,
            });
        }
    }
    Ok(bridges)
}

/// DFS along outgoing flows, tracking a split/join stack and refusing to
/// revisit arcs. Returns the flow entering the matching join plus its id.
fn traverse_matching_gateway<'a>(
    process: &Process,
    stack: &mut Vec<&'a str>,
    split_ids: &BTreeSet<&'a str>,
    join_ids: &BTreeSet<&'a str>,
    visited: &mut BTreeSet<String>,
    flow_id: &str,
) -> Result<Option<(String, String)>> {
    if visited.contains(flow_id) {
        // already visited arc: circle detected
        return Ok(None);
    }
    visited.insert(flow_id.to_owned());

    let target = process.flow_target(flow_id)?.to_owned();
    if join_ids.contains(target.as_str()) {
        if stack.len() == 1 {
            return Ok(Some((flow_id.to_owned(), target)));
        }
        stack.pop();
    }
    if let Some(split) = split_ids.get(target.as_str()) {
        stack.push(*split);
    }
    for next in process.outgoing_ids(&target) {
        if let Some(hit) =
            traverse_matching_gateway(process, stack, split_ids, join_ids, visited, &next)?
        {
            return Ok(Some(hit));
        }
    }
    Ok(None)
}

/// Replaces each matched OR gateway with an AND gateway `OR{id}`, re-keying
/// the incident flows to `OR_{flow}`.
fn inclusive_to_parallel(process: &mut Process, bridges: Vec<Bridge>) -> Result<Vec<Bridge>> {
    let mut replaced: BTreeSet<String> = BTreeSet::new();
    let mut flow_map: std::collections::BTreeMap<String, String> = Default::default();

    let mut todo: Vec<String> = Vec::new();
    for bridge in &bridges {
        for gw in [&bridge.split, &bridge.join] {
            if replaced.insert(gw.clone()) {
                todo.push(gw.clone());
            }
        }
    }
    for gw in todo {
        let new_id = format!("OR{gw}");
        let incident: Vec<Flow> = process
            .incoming_ids(&gw)
            .iter()
            .chain(process.outgoing_ids(&gw).iter())
            .filter_map(|id| process.flow(id).cloned())
            .collect();
        for flow in &incident {
            process.remove_flow(&flow.id)?;
        }
        process.remove_node(&gw)?;
        process.add_node(FlowNode::and_gateway(&new_id, None));
        for flow in incident {
            let source = if flow.source == gw { new_id.clone() } else { flow.source.clone() };
            let target = if flow.target == gw { new_id.clone() } else { flow.target.clone() };
            let new_flow_id = format!("OR_{}", flow.id);
            process.add_flow(&source, &target, Some(new_flow_id.clone()), flow.name)?;
            flow_map.insert(flow.id, new_flow_id);
        }
    }

    Ok(bridges
        .into_iter()
        .map(|b| Bridge {
            split: format!("OR{}", b.split),
            join: format!("OR{}", b.join),
            flow_out_split: flow_map
                .get(&b.flow_out_split)
                .cloned()
                .unwrap_or(b.flow_out_split),
            flow_in_join: flow_map.get(&b.flow_in_join).cloned().unwrap_or(b.flow_in_join),
        })
        .collect())
}

/// Wraps one branch of an AND pair into an XOR-split → silent task →
/// XOR-join bypass.
fn add_xor_bypass(process: &mut Process, bridge: &Bridge) -> Result<()> {
    let flow_out = process.require_flow(&bridge.flow_out_split)?.clone();
    let flow_in = process.require_flow(&bridge.flow_in_join)?.clone();

    let xor_split_id = format!("{}{}", bridge.split, flow_out.target);
    let xor_join_id = format!("{}{}", flow_in.source, bridge.join);
    let silent_id = format!("{xor_split_id}{xor_join_id}");

    process.add_node(FlowNode::xor_gateway(&xor_split_id, None));
    process.add_node(FlowNode::xor_gateway(&xor_join_id, None));
    process.add_node(FlowNode::task(&silent_id, None));

    process.remove_flow(&flow_out.id)?;
    process.remove_flow(&flow_in.id)?;

    // branch entry/exit through the XOR pair, names preserved
    process.add_flow(
        &xor_split_id,
        &flow_out.target,
        Some(ident::arc_id(&xor_split_id, &flow_out.target)),
        flow_out.name.clone(),
    )?;
    process.add_flow(
        &flow_in.source,
        &xor_join_id,
        Some(ident::arc_id(&flow_in.source, &xor_join_id)),
        flow_in.name.clone(),
    )?;
    process.add_flow(
        &bridge.split,
        &xor_split_id,
        Some(format!("{}{}", bridge.split, xor_split_id)),
        None,
    )?;
    process.add_flow(
        &xor_join_id,
        &bridge.join,
        Some(format!("{}{}", xor_join_id, bridge.join)),
        None,
    )?;

    // the empty alternative
    process.add_flow(
        &xor_split_id,
        &silent_id,
        Some(format!("{xor_split_id}{silent_id}")),
        None,
    )?;
    process.add_flow(
        &silent_id,
        &xor_join_id,
        Some(format!("{silent_id}{xor_join_id}")),
        None,
    )?;
    Ok(())
}

// ─── Gateway reduction (workflow mode) ────────────────────────

/// Removes gateways with in-degree ≤ 1 and out-degree ≤ 1, reconnecting
/// source to target with the gateway's id as the new flow's id.
pub fn reduce_unnecessary_gateways(process: &mut Process) -> Result<()> {
    let gateways: Vec<String> = process
        .nodes()
        .filter(|n| n.is_gateway())
        .map(|n| n.id.clone())
        .collect();
    for gw in gateways {
        if process.in_degree(&gw) > 1 || process.out_degree(&gw) > 1 {
            continue;
        }
        let (source, target) = process.remove_node_with_connecting_flows(&gw)?;
        if let (Some(source), Some(target)) = (source, target) {
            process.add_flow(&source, &target, Some(gw), None)?;
        }
    }
    Ok(())
}

// ─── Adjacency padding (workflow mode) ────────────────────────

/// Inserts a generic placeholder node (future place) between two adjacent
/// nodes that both emit workflow transitions, i.e. gateways and
/// subprocesses. Their operator emission requires place-typed outer faces.
pub fn insert_linking_placeholders(process: &mut Process) -> Result<()> {
    let is_padded = |node: &FlowNode| node.is_gateway() || node.is_subprocess();

    for id in process.node_ids() {
        let Some(node) = process.node(&id) else { continue };
        if !is_padded(node) {
            continue;
        }
        for flow_id in process.outgoing_ids(&id) {
            let flow = process.require_flow(&flow_id)?.clone();
            let target = process.require_node(&flow.target)?;
            if !is_padded(target) {
                continue;
            }
            let linking_id = format!("{}{}", id, flow.target);
            process.remove_flow(&flow_id)?;
            process.add_node(FlowNode::generic(&linking_id));
            process.add_flow(&id, &linking_id, None, None)?;
            process.add_flow(&linking_id, &flow.target, None, None)?;
        }
    }
    Ok(())
}
