//! Petri-net → BPMN pipeline.

pub mod operators;
pub mod preprocess;

use std::collections::BTreeMap;

use tracing::debug;

use crate::bpmn::{BpmnDocument, Collaboration, EventKind, FlowNode, FlowNodeKind, Lane, LaneSet, Participant, Process};
use crate::error::{Result, TransformError};
use crate::ident;
use crate::pnml::{ElementKind, Net, PnmlDocument};

pub const UNKNOWN_LANE: &str = "Unknown participant";

pub fn pnml_to_bpmn(mut doc: PnmlDocument) -> Result<BpmnDocument> {
    debug!(net = ?doc.net.id, "pnml-to-bpmn");
    preprocess_net(&mut doc.net)?;
    let mut bpmn = transform_net(&doc.net)?;
    annotate_resources(&doc.net, &mut bpmn)?;
    Ok(bpmn)
}

/// Runs the preprocessing stack on every page first, then on the net itself.
fn preprocess_net(net: &mut Net) -> Result<()> {
    for page_id in net.page_ids() {
        let page = net
            .page_mut(&page_id)
            .ok_or_else(|| TransformError::internal(format!("missing page {page_id}")))?;
        preprocess_net(page)?;
    }
    preprocess::cap_dangling_transitions(net)?;
    operators::expand_operators(net)?;
    preprocess::split_named_and_transitions(net)?;
    preprocess::split_event_triggers(net)?;
    Ok(())
}

/// Single-pass mapping of one net (and, recursively, its pages) to a BPMN
/// process, followed by the silent-residue postprocess.
fn transform_net(net: &Net) -> Result<BpmnDocument> {
    let process_id = net.id.clone().unwrap_or_else(|| "new_net".to_owned());
    let mut doc = BpmnDocument::new(process_id);
    let process = &mut doc.process;

    let mut subprocess_transitions: Vec<String> = Vec::new();

    for id in net.element_ids() {
        let element = net.require_element(&id)?;
        if element.is_workflow_subprocess() {
            subprocess_transitions.push(id);
            continue;
        }
        let in_degree = net.in_degree(&id);
        let out_degree = net.out_degree(&id);
        let name = element.name.as_deref();
        let node = match element.kind {
            ElementKind::Place => {
                if in_degree == 0 {
                    FlowNode::start(&id)
                } else if out_degree == 0 {
                    FlowNode::end(&id)
                } else {
                    FlowNode::xor_gateway(&id, None)
                }
            }
            ElementKind::Transition => {
                if in_degree == 0 {
                    FlowNode::start(&id)
                } else if out_degree == 0 {
                    FlowNode::end(&id)
                } else if in_degree == 1 && out_degree == 1 {
                    if element.is_workflow_resource() {
                        FlowNode::user_task(&id, name)
                    } else {
                        FlowNode::task(&id, name)
                    }
                } else {
                    FlowNode::and_gateway(&id, name)
                }
            }
            ElementKind::XorHelper => FlowNode::xor_gateway(&id, name),
            ElementKind::AndHelper => FlowNode::and_gateway(&id, name),
            ElementKind::TimeHelper => FlowNode::catch_event(&id, EventKind::Time, None),
            ElementKind::MessageHelper => FlowNode::catch_event(&id, EventKind::Message, None),
        };
        process.add_node(node);
    }

    for sb_id in subprocess_transitions {
        lift_subprocess(net, process, &sb_id)?;
    }

    for arc_id in net.arc_ids() {
        let arc = net
            .arc(&arc_id)
            .ok_or_else(|| TransformError::internal(format!("missing arc {arc_id}")))?;
        if !process.contains_node(&arc.source) || !process.contains_node(&arc.target) {
            continue;
        }
        let (source, target) = (arc.source.clone(), arc.target.clone());
        process.add_flow(&source, &target, None, None)?;
    }

    remove_silent_tasks(process)?;
    remove_unnecessary_gateways(process)?;
    Ok(doc)
}

/// Lifts a subprocess-marked transition: fetches its page, verifies the
/// inner source/sink, and embeds the recursively transformed page as a
/// nested process.
fn lift_subprocess(net: &Net, process: &mut Process, sb_id: &str) -> Result<()> {
    let page = net
        .page(sb_id)
        .ok_or_else(|| TransformError::internal(format!("subprocess {sb_id} has no page")))?;

    let incoming = net.incoming_ids(sb_id);
    let outgoing = net.outgoing_ids(sb_id);
    let outer_source = incoming
        .first()
        .and_then(|id| net.arc(id))
        .map(|a| a.source.clone())
        .ok_or(TransformError::WrongSubprocessDegree)?;
    let outer_sink = outgoing
        .first()
        .and_then(|id| net.arc(id))
        .map(|a| a.target.clone())
        .ok_or(TransformError::WrongSubprocessDegree)?;

    // the page mirrors the outer neighbor ids as its own source/sink places
    if !page.contains_element(&outer_source) || !page.contains_element(&outer_sink) {
        return Err(TransformError::SubprocessWrongInnerSourceSinkDegree);
    }
    if page.in_degree(&outer_source) > 0 || page.out_degree(&outer_sink) > 0 {
        return Err(TransformError::SubprocessWrongInnerSourceSinkDegree);
    }

    let mut inner = transform_net(page)?.process;
    inner.id = sb_id.to_owned();
    inner.name = net.require_element(sb_id)?.name.clone();
    inner.is_executable = None;
    process.add_node(FlowNode::subprocess(inner));
    Ok(())
}

// ─── Postprocess ──────────────────────────────────────────────

/// Removes every unnamed task, fusing its unique neighbors.
fn remove_silent_tasks(process: &mut Process) -> Result<()> {
    let silent: Vec<String> = process
        .nodes()
        .filter(|n| matches!(n.kind, FlowNodeKind::Task) && n.name.is_none())
        .map(|n| n.id.clone())
        .collect();
    for id in silent {
        let (source, target) = process.remove_node_with_connecting_flows(&id)?;
        if let (Some(source), Some(target)) = (source, target) {
            if process.flow(&ident::arc_id(&source, &target)).is_none() {
                process.add_flow(&source, &target, None, None)?;
            }
        }
    }
    Ok(())
}

/// Iteratively removes gateways with in-degree 1 and out-degree 1, unless
/// the reconnection would collide with an existing flow id.
fn remove_unnecessary_gateways(process: &mut Process) -> Result<()> {
    loop {
        let mut changed = false;
        let gateways: Vec<String> = process
            .nodes()
            .filter(|n| n.is_gateway())
            .map(|n| n.id.clone())
            .collect();
        for id in gateways {
            if process.in_degree(&id) != 1 || process.out_degree(&id) != 1 {
                continue;
            }
            let source = process.flow_source(&process.incoming_ids(&id)[0])?.to_owned();
            let target = process.flow_target(&process.outgoing_ids(&id)[0])?.to_owned();
            if process.flow(&ident::arc_id(&source, &target)).is_some() {
                continue;
            }
            process.remove_node_with_connecting_flows(&id)?;
            process.add_flow(&source, &target, None, None)?;
            changed = true;
        }
        if !changed {
            return Ok(());
        }
    }
}

// ─── Resource annotation ──────────────────────────────────────

/// Collects resource-marked transitions into lanes, emits the collaboration
/// with the single organizational unit, and drops every unannotated node
/// into the synthetic catch-all lane.
fn annotate_resources(net: &Net, doc: &mut BpmnDocument) -> Result<()> {
    let mut organization: Option<String> = None;
    let mut role_map: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for id in net.element_ids() {
        let element = net.require_element(&id)?;
        let Some(resource) =
            element.tool.as_ref().and_then(|t| t.transition_resource.as_ref())
        else {
            continue;
        };
        match &organization {
            Some(existing) if *existing != resource.organizational_unit_name => {
                return Err(TransformError::UnknownResourceOrganizationMapping)
            }
            Some(_) => {}
            None => organization = Some(resource.organizational_unit_name.clone()),
        }
        role_map.entry(resource.role_name.clone()).or_default().push(id);
    }

    for page_id in net.page_ids() {
        let page = net
            .page(&page_id)
            .ok_or_else(|| TransformError::internal(format!("missing page {page_id}")))?;
        if let Some(role) = subprocess_role(page, &mut organization)? {
            role_map.entry(role).or_default().push(page_id);
        }
    }

    if role_map.is_empty() {
        return Ok(());
    }

    let handled: std::collections::BTreeSet<&String> = role_map.values().flatten().collect();
    let unhandled: Vec<String> = doc
        .process
        .node_ids()
        .into_iter()
        .filter(|id| !handled.contains(id))
        .collect();
    if !unhandled.is_empty() {
        role_map.insert(UNKNOWN_LANE.to_owned(), unhandled);
    }

    let lanes = role_map
        .into_iter()
        .map(|(role, refs)| Lane {
            id: role.clone(),
            name: Some(role),
            flow_node_refs: refs.into_iter().collect(),
        })
        .collect();
    doc.process.lane_sets = vec![LaneSet { id: "ls".to_owned(), lanes }];
    doc.collaboration = Some(Collaboration {
        id: "collaboration".to_owned(),
        participant: Participant {
            id: "participant".to_owned(),
            name: organization,
            process_ref: doc.process.id.clone(),
        },
    });
    Ok(())
}

/// The unique role used inside a page (and its nested pages). More than one
/// role, or a diverging organizational unit, is a mapping error.
fn subprocess_role(net: &Net, organization: &mut Option<String>) -> Result<Option<String>> {
    let mut role: Option<String> = None;
    for id in net.element_ids() {
        let element = net.require_element(&id)?;
        let Some(resource) =
            element.tool.as_ref().and_then(|t| t.transition_resource.as_ref())
        else {
            continue;
        };
        if role.as_deref().is_some_and(|r| r != resource.role_name) {
            return Err(TransformError::UnknownResourceOrganizationMapping);
        }
        role = Some(resource.role_name.clone());
        match organization {
            Some(existing) if *existing != resource.organizational_unit_name => {
                return Err(TransformError::UnknownResourceOrganizationMapping)
            }
            Some(_) => {}
            None => *organization = Some(resource.organizational_unit_name.clone()),
        }
    }
    for page_id in net.page_ids() {
        let page = net
            .page(&page_id)
            .ok_or_else(|| TransformError::internal(format!("missing page {page_id}")))?;
        if let Some(nested) = subprocess_role(page, organization)? {
            if role.as_deref().is_some_and(|r| r != nested) {
                return Err(TransformError::UnknownResourceOrganizationMapping);
            }
            role = Some(nested);
        }
    }
    Ok(role)
}
