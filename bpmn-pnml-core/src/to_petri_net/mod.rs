//! BPMN → Petri-net pipeline.
//!
//! [`bpmn_to_st_net`] flattens subprocesses and emits a plain ST net;
//! [`bpmn_to_workflow_net`] keeps the hierarchy and emits WOPED workflow
//! operators, triggers, resources and subprocess pages.

pub mod participants;
pub mod preprocess;
pub mod workflow;

use tracing::debug;

use crate::bpmn::{BpmnDocument, EventKind, FlowNodeKind, Process};
use crate::error::{Result, TransformError};
use crate::pnml::{Net, NetElement, PnmlDocument};

/// Standard ST-net flavor: subprocesses are inlined, gateways become plain
/// places/transitions, no tool-specific annotations are produced.
pub fn bpmn_to_st_net(mut doc: BpmnDocument) -> Result<PnmlDocument> {
    debug!(process = %doc.process.id, "bpmn-to-st-net");
    preprocess::flatten_subprocesses(&mut doc.process)?;
    preprocess::apply_preprocessing(&mut doc.process, &[preprocess::replace_inclusive_gateways])?;
    let net = transform_process(doc.process, None)?;
    Ok(PnmlDocument { net })
}

/// WOPED workflow-net flavor.
pub fn bpmn_to_workflow_net(mut doc: BpmnDocument) -> Result<PnmlDocument> {
    debug!(process = %doc.process.id, "bpmn-to-workflow-net");
    preprocess::apply_preprocessing(
        &mut doc.process,
        &[
            preprocess::replace_inclusive_gateways,
            preprocess::reduce_unnecessary_gateways,
            preprocess::insert_linking_placeholders,
        ],
    )?;
    participants::create_participant_mapping(&mut doc.process)?;

    let organization = doc
        .collaboration
        .as_ref()
        .and_then(|c| c.participant.name.clone());
    let ctx = WorkflowCtx { organization: organization.clone() };
    let mapping = doc.process.participant_mapping.clone();
    let mut net = transform_process(doc.process, Some(&ctx))?;
    participants::set_global_toolspecific(&mut net, &mapping, organization.as_deref());
    Ok(PnmlDocument { net })
}

/// Context threaded through the workflow transform (also into subprocess
/// pages).
pub(crate) struct WorkflowCtx {
    organization: Option<String>,
}

/// Single-pass mapping of one (sub)process, guided by node type, degrees and
/// the workflow context.
fn transform_process(mut bpmn: Process, ctx: Option<&WorkflowCtx>) -> Result<Net> {
    let mut net = Net::default();
    net.id = Some(bpmn.id.clone());

    let mut gateways: Vec<String> = Vec::new();
    let mut subprocesses: Vec<String> = Vec::new();

    // normal nodes (and, in workflow mode, triggers) first
    for id in bpmn.node_ids() {
        let node = bpmn.require_node(&id)?;
        let name = node.name.clone().filter(|n| !n.is_empty());
        match (&node.kind, ctx) {
            (FlowNodeKind::Subprocess(_), Some(_)) => subprocesses.push(id),
            (FlowNodeKind::Subprocess(_), None) => {
                return Err(TransformError::internal(format!(
                    "subprocess {id} survived flattening"
                )))
            }
            (FlowNodeKind::XorGateway, Some(_)) | (FlowNodeKind::AndGateway, Some(_)) => {
                gateways.push(id)
            }
            (FlowNodeKind::Task, _)
            | (FlowNodeKind::UserTask, _)
            | (FlowNodeKind::ServiceTask, _) => {
                let mut transition = NetElement::transition(&id, name.as_deref());
                if let (FlowNodeKind::UserTask, Some(ctx)) = (&node.kind, ctx) {
                    if let (Some(lane), Some(org)) =
                        (bpmn.participant_mapping.get(&id), ctx.organization.as_deref())
                    {
                        transition = transition.mark_as_workflow_resource(lane, org);
                    }
                }
                net.add_element(transition);
            }
            (FlowNodeKind::AndGateway, None) => {
                net.add_element(NetElement::transition(&id, name.as_deref()));
            }
            (FlowNodeKind::IntermediateCatchEvent(kind), Some(_)) => {
                let transition = NetElement::transition(&id, name.as_deref());
                net.add_element(match kind {
                    EventKind::Time => transition.mark_as_workflow_time(),
                    EventKind::Message => transition.mark_as_workflow_message(),
                });
            }
            (FlowNodeKind::IntermediateCatchEvent(_), None) => {
                net.add_element(NetElement::transition(&id, name.as_deref()));
            }
            (FlowNodeKind::XorGateway, None)
            | (FlowNodeKind::OrGateway, _)
            | (FlowNodeKind::StartEvent, _)
            | (FlowNodeKind::EndEvent, _)
            | (FlowNodeKind::Generic, _) => {
                net.add_element(NetElement::place(&id));
            }
        }
    }

    // workflow-specific nodes: subprocesses (pages), then gateway operators
    if let Some(ctx) = ctx {
        for sb_id in &subprocesses {
            workflow::handle_subprocess(&bpmn, &mut net, sb_id, &mut |inner| {
                transform_process(inner, Some(ctx))
            })?;
        }
        for gw_id in &gateways {
            workflow::handle_gateway(&mut bpmn, &mut net, gw_id)?;
        }
    }

    // remaining flows become arcs, mediated when endpoints share a kind
    for flow_id in bpmn.flow_ids() {
        let flow = bpmn.require_flow(&flow_id)?;
        if !net.contains_element(&flow.source) || !net.contains_element(&flow.target) {
            continue;
        }
        let (source, target) = (flow.source.clone(), flow.target.clone());
        net.add_arc_handle_same_type(&source, &target)?;
    }

    Ok(net)
}
