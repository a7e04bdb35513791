//! [`BpmnDocument`] → BPMN 2.0 XML.
//!
//! Output is grouped per element type with ids in sorted order, every flow
//! node repeats its flow ids as `<incoming>`/`<outgoing>` children, and a
//! placeholder `bpmndi` diagram is appended (geometry is not preserved, only
//! generated).

use std::fmt::Write;

use super::{BpmnDocument, FlowNode, FlowNodeKind, Process};
use crate::error::{Result, TransformError};

pub fn write_bpmn(doc: &BpmnDocument) -> Result<String> {
    let mut xml = String::new();
    let w = &mut xml;

    push(w, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    push(
        w,
        concat!(
            r#"<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL" "#,
            r#"xmlns:bpmndi="http://www.omg.org/spec/BPMN/20100524/DI" "#,
            r#"xmlns:dc="http://www.omg.org/spec/DD/20100524/DC" "#,
            r#"xmlns:di="http://www.omg.org/spec/DD/20100524/DI" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#
        ),
    );

    if let Some(collab) = &doc.collaboration {
        push(w, &format!(r#"<bpmn:collaboration id="{}">"#, escape(&collab.id)));
        let p = &collab.participant;
        push(
            w,
            &format!(
                r#"<bpmn:participant id="{}"{} processRef="{}" />"#,
                escape(&p.id),
                name_attr(p.name.as_deref()),
                escape(&p.process_ref)
            ),
        );
        push(w, "</bpmn:collaboration>");
    }

    write_process(w, &doc.process, true)?;
    write_diagram(w, &doc.process);
    push(w, "</bpmn:definitions>");
    Ok(xml)
}

fn write_process(w: &mut String, process: &Process, top_level: bool) -> Result<()> {
    if top_level {
        let executable = match process.is_executable {
            Some(true) => r#" isExecutable="true""#,
            Some(false) => r#" isExecutable="false""#,
            None => "",
        };
        push(
            w,
            &format!(
                r#"<bpmn:process id="{}"{}{}>"#,
                escape(&process.id),
                name_attr(process.name.as_deref()),
                executable
            ),
        );
    } else {
        push(
            w,
            &format!(
                r#"<bpmn:subProcess id="{}"{}>"#,
                escape(&process.id),
                name_attr(process.name.as_deref())
            ),
        );
    }

    write_lane_sets(w, process);

    // One group per element type, ids sorted inside each group.
    for tag in [
        "startEvent",
        "endEvent",
        "task",
        "userTask",
        "serviceTask",
        "exclusiveGateway",
        "parallelGateway",
        "inclusiveGateway",
    ] {
        for id in process.node_ids() {
            let node = process.require_node(&id)?;
            if element_tag(node)? != tag {
                continue;
            }
            write_flow_node(w, process, node, tag)?;
        }
    }
    for id in process.node_ids() {
        let node = process.require_node(&id)?;
        if let FlowNodeKind::IntermediateCatchEvent(kind) = node.kind {
            push(
                w,
                &format!(
                    r#"<bpmn:intermediateCatchEvent id="{}"{}>"#,
                    escape(&node.id),
                    name_attr(node.name.as_deref())
                ),
            );
            write_flow_refs(w, process, &node.id);
            match kind {
                super::EventKind::Time => push(w, "<bpmn:timerEventDefinition />"),
                super::EventKind::Message => push(w, "<bpmn:messageEventDefinition />"),
            }
            push(w, "</bpmn:intermediateCatchEvent>");
        }
    }
    for id in process.subprocess_ids() {
        let sub = process
            .subprocess(&id)
            .ok_or_else(|| TransformError::internal(format!("missing subprocess {id}")))?;
        write_process(w, sub, false)?;
    }
    for id in process.flow_ids() {
        let flow = process.require_flow(&id)?;
        push(
            w,
            &format!(
                r#"<bpmn:sequenceFlow id="{}"{} sourceRef="{}" targetRef="{}" />"#,
                escape(&flow.id),
                name_attr(flow.name.as_deref()),
                escape(&flow.source),
                escape(&flow.target)
            ),
        );
    }

    push(w, if top_level { "</bpmn:process>" } else { "</bpmn:subProcess>" });
    Ok(())
}

fn write_flow_node(w: &mut String, process: &Process, node: &FlowNode, tag: &str) -> Result<()> {
    let incoming = process.incoming_ids(&node.id);
    let outgoing = process.outgoing_ids(&node.id);
    if incoming.is_empty() && outgoing.is_empty() {
        push(
            w,
            &format!(r#"<bpmn:{tag} id="{}"{} />"#, escape(&node.id), name_attr(node.name.as_deref())),
        );
        return Ok(());
    }
    push(
        w,
        &format!(r#"<bpmn:{tag} id="{}"{}>"#, escape(&node.id), name_attr(node.name.as_deref())),
    );
    write_flow_refs(w, process, &node.id);
    push(w, &format!("</bpmn:{tag}>"));
    Ok(())
}

fn write_flow_refs(w: &mut String, process: &Process, node_id: &str) {
    for flow_id in process.incoming_ids(node_id) {
        push(w, &format!("<bpmn:incoming>{}</bpmn:incoming>", escape(&flow_id)));
    }
    for flow_id in process.outgoing_ids(node_id) {
        push(w, &format!("<bpmn:outgoing>{}</bpmn:outgoing>", escape(&flow_id)));
    }
}

fn write_lane_sets(w: &mut String, process: &Process) {
    for set in &process.lane_sets {
        push(w, &format!(r#"<bpmn:laneSet id="{}">"#, escape(&set.id)));
        for lane in &set.lanes {
            push(
                w,
                &format!(r#"<bpmn:lane id="{}"{}>"#, escape(&lane.id), name_attr(lane.name.as_deref())),
            );
            for node_ref in &lane.flow_node_refs {
                push(w, &format!("<bpmn:flowNodeRef>{}</bpmn:flowNodeRef>", escape(node_ref)));
            }
            push(w, "</bpmn:lane>");
        }
        push(w, "</bpmn:laneSet>");
    }
}

/// Placeholder geometry: every flow becomes an edge with two zero waypoints,
/// every top-level node a 100×80 shape. Only the outermost process is laid
/// out, matching the WOPED exchange format.
fn write_diagram(w: &mut String, process: &Process) {
    push(w, r#"<bpmndi:BPMNDiagram id="diagram1">"#);
    push(
        w,
        &format!(
            r#"<bpmndi:BPMNPlane id="plane{}" bpmnElement="{}">"#,
            escape(&process.id),
            escape(&process.id)
        ),
    );
    for flow_id in process.flow_ids() {
        push(
            w,
            &format!(
                r#"<bpmndi:BPMNEdge id="{0}_di" bpmnElement="{0}"><di:waypoint x="0.0" y="0.0" /><di:waypoint x="0.0" y="0.0" /></bpmndi:BPMNEdge>"#,
                escape(&flow_id)
            ),
        );
    }
    for id in process.node_ids() {
        let Some(node) = process.node(&id) else { continue };
        let expanded = if node.is_subprocess() { r#" isExpanded="true""# } else { "" };
        let labelled =
            node.name.is_some() && !node.is_subprocess() && !node.is_task_like();
        push(
            w,
            &format!(
                r#"<bpmndi:BPMNShape id="{0}_di" bpmnElement="{0}"{1}>"#,
                escape(&id),
                expanded
            ),
        );
        push(w, r#"<dc:Bounds x="0.0" y="0.0" width="100.0" height="80.0" />"#);
        if labelled {
            push(
                w,
                r#"<bpmndi:BPMNLabel><dc:Bounds x="0.0" y="0.0" width="50.0" height="20.0" /></bpmndi:BPMNLabel>"#,
            );
        }
        push(w, "</bpmndi:BPMNShape>");
    }
    push(w, "</bpmndi:BPMNPlane>");
    push(w, "</bpmndi:BPMNDiagram>");
}

fn element_tag(node: &FlowNode) -> Result<&'static str> {
    Ok(match &node.kind {
        FlowNodeKind::StartEvent => "startEvent",
        FlowNodeKind::EndEvent => "endEvent",
        FlowNodeKind::Task => "task",
        FlowNodeKind::UserTask => "userTask",
        FlowNodeKind::ServiceTask => "serviceTask",
        FlowNodeKind::XorGateway => "exclusiveGateway",
        FlowNodeKind::AndGateway => "parallelGateway",
        FlowNodeKind::OrGateway => "inclusiveGateway",
        FlowNodeKind::IntermediateCatchEvent(_) => "intermediateCatchEvent",
        FlowNodeKind::Subprocess(_) => "subProcess",
        FlowNodeKind::Generic => {
            return Err(TransformError::internal(format!(
                "generic placeholder {} leaked into serialized BPMN",
                node.id
            )))
        }
    })
}

fn name_attr(name: Option<&str>) -> String {
    name.map(|n| format!(r#" name="{}""#, escape(n))).unwrap_or_default()
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn push(w: &mut String, line: &str) {
    let _ = write!(w, "{line}");
}
