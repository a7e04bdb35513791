//! BPMN 2.0 XML → [`BpmnDocument`].
//!
//! Accepts both prefixed (`bpmn:startEvent`) and default-namespace
//! (`startEvent`) forms. Documents containing a tag from the unsupported set
//! are rejected as a whole; the tags in the ignored set are skipped.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::{BpmnDocument, Collaboration, EventKind, FlowNode, Lane, LaneSet, Participant, Process};
use crate::error::{Result, TransformError};

/// Tags whose presence anywhere in the document aborts the transformation.
const UNSUPPORTED_TAGS: &[&str] = &[
    "complexgateway",
    "eventbasedgateway",
    "sendtask",
    "receivetask",
    "manualtask",
    "businessruletask",
    "scripttask",
    "callactivity",
    "intermediatethrowevent",
    "boundaryevent",
    "extensionelements",
];

pub fn parse_bpmn(xml: &str) -> Result<BpmnDocument> {
    reject_unsupported_tags(xml)?;

    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    // Stack of open (sub)processes; index 0 is the top-level process.
    let mut stack: Vec<ProcessFrame> = Vec::new();
    let mut document: Option<BpmnDocument> = None;
    let mut collaboration: Option<Collaboration> = None;

    // Open intermediateCatchEvent waiting for its event definition child.
    let mut pending_catch: Option<(String, Option<String>, Option<EventKind>)> = None;
    // Open lane collecting flowNodeRef children.
    let mut pending_lane: Option<Lane> = None;
    let mut pending_lane_set: Option<LaneSet> = None;
    let mut in_flow_node_ref = false;
    // Open collaboration id, until its participant arrives.
    let mut open_collaboration: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => handle_open(
                e,
                false,
                &mut stack,
                &mut pending_catch,
                &mut pending_lane,
                &mut pending_lane_set,
                &mut in_flow_node_ref,
                &mut open_collaboration,
                &mut collaboration,
            )?,
            Ok(Event::Empty(ref e)) => handle_open(
                e,
                true,
                &mut stack,
                &mut pending_catch,
                &mut pending_lane,
                &mut pending_lane_set,
                &mut in_flow_node_ref,
                &mut open_collaboration,
                &mut collaboration,
            )?,
            Ok(Event::End(ref e)) => {
                let tag = local_name(e.name().as_ref());
                match tag.as_str() {
                    "process" | "subprocess" => {
                        let frame = stack
                            .pop()
                            .ok_or(TransformError::InvalidInputXml)?;
                        let process = frame.finish()?;
                        if let Some(parent) = stack.last_mut() {
                            parent.process.add_node(FlowNode::subprocess(process));
                        } else {
                            document =
                                Some(BpmnDocument { process, collaboration: None });
                        }
                    }
                    "intermediatecatchevent" => {
                        let (id, name, kind) =
                            pending_catch.take().ok_or(TransformError::InvalidInputXml)?;
                        let kind = kind.ok_or(TransformError::UnknownIntermediateCatchEvent)?;
                        let frame =
                            stack.last_mut().ok_or(TransformError::InvalidInputXml)?;
                        frame
                            .process
                            .add_node(FlowNode::catch_event(id, kind, name.as_deref()));
                    }
                    "lane" => {
                        if let (Some(lane), Some(set)) =
                            (pending_lane.take(), pending_lane_set.as_mut())
                        {
                            set.lanes.push(lane);
                        }
                    }
                    "laneset" => {
                        if let (Some(set), Some(frame)) =
                            (pending_lane_set.take(), stack.last_mut())
                        {
                            frame.process.lane_sets.push(set);
                        }
                    }
                    "flownoderef" => in_flow_node_ref = false,
                    "collaboration" => open_collaboration = None,
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_flow_node_ref {
                    if let (Ok(text), Some(lane)) = (e.unescape(), pending_lane.as_mut()) {
                        let text = text.trim();
                        if !text.is_empty() {
                            lane.flow_node_refs.insert(text.to_owned());
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return Err(TransformError::InvalidInputXml),
            _ => {}
        }
        buf.clear();
    }

    let mut document = document.ok_or(TransformError::InvalidInputXml)?;
    document.collaboration = collaboration;
    Ok(document)
}

// ─── Frames ───────────────────────────────────────────────────

struct RawFlow {
    id: String,
    name: Option<String>,
    source: String,
    target: String,
}

struct ProcessFrame {
    process: Process,
    flows: Vec<RawFlow>,
}

impl ProcessFrame {
    fn new(process: Process) -> Self {
        ProcessFrame { process, flows: Vec::new() }
    }

    /// Flows are applied once every node of the level is known.
    fn finish(mut self) -> Result<Process> {
        for flow in self.flows {
            if !self.process.contains_node(&flow.source)
                || !self.process.contains_node(&flow.target)
            {
                return Err(TransformError::InvalidInputXml);
            }
            self.process
                .add_flow(&flow.source, &flow.target, Some(flow.id), flow.name)
                .map_err(|_| TransformError::InvalidInputXml)?;
        }
        Ok(self.process)
    }
}

// ─── Tag handling ─────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn handle_open(
    e: &BytesStart,
    is_empty: bool, // self-closing tags never receive an End event
    stack: &mut Vec<ProcessFrame>,
    pending_catch: &mut Option<(String, Option<String>, Option<EventKind>)>,
    pending_lane: &mut Option<Lane>,
    pending_lane_set: &mut Option<LaneSet>,
    in_flow_node_ref: &mut bool,
    open_collaboration: &mut Option<String>,
    collaboration: &mut Option<Collaboration>,
) -> Result<()> {
    let tag = local_name(e.name().as_ref());
    match tag.as_str() {
        "process" if is_empty => return Err(TransformError::InvalidInputXml),
        "process" => {
            let mut process = Process::new(require_attr(e, "id")?);
            process.name = attr(e, "name");
            process.is_executable = attr(e, "isExecutable").map(|v| v == "true");
            stack.push(ProcessFrame::new(process));
        }
        // a self-closing subprocess has no inner start/end and cannot be
        // transformed
        "subprocess" if is_empty => return Err(TransformError::WrongSubprocessDegree),
        "subprocess" => {
            let mut process = Process::new(require_attr(e, "id")?);
            process.name = attr(e, "name");
            process.is_executable = None;
            stack.push(ProcessFrame::new(process));
        }
        "startevent" | "endevent" | "task" | "usertask" | "servicetask" | "exclusivegateway"
        | "parallelgateway" | "inclusivegateway" => {
            let id = require_attr(e, "id")?;
            let name = attr(e, "name");
            let node = match tag.as_str() {
                "startevent" => FlowNode::start(id),
                "endevent" => FlowNode::end(id),
                "task" => FlowNode::task(id, name.as_deref()),
                "usertask" => FlowNode::user_task(id, name.as_deref()),
                "servicetask" => FlowNode::service_task(id, name.as_deref()),
                "exclusivegateway" => FlowNode::xor_gateway(id, name.as_deref()),
                "parallelgateway" => FlowNode::and_gateway(id, name.as_deref()),
                _ => FlowNode::or_gateway(id, name.as_deref()),
            };
            let frame = stack.last_mut().ok_or(TransformError::InvalidInputXml)?;
            frame.process.add_node(node);
        }
        "intermediatecatchevent" if is_empty => {
            return Err(TransformError::UnknownIntermediateCatchEvent)
        }
        "intermediatecatchevent" => {
            *pending_catch = Some((require_attr(e, "id")?, attr(e, "name"), None));
        }
        "timereventdefinition" => {
            if let Some((_, _, kind)) = pending_catch.as_mut() {
                *kind = Some(EventKind::Time);
            }
        }
        "messageeventdefinition" => {
            if let Some((_, _, kind)) = pending_catch.as_mut() {
                *kind = Some(EventKind::Message);
            }
        }
        "sequenceflow" => {
            let frame = stack.last_mut().ok_or(TransformError::InvalidInputXml)?;
            frame.flows.push(RawFlow {
                id: require_attr(e, "id")?,
                name: attr(e, "name"),
                source: require_attr(e, "sourceRef")?,
                target: require_attr(e, "targetRef")?,
            });
        }
        "laneset" => {
            let set =
                LaneSet { id: attr(e, "id").unwrap_or_else(|| "ls".into()), lanes: Vec::new() };
            if is_empty {
                if let Some(frame) = stack.last_mut() {
                    frame.process.lane_sets.push(set);
                }
            } else {
                *pending_lane_set = Some(set);
            }
        }
        "lane" => {
            let lane = Lane {
                id: attr(e, "id").unwrap_or_default(),
                name: attr(e, "name"),
                flow_node_refs: Default::default(),
            };
            if is_empty {
                if let Some(set) = pending_lane_set.as_mut() {
                    set.lanes.push(lane);
                }
            } else {
                *pending_lane = Some(lane);
            }
        }
        "flownoderef" if !is_empty => *in_flow_node_ref = true,
        "collaboration" if !is_empty => {
            *open_collaboration = Some(attr(e, "id").unwrap_or_else(|| "collaboration".into()));
        }
        "participant" => {
            if let Some(collab_id) = open_collaboration.as_ref() {
                *collaboration = Some(Collaboration {
                    id: collab_id.clone(),
                    participant: Participant {
                        id: attr(e, "id").unwrap_or_else(|| "participant".into()),
                        name: attr(e, "name"),
                        process_ref: attr(e, "processRef").unwrap_or_default(),
                    },
                });
            }
        }
        // incoming/outgoing children are recomputed from the sequence flows;
        // data objects, categories, annotations and all diagram elements are
        // ignored.
        _ => {}
    }
    Ok(())
}

/// Collects every tag of the document and rejects it when one of them is in
/// the unsupported set.
fn reject_unsupported_tags(xml: &str) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut offending: Vec<String> = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let tag = local_name(e.name().as_ref());
                if UNSUPPORTED_TAGS.contains(&tag.as_str()) && !offending.contains(&tag) {
                    offending.push(tag);
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return Err(TransformError::InvalidInputXml),
            _ => {}
        }
        buf.clear();
    }
    if offending.is_empty() {
        Ok(())
    } else {
        offending.sort();
        Err(TransformError::NotSupportedBpmnElement(offending.join(", ")))
    }
}

// ─── Small helpers ────────────────────────────────────────────

fn local_name(qname: &[u8]) -> String {
    let name = match qname.iter().rposition(|&b| b == b':') {
        Some(pos) => &qname[pos + 1..],
        None => qname,
    };
    String::from_utf8_lossy(name).to_lowercase()
}

fn attr(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.as_ref() == name.as_bytes() {
            a.unescape_value().ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

fn require_attr(e: &BytesStart, name: &str) -> Result<String> {
    attr(e, name).ok_or(TransformError::InvalidInputXml)
}
