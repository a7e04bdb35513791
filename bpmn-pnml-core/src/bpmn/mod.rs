//! BPMN graph model.
//!
//! A [`BpmnDocument`] owns one top-level [`Process`] and optionally a
//! [`Collaboration`]. Every process is an id-keyed arena of [`FlowNode`]s and
//! [`Flow`]s with incoming/outgoing indexes kept consistent by all mutating
//! operations (see the store invariants in the crate docs).

pub mod parse;
pub mod write;

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, TransformError};
use crate::ident;

// ─── Node variants ────────────────────────────────────────────

/// Subtype of an intermediate catch event. Exactly one of the two.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Time,
    Message,
}

/// The BPMN element behind a node. Nested processes live inline in
/// `Subprocess`; `Generic` is the placeholder inserted by preprocessing and
/// maps to a place.
#[derive(Clone, Debug)]
pub enum FlowNodeKind {
    StartEvent,
    EndEvent,
    Task,
    UserTask,
    ServiceTask,
    XorGateway,
    AndGateway,
    OrGateway,
    IntermediateCatchEvent(EventKind),
    Subprocess(Process),
    Generic,
}

impl FlowNodeKind {
    /// Discriminant used by the equality oracle to group nodes per type.
    pub fn type_tag(&self) -> &'static str {
        match self {
            FlowNodeKind::StartEvent => "startEvent",
            FlowNodeKind::EndEvent => "endEvent",
            FlowNodeKind::Task => "task",
            FlowNodeKind::UserTask => "userTask",
            FlowNodeKind::ServiceTask => "serviceTask",
            FlowNodeKind::XorGateway => "exclusiveGateway",
            FlowNodeKind::AndGateway => "parallelGateway",
            FlowNodeKind::OrGateway => "inclusiveGateway",
            FlowNodeKind::IntermediateCatchEvent(EventKind::Time) => "intermediateCatchEvent_time",
            FlowNodeKind::IntermediateCatchEvent(EventKind::Message) => {
                "intermediateCatchEvent_message"
            }
            FlowNodeKind::Subprocess(_) => "subProcess",
            FlowNodeKind::Generic => "generic",
        }
    }
}

/// One BPMN flow node.
#[derive(Clone, Debug)]
pub struct FlowNode {
    pub id: String,
    pub name: Option<String>,
    pub kind: FlowNodeKind,
}

impl FlowNode {
    pub fn new(id: impl Into<String>, kind: FlowNodeKind) -> Self {
        FlowNode { id: id.into(), name: None, kind }
    }

    pub fn named(id: impl Into<String>, name: impl Into<String>, kind: FlowNodeKind) -> Self {
        FlowNode { id: id.into(), name: Some(name.into()), kind }
    }

    pub fn start(id: impl Into<String>) -> Self {
        Self::new(id, FlowNodeKind::StartEvent)
    }

    pub fn end(id: impl Into<String>) -> Self {
        Self::new(id, FlowNodeKind::EndEvent)
    }

    pub fn task(id: impl Into<String>, name: Option<&str>) -> Self {
        FlowNode { id: id.into(), name: name.map(str::to_owned), kind: FlowNodeKind::Task }
    }

    pub fn user_task(id: impl Into<String>, name: Option<&str>) -> Self {
        FlowNode { id: id.into(), name: name.map(str::to_owned), kind: FlowNodeKind::UserTask }
    }

    pub fn service_task(id: impl Into<String>, name: Option<&str>) -> Self {
        FlowNode { id: id.into(), name: name.map(str::to_owned), kind: FlowNodeKind::ServiceTask }
    }

    pub fn xor_gateway(id: impl Into<String>, name: Option<&str>) -> Self {
        FlowNode { id: id.into(), name: name.map(str::to_owned), kind: FlowNodeKind::XorGateway }
    }

    pub fn and_gateway(id: impl Into<String>, name: Option<&str>) -> Self {
        FlowNode { id: id.into(), name: name.map(str::to_owned), kind: FlowNodeKind::AndGateway }
    }

    pub fn or_gateway(id: impl Into<String>, name: Option<&str>) -> Self {
        FlowNode { id: id.into(), name: name.map(str::to_owned), kind: FlowNodeKind::OrGateway }
    }

    pub fn catch_event(id: impl Into<String>, kind: EventKind, name: Option<&str>) -> Self {
        FlowNode {
            id: id.into(),
            name: name.map(str::to_owned),
            kind: FlowNodeKind::IntermediateCatchEvent(kind),
        }
    }

    pub fn generic(id: impl Into<String>) -> Self {
        Self::new(id, FlowNodeKind::Generic)
    }

    /// Wraps a finished process as a subprocess node; node id and name are
    /// taken from the process itself.
    pub fn subprocess(process: Process) -> Self {
        FlowNode {
            id: process.id.clone(),
            name: process.name.clone(),
            kind: FlowNodeKind::Subprocess(process),
        }
    }

    pub fn is_gateway(&self) -> bool {
        matches!(
            self.kind,
            FlowNodeKind::XorGateway | FlowNodeKind::AndGateway | FlowNodeKind::OrGateway
        )
    }

    pub fn is_subprocess(&self) -> bool {
        matches!(self.kind, FlowNodeKind::Subprocess(_))
    }

    pub fn is_task_like(&self) -> bool {
        matches!(
            self.kind,
            FlowNodeKind::Task | FlowNodeKind::UserTask | FlowNodeKind::ServiceTask
        )
    }
}

/// A sequence flow.
#[derive(Clone, Debug)]
pub struct Flow {
    pub id: String,
    pub name: Option<String>,
    pub source: String,
    pub target: String,
}

// ─── Lanes / collaboration ────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub struct Lane {
    pub id: String,
    pub name: Option<String>,
    pub flow_node_refs: BTreeSet<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LaneSet {
    pub id: String,
    pub lanes: Vec<Lane>,
}

#[derive(Clone, Debug)]
pub struct Participant {
    pub id: String,
    pub name: Option<String>,
    pub process_ref: String,
}

#[derive(Clone, Debug)]
pub struct Collaboration {
    pub id: String,
    pub participant: Participant,
}

// ─── Process (the graph store) ────────────────────────────────

/// A BPMN process: the node/flow arena plus its lookup indexes.
#[derive(Clone, Debug, Default)]
pub struct Process {
    pub id: String,
    pub name: Option<String>,
    pub is_executable: Option<bool>,
    pub lane_sets: Vec<LaneSet>,
    /// node id → lane name, derived from the lane sets before transformation.
    pub participant_mapping: BTreeMap<String, String>,

    nodes: BTreeMap<String, FlowNode>,
    flows: BTreeMap<String, Flow>,
    incoming: BTreeMap<String, BTreeSet<String>>,
    outgoing: BTreeMap<String, BTreeSet<String>>,
}

impl Process {
    pub fn new(id: impl Into<String>) -> Self {
        Process { id: id.into(), is_executable: Some(true), ..Default::default() }
    }

    // ─── Lookups ──────────────────────────────────────────────

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut FlowNode> {
        self.nodes.get_mut(id)
    }

    pub fn require_node(&self, id: &str) -> Result<&FlowNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| TransformError::internal(format!("unknown BPMN node {id}")))
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &FlowNode> {
        self.nodes.values()
    }

    /// Snapshot of all node ids, sorted.
    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    pub fn flow(&self, id: &str) -> Option<&Flow> {
        self.flows.get(id)
    }

    pub fn require_flow(&self, id: &str) -> Result<&Flow> {
        self.flows
            .get(id)
            .ok_or_else(|| TransformError::internal(format!("unknown BPMN flow {id}")))
    }

    pub fn flows(&self) -> impl Iterator<Item = &Flow> {
        self.flows.values()
    }

    pub fn flow_ids(&self) -> Vec<String> {
        self.flows.keys().cloned().collect()
    }

    /// Ids of the flows entering `node_id`, sorted.
    pub fn incoming_ids(&self, node_id: &str) -> Vec<String> {
        self.incoming.get(node_id).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    /// Ids of the flows leaving `node_id`, sorted.
    pub fn outgoing_ids(&self, node_id: &str) -> Vec<String> {
        self.outgoing.get(node_id).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn in_degree(&self, node_id: &str) -> usize {
        self.incoming.get(node_id).map_or(0, BTreeSet::len)
    }

    pub fn out_degree(&self, node_id: &str) -> usize {
        self.outgoing.get(node_id).map_or(0, BTreeSet::len)
    }

    /// Target node id of a flow.
    pub fn flow_target(&self, flow_id: &str) -> Result<&str> {
        Ok(self.require_flow(flow_id)?.target.as_str())
    }

    pub fn flow_source(&self, flow_id: &str) -> Result<&str> {
        Ok(self.require_flow(flow_id)?.source.as_str())
    }

    /// Ids of all direct subprocess nodes, sorted.
    pub fn subprocess_ids(&self) -> Vec<String> {
        self.nodes
            .values()
            .filter(|n| n.is_subprocess())
            .map(|n| n.id.clone())
            .collect()
    }

    /// Immutable access to a nested process.
    pub fn subprocess(&self, id: &str) -> Option<&Process> {
        match self.nodes.get(id).map(|n| &n.kind) {
            Some(FlowNodeKind::Subprocess(p)) => Some(p),
            _ => None,
        }
    }

    pub fn subprocess_mut(&mut self, id: &str) -> Option<&mut Process> {
        match self.nodes.get_mut(id).map(|n| &mut n.kind) {
            Some(FlowNodeKind::Subprocess(p)) => Some(p),
            _ => None,
        }
    }

    /// Start events with in-degree 0, sorted by id.
    pub fn source_start_events(&self) -> Vec<String> {
        self.nodes
            .values()
            .filter(|n| matches!(n.kind, FlowNodeKind::StartEvent) && self.in_degree(&n.id) == 0)
            .map(|n| n.id.clone())
            .collect()
    }

    /// End events with out-degree 0, sorted by id.
    pub fn sink_end_events(&self) -> Vec<String> {
        self.nodes
            .values()
            .filter(|n| matches!(n.kind, FlowNodeKind::EndEvent) && self.out_degree(&n.id) == 0)
            .map(|n| n.id.clone())
            .collect()
    }

    // ─── Mutation ─────────────────────────────────────────────

    /// Adds a node. Adding an id that already exists is a no-op.
    pub fn add_node(&mut self, node: FlowNode) -> &mut Self {
        self.nodes.entry(node.id.clone()).or_insert(node);
        self
    }

    /// Removes a node and detaches every flow touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<FlowNode> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| TransformError::internal(format!("cannot remove missing node {id}")))?;
        let touching: Vec<String> = self
            .flows
            .values()
            .filter(|f| f.source == id || f.target == id)
            .map(|f| f.id.clone())
            .collect();
        for flow_id in touching {
            self.remove_flow(&flow_id)?;
        }
        self.incoming.remove(id);
        self.outgoing.remove(id);
        Ok(node)
    }

    /// Adds a flow between two existing nodes. The id defaults to
    /// `{source}TO{target}`; an already-used flow id is an error.
    pub fn add_flow(
        &mut self,
        source: &str,
        target: &str,
        id: Option<String>,
        name: Option<String>,
    ) -> Result<String> {
        let id = id.unwrap_or_else(|| ident::arc_id(source, target));
        if self.flows.contains_key(&id) {
            return Err(TransformError::internal(format!("flow with the id {id} already exists")));
        }
        if !self.nodes.contains_key(source) {
            return Err(TransformError::internal(format!("flow {id}: unknown source {source}")));
        }
        if !self.nodes.contains_key(target) {
            return Err(TransformError::internal(format!("flow {id}: unknown target {target}")));
        }
        self.incoming.entry(target.to_owned()).or_default().insert(id.clone());
        self.outgoing.entry(source.to_owned()).or_default().insert(id.clone());
        self.flows.insert(
            id.clone(),
            Flow { id: id.clone(), name, source: source.to_owned(), target: target.to_owned() },
        );
        Ok(id)
    }

    pub fn remove_flow(&mut self, id: &str) -> Result<Flow> {
        let flow = self
            .flows
            .remove(id)
            .ok_or_else(|| TransformError::internal(format!("cannot remove missing flow {id}")))?;
        if let Some(set) = self.incoming.get_mut(&flow.target) {
            set.remove(id);
        }
        if let Some(set) = self.outgoing.get_mut(&flow.source) {
            set.remove(id);
        }
        Ok(flow)
    }

    /// Re-keys a node, preserving every incident flow's id, name and
    /// orientation.
    pub fn change_node_id(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        let incident: Vec<Flow> = self
            .flows
            .values()
            .filter(|f| f.source == old || f.target == old)
            .cloned()
            .collect();
        let mut node = self.remove_node(old)?;
        node.id = new.to_owned();
        if let FlowNodeKind::Subprocess(p) = &mut node.kind {
            p.id = new.to_owned();
        }
        self.add_node(node);
        for flow in incident {
            let source = if flow.source == old { new } else { &flow.source };
            let target = if flow.target == old { new } else { &flow.target };
            self.add_flow(source, target, Some(flow.id), flow.name)?;
        }
        Ok(())
    }

    /// Consumes the process, yielding its nodes and flows. Used when a
    /// subprocess is inlined into its parent.
    pub fn into_parts(self) -> (Vec<FlowNode>, Vec<Flow>) {
        (self.nodes.into_values().collect(), self.flows.into_values().collect())
    }

    /// Removes a node together with its (at most one) incoming and outgoing
    /// flow, returning the detached neighbor ids so the caller can fuse them.
    pub fn remove_node_with_connecting_flows(
        &mut self,
        id: &str,
    ) -> Result<(Option<String>, Option<String>)> {
        let source = match self.incoming_ids(id).first() {
            Some(flow_id) => Some(self.remove_flow(flow_id)?.source),
            None => None,
        };
        let target = match self.outgoing_ids(id).first() {
            Some(flow_id) => Some(self.remove_flow(flow_id)?.target),
            None => None,
        };
        self.remove_node(id)?;
        Ok((source, target))
    }
}

// ─── Document ─────────────────────────────────────────────────

/// A parsed BPMN definitions document.
#[derive(Clone, Debug)]
pub struct BpmnDocument {
    pub process: Process,
    pub collaboration: Option<Collaboration>,
}

impl BpmnDocument {
    pub fn new(process_id: impl Into<String>) -> Self {
        BpmnDocument { process: Process::new(process_id), collaboration: None }
    }
}
