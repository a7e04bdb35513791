//! Petri-net (PNML, WOPED dialect) graph model.
//!
//! A [`PnmlDocument`] owns a root [`Net`]; nested pages hold the nets of
//! workflow subprocesses. Places, transitions and the transient helper nodes
//! share the [`NetElement`] arena; arcs live in their own id-keyed map with
//! incoming/outgoing indexes maintained by every mutation.

pub mod parse;
pub mod write;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{Result, TransformError};
use crate::ident;

pub const WOPED: &str = "WoPeD";

// ─── Toolspecific annotations ─────────────────────────────────

/// WOPED workflow operator branching types with their wire codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BranchingType {
    AndSplit,
    AndJoin,
    XorSplit,
    XorJoin,
    XorJoinSplit,
    AndJoinSplit,
    AndJoinXorSplit,
    XorJoinAndSplit,
}

impl BranchingType {
    pub fn code(self) -> u16 {
        match self {
            BranchingType::AndSplit => 101,
            BranchingType::AndJoin => 102,
            BranchingType::XorSplit => 104,
            BranchingType::XorJoin => 105,
            BranchingType::XorJoinSplit => 106,
            BranchingType::AndJoinSplit => 107,
            BranchingType::AndJoinXorSplit => 108,
            BranchingType::XorJoinAndSplit => 109,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            101 => BranchingType::AndSplit,
            102 => BranchingType::AndJoin,
            104 => BranchingType::XorSplit,
            105 => BranchingType::XorJoin,
            106 => BranchingType::XorJoinSplit,
            107 => BranchingType::AndJoinSplit,
            108 => BranchingType::AndJoinXorSplit,
            109 => BranchingType::XorJoinAndSplit,
            _ => return None,
        })
    }
}

/// A workflow operator annotation: all nodes sharing the same operator id
/// form one logical gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operator {
    pub id: String,
    pub kind: BranchingType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerKind {
    Resource,
    Message,
    Time,
}

impl TriggerKind {
    pub fn code(self) -> u16 {
        match self {
            TriggerKind::Resource => 200,
            TriggerKind::Message => 201,
            TriggerKind::Time => 202,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            200 => TriggerKind::Resource,
            201 => TriggerKind::Message,
            202 => TriggerKind::Time,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trigger {
    pub id: String,
    pub kind: TriggerKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionResource {
    pub role_name: String,
    pub organizational_unit_name: String,
}

/// The WOPED `toolspecific` block of a place, transition or arc.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Toolspecific {
    pub time: Option<String>,
    pub time_unit: Option<String>,
    pub orientation: Option<String>,
    pub operator: Option<Operator>,
    pub trigger: Option<Trigger>,
    pub transition_resource: Option<TransitionResource>,
    pub subprocess: bool,
}

impl Toolspecific {
    pub fn is_empty(&self) -> bool {
        *self == Toolspecific::default()
    }
}

/// Stable rendering used by the equality oracle; `None` fields are skipped.
impl fmt::Display for Toolspecific {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if let Some(t) = &self.time {
            parts.push(format!("time={t}"));
        }
        if let Some(t) = &self.time_unit {
            parts.push(format!("timeUnit={t}"));
        }
        if let Some(o) = &self.orientation {
            parts.push(format!("orientation={o}"));
        }
        if let Some(op) = &self.operator {
            parts.push(format!("operator={}:{}", op.kind.code(), op.id));
        }
        if let Some(t) = &self.trigger {
            parts.push(format!("trigger={}:{}", t.kind.code(), t.id));
        }
        if let Some(r) = &self.transition_resource {
            parts.push(format!("resource={}/{}", r.role_name, r.organizational_unit_name));
        }
        if self.subprocess {
            parts.push("subprocess".to_owned());
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// The root net's global resources block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlobalResources {
    pub roles: Vec<String>,
    pub units: Vec<String>,
}

// ─── Elements ─────────────────────────────────────────────────

/// Kind of a net element. The four helper kinds exist only between
/// preprocessing and the transform pass; serializing them is an internal
/// error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Place,
    Transition,
    XorHelper,
    AndHelper,
    TimeHelper,
    MessageHelper,
}

impl ElementKind {
    pub fn is_helper(self) -> bool {
        !matches!(self, ElementKind::Place | ElementKind::Transition)
    }
}

/// A place, transition or transient helper node.
#[derive(Clone, Debug)]
pub struct NetElement {
    pub id: String,
    pub name: Option<String>,
    pub kind: ElementKind,
    pub tool: Option<Toolspecific>,
}

impl NetElement {
    pub fn place(id: impl Into<String>) -> Self {
        NetElement { id: id.into(), name: None, kind: ElementKind::Place, tool: None }
    }

    pub fn transition(id: impl Into<String>, name: Option<&str>) -> Self {
        NetElement {
            id: id.into(),
            name: name.map(str::to_owned),
            kind: ElementKind::Transition,
            tool: None,
        }
    }

    pub fn helper(id: impl Into<String>, kind: ElementKind, name: Option<&str>) -> Self {
        NetElement { id: id.into(), name: name.map(str::to_owned), kind, tool: None }
    }

    fn tool_mut(&mut self) -> &mut Toolspecific {
        self.tool.get_or_insert_with(Toolspecific::default)
    }

    pub fn mark_as_workflow_operator(mut self, kind: BranchingType, id: &str) -> Self {
        self.tool_mut().operator = Some(Operator { id: id.to_owned(), kind });
        self
    }

    pub fn mark_as_workflow_subprocess(mut self) -> Self {
        self.tool_mut().subprocess = true;
        self
    }

    pub fn mark_as_workflow_time(mut self) -> Self {
        let id = self.id.clone();
        self.tool_mut().trigger = Some(Trigger { id: ident::trigger_id(&id), kind: TriggerKind::Time });
        self
    }

    pub fn mark_as_workflow_message(mut self) -> Self {
        let id = self.id.clone();
        self.tool_mut().trigger =
            Some(Trigger { id: ident::trigger_id(&id), kind: TriggerKind::Message });
        self
    }

    pub fn mark_as_workflow_resource(mut self, role: &str, unit: &str) -> Self {
        let id = self.id.clone();
        let tool = self.tool_mut();
        tool.trigger = Some(Trigger { id: ident::trigger_id(&id), kind: TriggerKind::Resource });
        tool.transition_resource = Some(TransitionResource {
            role_name: role.to_owned(),
            organizational_unit_name: unit.to_owned(),
        });
        self
    }

    pub fn is_workflow_operator(&self) -> bool {
        self.tool.as_ref().is_some_and(|t| t.operator.is_some())
    }

    pub fn is_workflow_subprocess(&self) -> bool {
        self.tool.as_ref().is_some_and(|t| t.subprocess)
    }

    pub fn is_workflow_resource(&self) -> bool {
        self.tool.as_ref().is_some_and(|t| t.transition_resource.is_some())
    }

    /// Consults the trigger type, never the resource record.
    pub fn is_workflow_time(&self) -> bool {
        self.trigger_kind() == Some(TriggerKind::Time)
    }

    /// Consults the trigger type, never the resource record.
    pub fn is_workflow_message(&self) -> bool {
        self.trigger_kind() == Some(TriggerKind::Message)
    }

    pub fn is_workflow_event_trigger(&self) -> bool {
        self.is_workflow_time() || self.is_workflow_message()
    }

    pub fn trigger_kind(&self) -> Option<TriggerKind> {
        self.tool.as_ref().and_then(|t| t.trigger.as_ref()).map(|t| t.kind)
    }

    pub fn operator(&self) -> Option<&Operator> {
        self.tool.as_ref().and_then(|t| t.operator.as_ref())
    }

    pub fn clear_trigger(&mut self) {
        if let Some(tool) = &mut self.tool {
            tool.trigger = None;
            if tool.is_empty() {
                self.tool = None;
            }
        }
    }
}

/// A directed arc. Endpoints are element ids in the same net.
#[derive(Clone, Debug)]
pub struct PnmlArc {
    pub id: String,
    pub source: String,
    pub target: String,
    pub tool: Option<Toolspecific>,
}

// ─── Net (the graph store) ────────────────────────────────────

/// One Petri net: element/arc arena, indexes, nested pages, and the root-only
/// global resources block.
#[derive(Clone, Debug, Default)]
pub struct Net {
    pub id: Option<String>,
    pub net_type: Option<String>,
    pub resources: Option<GlobalResources>,

    elements: BTreeMap<String, NetElement>,
    arcs: BTreeMap<String, PnmlArc>,
    incoming: BTreeMap<String, BTreeSet<String>>,
    outgoing: BTreeMap<String, BTreeSet<String>>,
    pages: BTreeMap<String, Net>,
}

impl Net {
    pub fn new(id: impl Into<String>) -> Self {
        Net { id: Some(id.into()), ..Default::default() }
    }

    // ─── Lookups ──────────────────────────────────────────────

    pub fn element(&self, id: &str) -> Option<&NetElement> {
        self.elements.get(id)
    }

    pub fn element_mut(&mut self, id: &str) -> Option<&mut NetElement> {
        self.elements.get_mut(id)
    }

    pub fn require_element(&self, id: &str) -> Result<&NetElement> {
        self.elements
            .get(id)
            .ok_or_else(|| TransformError::internal(format!("unknown net element {id}")))
    }

    pub fn contains_element(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    pub fn elements(&self) -> impl Iterator<Item = &NetElement> {
        self.elements.values()
    }

    pub fn element_ids(&self) -> Vec<String> {
        self.elements.keys().cloned().collect()
    }

    pub fn arc(&self, id: &str) -> Option<&PnmlArc> {
        self.arcs.get(id)
    }

    pub fn arcs(&self) -> impl Iterator<Item = &PnmlArc> {
        self.arcs.values()
    }

    pub fn arc_ids(&self) -> Vec<String> {
        self.arcs.keys().cloned().collect()
    }

    /// Ids of arcs entering `id`, sorted.
    pub fn incoming_ids(&self, id: &str) -> Vec<String> {
        self.incoming.get(id).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    /// Ids of arcs leaving `id`, sorted.
    pub fn outgoing_ids(&self, id: &str) -> Vec<String> {
        self.outgoing.get(id).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.incoming.get(id).map_or(0, BTreeSet::len)
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.outgoing.get(id).map_or(0, BTreeSet::len)
    }

    pub fn pages(&self) -> impl Iterator<Item = (&String, &Net)> {
        self.pages.iter()
    }

    pub fn page(&self, id: &str) -> Option<&Net> {
        self.pages.get(id)
    }

    pub fn page_mut(&mut self, id: &str) -> Option<&mut Net> {
        self.pages.get_mut(id)
    }

    pub fn page_ids(&self) -> Vec<String> {
        self.pages.keys().cloned().collect()
    }

    // ─── Mutation ─────────────────────────────────────────────

    /// Adds an element. Adding an id that already exists is a no-op.
    pub fn add_element(&mut self, element: NetElement) -> &mut Self {
        self.elements.entry(element.id.clone()).or_insert(element);
        self
    }

    /// Removes an element and detaches every arc touching it.
    pub fn remove_element(&mut self, id: &str) -> Result<NetElement> {
        let element = self.elements.remove(id).ok_or_else(|| {
            TransformError::internal(format!("cannot remove missing net element {id}"))
        })?;
        let touching: Vec<String> = self
            .arcs
            .values()
            .filter(|a| a.source == id || a.target == id)
            .map(|a| a.id.clone())
            .collect();
        for arc_id in touching {
            self.remove_arc(&arc_id)?;
        }
        self.incoming.remove(id);
        self.outgoing.remove(id);
        Ok(element)
    }

    /// Adds one arc between two existing elements of different kinds. The id
    /// defaults to `{source}TO{target}`; reusing an arc id is an error, as is
    /// connecting two elements of the same kind.
    pub fn add_arc(&mut self, source: &str, target: &str, id: Option<String>) -> Result<String> {
        let id = id.unwrap_or_else(|| ident::arc_id(source, target));
        let source_kind = self.require_element(source)?.kind;
        let target_kind = self.require_element(target)?.kind;
        if source_kind == target_kind {
            return Err(TransformError::internal(format!(
                "cannot connect identical petrinet elements {source} and {target}"
            )));
        }
        if self.arcs.contains_key(&id) {
            return Err(TransformError::internal(format!(
                "arc {id} already exists from {source} to {target}"
            )));
        }
        self.incoming.entry(target.to_owned()).or_default().insert(id.clone());
        self.outgoing.entry(source.to_owned()).or_default().insert(id.clone());
        self.arcs.insert(
            id.clone(),
            PnmlArc { id: id.clone(), source: source.to_owned(), target: target.to_owned(), tool: None },
        );
        Ok(id)
    }

    /// Adds an arc, inserting a silent intermediate of the opposite kind when
    /// both endpoints are places or both are transitions.
    pub fn add_arc_handle_same_type(&mut self, source: &str, target: &str) -> Result<()> {
        let source_kind = self.require_element(source)?.kind;
        let target_kind = self.require_element(target)?.kind;
        match (source_kind, target_kind) {
            (ElementKind::Place, ElementKind::Place) => {
                let silent = ident::silent_node_id(source, target);
                self.add_element(NetElement::transition(&silent, None));
                self.add_arc(source, &silent, None)?;
                self.add_arc(&silent, target, None)?;
            }
            (ElementKind::Transition, ElementKind::Transition) => {
                let silent = ident::silent_node_id(source, target);
                self.add_element(NetElement::place(&silent));
                self.add_arc(source, &silent, None)?;
                self.add_arc(&silent, target, None)?;
            }
            _ => {
                self.add_arc(source, target, None)?;
            }
        }
        Ok(())
    }

    pub fn remove_arc(&mut self, id: &str) -> Result<PnmlArc> {
        let arc = self
            .arcs
            .remove(id)
            .ok_or_else(|| TransformError::internal(format!("cannot remove missing arc {id}")))?;
        if let Some(set) = self.incoming.get_mut(&arc.target) {
            set.remove(id);
        }
        if let Some(set) = self.outgoing.get_mut(&arc.source) {
            set.remove(id);
        }
        Ok(arc)
    }

    /// Re-keys an element, preserving every incident arc's id and
    /// orientation.
    pub fn change_element_id(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        let incident: Vec<PnmlArc> = self
            .arcs
            .values()
            .filter(|a| a.source == old || a.target == old)
            .cloned()
            .collect();
        let mut element = self.remove_element(old)?;
        element.id = new.to_owned();
        self.add_element(element);
        for arc in incident {
            let source = if arc.source == old { new } else { &arc.source };
            let target = if arc.target == old { new } else { &arc.target };
            let id = self.add_arc(source, target, Some(arc.id.clone()))?;
            if let Some(tool) = arc.tool {
                if let Some(stored) = self.arcs.get_mut(&id) {
                    stored.tool = Some(tool);
                }
            }
        }
        Ok(())
    }

    /// Collects the incoming arcs of `id` and removes them from the net.
    pub fn take_incoming_arcs(&mut self, id: &str) -> Result<Vec<PnmlArc>> {
        let mut taken = Vec::new();
        for arc_id in self.incoming_ids(id) {
            taken.push(self.remove_arc(&arc_id)?);
        }
        Ok(taken)
    }

    /// Collects the outgoing arcs of `id` and removes them from the net.
    pub fn take_outgoing_arcs(&mut self, id: &str) -> Result<Vec<PnmlArc>> {
        let mut taken = Vec::new();
        for arc_id in self.outgoing_ids(id) {
            taken.push(self.remove_arc(&arc_id)?);
        }
        Ok(taken)
    }

    /// Reconnects saved incoming arcs to `id`, mediating same-kind endpoints.
    pub fn connect_to_element(&mut self, id: &str, incoming: &[PnmlArc]) -> Result<()> {
        for arc in incoming {
            self.add_arc_handle_same_type(&arc.source, id)?;
        }
        Ok(())
    }

    /// Reconnects saved outgoing arcs from `id`, mediating same-kind
    /// endpoints.
    pub fn connect_from_element(&mut self, id: &str, outgoing: &[PnmlArc]) -> Result<()> {
        for arc in outgoing {
            self.add_arc_handle_same_type(id, &arc.target)?;
        }
        Ok(())
    }

    /// Registers a page for a subprocess transition. An existing page with
    /// the same id is kept.
    pub fn add_page(&mut self, id: impl Into<String>, net: Net) -> &mut Self {
        self.pages.entry(id.into()).or_insert(net);
        self
    }

    /// Inserts an arc read from XML before its endpoints are necessarily
    /// known. [`Net::check_arc_endpoints`] validates the references once the
    /// whole document is read.
    pub(crate) fn insert_parsed_arc(&mut self, arc: PnmlArc) {
        self.incoming.entry(arc.target.clone()).or_default().insert(arc.id.clone());
        self.outgoing.entry(arc.source.clone()).or_default().insert(arc.id.clone());
        self.arcs.insert(arc.id.clone(), arc);
    }

    pub(crate) fn check_arc_endpoints(&self) -> Result<()> {
        for arc in self.arcs.values() {
            if !self.elements.contains_key(&arc.source) || !self.elements.contains_key(&arc.target)
            {
                return Err(TransformError::InvalidInputXml);
            }
        }
        for page in self.pages.values() {
            page.check_arc_endpoints()?;
        }
        Ok(())
    }

    /// True if any element or any page element is a transient helper.
    pub fn contains_helpers(&self) -> bool {
        self.elements.values().any(|e| e.kind.is_helper())
            || self.pages.values().any(Net::contains_helpers)
    }
}

// ─── Document ─────────────────────────────────────────────────

/// A parsed PNML document.
#[derive(Clone, Debug)]
pub struct PnmlDocument {
    pub net: Net,
}

impl PnmlDocument {
    pub fn new(net_id: impl Into<String>) -> Self {
        PnmlDocument { net: Net::new(net_id) }
    }
}
