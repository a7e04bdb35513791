//! Workflow-operator grouping and expansion for the Petri-net → BPMN
//! direction.
//!
//! Every operator-marked node belongs to the group of its `Operator.id`. A
//! group is removed as a whole and re-emitted as gateway helper nodes (plus
//! an EXPLICIT transition when the operator carries a name, i.e. an implicit
//! task) that the transform pass can translate directly.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, TransformError};
use crate::ident;
use crate::pnml::{BranchingType, ElementKind, Net, NetElement, PnmlArc, Toolspecific, TriggerKind};

/// One logical gateway: the nodes sharing an `Operator.id` plus its outward
/// faces.
pub struct OperatorGroup {
    pub id: String,
    pub name: Option<String>,
    pub kind: BranchingType,
    pub nodes: Vec<String>,
    /// Arcs from outside the group into it.
    pub incoming_arcs: Vec<PnmlArc>,
    /// Arcs from the group to the outside.
    pub outgoing_arcs: Vec<PnmlArc>,
    /// Every arc touching the group, internal ones included.
    pub all_arcs: Vec<String>,
    /// Toolspecific block of the first transition node, source for trigger
    /// and resource forwarding.
    pub tool: Option<Toolspecific>,
}

impl OperatorGroup {
    /// Incoming arcs deduplicated by source, sorted.
    pub fn unique_incoming(&self) -> Vec<PnmlArc> {
        let mut seen = BTreeSet::new();
        let mut arcs: Vec<PnmlArc> = self
            .incoming_arcs
            .iter()
            .filter(|a| seen.insert(a.source.clone()))
            .cloned()
            .collect();
        arcs.sort_by(|a, b| a.source.cmp(&b.source));
        arcs
    }

    /// Outgoing arcs deduplicated by target, sorted.
    pub fn unique_outgoing(&self) -> Vec<PnmlArc> {
        let mut seen = BTreeSet::new();
        let mut arcs: Vec<PnmlArc> = self
            .outgoing_arcs
            .iter()
            .filter(|a| seen.insert(a.target.clone()))
            .cloned()
            .collect();
        arcs.sort_by(|a, b| a.target.cmp(&b.target));
        arcs
    }
}

/// Groups every operator-marked node by its operator id, sorted by group id.
pub fn find_operator_groups(net: &Net) -> Result<Vec<OperatorGroup>> {
    let mut by_id: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for id in net.element_ids() {
        let element = net.require_element(&id)?;
        if let Some(op) = element.operator() {
            by_id.entry(op.id.clone()).or_default().push(id);
        }
    }

    let mut groups = Vec::new();
    for (op_id, node_ids) in by_id {
        let first = net.require_element(&node_ids[0])?;
        let kind = first
            .operator()
            .map(|op| op.kind)
            .ok_or_else(|| TransformError::internal("operator group without operator"))?;
        let name = node_ids
            .iter()
            .filter_map(|id| net.element(id).and_then(|e| e.name.clone()))
            .next();
        let tool = node_ids
            .iter()
            .filter(|id| {
                net.element(id).map(|e| e.kind == ElementKind::Transition).unwrap_or(false)
            })
            .find_map(|id| net.element(id).and_then(|e| e.tool.clone()));

        let members: BTreeSet<&String> = node_ids.iter().collect();
        let mut group = OperatorGroup {
            id: op_id,
            name,
            kind,
            nodes: node_ids.clone(),
            incoming_arcs: Vec::new(),
            outgoing_arcs: Vec::new(),
            all_arcs: Vec::new(),
            tool,
        };
        let mut seen_arcs = BTreeSet::new();
        for node_id in &node_ids {
            for arc_id in net.incoming_ids(node_id) {
                let arc = net
                    .arc(&arc_id)
                    .ok_or_else(|| TransformError::internal(format!("missing arc {arc_id}")))?;
                if seen_arcs.insert(arc_id.clone()) {
                    group.all_arcs.push(arc_id.clone());
                }
                if !members.contains(&arc.source) {
                    group.incoming_arcs.push(arc.clone());
                }
            }
            for arc_id in net.outgoing_ids(node_id) {
                let arc = net
                    .arc(&arc_id)
                    .ok_or_else(|| TransformError::internal(format!("missing arc {arc_id}")))?;
                if seen_arcs.insert(arc_id.clone()) {
                    group.all_arcs.push(arc_id.clone());
                }
                if !members.contains(&arc.target) {
                    group.outgoing_arcs.push(arc.clone());
                }
            }
        }
        groups.push(group);
    }
    Ok(groups)
}

/// Expands every operator group into gateway helper nodes. Runs before the
/// transform pass.
pub fn expand_operators(net: &mut Net) -> Result<()> {
    for group in find_operator_groups(net)? {
        match group.kind {
            BranchingType::AndSplit
            | BranchingType::AndJoin
            | BranchingType::XorSplit
            | BranchingType::XorJoin => expand_single(net, &group)?,
            BranchingType::XorJoinSplit
            | BranchingType::AndJoinSplit
            | BranchingType::AndJoinXorSplit
            | BranchingType::XorJoinAndSplit => expand_combined(net, &group)?,
        }
    }
    Ok(())
}

fn remove_group(net: &mut Net, group: &OperatorGroup) -> Result<()> {
    for arc_id in &group.all_arcs {
        net.remove_arc(arc_id)?;
    }
    for node_id in &group.nodes {
        net.remove_element(node_id)?;
    }
    Ok(())
}

fn helper_kind_for(kind: BranchingType) -> ElementKind {
    match kind {
        BranchingType::XorSplit | BranchingType::XorJoin | BranchingType::XorJoinSplit => {
            ElementKind::XorHelper
        }
        BranchingType::AndSplit | BranchingType::AndJoin | BranchingType::AndJoinSplit => {
            ElementKind::AndHelper
        }
        // cross-kind operators pick per part
        BranchingType::AndJoinXorSplit | BranchingType::XorJoinAndSplit => ElementKind::AndHelper,
    }
}

/// AndSplit / AndJoin / XorSplit / XorJoin: one helper keeps the group id;
/// a name extracts an EXPLICIT transition on the outside face.
fn expand_single(net: &mut Net, group: &OperatorGroup) -> Result<()> {
    let incoming = group.unique_incoming();
    let outgoing = group.unique_outgoing();
    remove_group(net, group)?;

    let helper_kind = helper_kind_for(group.kind);
    net.add_element(NetElement::helper(&group.id, helper_kind, group.name.as_deref()));
    net.connect_to_element(&group.id, &incoming)?;
    net.connect_from_element(&group.id, &outgoing)?;

    if group.name.is_none() {
        forward_annotations(net, group, &[group.id.clone()], None)?;
        return Ok(());
    }

    // the name is an implicit task: extract it as an EXPLICIT transition and
    // strip the helper's name
    if let Some(helper) = net.element_mut(&group.id) {
        helper.name = None;
    }
    let explicit = ident::explicit_transition_id(&group.id);
    net.add_element(NetElement::transition(&explicit, group.name.as_deref()));

    let is_join = matches!(group.kind, BranchingType::AndJoin | BranchingType::XorJoin);
    if is_join {
        // the task runs after the join
        let outgoing_arc = net.outgoing_ids(&group.id).first().cloned();
        net.add_arc(&group.id, &explicit, None)?;
        if let Some(arc_id) = outgoing_arc {
            let arc = net.remove_arc(&arc_id)?;
            net.add_arc_handle_same_type(&explicit, &arc.target)?;
        }
    } else {
        // the task runs before the split
        let incoming_arc = net.incoming_ids(&group.id).first().cloned();
        net.add_arc(&explicit, &group.id, None)?;
        if let Some(arc_id) = incoming_arc {
            let arc = net.remove_arc(&arc_id)?;
            net.add_arc_handle_same_type(&arc.source, &explicit)?;
        }
    }
    forward_annotations(net, group, &[group.id.clone()], Some(&explicit))?;
    Ok(())
}

/// Combined operators: same-kind pairs collapse into one helper (or an
/// IN/OUT pair around the EXPLICIT task when named); cross-kind pairs always
/// split into a join part and a split part.
fn expand_combined(net: &mut Net, group: &OperatorGroup) -> Result<()> {
    let incoming = group.unique_incoming();
    let outgoing = group.unique_outgoing();
    remove_group(net, group)?;

    let cross_kind = matches!(
        group.kind,
        BranchingType::AndJoinXorSplit | BranchingType::XorJoinAndSplit
    );

    let (first_id, first_kind, second_id, second_kind) = if cross_kind {
        let (join_kind, split_kind) = match group.kind {
            BranchingType::XorJoinAndSplit => (ElementKind::XorHelper, ElementKind::AndHelper),
            _ => (ElementKind::AndHelper, ElementKind::XorHelper),
        };
        let join_prefix = if join_kind == ElementKind::XorHelper { "XOR" } else { "AND" };
        let split_prefix = if split_kind == ElementKind::XorHelper { "XOR" } else { "AND" };
        (
            format!("{join_prefix}{}", group.id),
            join_kind,
            format!("{split_prefix}{}", group.id),
            split_kind,
        )
    } else {
        let kind = helper_kind_for(group.kind);
        if group.name.is_some() {
            let prefix = if kind == ElementKind::XorHelper { "XOR" } else { "AND" };
            (format!("IN{prefix}{}", group.id), kind, format!("OUT{prefix}{}", group.id), kind)
        } else {
            (group.id.clone(), kind, group.id.clone(), kind)
        }
    };

    net.add_element(NetElement::helper(&first_id, first_kind, None));
    net.add_element(NetElement::helper(&second_id, second_kind, None));
    net.connect_to_element(&first_id, &incoming)?;
    net.connect_from_element(&second_id, &outgoing)?;

    let mut parts = vec![first_id.clone()];
    if second_id != first_id {
        parts.push(second_id.clone());
    }

    let explicit = if let Some(name) = &group.name {
        // implicit task between the two faces
        let explicit = ident::explicit_transition_id(&group.id);
        net.add_element(NetElement::transition(&explicit, Some(name)));
        if first_id == second_id {
            return Err(TransformError::internal(
                "named same-kind operator must split into two helpers",
            ));
        }
        net.add_arc(&first_id, &explicit, None)?;
        net.add_arc(&explicit, &second_id, None)?;
        Some(explicit)
    } else {
        if first_id != second_id {
            net.add_arc(&first_id, &second_id, None)?;
        }
        None
    };
    forward_annotations(net, group, &parts, explicit.as_deref())?;
    Ok(())
}

/// Annotation precedence: a resource propagates to every emitted part; a
/// time/message trigger only to the EXPLICIT transition, or to the first
/// helper when no explicit task exists.
fn forward_annotations(
    net: &mut Net,
    group: &OperatorGroup,
    helpers: &[String],
    explicit: Option<&str>,
) -> Result<()> {
    let Some(tool) = &group.tool else { return Ok(()) };

    if let Some(resource) = &tool.transition_resource {
        let mut ids: Vec<&str> = helpers.iter().map(String::as_str).collect();
        if let Some(explicit) = explicit {
            ids.push(explicit);
        }
        for id in ids {
            if let Some(element) = net.element_mut(id) {
                let t = element.tool.get_or_insert_with(Toolspecific::default);
                t.transition_resource = Some(resource.clone());
            }
        }
    }

    if let Some(trigger) = &tool.trigger {
        if matches!(trigger.kind, TriggerKind::Time | TriggerKind::Message) {
            let carrier = explicit.unwrap_or(&helpers[0]);
            if let Some(element) = net.element_mut(carrier) {
                let t = element.tool.get_or_insert_with(Toolspecific::default);
                t.trigger = Some(trigger.clone());
            }
        }
    }
    Ok(())
}
