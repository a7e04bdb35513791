//! Petri-net preprocessing for the PN → BPMN direction.
//!
//! Order matters: dangling transitions are capped first, then operator
//! groups are expanded (see [`super::operators`]), then named AND
//! transitions are split, and finally event triggers are externalized into
//! dedicated helper nodes.

use crate::error::{Result, TransformError};
use crate::ident;
use crate::pnml::{ElementKind, Net, NetElement, TriggerKind};

// ─── Dangling-transition capping ──────────────────────────────

/// Prepends a `SOURCE{id}` place to every transition with in-degree 0 and
/// appends a `SINK{id}` place to every transition with out-degree 0.
pub fn cap_dangling_transitions(net: &mut Net) -> Result<()> {
    for id in net.element_ids() {
        let element = net.require_element(&id)?;
        if element.kind != ElementKind::Transition {
            continue;
        }
        if net.in_degree(&id) == 0 {
            let cap = ident::source_id(&id);
            net.add_element(NetElement::place(&cap));
            net.add_arc(&cap, &id, None)?;
        }
        if net.out_degree(&id) == 0 {
            let cap = ident::sink_id(&id);
            net.add_element(NetElement::place(&cap));
            net.add_arc(&id, &cap, None)?;
        }
    }
    Ok(())
}

// ─── Named AND-transition split ───────────────────────────────

/// A transition with branching degree and a name is an implicit task: the
/// name moves onto an `EXPLICIT{id}` transition while the original node
/// keeps the branching role. Operator groups are already expanded at this
/// point, so only vanilla transitions qualify.
pub fn split_named_and_transitions(net: &mut Net) -> Result<()> {
    let candidates: Vec<String> = net
        .element_ids()
        .into_iter()
        .filter(|id| {
            let Some(e) = net.element(id) else { return false };
            e.kind == ElementKind::Transition
                && (net.in_degree(id) > 1 || net.out_degree(id) > 1)
                && e.name.as_deref().is_some_and(|n| !n.is_empty())
        })
        .collect();

    for id in candidates {
        let in_degree = net.in_degree(&id);
        let out_degree = net.out_degree(&id);
        let element = net.require_element(&id)?;
        let name = element.name.clone();
        let tool = element.tool.clone();
        let explicit_id = ident::explicit_transition_id(&id);

        let mut explicit = NetElement::transition(&explicit_id, name.as_deref());
        explicit.tool = tool;
        // the original node keeps a resource marker for lane assignment but
        // loses an event trigger once the explicit task carries it
        if net.require_element(&id)?.is_workflow_event_trigger() {
            if let Some(e) = net.element_mut(&id) {
                e.tool = None;
            }
        }

        if in_degree > 1 && out_degree > 1 {
            let outgoing = net.take_outgoing_arcs(&id)?;
            let end_id = format!("OUTAND{id}");
            let mut and_end = NetElement::transition(&end_id, None);
            if explicit.is_workflow_resource() {
                and_end.tool = explicit.tool.clone();
            }
            net.add_element(explicit);
            net.add_element(and_end);
            net.add_arc_handle_same_type(&id, &explicit_id)?;
            net.add_arc_handle_same_type(&explicit_id, &end_id)?;
            net.connect_from_element(&end_id, &outgoing)?;
        } else if in_degree > 1 {
            let outgoing = net.take_outgoing_arcs(&id)?;
            net.add_element(explicit);
            net.add_arc_handle_same_type(&id, &explicit_id)?;
            net.connect_from_element(&explicit_id, &outgoing)?;
        } else {
            let incoming = net.take_incoming_arcs(&id)?;
            net.add_element(explicit);
            net.add_arc_handle_same_type(&explicit_id, &id)?;
            net.connect_to_element(&explicit_id, &incoming)?;
        }

        if let Some(e) = net.element_mut(&id) {
            e.name = None;
        }
    }
    Ok(())
}

// ─── Event-trigger externalization ────────────────────────────

/// Splits every time/message marker off its hosting element into a dedicated
/// trigger helper with a `TRIGGER{id}` id. The hosting element keeps its
/// structural role (and any resource marker).
pub fn split_event_triggers(net: &mut Net) -> Result<()> {
    let triggers: Vec<String> = net
        .element_ids()
        .into_iter()
        .filter(|id| net.element(id).is_some_and(NetElement::is_workflow_event_trigger))
        .collect();

    for id in triggers {
        let element = net.require_element(&id)?;
        let helper_kind = match element.trigger_kind() {
            Some(TriggerKind::Time) => ElementKind::TimeHelper,
            Some(TriggerKind::Message) => ElementKind::MessageHelper,
            _ => return Err(TransformError::internal("trigger split on non-trigger element")),
        };
        let name = element.name.clone();
        let helper_id = ident::trigger_id(&id);
        let in_degree = net.in_degree(&id);
        let out_degree = net.out_degree(&id);

        if in_degree > 1 && out_degree > 1 {
            // join-split: the trigger helper sits between the join part and a
            // fresh silent AND part taking over the split
            let outgoing = net.take_outgoing_arcs(&id)?;
            let end_id = format!("OUTAND{id}");
            net.add_element(NetElement::helper(&helper_id, helper_kind, name.as_deref()));
            net.add_element(NetElement::transition(&end_id, None));
            net.add_arc_handle_same_type(&id, &helper_id)?;
            net.add_arc_handle_same_type(&helper_id, &end_id)?;
            net.connect_from_element(&end_id, &outgoing)?;
        } else if in_degree > 1 {
            // join: append the trigger helper
            let outgoing = net.take_outgoing_arcs(&id)?;
            net.add_element(NetElement::helper(&helper_id, helper_kind, name.as_deref()));
            net.add_arc_handle_same_type(&id, &helper_id)?;
            net.connect_from_element(&helper_id, &outgoing)?;
        } else if out_degree > 1 || (in_degree == 1 && out_degree == 1) {
            // split or plain sequence: prepend the trigger helper
            let incoming = net.take_incoming_arcs(&id)?;
            net.add_element(NetElement::helper(&helper_id, helper_kind, name.as_deref()));
            net.add_arc_handle_same_type(&helper_id, &id)?;
            net.connect_to_element(&helper_id, &incoming)?;
        } else {
            return Err(TransformError::internal(format!(
                "trigger {id} with degree 0 survived dangling capping"
            )));
        }

        if let Some(e) = net.element_mut(&id) {
            e.clear_trigger();
        }
    }
    Ok(())
}
