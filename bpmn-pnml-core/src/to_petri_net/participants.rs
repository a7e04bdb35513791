//! Lane/pool handling for the BPMN → workflow-net direction.
//!
//! Lane sets are flattened into a node-id → lane-name mapping before the
//! transform; user tasks then receive resource annotations and the root net
//! gets the global resources block.

use std::collections::BTreeMap;

use crate::bpmn::Process;
use crate::error::{Result, TransformError};
use crate::pnml::{GlobalResources, Net};

/// Builds `participant_mapping` from the lane sets and pushes it into every
/// nested subprocess: all user tasks inside a subprocess belong to the lane
/// the subprocess itself is assigned to.
pub fn create_participant_mapping(process: &mut Process) -> Result<()> {
    if process.lane_sets.is_empty() {
        return Ok(());
    }

    let mut mapping: BTreeMap<String, String> = BTreeMap::new();
    for lane_set in &process.lane_sets {
        for lane in &lane_set.lanes {
            let lane_name = lane.name.as_deref().ok_or(TransformError::UnnamedLane)?;
            if lane_name.is_empty() {
                return Err(TransformError::UnnamedLane);
            }
            for node_ref in &lane.flow_node_refs {
                mapping.insert(node_ref.clone(), lane_name.to_owned());
            }
        }
    }

    for sb_id in process.subprocess_ids() {
        let Some(lane_name) = mapping.get(&sb_id).cloned() else { continue };
        let sub = process
            .subprocess_mut(&sb_id)
            .ok_or_else(|| TransformError::internal(format!("missing subprocess {sb_id}")))?;
        assign_subprocess_lane(sub, &lane_name, &mut mapping);
    }

    distribute_mapping(process, &mapping);
    Ok(())
}

fn assign_subprocess_lane(
    process: &mut Process,
    lane_name: &str,
    mapping: &mut BTreeMap<String, String>,
) {
    for id in process.node_ids() {
        let Some(node) = process.node(&id) else { continue };
        if matches!(node.kind, crate::bpmn::FlowNodeKind::UserTask) {
            mapping.insert(id, lane_name.to_owned());
        }
    }
    for sb_id in process.subprocess_ids() {
        if let Some(sub) = process.subprocess_mut(&sb_id) {
            assign_subprocess_lane(sub, lane_name, mapping);
        }
    }
}

fn distribute_mapping(process: &mut Process, mapping: &BTreeMap<String, String>) {
    process.participant_mapping = mapping.clone();
    for sb_id in process.subprocess_ids() {
        if let Some(sub) = process.subprocess_mut(&sb_id) {
            distribute_mapping(sub, mapping);
        }
    }
}

/// Emits the root net's toolspecific block: every role once, plus the single
/// organizational unit.
pub fn set_global_toolspecific(
    net: &mut Net,
    mapping: &BTreeMap<String, String>,
    organization: Option<&str>,
) {
    if mapping.is_empty() {
        return;
    }
    let Some(organization) = organization else { return };
    let mut roles: Vec<String> = mapping.values().cloned().collect();
    roles.sort();
    roles.dedup();
    net.resources = Some(GlobalResources { roles, units: vec![organization.to_owned()] });
}
