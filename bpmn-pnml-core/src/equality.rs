//! Equality oracle backing the test suite.
//!
//! Two documents of the same formalism are equal when their (sub)process /
//! page decomposition has the same id set and, per container and per element
//! type, the multisets of comparable strings match. Graphical geometry and
//! element ordering are deliberately ignored.

use std::collections::BTreeMap;
use std::fmt;

use crate::bpmn::{BpmnDocument, Process};
use crate::pnml::Net;

/// Diagnostic of a failed comparison; both set differences are included.
#[derive(Debug)]
pub struct EqualityDiff(String);

impl fmt::Display for EqualityDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type Multiset = BTreeMap<String, usize>;
type TypeMap = BTreeMap<&'static str, Multiset>;

fn comp_string(parts: &[Option<String>]) -> String {
    parts.iter().flatten().cloned().collect::<Vec<_>>().join("_")
}

fn bump(map: &mut TypeMap, tag: &'static str, value: String) {
    *map.entry(tag).or_default().entry(value).or_insert(0) += 1;
}

fn multiset_difference(a: &Multiset, b: &Multiset) -> Vec<String> {
    let mut out = Vec::new();
    for (value, count_a) in a {
        let count_b = b.get(value).copied().unwrap_or(0);
        if *count_a > count_b {
            out.push(value.clone());
        }
    }
    out
}

fn compare_type_maps(
    container: &str,
    a: &TypeMap,
    b: &TypeMap,
    errors: &mut Vec<String>,
) {
    let mut tags: Vec<&'static str> = a.keys().chain(b.keys()).copied().collect();
    tags.sort();
    tags.dedup();
    let empty = Multiset::new();
    for tag in tags {
        let set_a = a.get(tag).unwrap_or(&empty);
        let set_b = b.get(tag).unwrap_or(&empty);
        if set_a != set_b {
            errors.push(format!(
                "{container}\n{tag} difference equality| 1 to 2: {:?} | 2 to 1: {:?}",
                multiset_difference(set_a, set_b),
                multiset_difference(set_b, set_a)
            ));
        }
    }
}

// ─── Petri nets ───────────────────────────────────────────────

fn collect_nets<'a>(net: &'a Net, map: &mut BTreeMap<String, &'a Net>) {
    if let Some(id) = &net.id {
        map.entry(id.clone()).or_insert(net);
    }
    for (page_id, page) in net.pages() {
        map.entry(page_id.clone()).or_insert(page);
        collect_nets(page, map);
    }
}

/// Id-keyed map of all nested nets, used by the subnet-enumeration tests.
pub fn all_nets_by_id<'a>(net: &'a Net) -> BTreeMap<String, &'a Net> {
    let mut map = BTreeMap::new();
    collect_nets(net, &mut map);
    map
}

fn petri_type_map(net: &Net) -> TypeMap {
    let mut map = TypeMap::new();
    for element in net.elements() {
        let tag = match element.kind {
            crate::pnml::ElementKind::Place => "place",
            crate::pnml::ElementKind::Transition => "transition",
            crate::pnml::ElementKind::XorHelper => "xor-helper",
            crate::pnml::ElementKind::AndHelper => "and-helper",
            crate::pnml::ElementKind::TimeHelper => "time-helper",
            crate::pnml::ElementKind::MessageHelper => "message-helper",
        };
        bump(
            &mut map,
            tag,
            comp_string(&[
                Some(element.id.clone()),
                element.name.clone(),
                element.tool.as_ref().map(|t| t.to_string()),
            ]),
        );
    }
    for arc in net.arcs() {
        bump(
            &mut map,
            "arc",
            comp_string(&[
                Some(arc.source.clone()),
                Some(arc.target.clone()),
                arc.tool.as_ref().map(|t| t.to_string()),
            ]),
        );
    }
    if let Some(resources) = &net.resources {
        bump(
            &mut map,
            "resources",
            format!("roles={:?}_units={:?}", sorted(&resources.roles), sorted(&resources.units)),
        );
    }
    map
}

fn sorted(values: &[String]) -> Vec<&String> {
    let mut v: Vec<&String> = values.iter().collect();
    v.sort();
    v
}

/// Compares two Petri nets by page decomposition and per-type multiset
/// equality.
pub fn compare_pnml(a: &Net, b: &Net) -> Result<(), EqualityDiff> {
    let nets_a = all_nets_by_id(a);
    let nets_b = all_nets_by_id(b);
    if nets_a.keys().ne(nets_b.keys()) {
        return Err(EqualityDiff(format!(
            "Different subnet IDs: {:?} vs {:?}",
            nets_a.keys().collect::<Vec<_>>(),
            nets_b.keys().collect::<Vec<_>>()
        )));
    }
    let mut errors = Vec::new();
    for (id, net_a) in &nets_a {
        let net_b = nets_b[id];
        compare_type_maps(id, &petri_type_map(net_a), &petri_type_map(net_b), &mut errors);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(EqualityDiff(format!("Issues petrinet equality for types:\n{}", errors.join("\n"))))
    }
}

// ─── BPMN ─────────────────────────────────────────────────────

fn collect_processes<'a>(process: &'a Process, map: &mut BTreeMap<String, &'a Process>) {
    map.entry(process.id.clone()).or_insert(process);
    for sb_id in process.subprocess_ids() {
        if let Some(sub) = process.subprocess(&sb_id) {
            collect_processes(sub, map);
        }
    }
}

/// Id-keyed map of all nested processes, used by the subnet-enumeration
/// tests.
pub fn all_processes_by_id<'a>(doc: &'a BpmnDocument) -> BTreeMap<String, &'a Process> {
    let mut map = BTreeMap::new();
    collect_processes(&doc.process, &mut map);
    map
}

fn bpmn_type_map(process: &Process) -> TypeMap {
    let mut map = TypeMap::new();
    for node in process.nodes() {
        bump(
            &mut map,
            node.kind.type_tag(),
            comp_string(&[
                Some(node.id.clone()),
                node.name.clone(),
                Some(format!("{:?}", process.outgoing_ids(&node.id))),
                Some(format!("{:?}", process.incoming_ids(&node.id))),
            ]),
        );
    }
    for flow in process.flows() {
        bump(
            &mut map,
            "sequenceFlow",
            comp_string(&[flow.name.clone(), Some(flow.source.clone()), Some(flow.target.clone())]),
        );
    }
    map
}

/// Compares two BPMN documents by subprocess decomposition and per-type
/// multiset equality.
pub fn compare_bpmn(a: &BpmnDocument, b: &BpmnDocument) -> Result<(), EqualityDiff> {
    let procs_a = all_processes_by_id(a);
    let procs_b = all_processes_by_id(b);
    if procs_a.keys().ne(procs_b.keys()) {
        return Err(EqualityDiff(format!(
            "Wrong processes IDs: {:?} vs {:?}",
            procs_a.keys().collect::<Vec<_>>(),
            procs_b.keys().collect::<Vec<_>>()
        )));
    }
    let mut errors = Vec::new();
    for (id, proc_a) in &procs_a {
        let proc_b = procs_b[id];
        compare_type_maps(id, &bpmn_type_map(proc_a), &bpmn_type_map(proc_b), &mut errors);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(EqualityDiff(format!("Issues BPMN equality for types:\n{}", errors.join("\n"))))
    }
}
