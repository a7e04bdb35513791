//! [`PnmlDocument`] → PNML XML (WOPED dialect).
//!
//! Emission is deterministic: places, transitions, arcs and pages are written
//! in sorted id order with placeholder geometry. Transient helper nodes must
//! be gone by the time a net is serialized.

use std::fmt::Write;

use super::{ElementKind, Net, NetElement, PnmlDocument, Toolspecific, WOPED};
use crate::error::{Result, TransformError};

pub fn write_pnml(doc: &PnmlDocument) -> Result<String> {
    let mut xml = String::new();
    push(&mut xml, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    push(&mut xml, "<pnml>");
    write_net(&mut xml, &doc.net)?;
    push(&mut xml, "</pnml>");
    Ok(xml)
}

fn write_net(w: &mut String, net: &Net) -> Result<()> {
    let mut attrs = String::new();
    if let Some(id) = &net.id {
        let _ = write!(attrs, r#" id="{}""#, escape(id));
    }
    if let Some(net_type) = &net.net_type {
        let _ = write!(attrs, r#" type="{}""#, escape(net_type));
    }
    push(w, &format!("<net{attrs}>"));

    for kind in [ElementKind::Place, ElementKind::Transition] {
        for id in net.element_ids() {
            let element = net.require_element(&id)?;
            if element.kind != kind {
                if element.kind.is_helper() {
                    return Err(TransformError::internal(format!(
                        "helper node {} leaked into serialized PNML",
                        element.id
                    )));
                }
                continue;
            }
            write_element(w, element)?;
        }
    }

    for id in net.arc_ids() {
        let arc = net
            .arc(&id)
            .ok_or_else(|| TransformError::internal(format!("missing arc {id}")))?;
        push(
            w,
            &format!(
                r#"<arc id="{}" source="{}" target="{}" />"#,
                escape(&arc.id),
                escape(&arc.source),
                escape(&arc.target)
            ),
        );
    }

    for page_id in net.page_ids() {
        let page = net
            .page(&page_id)
            .ok_or_else(|| TransformError::internal(format!("missing page {page_id}")))?;
        push(w, &format!(r#"<page id="{}">"#, escape(&page_id)));
        write_net(w, page)?;
        push(w, "</page>");
    }

    if let Some(resources) = &net.resources {
        push(w, &format!(r#"<toolspecific tool="{WOPED}" version="1.0">"#));
        push(w, "<resources>");
        for role in &resources.roles {
            push(w, &format!(r#"<role Name="{}" />"#, escape(role)));
        }
        for unit in &resources.units {
            push(w, &format!(r#"<organizationalUnit Name="{}" />"#, escape(unit)));
        }
        push(w, "</resources>");
        push(w, "</toolspecific>");
    }

    push(w, "</net>");
    Ok(())
}

fn write_element(w: &mut String, element: &NetElement) -> Result<()> {
    let tag = match element.kind {
        ElementKind::Place => "place",
        ElementKind::Transition => "transition",
        // unreachable: the caller filtered helpers already
        _ => return Err(TransformError::internal("helper node in write_element")),
    };
    let has_children = element.name.is_some() || element.tool.is_some();
    if !has_children {
        push(w, &format!(r#"<{tag} id="{}" />"#, escape(&element.id)));
        return Ok(());
    }
    push(w, &format!(r#"<{tag} id="{}">"#, escape(&element.id)));
    if let Some(name) = &element.name {
        push(
            w,
            &format!(
                r#"<name><graphics><offset x="0.0" y="0.0" /></graphics><text>{}</text></name>"#,
                escape(name)
            ),
        );
    }
    if let Some(tool) = &element.tool {
        write_toolspecific(w, tool);
    }
    push(w, &format!("</{tag}>"));
    Ok(())
}

fn write_toolspecific(w: &mut String, tool: &Toolspecific) {
    push(w, &format!(r#"<toolspecific tool="{WOPED}" version="1.0">"#));
    if let Some(time) = &tool.time {
        push(w, &format!("<time>{}</time>", escape(time)));
    }
    if let Some(unit) = &tool.time_unit {
        push(w, &format!("<timeUnit>{}</timeUnit>", escape(unit)));
    }
    if let Some(orientation) = &tool.orientation {
        push(w, &format!("<orientation>{}</orientation>", escape(orientation)));
    }
    if let Some(op) = &tool.operator {
        push(
            w,
            &format!(r#"<operator id="{}" type="{}" />"#, escape(&op.id), op.kind.code()),
        );
    }
    if let Some(trigger) = &tool.trigger {
        push(
            w,
            &format!(
                r#"<trigger id="{}" type="{}"><graphics><position x="0.0" y="0.0" /></graphics></trigger>"#,
                escape(&trigger.id),
                trigger.kind.code()
            ),
        );
    }
    if let Some(resource) = &tool.transition_resource {
        push(
            w,
            &format!(
                r#"<transitionResource roleName="{}" organizationalUnitName="{}"><graphics><position x="0.0" y="0.0" /></graphics></transitionResource>"#,
                escape(&resource.role_name),
                escape(&resource.organizational_unit_name)
            ),
        );
    }
    if tool.subprocess {
        push(w, "<subprocess>true</subprocess>");
    }
    push(w, "</toolspecific>");
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
