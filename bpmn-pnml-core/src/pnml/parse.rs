//! PNML (WOPED dialect) XML → [`PnmlDocument`].

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::{
    BranchingType, GlobalResources, Net, NetElement, Operator, PnmlArc, PnmlDocument,
    Toolspecific, Trigger, TriggerKind,
};
use crate::error::{Result, TransformError};

pub fn parse_pnml(xml: &str) -> Result<PnmlDocument> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    // Net stack: the root net plus one frame per open page.
    let mut nets: Vec<NetFrame> = Vec::new();
    let mut page_ids: Vec<String> = Vec::new();
    let mut root: Option<Net> = None;

    let mut element: Option<PendingElement> = None;
    let mut tool: Option<Toolspecific> = None;
    let mut in_name = false;
    let mut in_name_text = false;
    let mut in_tool = false;
    let mut tool_text_target: Option<ToolText> = None;
    let mut resources: Option<GlobalResources> = None;
    let mut in_resources = false;

    loop {
        let event = reader.read_event_into(&mut buf);
        match event {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                // self-closing tags never receive an End event
                let is_empty = matches!(event, Ok(Event::Empty(_)));
                let tag = local_name(e.name().as_ref());
                match tag.as_str() {
                    "net" if !is_empty => {
                        let mut net = Net::default();
                        net.id = attr(e, "id").filter(|v| !v.is_empty());
                        net.net_type = attr(e, "type");
                        nets.push(NetFrame { net });
                    }
                    "page" if !is_empty => {
                        page_ids.push(attr(e, "id").unwrap_or_default());
                    }
                    "place" | "transition" => {
                        let pending = if tag == "place" {
                            PendingElement::place(require_attr(e, "id")?)
                        } else {
                            PendingElement::transition(require_attr(e, "id")?)
                        };
                        if is_empty {
                            let frame =
                                nets.last_mut().ok_or(TransformError::InvalidInputXml)?;
                            frame.net.add_element(pending.into_element());
                        } else {
                            element = Some(pending);
                        }
                    }
                    "arc" => {
                        let frame = nets.last_mut().ok_or(TransformError::InvalidInputXml)?;
                        let arc = PnmlArc {
                            id: require_attr(e, "id")?,
                            source: require_attr(e, "source")?,
                            target: require_attr(e, "target")?,
                            tool: None,
                        };
                        if frame.net.arc(&arc.id).is_some() {
                            return Err(TransformError::InvalidInputXml);
                        }
                        frame.net.insert_parsed_arc(arc);
                    }
                    "name" if !is_empty => in_name = element.is_some(),
                    "text" if in_name && !is_empty => in_name_text = true,
                    "toolspecific" if !is_empty => {
                        in_tool = true;
                        tool = Some(Toolspecific::default());
                    }
                    "operator" if in_tool => {
                        let code: u16 = require_attr(e, "type")?
                            .parse()
                            .map_err(|_| TransformError::InvalidInputXml)?;
                        let kind =
                            BranchingType::from_code(code).ok_or(TransformError::InvalidInputXml)?;
                        if let Some(tool) = tool.as_mut() {
                            tool.operator = Some(Operator { id: require_attr(e, "id")?, kind });
                        }
                    }
                    "trigger" if in_tool => {
                        let code: u16 = require_attr(e, "type")?
                            .parse()
                            .map_err(|_| TransformError::InvalidInputXml)?;
                        let kind =
                            TriggerKind::from_code(code).ok_or(TransformError::InvalidInputXml)?;
                        if let Some(tool) = tool.as_mut() {
                            tool.trigger = Some(Trigger { id: require_attr(e, "id")?, kind });
                        }
                    }
                    "transitionresource" if in_tool => {
                        if let Some(tool) = tool.as_mut() {
                            tool.transition_resource = Some(super::TransitionResource {
                                role_name: require_attr(e, "roleName")?,
                                organizational_unit_name: require_attr(
                                    e,
                                    "organizationalUnitName",
                                )?,
                            });
                        }
                    }
                    "subprocess" if in_tool => tool_text_target = Some(ToolText::Subprocess),
                    "time" if in_tool => tool_text_target = Some(ToolText::Time),
                    "timeunit" if in_tool => tool_text_target = Some(ToolText::TimeUnit),
                    "orientation" if in_tool => tool_text_target = Some(ToolText::Orientation),
                    "resources" if in_tool => {
                        in_resources = true;
                        resources = Some(GlobalResources::default());
                    }
                    "role" if in_resources => {
                        if let (Some(res), Some(name)) = (resources.as_mut(), attr(e, "Name")) {
                            res.roles.push(name);
                        }
                    }
                    "organizationalunit" if in_resources => {
                        if let (Some(res), Some(name)) = (resources.as_mut(), attr(e, "Name")) {
                            res.units.push(name);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let tag = local_name(e.name().as_ref());
                match tag.as_str() {
                    "net" => {
                        let frame = nets.pop().ok_or(TransformError::InvalidInputXml)?;
                        if let Some(parent) = nets.last_mut() {
                            let page_id = page_ids
                                .last()
                                .cloned()
                                .filter(|v| !v.is_empty())
                                .or_else(|| frame.net.id.clone())
                                .ok_or(TransformError::InvalidInputXml)?;
                            parent.net.add_page(page_id, frame.net);
                        } else {
                            root = Some(frame.net);
                        }
                    }
                    "page" => {
                        page_ids.pop();
                    }
                    "place" | "transition" => {
                        let pending = element.take().ok_or(TransformError::InvalidInputXml)?;
                        let frame = nets.last_mut().ok_or(TransformError::InvalidInputXml)?;
                        frame.net.add_element(pending.into_element());
                    }
                    "name" => {
                        in_name = false;
                        in_name_text = false;
                    }
                    "text" => in_name_text = false,
                    "toolspecific" => {
                        in_tool = false;
                        tool_text_target = None;
                        let finished = tool.take().unwrap_or_default();
                        match element.as_mut() {
                            // element-level toolspecific
                            Some(pending) if !finished.is_empty() => {
                                pending.tool = Some(finished)
                            }
                            Some(_) => {}
                            // net-level toolspecific: only the resources block matters
                            None => {
                                if let (Some(res), Some(frame)) =
                                    (resources.take(), nets.last_mut())
                                {
                                    frame.net.resources = Some(res);
                                }
                            }
                        }
                        in_resources = false;
                    }
                    "resources" => in_resources = false,
                    "subprocess" | "time" | "timeunit" | "orientation" => {
                        tool_text_target = None
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                let Ok(text) = e.unescape() else { continue };
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if in_name_text {
                    if let Some(pending) = element.as_mut() {
                        pending.name = Some(text.to_owned());
                    }
                } else if let (Some(target), Some(tool)) = (tool_text_target, tool.as_mut()) {
                    match target {
                        ToolText::Subprocess => tool.subprocess = text == "true",
                        ToolText::Time => tool.time = Some(text.to_owned()),
                        ToolText::TimeUnit => tool.time_unit = Some(text.to_owned()),
                        ToolText::Orientation => tool.orientation = Some(text.to_owned()),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return Err(TransformError::InvalidInputXml),
            _ => {}
        }
        buf.clear();
    }

    let net = root.ok_or(TransformError::InvalidInputXml)?;
    net.check_arc_endpoints()?;
    Ok(PnmlDocument { net })
}

#[derive(Clone, Copy)]
enum ToolText {
    Subprocess,
    Time,
    TimeUnit,
    Orientation,
}

struct NetFrame {
    net: Net,
}

struct PendingElement {
    id: String,
    name: Option<String>,
    is_place: bool,
    tool: Option<Toolspecific>,
}

impl PendingElement {
    fn place(id: String) -> Self {
        PendingElement { id, name: None, is_place: true, tool: None }
    }

    fn transition(id: String) -> Self {
        PendingElement { id, name: None, is_place: false, tool: None }
    }

    fn into_element(self) -> NetElement {
        let mut element = if self.is_place {
            NetElement::place(self.id)
        } else {
            NetElement::transition(self.id, None)
        };
        element.name = self.name;
        element.tool = self.tool;
        element
    }
}

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
