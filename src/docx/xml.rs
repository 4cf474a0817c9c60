use std::collections::BTreeMap;

use anyhow::{anyhow, Context};
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;
use sha2::{Digest, Sha256};

#[derive(Clone, Debug, PartialEq)]
pub enum XmlEvent {
    Decl {
        version: String,
        encoding: Option<String>,
        standalone: Option<String>,
    },
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
    CData {
        text: String,
    },
    Comment {
        text: String,
    },
    PI {
        content: String,
    },
    DocType {
        text: String,
    },
}

impl XmlEvent {
    pub fn start(name: &str, attrs: &[(&str, &str)]) -> Self {
        XmlEvent::Start {
            name: name.to_string(),
            attrs: owned_attrs(attrs),
        }
    }

    pub fn empty(name: &str, attrs: &[(&str, &str)]) -> Self {
        XmlEvent::Empty {
            name: name.to_string(),
            attrs: owned_attrs(attrs),
        }
    }

    pub fn end(name: &str) -> Self {
        XmlEvent::End {
            name: name.to_string(),
        }
    }

    pub fn text(text: &str) -> Self {
        XmlEvent::Text {
            text: text.to_string(),
        }
    }

    /// Element name for start, empty, and end events.
    pub fn name(&self) -> Option<&str> {
        match self {
            XmlEvent::Start { name, .. } | XmlEvent::Empty { name, .. } | XmlEvent::End { name } => {
                Some(name.as_str())
            }
            _ => None,
        }
    }

    pub fn is_start(&self, tag: &str) -> bool {
        matches!(self, XmlEvent::Start { name, .. } if name == tag)
    }

    pub fn is_end(&self, tag: &str) -> bool {
        matches!(self, XmlEvent::End { name } if name == tag)
    }

    pub fn attrs(&self) -> &[(String, String)] {
        match self {
            XmlEvent::Start { attrs, .. } | XmlEvent::Empty { attrs, .. } => attrs,
            _ => &[],
        }
    }
}

fn owned_attrs(attrs: &[(&str, &str)]) -> Vec<(String, String)> {
    attrs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Clone)]
pub struct XmlPart {
    pub name: String,
    pub events: Vec<XmlEvent>,
    pub baseline_hash: String,
}

impl XmlPart {
    /// Re-anchors the structure baseline to the current events.
    pub fn rebaseline(&mut self) {
        self.baseline_hash = structure_hash(&self.events);
    }
}

pub fn parse_xml_part(name: &str, xml_bytes: &[u8]) -> anyhow::Result<XmlPart> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut events: Vec<XmlEvent> = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader.read_event_into(&mut buf).context("read xml event")?;
        match ev {
            Event::Eof => break,
            Event::Decl(d) => {
                let version = bytes_to_string(d.version().context("decl version")?);
                let encoding = d
                    .encoding()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                let standalone = d
                    .standalone()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                events.push(XmlEvent::Decl {
                    version,
                    encoding,
                    standalone,
                });
            }
            Event::Start(s) => {
                events.push(XmlEvent::Start {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s)?,
                });
            }
            Event::End(e) => {
                events.push(XmlEvent::End {
                    name: bytes_to_string(e.name().as_ref()),
                });
            }
            Event::Empty(s) => {
                events.push(XmlEvent::Empty {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s)?,
                });
            }
            Event::Text(t) => {
                let txt = t.unescape().context("unescape text")?.into_owned();
                events.push(XmlEvent::Text { text: txt });
            }
            Event::CData(t) => {
                events.push(XmlEvent::CData {
                    text: bytes_to_string(t.into_inner()),
                });
            }
            Event::Comment(t) => {
                events.push(XmlEvent::Comment {
                    text: bytes_to_string(t.into_inner()),
                });
            }
            Event::PI(t) => {
                let target = bytes_to_string(t.target());
                let content = bytes_to_string(t.content());
                events.push(XmlEvent::PI {
                    content: format!("{target}{content}"),
                });
            }
            Event::DocType(t) => {
                events.push(XmlEvent::DocType {
                    text: bytes_to_string(t.into_inner()),
                });
            }
        }
    }

    let baseline_hash = structure_hash(&events);
    Ok(XmlPart {
        name: name.to_string(),
        events,
        baseline_hash,
    })
}

fn collect_attrs(s: &BytesStart<'_>) -> anyhow::Result<Vec<(String, String)>> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for a in s.attributes() {
        let a = a.context("attr")?;
        // Raw (still escaped) value: character references such as `&#13;&#10;` in VML
        // attributes must survive the round trip untouched.
        attrs.push((bytes_to_string(a.key.as_ref()), bytes_to_string(a.value.as_ref())));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

pub fn write_xml_part(part: &XmlPart) -> anyhow::Result<Vec<u8>> {
    write_events(&part.events)
}

pub fn write_events(events: &[XmlEvent]) -> anyhow::Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();

    fn escape_text_into(out: &mut Vec<u8>, text: &str) {
        for ch in text.chars() {
            match ch {
                '&' => out.extend_from_slice(b"&amp;"),
                '<' => out.extend_from_slice(b"&lt;"),
                '>' => out.extend_from_slice(b"&gt;"),
                _ => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
    }

    fn write_start_like(out: &mut Vec<u8>, name: &str, attrs: &[(String, String)], empty: bool) {
        out.extend_from_slice(b"<");
        out.extend_from_slice(name.as_bytes());
        // Attribute values are stored escaped; do not escape again.
        for (k, v) in attrs {
            out.extend_from_slice(b" ");
            out.extend_from_slice(k.as_bytes());
            out.extend_from_slice(b"=\"");
            out.extend_from_slice(v.as_bytes());
            out.extend_from_slice(b"\"");
        }
        if empty {
            out.extend_from_slice(b"/>");
        } else {
            out.extend_from_slice(b">");
        }
    }

    for ev in events {
        match ev {
            XmlEvent::Decl {
                version,
                encoding,
                standalone,
            } => {
                let d =
                    BytesDecl::new(version.as_str(), encoding.as_deref(), standalone.as_deref());
                let mut writer = quick_xml::Writer::new(Vec::new());
                writer.write_event(Event::Decl(d)).context("write decl")?;
                out.extend_from_slice(&writer.into_inner());
            }
            XmlEvent::Start { name, attrs } => write_start_like(&mut out, name, attrs, false),
            XmlEvent::End { name } => {
                out.extend_from_slice(b"</");
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(b">");
            }
            XmlEvent::Empty { name, attrs } => write_start_like(&mut out, name, attrs, true),
            XmlEvent::Text { text } => escape_text_into(&mut out, text),
            XmlEvent::CData { text } => {
                out.extend_from_slice(b"<![CDATA[");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b"]]>");
            }
            XmlEvent::Comment { text } => {
                out.extend_from_slice(b"<!--");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b"-->");
            }
            XmlEvent::PI { content } => {
                out.extend_from_slice(b"<?");
                out.extend_from_slice(content.as_bytes());
                out.extend_from_slice(b"?>");
            }
            XmlEvent::DocType { text } => {
                out.extend_from_slice(b"<!DOCTYPE");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b">");
            }
        }
    }

    Ok(out)
}

/// For every event, the index of the event closing it (itself for non-start events).
pub fn element_ends(events: &[XmlEvent]) -> Vec<usize> {
    let mut ends: Vec<usize> = (0..events.len()).collect();
    let mut open: Vec<usize> = Vec::new();
    for (i, ev) in events.iter().enumerate() {
        match ev {
            XmlEvent::Start { .. } => open.push(i),
            XmlEvent::End { .. } => {
                if let Some(s) = open.pop() {
                    ends[s] = i;
                }
            }
            _ => {}
        }
    }
    // Unclosed elements extend to the end of the part.
    for s in open {
        ends[s] = events.len().saturating_sub(1);
    }
    ends
}

pub fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

pub fn set_attr_value(ev: &mut XmlEvent, key: &str, value: &str) {
    if let XmlEvent::Start { attrs, .. } | XmlEvent::Empty { attrs, .. } = ev {
        for (k, v) in attrs.iter_mut() {
            if k == key {
                *v = value.to_string();
                return;
            }
        }
        attrs.push((key.to_string(), value.to_string()));
    }
}

pub fn verify_structure_unchanged(part: &XmlPart) -> anyhow::Result<()> {
    let cur = structure_hash(&part.events);
    if cur != part.baseline_hash {
        return Err(anyhow!(
            "non-text structure changed in {} (baseline={} current={})",
            part.name,
            part.baseline_hash,
            cur
        ));
    }
    Ok(())
}

/// Hash of everything except run text: element names, attributes (minus `xml:space`),
/// and text outside `w:t`. Formatting changes alter it; text rewrites do not.
fn structure_hash(events: &[XmlEvent]) -> String {
    let mut hasher = Sha256::new();
    let mut stack: Vec<String> = Vec::new();

    for ev in events {
        match ev {
            XmlEvent::Start { name, attrs } => {
                stack.push(name.clone());
                hash_start_like(&mut hasher, name, attrs);
            }
            XmlEvent::Empty { name, attrs } => {
                hash_start_like(&mut hasher, name, attrs);
                hash_end_like(&mut hasher, name);
            }
            XmlEvent::End { name } => {
                hash_end_like(&mut hasher, name);
                let _ = stack.pop();
            }
            XmlEvent::Text { text } => {
                let cur = stack.last().map(|s| s.as_str()).unwrap_or("");
                if is_text_tag(cur) {
                    continue;
                }
                hasher.update(b"T:");
                hasher.update(text.as_bytes());
                hasher.update(b"\n");
            }
            XmlEvent::Decl {
                version,
                encoding,
                standalone,
            } => {
                hasher.update(b"D:");
                hasher.update(version.as_bytes());
                hasher.update(b"|");
                if let Some(e) = encoding.as_ref() {
                    hasher.update(e.as_bytes());
                }
                hasher.update(b"|");
                if let Some(s) = standalone.as_ref() {
                    hasher.update(s.as_bytes());
                }
                hasher.update(b"\n");
            }
            XmlEvent::CData { text } => {
                hasher.update(b"C:");
                hasher.update(text.as_bytes());
                hasher.update(b"\n");
            }
            XmlEvent::Comment { text } => {
                hasher.update(b"M:");
                hasher.update(text.as_bytes());
                hasher.update(b"\n");
            }
            XmlEvent::PI { content } => {
                hasher.update(b"P:");
                hasher.update(content.as_bytes());
                hasher.update(b"\n");
            }
            XmlEvent::DocType { text } => {
                hasher.update(b"Y:");
                hasher.update(text.as_bytes());
                hasher.update(b"\n");
            }
        }
    }
    hex::encode(hasher.finalize())
}

fn is_text_tag(name: &str) -> bool {
    name == "w:t"
}

fn hash_start_like(hasher: &mut Sha256, name: &str, attrs: &[(String, String)]) {
    hasher.update(b"S:");
    hasher.update(name.as_bytes());
    hasher.update(b"|");

    let map: BTreeMap<&str, &str> = attrs
        .iter()
        .filter(|(k, _)| k != "xml:space")
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    for (k, v) in map {
        hasher.update(k.as_bytes());
        hasher.update(b"=");
        hasher.update(v.as_bytes());
        hasher.update(b";");
    }
    hasher.update(b"\n");
}

fn hash_end_like(hasher: &mut Sha256, name: &str) {
    hasher.update(b"E:");
    hasher.update(name.as_bytes());
    hasher.update(b"\n");
}
