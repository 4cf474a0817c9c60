//! In-memory model of a WordprocessingML document.
//!
//! Every story part (main body, headers, footers) is kept as a lossless [`XmlPart`] event
//! list plus an index of its paragraphs, tables and text runs. Text is edited in place
//! through the index, so run properties and every other element are written back exactly
//! as they were read.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;

use crate::docx::package::DocxPackage;
use crate::docx::xml::{
    element_ends, find_attr, parse_xml_part, set_attr_value, verify_structure_unchanged,
    write_events, XmlEvent, XmlPart,
};
use crate::error::LoadError;

const STYLES_PART: &str = "word/styles.xml";
const STORY_ROOTS: [&str; 3] = ["w:body", "w:hdr", "w:ftr"];

/// Containers whose runs still belong to the enclosing paragraph.
const TRANSPARENT_WRAPPERS: [&str; 3] = ["w:sdt", "w:sdtContent", "w:customXml"];

/// Paragraph children that never contribute visible run text.
const SKIPPED_IN_PARAGRAPH: [&str; 6] = [
    "w:pPr",
    "w:del",
    "w:moveFrom",
    "w:sdtPr",
    "w:sdtEndPr",
    "w:p",
];

/// One `<w:t>` node. Several text runs may share a `<w:r>` (and its formatting) when the
/// run interleaves text with `<w:br/>` or `<w:tab/>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextRun {
    pub run_start: usize,
    pub text_start: usize,
    pub text_event: usize,
}

#[derive(Clone, Debug)]
pub struct Paragraph {
    pub start: usize,
    pub end: usize,
    pub runs: Vec<TextRun>,
}

#[derive(Clone, Debug, Default)]
pub struct Cell {
    pub paragraphs: Vec<Paragraph>,
    pub tables: Vec<Table>,
}

#[derive(Clone, Debug, Default)]
pub struct Row {
    pub cells: Vec<Cell>,
}

#[derive(Clone, Debug, Default)]
pub struct Table {
    pub rows: Vec<Row>,
}

impl Table {
    fn collect_paragraphs(&self, out: &mut Vec<Paragraph>) {
        for cell in self.rows.iter().flat_map(|r| r.cells.iter()) {
            out.extend(cell.paragraphs.iter().cloned());
            for nested in &cell.tables {
                nested.collect_paragraphs(out);
            }
        }
    }
}

/// A part holding document text: the main body, a header, or a footer.
pub struct Story {
    part: XmlPart,
    paragraphs: Vec<Paragraph>,
    tables: Vec<Table>,
    dirty: bool,
}

impl Story {
    fn from_part(mut part: XmlPart) -> Option<Self> {
        part.events = normalize_text_nodes(&part.events);
        part.rebaseline();
        let mut story = Self {
            part,
            paragraphs: Vec::new(),
            tables: Vec::new(),
            dirty: false,
        };
        story.root()?;
        story.reindex();
        Some(story)
    }

    pub fn name(&self) -> &str {
        &self.part.name
    }

    pub fn part(&self) -> &XmlPart {
        &self.part
    }

    /// Top-level paragraphs in document order.
    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    /// Top-level tables in document order.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Free-standing paragraphs followed by every table-cell paragraph (nested tables
    /// included).
    pub fn all_paragraphs(&self) -> Vec<Paragraph> {
        let mut out = self.paragraphs.clone();
        for table in &self.tables {
            table.collect_paragraphs(&mut out);
        }
        out
    }

    pub fn run_text(&self, run: &TextRun) -> &str {
        match self.part.events.get(run.text_event) {
            Some(XmlEvent::Text { text }) => text,
            _ => "",
        }
    }

    pub fn paragraph_text(&self, para: &Paragraph) -> String {
        para.runs.iter().map(|r| self.run_text(r)).collect()
    }

    /// Rewrites a run's text. Run properties are untouched; `xml:space="preserve"` is added
    /// when the new text would otherwise lose leading or trailing whitespace.
    pub fn set_run_text(&mut self, run: &TextRun, text: &str) {
        if let Some(XmlEvent::Text { text: slot }) = self.part.events.get_mut(run.text_event) {
            if slot.as_str() == text {
                return;
            }
            *slot = text.to_string();
        } else {
            return;
        }
        if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
            if let Some(ev) = self.part.events.get_mut(run.text_start) {
                set_attr_value(ev, "xml:space", "preserve");
            }
        }
        self.dirty = true;
    }

    fn root(&self) -> Option<usize> {
        self.part
            .events
            .iter()
            .position(|ev| STORY_ROOTS.iter().any(|r| ev.is_start(r)))
    }

    fn reindex(&mut self) {
        let events = &self.part.events;
        let ends = element_ends(events);
        let mut paragraphs = Vec::new();
        let mut tables = Vec::new();
        if let Some(root) = self.root() {
            index_blocks(events, &ends, root + 1, ends[root], &mut paragraphs, &mut tables);
        }
        self.paragraphs = paragraphs;
        self.tables = tables;
    }

    /// Where appended blocks go: before a trailing `w:sectPr`, else before the root closes.
    fn append_point(&self) -> Option<usize> {
        let root = self.root()?;
        let events = &self.part.events;
        let ends = element_ends(events);
        let end = ends[root];
        let mut last_child: Option<usize> = None;
        let mut i = root + 1;
        while i < end {
            match &events[i] {
                XmlEvent::Start { .. } | XmlEvent::Empty { .. } => {
                    last_child = Some(i);
                    i = ends[i] + 1;
                }
                _ => i += 1,
            }
        }
        match last_child {
            Some(c) if events[c].name() == Some("w:sectPr") => Some(c),
            _ => Some(end),
        }
    }

    fn append_block(&mut self, block: Vec<XmlEvent>) {
        let Some(at) = self.append_point() else {
            return;
        };
        self.part.events.splice(at..at, block);
        self.dirty = true;
        self.reindex();
    }
}

pub struct WordDocument {
    package: DocxPackage,
    stories: Vec<Story>,
    styles: Option<XmlPart>,
    styles_dirty: bool,
    render_line_breaks: bool,
}

impl WordDocument {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        if !path.is_file() {
            return Err(LoadError::TemplateMissing(path.to_path_buf()));
        }
        Self::from_package(DocxPackage::read(path)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        Self::from_package(DocxPackage::from_bytes(bytes)?)
    }

    fn from_package(package: DocxPackage) -> Result<Self, LoadError> {
        let main_name = package.main_part_name();
        let main = load_part(&package, &main_name)?
            .ok_or_else(|| LoadError::MissingPart(main_name.clone()))?;
        let body = Story::from_part(main).ok_or_else(|| LoadError::MalformedXml {
            part: main_name.clone(),
            reason: "no w:body element".to_string(),
        })?;

        let mut stories = vec![body];
        for name in package.story_part_names() {
            if let Some(story) = load_part(&package, &name)?.and_then(Story::from_part) {
                stories.push(story);
            }
        }
        let styles = load_part(&package, STYLES_PART)?;

        Ok(Self {
            package,
            stories,
            styles,
            styles_dirty: false,
            render_line_breaks: false,
        })
    }

    /// Serialize `\n` inside run text as `<w:br/>` instead of a literal newline.
    pub fn set_render_line_breaks(&mut self, enabled: bool) {
        self.render_line_breaks = enabled;
    }

    pub fn body(&self) -> &Story {
        &self.stories[0]
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        self.body().paragraphs()
    }

    pub fn tables(&self) -> &[Table] {
        self.body().tables()
    }

    /// Body first, then headers and footers.
    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn stories_mut(&mut self) -> &mut [Story] {
        &mut self.stories
    }

    /// Body text in document order, one line per paragraph.
    pub fn body_text(&self) -> String {
        let body = self.body();
        let mut paras = body.all_paragraphs();
        paras.sort_by_key(|p| p.start);
        paras
            .iter()
            .map(|p| body.paragraph_text(p))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Fails if anything other than run text changed since load.
    pub fn verify_formatting_unchanged(&self) -> anyhow::Result<()> {
        for story in &self.stories {
            verify_structure_unchanged(&story.part)?;
        }
        Ok(())
    }

    pub fn add_page_break(&mut self) {
        let block = vec![
            XmlEvent::start("w:p", &[]),
            XmlEvent::start("w:r", &[]),
            XmlEvent::empty("w:br", &[("w:type", "page")]),
            XmlEvent::end("w:r"),
            XmlEvent::end("w:p"),
        ];
        self.stories[0].append_block(block);
    }

    pub fn add_heading(&mut self, text: &str, level: u8) {
        let level = level.clamp(1, 9);
        let style_id = self.heading_style_id(level);
        let outline = (level - 1).to_string();
        let mut block = vec![
            XmlEvent::start("w:p", &[]),
            XmlEvent::start("w:pPr", &[]),
            XmlEvent::empty("w:pStyle", &[("w:val", style_id.as_str())]),
            XmlEvent::empty("w:outlineLvl", &[("w:val", outline.as_str())]),
            XmlEvent::end("w:pPr"),
        ];
        block.extend(run_events(text));
        block.push(XmlEvent::end("w:p"));
        self.stories[0].append_block(block);
    }

    /// Appends a body paragraph; newlines in `text` become line breaks within it.
    pub fn add_paragraph(&mut self, text: &str) {
        let mut block = vec![XmlEvent::start("w:p", &[])];
        if !text.is_empty() {
            block.extend(run_events(text));
        }
        block.push(XmlEvent::end("w:p"));
        self.stories[0].append_block(block);
    }

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let mut replacements: HashMap<String, Vec<u8>> = HashMap::new();
        for story in self.stories.iter().filter(|s| s.dirty) {
            let bytes = if self.render_line_breaks {
                write_events(&expand_line_breaks(&story.part.events))
            } else {
                write_events(&story.part.events)
            }
            .with_context(|| format!("serialize xml: {}", story.part.name))?;
            replacements.insert(story.part.name.clone(), bytes);
        }
        if let (true, Some(styles)) = (self.styles_dirty, self.styles.as_ref()) {
            let bytes = write_events(&styles.events).context("serialize styles")?;
            replacements.insert(styles.name.clone(), bytes);
        }
        self.package.to_bytes(&replacements)
    }

    /// Style id of the paragraph style named `heading N`, defining it when the template
    /// does not.
    fn heading_style_id(&mut self, level: u8) -> String {
        let fallback = format!("Heading{level}");
        let Some(styles) = self.styles.as_mut() else {
            return fallback;
        };
        let wanted = format!("heading {level}");
        if let Some(id) = find_paragraph_style(&styles.events, |_, name| {
            name.eq_ignore_ascii_case(&wanted)
        }) {
            return id;
        }
        if let Some(id) = find_paragraph_style(&styles.events, |id, _| id == fallback) {
            return id;
        }
        let Some(at) = styles.events.iter().rposition(|ev| ev.is_end("w:styles")) else {
            return fallback;
        };
        styles
            .events
            .splice(at..at, heading_style_events(&fallback, &wanted, level));
        self.styles_dirty = true;
        fallback
    }
}

fn load_part(package: &DocxPackage, name: &str) -> Result<Option<XmlPart>, LoadError> {
    let Some(entry) = package.entry(name) else {
        return Ok(None);
    };
    parse_xml_part(name, &entry.data)
        .map(Some)
        .map_err(|e| LoadError::MalformedXml {
            part: name.to_string(),
            reason: format!("{e:#}"),
        })
}

/// Gives every `<w:t>` exactly one text event so runs can be edited in place.
fn normalize_text_nodes(events: &[XmlEvent]) -> Vec<XmlEvent> {
    let mut out = Vec::with_capacity(events.len());
    let mut i = 0usize;
    while i < events.len() {
        match &events[i] {
            XmlEvent::Empty { name, attrs } if name == "w:t" => {
                out.push(XmlEvent::Start {
                    name: name.clone(),
                    attrs: attrs.clone(),
                });
                out.push(XmlEvent::text(""));
                out.push(XmlEvent::end("w:t"));
                i += 1;
            }
            XmlEvent::Start { name, .. } if name == "w:t" => {
                out.push(events[i].clone());
                let mut text = String::new();
                let mut j = i + 1;
                while let Some(XmlEvent::Text { text: t } | XmlEvent::CData { text: t }) =
                    events.get(j)
                {
                    text.push_str(t);
                    j += 1;
                }
                out.push(XmlEvent::Text { text });
                i = j;
            }
            _ => {
                out.push(events[i].clone());
                i += 1;
            }
        }
    }
    out
}

fn index_blocks(
    events: &[XmlEvent],
    ends: &[usize],
    from: usize,
    to: usize,
    paragraphs: &mut Vec<Paragraph>,
    tables: &mut Vec<Table>,
) {
    let mut i = from;
    while i < to {
        match &events[i] {
            XmlEvent::Start { name, .. } => match name.as_str() {
                "w:p" => {
                    paragraphs.push(index_paragraph(events, ends, i));
                    i = ends[i] + 1;
                }
                "w:tbl" => {
                    tables.push(index_table(events, ends, i));
                    i = ends[i] + 1;
                }
                n if TRANSPARENT_WRAPPERS.contains(&n) => i += 1,
                _ => i = ends[i] + 1,
            },
            XmlEvent::Empty { name, .. } if name == "w:p" => {
                paragraphs.push(Paragraph {
                    start: i,
                    end: i,
                    runs: Vec::new(),
                });
                i += 1;
            }
            _ => i += 1,
        }
    }
}

fn index_paragraph(events: &[XmlEvent], ends: &[usize], start: usize) -> Paragraph {
    let end = ends[start];
    let mut runs = Vec::new();
    let mut i = start + 1;
    while i < end {
        match &events[i] {
            XmlEvent::Start { name, .. } if name == "w:r" => {
                index_run(events, ends, i, &mut runs);
                i = ends[i] + 1;
            }
            XmlEvent::Start { name, .. } if SKIPPED_IN_PARAGRAPH.contains(&name.as_str()) => {
                i = ends[i] + 1;
            }
            // hyperlinks, insertions, smart tags, simple fields, content controls
            _ => i += 1,
        }
    }
    Paragraph { start, end, runs }
}

fn index_run(events: &[XmlEvent], ends: &[usize], run_start: usize, runs: &mut Vec<TextRun>) {
    let end = ends[run_start];
    let mut i = run_start + 1;
    while i < end {
        if events[i].is_start("w:t") && matches!(events.get(i + 1), Some(XmlEvent::Text { .. })) {
            runs.push(TextRun {
                run_start,
                text_start: i,
                text_event: i + 1,
            });
        }
        i = ends[i] + 1;
    }
}

fn index_table(events: &[XmlEvent], ends: &[usize], start: usize) -> Table {
    let rows = children_named(events, ends, start, "w:tr")
        .into_iter()
        .map(|tr| Row {
            cells: children_named(events, ends, tr, "w:tc")
                .into_iter()
                .map(|tc| {
                    let mut cell = Cell::default();
                    index_blocks(
                        events,
                        ends,
                        tc + 1,
                        ends[tc],
                        &mut cell.paragraphs,
                        &mut cell.tables,
                    );
                    cell
                })
                .collect(),
        })
        .collect();
    Table { rows }
}

fn children_named(events: &[XmlEvent], ends: &[usize], parent: usize, tag: &str) -> Vec<usize> {
    let end = ends[parent];
    let mut out = Vec::new();
    let mut i = parent + 1;
    while i < end {
        match &events[i] {
            XmlEvent::Start { name, .. } if name == tag => {
                out.push(i);
                i = ends[i] + 1;
            }
            XmlEvent::Start { name, .. } if TRANSPARENT_WRAPPERS.contains(&name.as_str()) => {
                i += 1;
            }
            XmlEvent::Start { .. } => i = ends[i] + 1,
            _ => i += 1,
        }
    }
    out
}

/// `<w:r>` carrying `text`, with `\n` as `<w:br/>` and `\t` as `<w:tab/>`.
fn run_events(text: &str) -> Vec<XmlEvent> {
    let mut out = vec![XmlEvent::start("w:r", &[])];
    for (li, line) in text.split('\n').enumerate() {
        if li > 0 {
            out.push(XmlEvent::empty("w:br", &[]));
        }
        for (ti, chunk) in line.trim_end_matches('\r').split('\t').enumerate() {
            if ti > 0 {
                out.push(XmlEvent::empty("w:tab", &[]));
            }
            if chunk.is_empty() {
                continue;
            }
            out.push(XmlEvent::start("w:t", &[("xml:space", "preserve")]));
            out.push(XmlEvent::text(chunk));
            out.push(XmlEvent::end("w:t"));
        }
    }
    out.push(XmlEvent::end("w:r"));
    out
}

fn expand_line_breaks(events: &[XmlEvent]) -> Vec<XmlEvent> {
    let mut out = Vec::with_capacity(events.len());
    // index in `out` of the open w:t start
    let mut open_t: Option<usize> = None;
    for ev in events {
        match ev {
            XmlEvent::Start { name, .. } if name == "w:t" => {
                open_t = Some(out.len());
                out.push(ev.clone());
            }
            XmlEvent::End { name } if name == "w:t" => {
                open_t = None;
                out.push(ev.clone());
            }
            XmlEvent::Text { text } if open_t.is_some() && text.contains('\n') => {
                if let Some(start) = open_t {
                    set_attr_value(&mut out[start], "xml:space", "preserve");
                }
                for (k, line) in text.split('\n').enumerate() {
                    if k > 0 {
                        out.push(XmlEvent::end("w:t"));
                        out.push(XmlEvent::empty("w:br", &[]));
                        out.push(XmlEvent::start("w:t", &[("xml:space", "preserve")]));
                    }
                    out.push(XmlEvent::text(line.trim_end_matches('\r')));
                }
            }
            _ => out.push(ev.clone()),
        }
    }
    out
}

fn find_paragraph_style(
    events: &[XmlEvent],
    matches: impl Fn(&str, &str) -> bool,
) -> Option<String> {
    let ends = element_ends(events);
    for (i, ev) in events.iter().enumerate() {
        let XmlEvent::Start { name, attrs } = ev else {
            continue;
        };
        if name != "w:style" || find_attr(attrs, "w:type") != Some("paragraph") {
            continue;
        }
        let Some(id) = find_attr(attrs, "w:styleId") else {
            continue;
        };
        let style_name = events[i + 1..ends[i]]
            .iter()
            .find(|e| e.name() == Some("w:name"))
            .and_then(|e| find_attr(e.attrs(), "w:val"))
            .unwrap_or("");
        if matches(id, style_name) {
            return Some(id.to_string());
        }
    }
    None
}

fn heading_style_events(id: &str, name: &str, level: u8) -> Vec<XmlEvent> {
    let outline = (level - 1).to_string();
    let size = match level {
        1 => "32",
        2 => "28",
        _ => "26",
    };
    vec![
        XmlEvent::start("w:style", &[("w:type", "paragraph"), ("w:styleId", id)]),
        XmlEvent::empty("w:name", &[("w:val", name)]),
        XmlEvent::empty("w:next", &[("w:val", "Normal")]),
        XmlEvent::empty("w:uiPriority", &[("w:val", "9")]),
        XmlEvent::empty("w:qFormat", &[]),
        XmlEvent::start("w:pPr", &[]),
        XmlEvent::empty("w:keepNext", &[]),
        XmlEvent::empty("w:spacing", &[("w:before", "240"), ("w:after", "120")]),
        XmlEvent::empty("w:outlineLvl", &[("w:val", outline.as_str())]),
        XmlEvent::end("w:pPr"),
        XmlEvent::start("w:rPr", &[]),
        XmlEvent::empty("w:b", &[]),
        XmlEvent::empty("w:sz", &[("w:val", size)]),
        XmlEvent::end("w:rPr"),
        XmlEvent::end("w:style"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::testutil::{docx_bytes, docx_with_parts, wrap_body};

    #[test]
    fn indexes_paragraphs_runs_and_tables() {
        let body = r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Hello </w:t></w:r><w:hyperlink r:id="rId9"><w:r><w:t>world</w:t></w:r></w:hyperlink></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>a</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>b</w:t></w:r></w:p><w:tbl><w:tr><w:tc><w:p><w:r><w:t>nested</w:t></w:r></w:p></w:tc></w:tr></w:tbl></w:tc></w:tr></w:tbl>"#;
        let doc = WordDocument::from_bytes(&docx_bytes(&wrap_body(body))).expect("load");

        assert_eq!(doc.paragraphs().len(), 1);
        assert_eq!(doc.body().paragraph_text(&doc.paragraphs()[0]), "Hello world");
        assert_eq!(doc.paragraphs()[0].runs.len(), 2);

        assert_eq!(doc.tables().len(), 1);
        let row = &doc.tables()[0].rows[0];
        assert_eq!(row.cells.len(), 2);
        assert_eq!(row.cells[1].tables.len(), 1);

        let texts: Vec<String> = doc
            .body()
            .all_paragraphs()
            .iter()
            .map(|p| doc.body().paragraph_text(p))
            .collect();
        assert_eq!(texts, vec!["Hello world", "a", "b", "nested"]);
    }

    #[test]
    fn deleted_text_and_multi_text_runs() {
        let body = r#"<w:p><w:del w:id="1"><w:r><w:delText>gone</w:delText></w:r></w:del><w:r><w:t>one</w:t><w:br/><w:t/></w:r></w:p>"#;
        let doc = WordDocument::from_bytes(&docx_bytes(&wrap_body(body))).expect("load");
        let para = &doc.paragraphs()[0];
        assert_eq!(para.runs.len(), 2);
        assert_eq!(para.runs[0].run_start, para.runs[1].run_start);
        assert_eq!(doc.body().paragraph_text(para), "one");
    }

    #[test]
    fn set_run_text_keeps_formatting_and_round_trips() {
        let body = r#"<w:p><w:r><w:rPr><w:i/></w:rPr><w:t>old</w:t></w:r></w:p>"#;
        let mut doc = WordDocument::from_bytes(&docx_bytes(&wrap_body(body))).expect("load");
        let run = doc.paragraphs()[0].runs[0].clone();
        doc.stories_mut()[0].set_run_text(&run, " new & <improved> ");
        doc.verify_formatting_unchanged().expect("formatting");

        let reloaded = WordDocument::from_bytes(&doc.to_bytes().expect("bytes")).expect("reload");
        assert_eq!(reloaded.body_text(), " new & <improved> ");
        let xml = String::from_utf8(write_events(&reloaded.body().part().events).unwrap()).unwrap();
        assert!(xml.contains("<w:i/>"));
        assert!(xml.contains(r#"<w:t xml:space="preserve">"#));
    }

    #[test]
    fn appends_before_section_properties() {
        let body = r#"<w:p><w:r><w:t>cover</w:t></w:r></w:p><w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr>"#;
        let mut doc = WordDocument::from_bytes(&docx_bytes(&wrap_body(body))).expect("load");
        doc.add_page_break();
        doc.add_heading("Abstract", 1);
        doc.add_paragraph("line one\nline two");

        let events = &doc.body().part().events;
        let sect = events.iter().position(|e| e.is_start("w:sectPr")).unwrap();
        let last_p = events.iter().rposition(|e| e.is_end("w:p")).unwrap();
        assert!(last_p < sect);
        assert_eq!(doc.paragraphs().len(), 4);
        assert_eq!(doc.body_text(), "cover\n\nAbstract\nline oneline two");
        assert!(events
            .iter()
            .any(|e| e.name() == Some("w:br") && find_attr(e.attrs(), "w:type") == Some("page")));
    }

    #[test]
    fn heading_style_reused_or_injected() {
        let styles = r#"<?xml version="1.0"?><w:styles xmlns:w="w"><w:style w:type="paragraph" w:styleId="Titre1"><w:name w:val="heading 1"/></w:style></w:styles>"#;
        let bytes = docx_with_parts(&wrap_body("<w:p/>"), &[("word/styles.xml", styles)]);
        let mut doc = WordDocument::from_bytes(&bytes).expect("load");
        doc.add_heading("Intro", 1);
        let events = &doc.body().part().events;
        assert!(events
            .iter()
            .any(|e| e.name() == Some("w:pStyle") && find_attr(e.attrs(), "w:val") == Some("Titre1")));
        assert!(!doc.styles_dirty);

        doc.add_heading("Sub", 2);
        assert!(doc.styles_dirty);
        let styles = doc.styles.as_ref().unwrap();
        assert!(find_paragraph_style(&styles.events, |id, _| id == "Heading2").is_some());
    }

    #[test]
    fn header_story_is_indexed() {
        let header = r#"<?xml version="1.0"?><w:hdr xmlns:w="w"><w:p><w:r><w:t>{COLLEGE_NAME}</w:t></w:r></w:p></w:hdr>"#;
        let bytes = docx_with_parts(&wrap_body("<w:p/>"), &[("word/header1.xml", header)]);
        let doc = WordDocument::from_bytes(&bytes).expect("load");
        assert_eq!(doc.stories().len(), 2);
        let hdr = &doc.stories()[1];
        assert_eq!(hdr.name(), "word/header1.xml");
        assert_eq!(hdr.paragraph_text(&hdr.paragraphs()[0]), "{COLLEGE_NAME}");
    }

    #[test]
    fn line_breaks_rendered_when_enabled() {
        let body = r#"<w:p><w:r><w:t>x</w:t></w:r></w:p>"#;
        let mut doc = WordDocument::from_bytes(&docx_bytes(&wrap_body(body))).expect("load");
        let run = doc.paragraphs()[0].runs[0].clone();
        doc.stories_mut()[0].set_run_text(&run, "A\nB");
        doc.set_render_line_breaks(true);
        let reloaded = WordDocument::from_bytes(&doc.to_bytes().unwrap()).unwrap();
        let para = &reloaded.paragraphs()[0];
        assert_eq!(para.runs.len(), 2);
        assert_eq!(reloaded.body_text(), "AB");
    }

    #[test]
    fn split_line_keeps_trailing_space_of_first_segment() {
        let body = r#"<w:p><w:r><w:t>{NAME}</w:t></w:r></w:p>"#;
        let mut doc = WordDocument::from_bytes(&docx_bytes(&wrap_body(body))).expect("load");
        let run = doc.paragraphs()[0].runs[0].clone();
        doc.stories_mut()[0].set_run_text(&run, "Name: A \nB");
        doc.set_render_line_breaks(true);
        let bytes = doc.to_bytes().unwrap();

        let pkg = DocxPackage::from_bytes(&bytes).unwrap();
        let xml = String::from_utf8(pkg.entry("word/document.xml").unwrap().data.clone()).unwrap();
        assert!(xml.contains(
            r#"<w:t xml:space="preserve">Name: A </w:t><w:br/><w:t xml:space="preserve">B</w:t>"#
        ));
        let reloaded = WordDocument::from_bytes(&bytes).unwrap();
        assert_eq!(reloaded.body_text(), "Name: A B");
    }

    #[test]
    fn missing_main_part_is_load_error() {
        let mut pkg = DocxPackage::from_bytes(&docx_bytes(&wrap_body("<w:p/>"))).unwrap();
        pkg.entries.retain(|e| e.name != "word/document.xml");
        let bytes = pkg.to_bytes(&HashMap::new()).unwrap();
        assert!(matches!(
            WordDocument::from_bytes(&bytes),
            Err(LoadError::MissingPart(_))
        ));
    }

    #[test]
    fn malformed_xml_is_load_error() {
        let bytes = docx_bytes("<w:document><w:body><w:p></w:body>");
        assert!(matches!(
            WordDocument::from_bytes(&bytes),
            Err(LoadError::MalformedXml { .. })
        ));
    }
}
