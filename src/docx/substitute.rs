//! Placeholder substitution over the run structure of a [`WordDocument`].
//!
//! Membership is decided on a paragraph's concatenated run text, so tokens that Word split
//! across several runs (spell-check marks, revision ids, partial formatting) are still found.
//! A token inside one run is rewritten in that run. A token spanning runs is collapsed into
//! the run holding its first character: that run receives the value and keeps its
//! formatting, and the token's remaining fragments are removed from the following runs.
//!
//! The scan is left to right and never revisits inserted text, so a value that happens to
//! contain a placeholder is inserted verbatim. Newlines in values stay literal `\n`
//! characters in the run text (see [`WordDocument::set_render_line_breaks`]).

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::docx::document::{Paragraph, Story, WordDocument};

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[A-Z][A-Z0-9_]*\}").expect("placeholder token"));

/// Placeholder token -> replacement value. Keys are unique; empty keys are ignored.
#[derive(Clone, Debug, Default)]
pub struct PlaceholderMap {
    entries: BTreeMap<String, String>,
}

impl PlaceholderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter(|(k, _)| !k.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PlaceholderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

#[derive(Clone, Debug, Default)]
pub struct SubstitutionReport {
    /// Replacements performed per key.
    pub replacements: BTreeMap<String, usize>,
    /// Replacements whose token spanned more than one run.
    pub cross_run: usize,
    /// Placeholder-like tokens with no entry in the map; left as they are.
    pub unresolved: BTreeSet<String>,
}

impl SubstitutionReport {
    pub fn total(&self) -> usize {
        self.replacements.values().sum()
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Hit {
    key: String,
    cross_run: bool,
}

/// Replaces every key of `map` in every story (body, table cells, headers, footers).
pub fn replace_placeholders(doc: &mut WordDocument, map: &PlaceholderMap) -> SubstitutionReport {
    let mut report = SubstitutionReport::default();
    for story in doc.stories_mut() {
        for para in story.all_paragraphs() {
            // tokens are collected from the template text, never from inserted values
            let text = story.paragraph_text(&para);
            for m in TOKEN_RE.find_iter(&text) {
                if !map.contains_key(m.as_str()) {
                    report.unresolved.insert(m.as_str().to_string());
                }
            }
            for hit in substitute_paragraph(story, &para, map) {
                *report.replacements.entry(hit.key).or_default() += 1;
                if hit.cross_run {
                    report.cross_run += 1;
                }
            }
        }
    }
    report
}

fn substitute_paragraph(story: &mut Story, para: &Paragraph, map: &PlaceholderMap) -> Vec<Hit> {
    if para.runs.is_empty() {
        return Vec::new();
    }
    let original: Vec<String> = para
        .runs
        .iter()
        .map(|r| story.run_text(r).to_string())
        .collect();
    let mut texts = original.clone();
    let hits = substitute_texts(&mut texts, map);
    if hits.is_empty() {
        return hits;
    }
    for ((run, new), old) in para.runs.iter().zip(&texts).zip(&original) {
        if new != old {
            story.set_run_text(run, new);
        }
    }
    hits
}

fn substitute_texts(texts: &mut [String], map: &PlaceholderMap) -> Vec<Hit> {
    let full = texts.concat();
    let keys: Vec<(&str, &str)> = map.iter().filter(|(k, _)| full.contains(*k)).collect();
    if keys.is_empty() {
        return Vec::new();
    }

    let mut hits = Vec::new();
    let mut cursor = 0usize;
    loop {
        let full = texts.concat();
        let Some((start, key, value)) = earliest_match(&full, cursor, &keys) else {
            break;
        };
        let end = start + key.len();
        let (si, s_base) = locate(texts, start);
        let (ei, e_base) = locate(texts, end - 1);
        let (so, eo) = (start - s_base, end - e_base);
        if si == ei {
            texts[si].replace_range(so..eo, value);
        } else {
            texts[si].truncate(so);
            texts[si].push_str(value);
            for t in &mut texts[si + 1..ei] {
                t.clear();
            }
            texts[ei].replace_range(..eo, "");
        }
        hits.push(Hit {
            key: key.to_string(),
            cross_run: si != ei,
        });
        cursor = start + value.len();
    }
    hits
}

/// Leftmost occurrence at or after `cursor`; the longest key wins a tie.
fn earliest_match<'k>(
    full: &str,
    cursor: usize,
    keys: &[(&'k str, &'k str)],
) -> Option<(usize, &'k str, &'k str)> {
    let rest = full.get(cursor..)?;
    let mut best: Option<(usize, &'k str, &'k str)> = None;
    for &(key, value) in keys {
        let Some(rel) = rest.find(key) else {
            continue;
        };
        let pos = cursor + rel;
        let better = match best {
            None => true,
            Some((bp, bk, _)) => pos < bp || (pos == bp && key.len() > bk.len()),
        };
        if better {
            best = Some((pos, key, value));
        }
    }
    best
}

/// Run holding byte `pos` of the concatenated text, with that run's starting offset.
fn locate(texts: &[String], pos: usize) -> (usize, usize) {
    let mut base = 0usize;
    for (i, t) in texts.iter().enumerate() {
        if pos < base + t.len() {
            return (i, base);
        }
        base += t.len();
    }
    (texts.len().saturating_sub(1), base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::testutil::{docx_bytes, docx_with_parts, wrap_body};
    use crate::docx::xml::write_events;

    fn texts(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn map(pairs: &[(&str, &str)]) -> PlaceholderMap {
        pairs.iter().copied().collect()
    }

    fn load(body: &str) -> WordDocument {
        WordDocument::from_bytes(&docx_bytes(&wrap_body(body))).expect("load")
    }

    fn body_xml(doc: &WordDocument) -> String {
        String::from_utf8(write_events(&doc.body().part().events).expect("write")).expect("utf8")
    }

    #[test]
    fn absent_key_leaves_runs_untouched() {
        let mut t = texts(&["Dept of ", "{DEPT"]);
        let hits = substitute_texts(&mut t, &map(&[("{YEAR}", "2025")]));
        assert!(hits.is_empty());
        assert_eq!(t, texts(&["Dept of ", "{DEPT"]));
    }

    #[test]
    fn replaces_every_occurrence_inside_one_run() {
        let mut t = texts(&["{YEAR} and {YEAR}", " / {YEAR}"]);
        let hits = substitute_texts(&mut t, &map(&[("{YEAR}", "2025 – 2026")]));
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| !h.cross_run));
        assert_eq!(t, texts(&["2025 – 2026 and 2025 – 2026", " / 2025 – 2026"]));
    }

    #[test]
    fn token_split_across_runs_leaves_no_fragment() {
        let mut t = texts(&["Title: {PROJ", "ECT_", "TI", "TLE} (final)"]);
        let hits = substitute_texts(&mut t, &map(&[("{PROJECT_TITLE}", "Library System")]));
        assert_eq!(
            hits,
            vec![Hit {
                key: "{PROJECT_TITLE}".to_string(),
                cross_run: true
            }]
        );
        assert_eq!(t, texts(&["Title: Library System", "", "", " (final)"]));
        let joined = t.concat();
        assert!(!joined.contains('{') && !joined.contains('}'));
    }

    #[test]
    fn inserted_values_are_not_rescanned() {
        let mut t = texts(&["{A}{B}"]);
        let hits = substitute_texts(&mut t, &map(&[("{A}", "<{B}>"), ("{B}", "b")]));
        assert_eq!(hits.len(), 2);
        assert_eq!(t, texts(&["<{B}>b"]));
    }

    #[test]
    fn longest_key_wins_at_same_position() {
        let mut t = texts(&["{PROFESSOR_NAME}, {PROFESSOR_DESIGNATION}"]);
        let m = map(&[
            ("{PROFESSOR_NAME}", "Prof. Syed Nooreain"),
            ("{PROFESSOR_DESIGNATION}", "Assistant Professor"),
            ("{PROF", "x"),
        ]);
        substitute_texts(&mut t, &m);
        assert_eq!(t, texts(&["Prof. Syed Nooreain, Assistant Professor"]));
    }

    #[test]
    fn project_title_twice_in_bold_run() {
        let mut doc = load(
            r#"<w:p><w:r><w:rPr><w:b/><w:i/></w:rPr><w:t>{PROJECT_TITLE} - {PROJECT_TITLE}</w:t></w:r></w:p>"#,
        );
        let report = replace_placeholders(
            &mut doc,
            &map(&[("{PROJECT_TITLE}", "MINI PROJECT (BCS586)")]),
        );
        assert_eq!(report.replacements.get("{PROJECT_TITLE}"), Some(&2));
        assert_eq!(doc.body_text(), "MINI PROJECT (BCS586) - MINI PROJECT (BCS586)");
        doc.verify_formatting_unchanged().expect("formatting unchanged");
        assert!(body_xml(&doc).contains("<w:rPr><w:b/><w:i/></w:rPr>"));
    }

    #[test]
    fn split_token_keeps_first_run_formatting() {
        let mut doc = load(
            r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>{COLLEGE</w:t></w:r><w:proofErr w:type="spellStart"/><w:r><w:rPr><w:i/></w:rPr><w:t>_NAME}</w:t></w:r></w:p>"#,
        );
        let report = replace_placeholders(&mut doc, &map(&[("{COLLEGE_NAME}", "AITM")]));
        assert_eq!(report.cross_run, 1);
        let body = doc.body();
        let para = &body.paragraphs()[0];
        assert_eq!(body.run_text(&para.runs[0]), "AITM");
        assert_eq!(body.run_text(&para.runs[1]), "");
        doc.verify_formatting_unchanged().expect("formatting unchanged");
    }

    #[test]
    fn replaces_in_every_table_cell() {
        let cell = |token: &str| format!("<w:tc><w:p><w:r><w:t>{token}</w:t></w:r></w:p></w:tc>");
        let body = format!(
            "<w:tbl><w:tr>{}{}</w:tr><w:tr>{}{}</w:tr></w:tbl>",
            cell("{COLLEGE_NAME}"),
            cell("{DEPARTMENT}"),
            cell("{YEAR}"),
            cell("{AFFILIATION}")
        );
        let mut doc = load(&body);
        let report = replace_placeholders(
            &mut doc,
            &map(&[
                ("{COLLEGE_NAME}", "College"),
                ("{DEPARTMENT}", "CSE"),
                ("{YEAR}", "2025"),
                ("{AFFILIATION}", "VTU"),
            ]),
        );
        assert_eq!(report.total(), 4);
        let table = &doc.tables()[0];
        let cells: Vec<String> = table
            .rows
            .iter()
            .flat_map(|r| r.cells.iter())
            .map(|c| doc.body().paragraph_text(&c.paragraphs[0]))
            .collect();
        assert_eq!(cells, vec!["College", "CSE", "2025", "VTU"]);
    }

    #[test]
    fn foreign_tokens_pass_through_and_are_reported() {
        let mut doc = load(r#"<w:p><w:r><w:t>{YEAR} {SIGNATURE}</w:t></w:r></w:p>"#);
        let report = replace_placeholders(&mut doc, &map(&[("{YEAR}", "2025")]));
        assert_eq!(doc.body_text(), "2025 {SIGNATURE}");
        assert!(report.unresolved.contains("{SIGNATURE}"));
    }

    #[test]
    fn braces_inside_values_are_not_reported() {
        let mut doc = load(r#"<w:p><w:r><w:t>{YEAR}</w:t></w:r></w:p><w:p><w:r><w:t>{GUIDE}</w:t></w:r></w:p>"#);
        let report = replace_placeholders(&mut doc, &map(&[("{YEAR}", "value with {OTHER}")]));
        assert_eq!(doc.body_text(), "value with {OTHER}\n{GUIDE}");
        assert!(!report.unresolved.contains("{OTHER}"));
        assert_eq!(report.unresolved.len(), 1);
        assert!(report.unresolved.contains("{GUIDE}"));
    }

    #[test]
    fn newline_values_stay_literal_in_run() {
        let mut doc = load(r#"<w:p><w:r><w:t>{STUDENTS}</w:t></w:r></w:p>"#);
        replace_placeholders(&mut doc, &map(&[("{STUDENTS}", "ARZISH\nNAJMA")]));
        let body = doc.body();
        assert_eq!(body.paragraphs()[0].runs.len(), 1);
        assert_eq!(body.run_text(&body.paragraphs()[0].runs[0]), "ARZISH\nNAJMA");
    }

    #[test]
    fn header_placeholders_are_replaced() {
        let header = r#"<?xml version="1.0"?><w:hdr xmlns:w="w"><w:p><w:r><w:t>{DEPARTMENT}</w:t></w:r></w:p></w:hdr>"#;
        let bytes = docx_with_parts(&wrap_body("<w:p/>"), &[("word/header1.xml", header)]);
        let mut doc = WordDocument::from_bytes(&bytes).expect("load");
        replace_placeholders(&mut doc, &map(&[("{DEPARTMENT}", "CSE")]));

        let reloaded = WordDocument::from_bytes(&doc.to_bytes().expect("bytes")).expect("reload");
        let hdr = &reloaded.stories()[1];
        assert_eq!(hdr.paragraph_text(&hdr.paragraphs()[0]), "CSE");
    }
}
