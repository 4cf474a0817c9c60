use crate::content::GeneratedSections;

use super::WordDocument;

const SECTION_HEADING_LEVEL: u8 = 1;

pub fn missing_section_marker(section: &str) -> String {
    format!("(⚠️ Section '{section}' was not generated)")
}

/// Appends one page per registry entry after the substituted template: heading, body,
/// page break. Order follows `registry`, never the map.
pub fn append_sections(doc: &mut WordDocument, sections: &GeneratedSections, registry: &[&str]) {
    doc.add_page_break();
    for section in registry {
        doc.add_heading(section, SECTION_HEADING_LEVEL);
        match sections.get(section) {
            Some(text) => doc.add_paragraph(text),
            None => doc.add_paragraph(&missing_section_marker(section)),
        }
        doc.add_page_break();
    }
}

/// Appends the sections and serializes the finished document.
pub fn assemble_report(
    doc: &mut WordDocument,
    sections: &GeneratedSections,
    registry: &[&str],
) -> anyhow::Result<Vec<u8>> {
    append_sections(doc, sections, registry);
    doc.to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::testutil::{docx_bytes, wrap_body};

    fn template() -> WordDocument {
        let xml = wrap_body(
            r#"<w:p><w:r><w:t>Cover</w:t></w:r></w:p><w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr>"#,
        );
        WordDocument::from_bytes(&docx_bytes(&xml)).unwrap()
    }

    #[test]
    fn sections_follow_registry_order() {
        let registry = ["Abstract", "Introduction", "Conclusion"];
        let mut sections = GeneratedSections::new();
        for name in registry.iter().rev() {
            sections.insert(*name, format!("text for {name}"));
        }
        let mut doc = template();
        let bytes = assemble_report(&mut doc, &sections, &registry).unwrap();

        let reloaded = WordDocument::from_bytes(&bytes).unwrap();
        let text = reloaded.body_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Cover");
        let pos = |needle: &str| text.find(needle).unwrap();
        assert!(pos("Abstract") < pos("text for Abstract"));
        assert!(pos("text for Abstract") < pos("Introduction"));
        assert!(pos("text for Introduction") < pos("Conclusion"));
    }

    #[test]
    fn appended_blocks_stay_before_section_properties() {
        let mut sections = GeneratedSections::new();
        sections.insert("Abstract", "line one\nline two");
        let mut doc = template();
        let bytes = assemble_report(&mut doc, &sections, &["Abstract"]).unwrap();
        let xml = String::from_utf8(
            crate::docx::package::DocxPackage::from_bytes(&bytes)
                .unwrap()
                .entry("word/document.xml")
                .unwrap()
                .data
                .clone(),
        )
        .unwrap();

        let last_p = xml.rfind("</w:p>").unwrap();
        assert!(last_p < xml.find("<w:sectPr").unwrap());
        assert_eq!(xml.matches(r#"w:type="page""#).count(), 2);
        assert!(xml.contains("<w:br/>"));
    }

    #[test]
    fn absent_section_gets_visible_marker() {
        let mut doc = template();
        append_sections(&mut doc, &GeneratedSections::new(), &["References"]);
        assert!(doc
            .body_text()
            .contains("Section 'References' was not generated"));
    }
}
