pub mod assemble;
pub mod document;
pub mod package;
pub mod substitute;
pub mod xml;

pub use document::{Paragraph, Story, Table, TextRun, WordDocument};
pub use substitute::{replace_placeholders, PlaceholderMap, SubstitutionReport};

#[cfg(test)]
pub(crate) mod testutil {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

    const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

    pub fn wrap_body(inner: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{inner}</w:body></w:document>"#
        )
    }

    pub fn docx_bytes(document_xml: &str) -> Vec<u8> {
        docx_with_parts(document_xml, &[])
    }

    pub fn docx_with_parts(document_xml: &str, extra: &[(&str, &str)]) -> Vec<u8> {
        let mut parts: Vec<(&str, &str)> = vec![
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", ROOT_RELS),
            ("word/document.xml", document_xml),
        ];
        parts.extend_from_slice(extra);
        zip_parts(&parts)
    }

    /// A zip holding exactly `parts`, in order.
    pub fn zip_parts(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();
        for &(name, body) in parts {
            zout.start_file(name, opts).expect("start file");
            zout.write_all(body.as_bytes()).expect("write file");
        }
        zout.finish().expect("finish zip").into_inner()
    }
}
