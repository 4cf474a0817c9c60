use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use anyhow::Context;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::docx::xml::{find_attr, parse_xml_part};
use crate::error::LoadError;

pub const DEFAULT_MAIN_PART: &str = "word/document.xml";
const ROOT_RELS: &str = "_rels/.rels";
const OFFICE_DOCUMENT_REL: &str = "/officeDocument";

pub struct DocxPackage {
    pub entries: Vec<DocxEntry>,
}

pub struct DocxEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
}

impl DocxPackage {
    pub fn read(path: &Path) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| LoadError::NotAPackage(e.to_string()))?;
        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip
                .by_index(i)
                .map_err(|e| LoadError::NotAPackage(format!("zip entry {i}: {e}")))?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| LoadError::NotAPackage(format!("read {}: {e}", file.name())))?;
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    pub fn entry(&self, name: &str) -> Option<&DocxEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Name of the main document part, following the package relationship when present.
    pub fn main_part_name(&self) -> String {
        self.entry(ROOT_RELS)
            .and_then(|rels| office_document_target(&rels.data))
            .filter(|name| self.entry(name).is_some())
            .unwrap_or_else(|| DEFAULT_MAIN_PART.to_string())
    }

    /// Header and footer parts, in archive order.
    pub fn story_part_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.name.as_str())
            .filter(|n| {
                let lower = n.to_ascii_lowercase();
                (lower.starts_with("word/header") || lower.starts_with("word/footer"))
                    && lower.ends_with(".xml")
            })
            .map(str::to_string)
            .collect()
    }

    pub fn write_to<W: Write + Seek>(
        &self,
        writer: W,
        replacements: &HashMap<String, Vec<u8>>,
    ) -> anyhow::Result<W> {
        let mut zout = ZipWriter::new(writer);
        for ent in &self.entries {
            let data = replacements.get(&ent.name).unwrap_or(&ent.data);
            let mut opts = SimpleFileOptions::default()
                .compression_method(ent.compression)
                .last_modified_time(ent.last_modified);
            if let Some(mode) = ent.unix_mode {
                opts = opts.unix_permissions(mode);
            }
            if ent.is_dir || ent.name.ends_with('/') {
                zout.add_directory(&ent.name, opts)
                    .with_context(|| format!("add zip dir: {}", ent.name))?;
            } else {
                zout.start_file(&ent.name, opts)
                    .with_context(|| format!("start zip file: {}", ent.name))?;
                zout.write_all(data)
                    .with_context(|| format!("write zip file: {}", ent.name))?;
            }
        }
        zout.finish().context("finish zip")
    }

    pub fn to_bytes(&self, replacements: &HashMap<String, Vec<u8>>) -> anyhow::Result<Vec<u8>> {
        let cursor = self.write_to(Cursor::new(Vec::new()), replacements)?;
        Ok(cursor.into_inner())
    }
}

fn office_document_target(rels_xml: &[u8]) -> Option<String> {
    let part = parse_xml_part(ROOT_RELS, rels_xml).ok()?;
    part.events
        .iter()
        .filter(|ev| ev.name() == Some("Relationship"))
        .find(|ev| {
            find_attr(ev.attrs(), "Type").is_some_and(|t| t.ends_with(OFFICE_DOCUMENT_REL))
        })
        .and_then(|ev| find_attr(ev.attrs(), "Target"))
        .map(|target| target.trim_start_matches('/').to_string())
}
