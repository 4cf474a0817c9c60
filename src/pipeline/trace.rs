use std::path::{Path, PathBuf};

use anyhow::Context;

/// Optional dump of prompts and responses, one file per section and kind.
pub struct TraceWriter {
    dir: PathBuf,
    enabled: bool,
}

impl TraceWriter {
    pub fn new(dir: PathBuf, enabled: bool) -> anyhow::Result<Self> {
        if enabled {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create trace dir: {}", dir.display()))?;
        }
        Ok(Self { dir, enabled })
    }

    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_named_text(&self, name: &str, text: &str) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let path = self.dir.join(sanitize_filename(name));
        std::fs::write(&path, text).with_context(|| format!("write trace: {}", path.display()))?;
        Ok(())
    }

    /// `section_02_Problem_Statement.response.txt`
    pub fn write_section_text(
        &self,
        index: usize,
        section: &str,
        kind: &str,
        text: &str,
    ) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let name = format!("section_{index:02}_{}.{kind}.txt", section.replace(' ', "_"));
        self.write_named_text(&name, text)
    }
}

fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => out.push('_'),
            _ => out.push(ch),
        }
    }
    out
}
