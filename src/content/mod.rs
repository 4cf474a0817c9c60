pub mod credentials;
pub mod gemini;
pub mod prompts;

use std::collections::HashMap;

use crate::error::GenerationError;

pub use credentials::{resolve_api_key, ApiKey, KeySource};
pub use gemini::{GeminiClient, GeminiConfig};

/// Report sections, in the order they are requested and appended.
pub const REPORT_SECTIONS: [&str; 9] = [
    "Abstract",
    "Introduction",
    "Problem Statement",
    "Proposed Solution",
    "Features",
    "Technologies Used",
    "System Requirements",
    "Conclusion",
    "References",
];

/// Produces prose for one report section.
pub trait SectionContentProvider {
    fn generate(&self, description: &str, section_name: &str) -> Result<String, GenerationError>;

    /// The prompt `generate` sends for this section, when the provider has one.
    fn prompt_for(&self, _description: &str, _section_name: &str) -> Option<String> {
        None
    }
}

impl<T: SectionContentProvider + ?Sized> SectionContentProvider for &T {
    fn generate(&self, description: &str, section_name: &str) -> Result<String, GenerationError> {
        (**self).generate(description, section_name)
    }
    fn prompt_for(&self, description: &str, section_name: &str) -> Option<String> {
        (**self).prompt_for(description, section_name)
    }
}

impl<T: SectionContentProvider + ?Sized> SectionContentProvider for Box<T> {
    fn generate(&self, description: &str, section_name: &str) -> Result<String, GenerationError> {
        (**self).generate(description, section_name)
    }
    fn prompt_for(&self, description: &str, section_name: &str) -> Option<String> {
        (**self).prompt_for(description, section_name)
    }
}

/// Section name -> generated text (or a failure marker).
#[derive(Clone, Debug, Default)]
pub struct GeneratedSections {
    contents: HashMap<String, String>,
    failed: Vec<String>,
}

impl GeneratedSections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, section: impl Into<String>, text: impl Into<String>) {
        self.contents.insert(section.into(), text.into());
    }

    /// Stores the visible failure marker for `section`.
    pub fn record_failure(&mut self, section: &str, err: &GenerationError) {
        self.contents
            .insert(section.to_string(), failure_marker(section, err));
        self.failed.push(section.to_string());
    }

    pub fn get(&self, section: &str) -> Option<&str> {
        self.contents.get(section).map(String::as_str)
    }

    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

pub fn failure_marker(section: &str, err: &GenerationError) -> String {
    format!("(⚠️ Failed to generate section '{section}': {err})")
}

/// Requests every section of `registry` in order, one call each. A failed section gets a
/// marker and the loop moves on. `observe` sees each outcome as it arrives.
pub fn generate_sections<P, F>(
    provider: &P,
    description: &str,
    registry: &[&str],
    mut observe: F,
) -> GeneratedSections
where
    P: SectionContentProvider + ?Sized,
    F: FnMut(usize, &str, &Result<String, GenerationError>),
{
    let mut out = GeneratedSections::new();
    for (i, section) in registry.iter().enumerate() {
        let result = provider.generate(description, section);
        observe(i, section, &result);
        match result {
            Ok(text) => out.insert(*section, text.trim()),
            Err(err) => out.record_failure(section, &err),
        }
    }
    out
}
