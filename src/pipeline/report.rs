use std::path::{Path, PathBuf};

use crate::content::{generate_sections, GeneratedSections, SectionContentProvider, REPORT_SECTIONS};
use crate::docx::assemble::assemble_report;
use crate::docx::{replace_placeholders, SubstitutionReport, WordDocument};
use crate::error::{LoadError, ReportError};
use crate::fields::ReportFields;
use crate::pipeline::trace::TraceWriter;
use crate::progress::ConsoleProgress;
use crate::textutil::{output_file_stem, preview};

#[derive(Clone, Debug)]
pub struct ReportRequest {
    pub fields: ReportFields,
    pub template: PathBuf,
    pub render_line_breaks: bool,
}

#[derive(Debug)]
pub struct ReportArtifacts {
    pub docx: Vec<u8>,
    pub file_stem: String,
    pub sections: GeneratedSections,
    pub substitution: SubstitutionReport,
}

pub fn check_template(path: &Path) -> Result<(), LoadError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(LoadError::TemplateMissing(path.to_path_buf()))
    }
}

pub struct ReportPipeline<'a, P: ?Sized> {
    provider: &'a P,
    progress: &'a ConsoleProgress,
    trace: &'a TraceWriter,
}

impl<'a, P: SectionContentProvider + ?Sized> ReportPipeline<'a, P> {
    pub fn new(provider: &'a P, progress: &'a ConsoleProgress, trace: &'a TraceWriter) -> Self {
        Self {
            provider,
            progress,
            trace,
        }
    }

    /// Fill the template, generate every section, append them, and serialize.
    pub fn run(&self, request: &ReportRequest) -> Result<ReportArtifacts, ReportError> {
        let (mut doc, substitution) = fill_template(request, self.progress)?;

        let total = REPORT_SECTIONS.len();
        self.progress
            .info(format!("generating {total} sections"));
        let description = request.fields.project_description.trim();
        let sections = generate_sections(
            self.provider,
            description,
            &REPORT_SECTIONS,
            |i, section, result| {
                let request = self
                    .provider
                    .prompt_for(description, section)
                    .unwrap_or_else(|| {
                        format!("section: {section}\ndescription: {description}\n")
                    });
                let _ = self.trace.write_section_text(i, section, "request", &request);
                match result {
                    Ok(text) => {
                        let _ = self.trace.write_section_text(i, section, "response", text);
                        self.progress
                            .info(format!("{section}: {}", preview(text, 60)));
                    }
                    Err(err) => {
                        let _ = self
                            .trace
                            .write_section_text(i, section, "error", &err.to_string());
                        self.progress.warn(format!("section {section} failed: {err}"));
                    }
                }
                self.progress.progress("sections", i + 1, total);
            },
        );
        if !sections.failed().is_empty() {
            self.progress.warn(format!(
                "{} of {total} sections failed: {}",
                sections.failed().len(),
                sections.failed().join(", ")
            ));
        }

        let docx =
            assemble_report(&mut doc, &sections, &REPORT_SECTIONS).map_err(ReportError::Assembly)?;
        self.progress
            .info(format!("assembled report ({} bytes)", docx.len()));

        Ok(ReportArtifacts {
            docx,
            file_stem: output_file_stem(&request.fields.project_title),
            sections,
            substitution,
        })
    }
}

/// Load and substitute only. No provider is involved.
pub fn fill_template_bytes(
    request: &ReportRequest,
    progress: &ConsoleProgress,
) -> Result<(Vec<u8>, SubstitutionReport), ReportError> {
    let (doc, report) = fill_template(request, progress)?;
    let bytes = doc.to_bytes().map_err(ReportError::Assembly)?;
    Ok((bytes, report))
}

fn fill_template(
    request: &ReportRequest,
    progress: &ConsoleProgress,
) -> Result<(WordDocument, SubstitutionReport), ReportError> {
    check_template(&request.template)?;
    let mut doc = WordDocument::load(&request.template)?;
    doc.set_render_line_breaks(request.render_line_breaks);
    progress.info(format!(
        "loaded template {} ({} stories)",
        request.template.display(),
        doc.stories().len()
    ));

    let map = request.fields.placeholder_map();
    let report = replace_placeholders(&mut doc, &map);
    progress.info(format!(
        "replaced {} placeholders ({} across runs)",
        report.total(),
        report.cross_run
    ));
    for key in map.iter().map(|(k, _)| k) {
        if !report.replacements.contains_key(key) {
            progress.info(format!("placeholder {key} not present in template"));
        }
    }
    if !report.unresolved.is_empty() {
        progress.warn(format!(
            "unknown placeholders left as-is: {}",
            report.unresolved.iter().cloned().collect::<Vec<_>>().join(", ")
        ));
    }

    doc.verify_formatting_unchanged()
        .map_err(ReportError::Assembly)?;
    Ok((doc, report))
}
