use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

pub const DEFAULT_PROMPTS_DIR: &str = "prompts";
pub const DEFAULT_SECTION_PROMPT: &str = "section.txt";

pub const DEFAULT_SECTION_PROMPT_TEXT: &str = r#"Create a well-structured, college-level '{{section_title}}' for a mini-project report.

Project description: {{project_description}}

Write the {{section_title}} in formal academic style: 1-2 paragraphs for an Abstract, 2-4 paragraphs for an Introduction, a concise list-like treatment for Features, Technologies Used and System Requirements, and numbered entries for References.
Return plain text only. Do not repeat the section title. Do not use Markdown.
"#;

pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (k, v) in vars {
        let pat = format!("{{{{{k}}}}}");
        out = out.replace(&pat, v);
    }
    out
}

pub fn render_section_prompt(template: &str, description: &str, section_title: &str) -> String {
    render_template(
        template,
        &[
            ("section_title", section_title),
            ("project_description", description),
        ],
    )
}

pub fn default_prompt_files() -> Vec<(&'static str, &'static str)> {
    vec![(DEFAULT_SECTION_PROMPT, DEFAULT_SECTION_PROMPT_TEXT)]
}

/// Resolves the section prompt. `configured` is relative to the config file's directory.
/// Without a configured path, the default prompt file is used if present, else the built-in.
pub fn load_section_prompt(config_dir: &Path, configured: Option<&str>) -> anyhow::Result<String> {
    let Some(rel) = configured else {
        let p = config_dir
            .join(DEFAULT_PROMPTS_DIR)
            .join(DEFAULT_SECTION_PROMPT);
        if p.is_file() {
            return std::fs::read_to_string(&p)
                .with_context(|| format!("read prompt: {}", p.display()));
        }
        return Ok(DEFAULT_SECTION_PROMPT_TEXT.to_string());
    };

    let mut p = PathBuf::from(rel);
    if p.is_relative() {
        p = config_dir.join(&p);
    }
    if !p.exists() {
        return Err(anyhow!(
            "prompt file not found: {} (run: report-generator --init-config)",
            p.display()
        ));
    }
    std::fs::read_to_string(&p).with_context(|| format!("read prompt: {}", p.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_both_variables_everywhere() {
        let out = render_section_prompt(DEFAULT_SECTION_PROMPT_TEXT, "A parking app", "Abstract");
        assert!(out.contains("college-level 'Abstract'"));
        assert!(out.contains("Write the Abstract in formal"));
        assert!(out.contains("Project description: A parking app"));
        assert!(!out.contains("{{"));
    }

    #[test]
    fn configured_prompt_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_section_prompt(dir.path(), Some("prompts/custom.txt")).is_err());

        std::fs::create_dir_all(dir.path().join("prompts")).unwrap();
        std::fs::write(dir.path().join("prompts/custom.txt"), "{{section_title}}!").unwrap();
        let text = load_section_prompt(dir.path(), Some("prompts/custom.txt")).unwrap();
        assert_eq!(text, "{{section_title}}!");
    }

    #[test]
    fn falls_back_to_builtin_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let text = load_section_prompt(dir.path(), None).unwrap();
        assert_eq!(text, DEFAULT_SECTION_PROMPT_TEXT);
    }
}
