use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::export::ExportStrategy;

pub const CONFIG_FILENAME: &str = "report-generator.toml";
pub const CONFIG_ENV: &str = "REPORT_GENERATOR_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub report: ReportSection,
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub export: ExportSection,
    #[serde(default)]
    pub trace: TraceSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ReportSection {
    /// Template path, relative to the config file directory.
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    /// Write `\n` in substituted values as `<w:br/>`.
    #[serde(default)]
    pub render_line_breaks: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ProviderSection {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Name of the environment variable (and secrets-file key) holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub secrets_file: Option<String>,

    /// Section prompt file; `{{section_title}}` and `{{project_description}}` are filled in.
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ExportSection {
    #[serde(default)]
    pub pdf: Option<bool>,
    #[serde(default)]
    pub soffice: Option<String>,
    #[serde(default)]
    pub strategies: Option<Vec<ExportStrategy>>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TraceSection {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub dir: Option<String>,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

/// `p` as given when absolute, else joined onto `base`.
pub fn resolve_relative(base: &Path, p: &str) -> PathBuf {
    let p = PathBuf::from(p);
    if p.is_relative() {
        base.join(p)
    } else {
        p
    }
}
