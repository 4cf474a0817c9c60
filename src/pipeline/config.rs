use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::config::{
    find_default_config, load_config, resolve_relative, AppConfig, CONFIG_ENV, CONFIG_FILENAME,
};
use crate::content::gemini::{GeminiConfig, DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::content::prompts::{default_prompt_files, load_section_prompt, DEFAULT_PROMPTS_DIR};
use crate::export::{ExportStrategy, PdfExporter, DEFAULT_SOFFICE};

pub const DEFAULT_TEMPLATE: &str = "template.docx";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_SECRETS_FILE: &str = "secrets.toml";
pub const DEFAULT_TRACE_DIR: &str = "_trace";

/// Command-line values that take precedence over the config file.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub model: Option<String>,
    pub pdf: bool,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub config_path: Option<PathBuf>,

    pub template: PathBuf,
    pub output_dir: PathBuf,
    pub render_line_breaks: bool,

    pub model: String,
    pub endpoint: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
    pub api_key_env: String,
    pub secrets_file: PathBuf,
    pub prompt_template: String,

    pub pdf: bool,
    pub soffice: PathBuf,
    pub strategies: Vec<ExportStrategy>,

    pub trace_enabled: bool,
    pub trace_dir: PathBuf,
}

impl PipelineConfig {
    pub fn from_overrides(overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let cfg_file = overrides
            .config_path
            .clone()
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(|| find_default_config(&cwd, CONFIG_FILENAME));

        let mut file_cfg = AppConfig::default();
        if let Some(p) = cfg_file.as_ref() {
            if p.exists() {
                file_cfg = load_config(p)?;
            } else if overrides.config_path.is_some() {
                anyhow::bail!("config file not found: {}", p.display());
            }
        }
        let base_dir = cfg_file
            .as_ref()
            .filter(|p| p.exists())
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| cwd.clone());

        Self::resolve(file_cfg, cfg_file, &base_dir, &cwd, overrides)
    }

    fn resolve(
        file_cfg: AppConfig,
        config_path: Option<PathBuf>,
        base_dir: &Path,
        cwd: &Path,
        overrides: ConfigOverrides,
    ) -> anyhow::Result<Self> {
        let AppConfig {
            report,
            provider,
            export,
            trace,
        } = file_cfg;

        let template = overrides.template.unwrap_or_else(|| {
            report
                .template
                .as_deref()
                .map(|t| resolve_relative(base_dir, t))
                .unwrap_or_else(|| cwd.join(DEFAULT_TEMPLATE))
        });
        let output_dir = overrides.output_dir.unwrap_or_else(|| {
            report
                .output_dir
                .as_deref()
                .map(|d| resolve_relative(base_dir, d))
                .unwrap_or_else(|| cwd.to_path_buf())
        });

        let prompt_template = load_section_prompt(base_dir, provider.prompt.as_deref())?;

        let trace_dir = trace
            .dir
            .as_deref()
            .map(|d| resolve_relative(base_dir, d))
            .unwrap_or_else(|| output_dir.join(DEFAULT_TRACE_DIR));

        Ok(Self {
            config_path: config_path.filter(|p| p.exists()),
            template,
            output_dir,
            render_line_breaks: report.render_line_breaks.unwrap_or(false),

            model: overrides
                .model
                .or(provider.model)
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            endpoint: provider
                .endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            temperature: provider.temperature.unwrap_or(0.2),
            max_output_tokens: provider.max_output_tokens.unwrap_or(800),
            timeout: Duration::from_secs(provider.timeout_secs.unwrap_or(120)),
            api_key_env: provider
                .api_key_env
                .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
            secrets_file: resolve_relative(
                &base_dir,
                provider
                    .secrets_file
                    .as_deref()
                    .unwrap_or(DEFAULT_SECRETS_FILE),
            ),
            prompt_template,

            pdf: overrides.pdf || export.pdf.unwrap_or(false),
            soffice: export
                .soffice
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOFFICE)),
            strategies: export
                .strategies
                .unwrap_or_else(|| vec![ExportStrategy::Desktop, ExportStrategy::Headless]),

            trace_enabled: trace.enabled.unwrap_or(false),
            trace_dir,
        })
    }

    pub fn gemini_config(&self, api_key: impl Into<String>) -> GeminiConfig {
        GeminiConfig {
            api_key: api_key.into(),
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            timeout: self.timeout,
            prompt_template: self.prompt_template.clone(),
        }
    }

    pub fn exporter(&self) -> PdfExporter {
        PdfExporter::new(self.strategies.clone(), self.soffice.clone())
    }
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);

    let prompts_dir = dir.join(DEFAULT_PROMPTS_DIR);
    std::fs::create_dir_all(&prompts_dir)
        .with_context(|| format!("create prompts dir: {}", prompts_dir.display()))?;

    for (fname, body) in default_prompt_files() {
        let p = prompts_dir.join(fname);
        if p.exists() && !force {
            continue;
        }
        std::fs::write(&p, body).with_context(|| format!("write prompt: {}", p.display()))?;
    }

    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }

    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r#"[report]
template = "template.docx"
output_dir = "."
# Write newlines in field values (e.g. the student list) as line breaks.
render_line_breaks = false

[provider]
model = "gemini-1.5-pro"
endpoint = "https://generativelanguage.googleapis.com/v1beta"
temperature = 0.2
max_output_tokens = 800
timeout_secs = 120
# The API key is read from secrets_file (key = api_key_env), then the environment.
api_key_env = "GEMINI_API_KEY"
secrets_file = "secrets.toml"
prompt = "prompts/section.txt"

[export]
pdf = false
soffice = "soffice"
# "desktop" = Microsoft Word (macOS/Windows), "headless" = LibreOffice.
strategies = ["desktop", "headless"]

[trace]
enabled = false
dir = "_trace"
"#;
