use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;

use report_generator::content::credentials::prompt_on_terminal;
use report_generator::content::{resolve_api_key, GeminiClient};
use report_generator::fields::ReportFields;
use report_generator::pipeline::{
    check_template, fill_template_bytes, init_default_config, ConfigOverrides, PipelineConfig,
    ReportPipeline, ReportRequest, TraceWriter,
};
use report_generator::progress::ConsoleProgress;
use report_generator::textutil::output_file_stem;

#[derive(Parser, Debug)]
#[command(name = "report-generator")]
#[command(about = "Fill a college report template and append Gemini-written sections", long_about = None)]
struct Args {
    /// Generate default config + prompt files, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write config/prompt files (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite existing config/prompt files when used with --init-config
    #[arg(long)]
    force: bool,

    /// Config file path (default: search for report-generator.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Template .docx with {PLACEHOLDER} tokens (default: template.docx)
    #[arg(short, long, value_name = "DOCX")]
    template: Option<PathBuf>,

    /// Directory for <project_title>.docx/.pdf (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Report fields TOML; flags below override it
    #[arg(long, value_name = "TOML")]
    fields: Option<PathBuf>,

    #[arg(long)]
    college_name: Option<String>,

    #[arg(long)]
    affiliation: Option<String>,

    #[arg(long)]
    department: Option<String>,

    /// Academic year, e.g. "2025 – 2026"
    #[arg(long)]
    year: Option<String>,

    /// Students, one per line
    #[arg(long)]
    students: Option<String>,

    #[arg(long)]
    project_title: Option<String>,

    /// Guide name
    #[arg(long)]
    professor_name: Option<String>,

    #[arg(long)]
    professor_designation: Option<String>,

    /// Short project description (1-3 sentences) given to the model
    #[arg(long)]
    description: Option<String>,

    /// Gemini model name (e.g. gemini-1.5-pro)
    #[arg(long)]
    model: Option<String>,

    /// Also produce a PDF (Microsoft Word or LibreOffice required)
    #[arg(long)]
    pdf: bool,

    /// Only fill the template; no sections, no API key needed
    #[arg(long)]
    dry_run: bool,

    /// Suppress progress output (warnings are still printed)
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn report_fields(&self) -> anyhow::Result<ReportFields> {
        let mut fields = match self.fields.as_ref() {
            Some(p) => ReportFields::load(p)?,
            None => ReportFields::default(),
        };
        let overrides = [
            (&self.college_name, &mut fields.college_name),
            (&self.affiliation, &mut fields.affiliation),
            (&self.department, &mut fields.department),
            (&self.year, &mut fields.year),
            (&self.students, &mut fields.students),
            (&self.project_title, &mut fields.project_title),
            (&self.professor_name, &mut fields.professor_name),
            (&self.professor_designation, &mut fields.professor_designation),
            (&self.description, &mut fields.project_description),
        ];
        for (flag, slot) in overrides {
            if let Some(v) = flag {
                *slot = v.clone();
            }
        }
        Ok(fields)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let progress = ConsoleProgress::new(!args.quiet);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let fields = args.report_fields()?;
    let cfg = PipelineConfig::from_overrides(ConfigOverrides {
        config_path: args.config.clone(),
        template: args.template.clone(),
        output_dir: args.output_dir.clone(),
        model: args.model.clone(),
        pdf: args.pdf,
    })
    .context("build config")?;
    if let Some(p) = cfg.config_path.as_ref() {
        progress.info(format!("config: {}", p.display()));
    }

    let request = ReportRequest {
        fields,
        template: cfg.template.clone(),
        render_line_breaks: cfg.render_line_breaks,
    };
    let stem = output_file_stem(&request.fields.project_title);

    if args.dry_run {
        let (bytes, _) = fill_template_bytes(&request, &progress)?;
        let out = write_artifact(&cfg.output_dir, &format!("{stem}.docx"), &bytes)?;
        progress.info(format!("wrote {}", out.display()));
        return Ok(());
    }

    // Fail on a missing template before asking for credentials.
    check_template(&cfg.template)?;
    let key = resolve_api_key(&cfg.secrets_file, &cfg.api_key_env, || {
        prompt_on_terminal(&cfg.api_key_env)
    })?;
    progress.info(format!("api key from {}", key.source));

    let client = GeminiClient::new(cfg.gemini_config(key.value)).context("gemini client")?;
    let trace = TraceWriter::new(cfg.trace_dir.clone(), cfg.trace_enabled)?;
    if cfg.trace_enabled {
        progress.info(format!("trace: {}", trace.dir().display()));
    }
    let artifacts = ReportPipeline::new(&client, &progress, &trace).run(&request)?;

    let docx_path = write_artifact(
        &cfg.output_dir,
        &format!("{}.docx", artifacts.file_stem),
        &artifacts.docx,
    )?;
    progress.info(format!("wrote {}", docx_path.display()));

    if cfg.pdf {
        match export_pdf(&cfg, &artifacts.file_stem, &artifacts.docx) {
            Ok(pdf) => progress.info(format!("wrote {}", pdf.display())),
            Err(e) => progress.warn(format!(
                "PDF export failed ({e:#}); export manually from {}",
                docx_path.display()
            )),
        }
    }
    Ok(())
}

fn write_artifact(dir: &Path, name: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create output dir: {}", dir.display()))?;
    let path = dir.join(name);
    std::fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

/// Converts in a scratch directory so converter side files never reach the output dir.
fn export_pdf(cfg: &PipelineConfig, stem: &str, docx: &[u8]) -> anyhow::Result<PathBuf> {
    let scratch = tempfile::TempDir::new().context("create temp dir")?;
    let src = write_artifact(scratch.path(), &format!("{stem}.docx"), docx)?;
    let pdf = cfg.exporter().convert(&src, scratch.path())?;
    let dest = cfg.output_dir.join(format!("{stem}.pdf"));
    std::fs::copy(&pdf, &dest)
        .with_context(|| format!("copy {} -> {}", pdf.display(), dest.display()))?;
    Ok(dest)
}
