mod config;
mod report;
mod trace;

pub use config::{init_default_config, ConfigOverrides, PipelineConfig};
pub use report::{
    check_template, fill_template_bytes, ReportArtifacts, ReportPipeline, ReportRequest,
};
pub use trace::TraceWriter;
