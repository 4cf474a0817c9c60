use std::path::PathBuf;

use thiserror::Error;

/// Template could not be turned into a document model. Always fatal.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("template not found: {}", .0.display())]
    TemplateMissing(PathBuf),

    #[error("read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a docx package: {0}")]
    NotAPackage(String),

    #[error("docx package has no part {0}")]
    MissingPart(String),

    #[error("malformed xml in {part}: {reason}")]
    MalformedXml { part: String, reason: String },
}

/// Missing or invalid configuration. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(
        "no API key found (checked secrets file {}, env var {env_var}, interactive input)",
        secrets_file.display()
    )]
    MissingCredential {
        secrets_file: PathBuf,
        env_var: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A single section request failed. Recovered per section.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("authentication rejected (HTTP {status})")]
    Authentication { status: u16 },

    #[error("quota exhausted (HTTP 429)")]
    Quota,

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// PDF export failed. Recovered with a warning; the docx is still delivered.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("no converter available for {0}")]
    Unavailable(String),

    #[error("all conversion strategies failed: {}", .0.join("; "))]
    AllStrategiesFailed(Vec<String>),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("assemble report: {0:#}")]
    Assembly(anyhow::Error),
}
