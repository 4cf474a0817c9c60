use std::fmt;
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use crate::error::ConfigurationError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeySource {
    SecretsFile(PathBuf),
    Environment(String),
    Interactive,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::SecretsFile(p) => write!(f, "secrets file {}", p.display()),
            KeySource::Environment(var) => write!(f, "environment variable {var}"),
            KeySource::Interactive => f.write_str("interactive input"),
        }
    }
}

#[derive(Clone)]
pub struct ApiKey {
    pub value: String,
    pub source: KeySource,
}

// Never print the key itself.
impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Looks for the key in the secrets file, then the environment, then asks `interactive`.
/// The secrets file is a TOML table whose key name equals `key_name`.
pub fn resolve_api_key(
    secrets_file: &Path,
    key_name: &str,
    interactive: impl FnOnce() -> Option<String>,
) -> Result<ApiKey, ConfigurationError> {
    if let Some(value) = read_secrets_file(secrets_file, key_name)? {
        return Ok(ApiKey {
            value,
            source: KeySource::SecretsFile(secrets_file.to_path_buf()),
        });
    }
    if let Some(value) = std::env::var(key_name).ok().and_then(non_blank) {
        return Ok(ApiKey {
            value,
            source: KeySource::Environment(key_name.to_string()),
        });
    }
    if let Some(value) = interactive().and_then(non_blank) {
        return Ok(ApiKey {
            value,
            source: KeySource::Interactive,
        });
    }
    Err(ConfigurationError::MissingCredential {
        secrets_file: secrets_file.to_path_buf(),
        env_var: key_name.to_string(),
    })
}

/// Reads one line from stdin when both stdin and stderr are terminals.
pub fn prompt_on_terminal(key_name: &str) -> Option<String> {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() || !std::io::stderr().is_terminal() {
        return None;
    }
    let mut err = std::io::stderr();
    let _ = write!(err, "Enter {key_name}: ");
    let _ = err.flush();
    let mut line = String::new();
    stdin.lock().read_line(&mut line).ok()?;
    Some(line)
}

fn read_secrets_file(path: &Path, key_name: &str) -> Result<Option<String>, ConfigurationError> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| {
        ConfigurationError::InvalidConfig(format!("read secrets {}: {e}", path.display()))
    })?;
    let table: toml::Table = toml::from_str(&text).map_err(|e| {
        ConfigurationError::InvalidConfig(format!("parse secrets {}: {e}", path.display()))
    })?;
    Ok(table
        .get(key_name)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .and_then(non_blank))
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
