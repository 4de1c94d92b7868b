use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use uuid::Uuid;

pub const GITHUB_OUTPUT: &str = "GITHUB_OUTPUT";
pub const GITHUB_ENV: &str = "GITHUB_ENV";

pub trait OutputSink {
    fn emit_str(&mut self, key: &str, value: &str) -> Result<()>;

    fn emit_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.emit_str(key, if value { "true" } else { "false" })
    }
}

/// Appends `KEY=value` lines to a GitHub Actions environment file such as
/// `$GITHUB_OUTPUT` or `$GITHUB_ENV`.
#[derive(Debug, Clone)]
pub struct EnvFileSink {
    var: String,
    path: Option<PathBuf>,
}

impl EnvFileSink {
    pub fn new(var: &str, path: Option<PathBuf>) -> Self {
        Self {
            var: var.to_string(),
            path,
        }
    }

    pub fn from_env(var: &str) -> Self {
        let path = std::env::var_os(var)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::new(var, path)
    }
}

impl OutputSink for EnvFileSink {
    fn emit_str(&mut self, key: &str, value: &str) -> Result<()> {
        let Some(path) = &self.path else {
            tracing::warn!(
                "output: {} not set, cannot set output '{}'",
                self.var,
                key
            );
            return Ok(());
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open {} file {}", self.var, path.display()))?;
        file.write_all(format_entry(key, value).as_bytes())
            .with_context(|| format!("failed to write {} file {}", self.var, path.display()))?;
        tracing::debug!("output: {}={}", key, value);
        Ok(())
    }
}

pub fn format_entry(key: &str, value: &str) -> String {
    if !value.contains('\n') {
        return format!("{}={}\n", key, value);
    }
    let delimiter = unique_delimiter(value);
    format!("{}<<{}\n{}\n{}\n", key, delimiter, value, delimiter)
}

fn unique_delimiter(value: &str) -> String {
    loop {
        let delimiter = format!("ghadelimiter_{}", Uuid::new_v4());
        if !value.contains(&delimiter) {
            return delimiter;
        }
    }
}

/// Surface an error in the GitHub Actions UI when running inside a workflow.
pub fn annotate_error(message: &str) {
    if std::env::var("GITHUB_ACTIONS").as_deref() == Ok("true") {
        eprintln!("::error::{}", escape_command_data(message));
    }
}

fn escape_command_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
