use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::checker::LATEST_VERSION;
use crate::github::ReleaseSource;
use crate::output::OutputSink;
use crate::release::ReleaseTag;

pub const IS_NEW_RELEASE: &str = "IS_NEW_RELEASE";
pub const DEFAULT_VERSION_FILE: &str = "version.json";

const NO_VERSION: &str = "none";

#[derive(Debug, Deserialize)]
struct VersionFile {
    #[serde(default)]
    version: Value,
}

#[derive(Debug)]
pub struct ReleaseCheck {
    pub latest: ReleaseTag,
    pub previous: String,
    pub is_new: bool,
}

/// The previously recorded version: an explicit value wins, then the
/// `version` field of `file`, then `none`.
pub async fn previous_version(explicit: Option<String>, file: &Path) -> Result<String> {
    if let Some(v) = explicit.filter(|v| !v.is_empty()) {
        return Ok(v);
    }
    if !file.exists() {
        tracing::debug!("release: {} not present", file.display());
        return Ok(NO_VERSION.to_string());
    }
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let parsed: VersionFile = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", file.display()))?;
    Ok(match parsed.version {
        Value::Null => NO_VERSION.to_string(),
        Value::String(v) => v,
        other => other.to_string(),
    })
}

pub async fn run_version_check(
    releases: &impl ReleaseSource,
    repo: &str,
    previous: &str,
    sink: &mut impl OutputSink,
) -> Result<ReleaseCheck> {
    let latest = releases.latest_tag(repo).await?;
    tracing::info!("release: latest version {}", latest);
    tracing::info!("release: current version {}", previous);

    let is_new = latest.as_str() != previous;
    sink.emit_bool(IS_NEW_RELEASE, is_new)?;
    if is_new {
        sink.emit_str(LATEST_VERSION, latest.as_str())?;
    }

    Ok(ReleaseCheck {
        latest,
        previous: previous.to_string(),
        is_new,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl ReleaseSource for Fixed {
        async fn latest_tag(&self, _repo: &str) -> Result<ReleaseTag> {
            ReleaseTag::parse(self.0)
        }
    }

    #[derive(Default)]
    struct Lines(Vec<String>);

    impl OutputSink for Lines {
        fn emit_str(&mut self, key: &str, value: &str) -> Result<()> {
            self.0.push(format!("{}={}", key, value));
            Ok(())
        }
    }

    #[tokio::test]
    async fn new_release_emits_version() {
        let mut sink = Lines::default();
        let check = run_version_check(&Fixed("v2.8.4"), "caddyserver/caddy", "v2.8.3", &mut sink)
            .await
            .unwrap();
        assert!(check.is_new);
        assert_eq!(sink.0, vec!["IS_NEW_RELEASE=true", "LATEST_VERSION=v2.8.4"]);
    }

    #[tokio::test]
    async fn same_release_emits_flag_only() {
        let mut sink = Lines::default();
        let check = run_version_check(&Fixed("v2.8.4"), "caddyserver/caddy", "v2.8.4", &mut sink)
            .await
            .unwrap();
        assert!(!check.is_new);
        assert_eq!(sink.0, vec!["IS_NEW_RELEASE=false"]);
    }

    #[tokio::test]
    async fn bad_tag_emits_nothing() {
        let mut sink = Lines::default();
        let result = run_version_check(&Fixed("latest"), "caddyserver/caddy", "none", &mut sink).await;
        assert!(result.is_err());
        assert!(sink.0.is_empty());
    }

    #[tokio::test]
    async fn previous_version_sources() {
        let td = tempfile::tempdir().unwrap();
        let file = td.path().join(DEFAULT_VERSION_FILE);

        assert_eq!(previous_version(None, &file).await.unwrap(), "none");

        std::fs::write(&file, r#"{"version": "v2.8.1"}"#).unwrap();
        assert_eq!(previous_version(None, &file).await.unwrap(), "v2.8.1");
        assert_eq!(
            previous_version(Some("v2.7.0".to_string()), &file)
                .await
                .unwrap(),
            "v2.7.0"
        );

        std::fs::write(&file, "{}").unwrap();
        assert_eq!(previous_version(None, &file).await.unwrap(), "none");

        std::fs::write(&file, r#"{"version": 123}"#).unwrap();
        assert_eq!(previous_version(None, &file).await.unwrap(), "123");

        std::fs::write(&file, "not json").unwrap();
        assert!(previous_version(None, &file).await.is_err());
    }
}
