use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::platform::Platform;

pub const DEFAULT_CONFIG_FILE: &str = ".relgate.toml";

const DEFAULT_REPO: &str = "caddyserver/caddy";
const DEFAULT_OFFICIAL_IMAGE: &str = "library/caddy";
const DEFAULT_CUSTOM_IMAGE: &str = "caddybuilds/caddy-cloudflare";
const DEFAULT_REQUIRED_PLATFORMS: [&str; 5] = [
    "linux/amd64",
    "linux/arm64",
    "linux/arm/v7",
    "linux/ppc64le",
    "linux/s390x",
];
const DEFAULT_GITHUB_API: &str = "https://api.github.com";
const DEFAULT_REGISTRY_API: &str = "https://hub.docker.com";
const DEFAULT_GITHUB_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REGISTRY_TIMEOUT_SECS: u64 = 45;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub repo: Option<String>,
    pub official_image: Option<String>,
    pub custom_image: Option<String>,
    pub custom_tag_prefix: Option<String>,
    pub required_platforms: Option<Vec<Platform>>,
    pub github_api: Option<String>,
    pub registry_api: Option<String>,
    pub github_timeout_secs: Option<u64>,
    pub registry_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub repo: Option<String>,
    pub official_image: Option<String>,
    pub custom_image: Option<String>,
    pub custom_tag_prefix: Option<String>,
    pub required_platforms: Option<Vec<Platform>>,
    pub github_api: Option<String>,
    pub registry_api: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Upstream GitHub repository as `owner/name`.
    pub repo: String,
    pub official_image: String,
    pub custom_image: String,
    pub custom_tag_prefix: String,
    pub required_platforms: BTreeSet<Platform>,
    pub github_api: String,
    pub registry_api: String,
    pub github_timeout: Duration,
    pub registry_timeout: Duration,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            repo: DEFAULT_REPO.to_string(),
            official_image: DEFAULT_OFFICIAL_IMAGE.to_string(),
            custom_image: DEFAULT_CUSTOM_IMAGE.to_string(),
            custom_tag_prefix: String::new(),
            required_platforms: DEFAULT_REQUIRED_PLATFORMS
                .iter()
                .filter_map(|p| p.parse().ok())
                .collect(),
            github_api: DEFAULT_GITHUB_API.to_string(),
            registry_api: DEFAULT_REGISTRY_API.to_string(),
            github_timeout: Duration::from_secs(DEFAULT_GITHUB_TIMEOUT_SECS),
            registry_timeout: Duration::from_secs(DEFAULT_REGISTRY_TIMEOUT_SECS),
        }
    }
}

impl CheckerConfig {
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(v) = overrides.repo.or(file.repo) {
            cfg.repo = v;
        }
        if let Some(v) = overrides.official_image.or(file.official_image) {
            cfg.official_image = v;
        }
        if let Some(v) = overrides.custom_image.or(file.custom_image) {
            cfg.custom_image = v;
        }
        if let Some(v) = overrides.custom_tag_prefix.or(file.custom_tag_prefix) {
            cfg.custom_tag_prefix = v;
        }
        if let Some(v) = overrides.required_platforms.or(file.required_platforms) {
            cfg.required_platforms = v.into_iter().collect();
        }
        if let Some(v) = overrides.github_api.or(file.github_api) {
            cfg.github_api = v;
        }
        if let Some(v) = overrides.registry_api.or(file.registry_api) {
            cfg.registry_api = v;
        }
        if let Some(secs) = file.github_timeout_secs {
            cfg.github_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.registry_timeout_secs {
            cfg.registry_timeout = Duration::from_secs(secs);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        match self.repo.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {}
            _ => bail!("repo must be given as owner/name, got {:?}", self.repo),
        }
        if self.official_image.is_empty() || self.custom_image.is_empty() {
            bail!("image names must not be empty");
        }
        if self.required_platforms.is_empty() {
            bail!("configuration error: required platform set is empty");
        }
        Ok(())
    }
}

/// Read a config file. A missing file at the default location means defaults;
/// a missing file the user asked for explicitly is an error.
pub async fn load_file_config(path: &Path, explicit: bool) -> Result<FileConfig> {
    if !path.exists() {
        if explicit {
            bail!("config file not found: {}", path.display());
        }
        tracing::debug!("config: {} not present, using defaults", path.display());
        return Ok(FileConfig::default());
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg: FileConfig =
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let cfg = CheckerConfig::resolve(FileConfig::default(), Overrides::default()).unwrap();
        assert_eq!(cfg.repo, "caddyserver/caddy");
        assert_eq!(cfg.official_image, "library/caddy");
        assert_eq!(cfg.custom_image, "caddybuilds/caddy-cloudflare");
        assert_eq!(cfg.custom_tag_prefix, "");
        assert_eq!(cfg.required_platforms.len(), 5);
        assert!(
            cfg.required_platforms
                .contains(&Platform::new("linux", "arm", Some("v7")))
        );
        assert_eq!(cfg.github_timeout, Duration::from_secs(30));
        assert_eq!(cfg.registry_timeout, Duration::from_secs(45));
    }

    #[test]
    fn overrides_beat_file_values() {
        let file: FileConfig = toml::from_str(
            r#"
repo = "traefik/traefik"
custom_image = "me/from-file"
custom_tag_prefix = "v"
required_platforms = ["linux/amd64"]
registry_timeout_secs = 5
"#,
        )
        .unwrap();
        let overrides = Overrides {
            custom_image: Some("me/from-cli".to_string()),
            ..Overrides::default()
        };
        let cfg = CheckerConfig::resolve(file, overrides).unwrap();
        assert_eq!(cfg.repo, "traefik/traefik");
        assert_eq!(cfg.custom_image, "me/from-cli");
        assert_eq!(cfg.custom_tag_prefix, "v");
        assert_eq!(cfg.required_platforms.len(), 1);
        assert_eq!(cfg.registry_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_unknown_keys_and_bad_platforms() {
        assert!(toml::from_str::<FileConfig>("colour = \"blue\"").is_err());
        assert!(toml::from_str::<FileConfig>("required_platforms = [\"linux\"]").is_err());
    }

    #[test]
    fn rejects_empty_platforms_and_bad_repo() {
        let overrides = Overrides {
            required_platforms: Some(Vec::new()),
            ..Overrides::default()
        };
        let err = CheckerConfig::resolve(FileConfig::default(), overrides).unwrap_err();
        assert!(err.to_string().contains("required platform set is empty"));

        let overrides = Overrides {
            repo: Some("caddy".to_string()),
            ..Overrides::default()
        };
        assert!(CheckerConfig::resolve(FileConfig::default(), overrides).is_err());
    }

    #[tokio::test]
    async fn missing_default_file_yields_defaults() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join(DEFAULT_CONFIG_FILE);
        let cfg = load_file_config(&path, false).await.unwrap();
        assert!(cfg.repo.is_none());
        assert!(load_file_config(&path, true).await.is_err());
    }

    #[tokio::test]
    async fn reads_file_from_disk() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "official_image = \"library/traefik\"\n").unwrap();
        let cfg = load_file_config(&path, true).await.unwrap();
        assert_eq!(cfg.official_image.as_deref(), Some("library/traefik"));
    }
}
