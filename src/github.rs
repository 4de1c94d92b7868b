use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use octocrab::Octocrab;
use octocrab::service::middleware::retry::RetryConfig;
use serde::Deserialize;

use crate::release::ReleaseTag;

const TOKEN_VARS: [&str; 2] = ["RELGATE_GITHUB_TOKEN", "GITHUB_TOKEN"];

pub trait ReleaseSource {
    async fn latest_tag(&self, repo: &str) -> Result<ReleaseTag>;
}

/// Public release data does not need a token, it only lifts the rate limit.
pub fn token() -> Option<String> {
    TOKEN_VARS
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
}

pub fn client(api: &str, timeout: Duration) -> Result<Octocrab> {
    let mut builder = Octocrab::builder()
        .base_uri(api)
        .with_context(|| format!("invalid GitHub API url {}", api))?
        .set_connect_timeout(Some(timeout))
        .set_read_timeout(Some(timeout));
    builder.add_retry_config(RetryConfig::None);
    if let Some(token) = token() {
        tracing::debug!("github: using token from environment");
        builder = builder.personal_token(token);
    }
    builder.build().context("failed to build GitHub client")
}

#[derive(Debug, Deserialize)]
struct LatestRelease {
    #[serde(default)]
    tag_name: Option<String>,
}

pub struct GithubReleases {
    gh: Octocrab,
}

impl GithubReleases {
    pub fn new(gh: Octocrab) -> Self {
        Self { gh }
    }
}

impl ReleaseSource for GithubReleases {
    async fn latest_tag(&self, repo: &str) -> Result<ReleaseTag> {
        let route = format!("/repos/{}/releases/latest", repo);
        tracing::info!("github: fetching latest release {}", route);
        let release: LatestRelease = self
            .gh
            .get(&route, None::<&()>)
            .await
            .with_context(|| format!("failed to fetch latest release for {}", repo))?;
        let raw = release
            .tag_name
            .ok_or_else(|| anyhow!("latest release of {} has no tag_name", repo))?;
        let tag = ReleaseTag::parse(&raw)
            .with_context(|| format!("invalid tag_name in latest release of {}", repo))?;
        tracing::info!("github: latest release tag {}", tag);
        Ok(tag)
    }
}
