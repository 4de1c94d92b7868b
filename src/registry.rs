use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use urlencoding::encode as url_encode;

use crate::platform::ImageDescriptor;

const BODY_SNIPPET: usize = 200;

#[derive(Debug, Clone, Default)]
pub struct TagDetails {
    pub images: Vec<ImageDescriptor>,
}

impl TagDetails {
    pub fn from_json(value: &Value) -> Self {
        let Some(list) = value.get("images").and_then(Value::as_array) else {
            tracing::info!("registry: no valid 'images' list in tag data");
            return Self::default();
        };
        let images = list
            .iter()
            .filter(|v| v.is_object())
            .filter_map(|v| serde_json::from_value::<ImageDescriptor>(v.clone()).ok())
            .collect();
        Self { images }
    }
}

/// Looks up image tags on a container registry.
///
/// `Ok(None)` is a clean not-found; `Err` is anything unexpected.
pub trait TagRegistry {
    async fn lookup(&self, image: &str, tag: &str) -> Result<Option<TagDetails>>;
}

pub struct DockerHub {
    client: Client,
    base: String,
}

impl DockerHub {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("relgate/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("failed to build registry client")?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    fn tag_url(&self, image: &str, tag: &str) -> String {
        format!(
            "{}/v2/repositories/{}/tags/{}",
            self.base,
            image,
            url_encode(tag)
        )
    }
}

impl TagRegistry for DockerHub {
    async fn lookup(&self, image: &str, tag: &str) -> Result<Option<TagDetails>> {
        let url = self.tag_url(image, tag);
        tracing::debug!("registry: GET {}", url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request for tag '{}' of '{}' failed", tag, image))?;

        match resp.status() {
            StatusCode::OK => {
                let body: Value = resp.json().await.with_context(|| {
                    format!("invalid JSON for tag '{}' of '{}'", tag, image)
                })?;
                Ok(Some(TagDetails::from_json(&body)))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = resp.text().await.unwrap_or_default();
                let snippet: String = body.chars().take(BODY_SNIPPET).collect();
                bail!(
                    "unexpected status {} checking tag '{}' for '{}': {}",
                    status,
                    tag,
                    image,
                    snippet
                );
            }
        }
    }
}
