use std::collections::BTreeSet;
use std::fmt;

use anyhow::Result;
use chrono::Utc;

use crate::config::CheckerConfig;
use crate::github::ReleaseSource;
use crate::output::{self, OutputSink};
use crate::platform::{Platform, display_set, missing_platforms, published_platforms};
use crate::registry::TagRegistry;
use crate::release::ReleaseTag;

pub const NEEDS_BUILD: &str = "NEEDS_BUILD";
pub const LATEST_VERSION: &str = "LATEST_VERSION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageStatus {
    /// Tag not found, or the lookup failed.
    Absent,
    Incomplete { missing: BTreeSet<Platform> },
    Complete,
}

impl ImageStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, ImageStatus::Complete)
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageStatus::Absent => f.write_str("absent"),
            ImageStatus::Incomplete { missing } => {
                write!(f, "incomplete (missing {})", display_set(missing))
            }
            ImageStatus::Complete => f.write_str("complete"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub needs_build: bool,
    pub latest_version: ReleaseTag,
    pub official: ImageStatus,
    /// `None` when the official image was not ready and the custom image was
    /// never looked at.
    pub custom: Option<ImageStatus>,
}

pub struct ReadinessChecker<R, G> {
    cfg: CheckerConfig,
    releases: R,
    registry: G,
}

impl<R: ReleaseSource, G: TagRegistry> ReadinessChecker<R, G> {
    pub fn new(cfg: CheckerConfig, releases: R, registry: G) -> Self {
        Self {
            cfg,
            releases,
            registry,
        }
    }

    pub async fn run(&self, sink: &mut impl OutputSink) -> Result<Decision> {
        let start = Utc::now();
        tracing::info!("check: starting at {}", start.to_rfc3339());
        tracing::info!(
            "check: required platforms {}",
            display_set(&self.cfg.required_platforms)
        );

        // Nothing can be decided without the release, so this is the only fatal step.
        let tag = self.releases.latest_tag(&self.cfg.repo).await?;
        let official_tag = tag.normalized().to_string();
        let custom_tag = tag.registry_tag(&self.cfg.custom_tag_prefix);

        tracing::info!(
            "check: step 1, official image {}:{}",
            self.cfg.official_image,
            official_tag
        );
        let official = self
            .image_status(&self.cfg.official_image, &official_tag)
            .await;

        let (needs_build, custom) = if official.is_complete() {
            tracing::info!(
                "check: step 2, custom image {}:{}",
                self.cfg.custom_image,
                custom_tag
            );
            let custom = self.image_status(&self.cfg.custom_image, &custom_tag).await;
            (!custom.is_complete(), Some(custom))
        } else {
            tracing::info!("check: official image is not ready, no build triggered");
            (false, None)
        };

        tracing::info!(
            "check: final decision for {}: needs build = {}",
            tag,
            needs_build
        );
        sink.emit_bool(NEEDS_BUILD, needs_build)?;
        sink.emit_str(LATEST_VERSION, tag.as_str())?;

        let end = Utc::now();
        tracing::info!(
            "check: finished at {} (took {}ms)",
            end.to_rfc3339(),
            (end - start).num_milliseconds()
        );

        Ok(Decision {
            needs_build,
            latest_version: tag,
            official,
            custom,
        })
    }

    async fn image_status(&self, image: &str, tag: &str) -> ImageStatus {
        let details = match self.registry.lookup(image, tag).await {
            Ok(Some(details)) => details,
            Ok(None) => {
                tracing::info!("check: tag '{}' of '{}' not found", tag, image);
                return ImageStatus::Absent;
            }
            Err(err) => {
                let message = format!("{:#}", err);
                tracing::error!("check: treating '{}:{}' as absent: {}", image, tag, message);
                output::annotate_error(&message);
                return ImageStatus::Absent;
            }
        };

        let required = &self.cfg.required_platforms;
        let found = published_platforms(&details.images, required);
        tracing::info!(
            "check: tag '{}' of '{}' found, relevant platforms {}",
            tag,
            image,
            display_set(&found)
        );
        let missing = missing_platforms(required, &found);
        if missing.is_empty() {
            tracing::info!("check: '{}:{}' has all required platforms", image, tag);
            ImageStatus::Complete
        } else {
            tracing::info!(
                "check: '{}:{}' is missing platforms {}",
                image,
                tag,
                display_set(&missing)
            );
            ImageStatus::Incomplete { missing }
        }
    }
}
