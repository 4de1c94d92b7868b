use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::Deserialize;

const LINUX: &str = "linux";
const ARM: &str = "arm";
const ARM_VARIANT: &str = "v7";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Platform {
    pub os: String,
    pub arch: String,
    pub variant: Option<String>,
}

impl Platform {
    pub fn new(os: &str, arch: &str, variant: Option<&str>) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
            variant: variant.map(str::to_string),
        }
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.iter().any(|p| p.trim().is_empty()) {
            bail!("invalid platform {:?} (expected os/arch[/variant])", s);
        }
        match parts.as_slice() {
            [os, arch] => Ok(Self::new(os, arch, None)),
            [os, arch, variant] => Ok(Self::new(os, arch, Some(variant))),
            _ => bail!("invalid platform {:?} (expected os/arch[/variant])", s),
        }
    }
}

impl TryFrom<String> for Platform {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{}", variant)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageDescriptor {
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
}

/// Platforms from `images` that count towards `required`.
///
/// Only linux entries qualify. `arm` needs the `v7` variant to match
/// `linux/arm/v7`; every other architecture matches as `linux/{arch}`.
/// Anything else is ignored.
pub fn published_platforms(
    images: &[ImageDescriptor],
    required: &BTreeSet<Platform>,
) -> BTreeSet<Platform> {
    let mut found = BTreeSet::new();
    for image in images {
        if image.os.as_deref() != Some(LINUX) {
            continue;
        }
        let Some(arch) = image.architecture.as_deref().filter(|a| !a.is_empty()) else {
            continue;
        };
        let candidate = if arch == ARM && image.variant.as_deref() == Some(ARM_VARIANT) {
            Platform::new(LINUX, arch, Some(ARM_VARIANT))
        } else {
            Platform::new(LINUX, arch, None)
        };
        if required.contains(&candidate) {
            found.insert(candidate);
        }
    }
    found
}

pub fn missing_platforms(
    required: &BTreeSet<Platform>,
    found: &BTreeSet<Platform>,
) -> BTreeSet<Platform> {
    required.difference(found).cloned().collect()
}

pub fn display_set(set: &BTreeSet<Platform>) -> String {
    let items: Vec<String> = set.iter().map(ToString::to_string).collect();
    format!("{{{}}}", items.join(", "))
}
