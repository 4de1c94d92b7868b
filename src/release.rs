use std::fmt;

use anyhow::{Result, bail};

pub const VERSION_PREFIX: char = 'v';

/// A validated upstream release tag such as `v2.8.4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTag(String);

impl ReleaseTag {
    pub fn parse(raw: &str) -> Result<Self> {
        let Some(rest) = raw.strip_prefix(VERSION_PREFIX) else {
            bail!("release tag {:?} does not start with '{}'", raw, VERSION_PREFIX);
        };
        if rest.is_empty() || rest.chars().any(char::is_whitespace) {
            bail!("malformed release tag {:?}", raw);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn normalized(&self) -> &str {
        &self.0[VERSION_PREFIX.len_utf8()..]
    }

    pub fn registry_tag(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.normalized())
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix_for_registry() {
        let tag = ReleaseTag::parse("v2.8.4").unwrap();
        assert_eq!(tag.as_str(), "v2.8.4");
        assert_eq!(tag.normalized(), "2.8.4");
        assert_eq!(tag.registry_tag(""), "2.8.4");
        assert_eq!(tag.registry_tag("v"), "v2.8.4");
    }

    #[test]
    fn keeps_prerelease_suffix() {
        let tag = ReleaseTag::parse("v2.9.0-beta.1").unwrap();
        assert_eq!(tag.normalized(), "2.9.0-beta.1");
    }

    #[test]
    fn rejects_missing_prefix() {
        let err = ReleaseTag::parse("2.8.4").unwrap_err();
        assert!(err.to_string().contains("does not start with"));
    }

    #[test]
    fn rejects_empty_and_bare_prefix() {
        assert!(ReleaseTag::parse("").is_err());
        assert!(ReleaseTag::parse("v").is_err());
        assert!(ReleaseTag::parse("v2.8 .4").is_err());
    }
}
