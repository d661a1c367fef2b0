// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles the archive source, which is either a local path or an http:// URL.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Where the MTA archive comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveSource {
    Path(PathBuf),
    Url(String),
}

impl ArchiveSource {
    pub fn parse(s: &str) -> Result<Self, String> {
        if s.trim().is_empty() {
            return Err("archive must not be empty".to_string());
        }
        if s.starts_with("http://") {
            return Ok(ArchiveSource::Url(s.to_string()));
        }
        if s.starts_with("https://") {
            return Err(format!(
                "unsupported archive URL {s}: only http:// URLs can be fetched"
            ));
        }
        Ok(ArchiveSource::Path(PathBuf::from(s)))
    }
}

impl fmt::Display for ArchiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveSource::Path(path) => write!(f, "{}", path.display()),
            ArchiveSource::Url(url) => write!(f, "{url}"),
        }
    }
}

impl Serialize for ArchiveSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn deserialize_archive_source<'de, D>(deserializer: D) -> Result<ArchiveSource, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ArchiveSource::parse(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_urls_are_urls() {
        assert_eq!(
            ArchiveSource::parse("http://repo/app.mtar").unwrap(),
            ArchiveSource::Url("http://repo/app.mtar".to_string())
        );
    }

    #[test]
    fn plain_strings_are_paths() {
        assert_eq!(
            ArchiveSource::parse("dist/app.mtar").unwrap(),
            ArchiveSource::Path(PathBuf::from("dist/app.mtar"))
        );
    }

    #[test]
    fn https_is_rejected() {
        let err = ArchiveSource::parse("https://repo/app.mtar").unwrap_err();
        assert!(err.contains("only http://"));
    }
}
