//! Image spec parsing.
//!
//! A spec is the string `<user>:<image>:<version>` — exactly two colons,
//! all three fields non-empty.

use std::fmt;

use qube_common::error::{QubeError, Result};

/// A parsed image identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageSpec {
    /// Hub account that published the image.
    pub user: String,
    /// Image name.
    pub name: String,
    /// Version tag.
    pub version: String,
}

impl ImageSpec {
    /// Parses a `<user>:<image>:<version>` string.
    ///
    /// # Errors
    ///
    /// Returns [`QubeError::BadImageSpec`] unless the input has exactly two
    /// colons and three non-empty fields.
    pub fn parse(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.split(':').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(QubeError::BadImageSpec { spec: spec.into() });
        }
        Ok(Self {
            user: parts[0].into(),
            name: parts[1].into(),
            version: parts[2].into(),
        })
    }

    /// Canonical filename of the cached tarball.
    #[must_use]
    pub fn archive_file_name(&self) -> String {
        format!("{}_{}_{}.tar.gz", self.user, self.name, self.version)
    }

    /// Reverses [`archive_file_name`](Self::archive_file_name) for store listings.
    #[must_use]
    pub fn from_archive_file_name(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".tar.gz")?;
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        Some(Self {
            user: parts[0].into(),
            name: parts[1].into(),
            version: parts[2].into(),
        })
    }
}

impl fmt::Display for ImageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.user, self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_three_nonempty_fields() {
        let spec = ImageSpec::parse("Voyrox:nodejs:1.1.0").expect("valid spec");
        assert_eq!(spec.user, "Voyrox");
        assert_eq!(spec.name, "nodejs");
        assert_eq!(spec.version, "1.1.0");
    }

    #[test]
    fn rejects_missing_colons() {
        assert!(ImageSpec::parse("onlyone").is_err());
        assert!(ImageSpec::parse("a:b").is_err());
    }

    #[test]
    fn rejects_extra_colons() {
        assert!(ImageSpec::parse("a:b:c:d").is_err());
    }

    #[test]
    fn rejects_empty_fields() {
        assert!(ImageSpec::parse(":b:c").is_err());
        assert!(ImageSpec::parse("a::c").is_err());
        assert!(ImageSpec::parse("a:b:").is_err());
    }

    #[test]
    fn archive_file_name_round_trip() {
        let spec = ImageSpec::parse("Foo:demo:1.0.0").expect("valid spec");
        assert_eq!(spec.archive_file_name(), "Foo_demo_1.0.0.tar.gz");
        let back = ImageSpec::from_archive_file_name("Foo_demo_1.0.0.tar.gz")
            .expect("parseable file name");
        assert_eq!(back, spec);
    }

    #[test]
    fn from_archive_file_name_rejects_foreign_files() {
        assert!(ImageSpec::from_archive_file_name("README.md").is_none());
        assert!(ImageSpec::from_archive_file_name("demo.tar.gz").is_none());
    }

    #[test]
    fn display_is_colon_joined() {
        let spec = ImageSpec::parse("a:b:c").expect("valid spec");
        assert_eq!(spec.to_string(), "a:b:c");
    }
}
