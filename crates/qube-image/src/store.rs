//! Local tarball store backed by the hub.
//!
//! Resolves image specs to cached archives under
//! `<containers_base>/images/`, downloading from the hub on a cache miss.

use std::fs::{self, File};
use std::path::PathBuf;

use qube_common::config::RuntimeConfig;
use qube_common::error::{QubeError, Result};

use crate::spec::ImageSpec;

/// Resolves image specs to local tarballs, pulling from the hub when absent.
#[derive(Debug, Clone)]
pub struct ImageStore {
    images_dir: PathBuf,
    hub_base_url: String,
}

impl ImageStore {
    /// Creates a store from the runtime configuration.
    #[must_use]
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            images_dir: config.images_dir(),
            hub_base_url: config.hub_base_url.clone(),
        }
    }

    /// Returns the cache path an image spec resolves to.
    #[must_use]
    pub fn archive_path(&self, spec: &ImageSpec) -> PathBuf {
        self.images_dir.join(spec.archive_file_name())
    }

    /// Resolves an image spec to a local tarball, downloading it if absent.
    ///
    /// A cached image is returned without any network I/O. On a cache miss
    /// the archive is streamed from
    /// `<hub_base_url>/download/<user>/<image>?version=<version>`; a partial
    /// file never survives a failed download.
    ///
    /// # Errors
    ///
    /// Returns [`QubeError::BadImageSpec`] for a malformed spec,
    /// [`QubeError::ImageFetch`] when the hub answers non-200, and
    /// [`QubeError::Network`] on transport failures.
    pub fn ensure(&self, image: &str) -> Result<PathBuf> {
        let spec = ImageSpec::parse(image)?;
        let path = self.archive_path(&spec);
        if path.exists() {
            return Ok(path);
        }

        fs::create_dir_all(&self.images_dir).map_err(|e| QubeError::Io {
            path: self.images_dir.clone(),
            source: e,
        })?;

        let url = format!(
            "{}/download/{}/{}?version={}",
            self.hub_base_url, spec.user, spec.name, spec.version
        );
        tracing::info!(image = %spec, url = %url, "image not cached, downloading");

        self.download(&url, &path).inspect_err(|_| {
            let _ = fs::remove_file(&path);
        })?;

        tracing::info!(image = %spec, path = %path.display(), "download complete");
        Ok(path)
    }

    /// Validates that an image spec parses and its archive is obtainable.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`ensure`](Self::ensure).
    pub fn validate(&self, image: &str) -> Result<()> {
        self.ensure(image).map(|_| ())
    }

    /// Lists the specs of all cached images.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory exists but cannot be read.
    pub fn list(&self) -> Result<Vec<ImageSpec>> {
        if !self.images_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.images_dir).map_err(|e| QubeError::Io {
            path: self.images_dir.clone(),
            source: e,
        })?;

        let mut specs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| QubeError::Io {
                path: self.images_dir.clone(),
                source: e,
            })?;
            if entry.path().is_dir() {
                continue;
            }
            let file_name = entry.file_name();
            if let Some(spec) = ImageSpec::from_archive_file_name(&file_name.to_string_lossy()) {
                specs.push(spec);
            }
        }
        specs.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        Ok(specs)
    }

    /// Returns the image-cache directory.
    #[must_use]
    pub fn images_dir(&self) -> &std::path::Path {
        &self.images_dir
    }

    fn download(&self, url: &str, dest: &std::path::Path) -> Result<()> {
        let mut response = reqwest::blocking::get(url).map_err(|e| QubeError::Network {
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(QubeError::ImageFetch { status, body });
        }

        let total = response.content_length().unwrap_or(0);
        let mut file = File::create(dest).map_err(|e| QubeError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;
        let written = response
            .copy_to(&mut file)
            .map_err(|e| QubeError::Network {
                message: e.to_string(),
            })?;
        tracing::debug!(bytes = written, expected = total, "image streamed to disk");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &std::path::Path) -> ImageStore {
        let config = RuntimeConfig {
            containers_base: dir.to_path_buf(),
            ..RuntimeConfig::default()
        };
        ImageStore::new(&config)
    }

    #[test]
    fn ensure_hits_local_cache_without_network() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());

        let images_dir = dir.path().join("images");
        std::fs::create_dir_all(&images_dir).expect("create images dir");
        std::fs::write(images_dir.join("Foo_demo_1.0.0.tar.gz"), b"gzip bytes")
            .expect("write archive");

        let path = store.ensure("Foo:demo:1.0.0").expect("cached image resolves");
        assert_eq!(path, images_dir.join("Foo_demo_1.0.0.tar.gz"));
    }

    #[test]
    fn ensure_rejects_bad_spec_before_any_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());

        assert!(matches!(
            store.ensure("onlyone"),
            Err(qube_common::error::QubeError::BadImageSpec { .. })
        ));
        assert!(matches!(
            store.ensure("a:b"),
            Err(qube_common::error::QubeError::BadImageSpec { .. })
        ));
    }

    #[test]
    fn list_returns_specs_of_cached_archives() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());

        let images_dir = dir.path().join("images");
        std::fs::create_dir_all(&images_dir).expect("create images dir");
        std::fs::write(images_dir.join("Foo_demo_1.0.0.tar.gz"), b"x").expect("write");
        std::fs::write(images_dir.join("Bar_web_2.3.4.tar.gz"), b"x").expect("write");
        std::fs::write(images_dir.join("notes.txt"), b"x").expect("write");

        let specs = store.list().expect("list");
        let rendered: Vec<String> = specs.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["Bar:web:2.3.4", "Foo:demo:1.0.0"]);
    }

    #[test]
    fn list_on_missing_cache_dir_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        assert!(store.list().expect("list").is_empty());
    }
}
