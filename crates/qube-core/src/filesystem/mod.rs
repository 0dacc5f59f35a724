//! Per-container root filesystem construction.
//!
//! Each container gets a fresh extraction of its base image plus a copy of
//! the user's working directory at `/workspace`. There is no layering or
//! snapshotting — the rootfs is a plain directory tree.

pub mod mount;

use std::fs::File;
use std::path::Path;
use std::process::Command;

use flate2::read::GzDecoder;
use qube_common::config::RuntimeConfig;
use qube_common::error::{QubeError, Result};

/// Builds a container's rootfs if it does not already exist.
///
/// An existing rootfs is left untouched so restarts skip the build. On
/// extraction failure the partial tree is removed before the error
/// propagates; the caller is responsible for dropping any ledger row.
///
/// # Errors
///
/// Returns an error if directory creation, extraction, or the workspace
/// sync fails.
pub fn build(config: &RuntimeConfig, name: &str, work_dir: &Path, archive: &Path) -> Result<()> {
    let rootfs = config.rootfs_dir(name);
    if rootfs.exists() {
        tracing::info!(name, "container filesystem already exists, skipping build");
        return Ok(());
    }

    std::fs::create_dir_all(&rootfs).map_err(|e| QubeError::Io {
        path: rootfs.clone(),
        source: e,
    })?;

    if let Err(e) = extract_archive(archive, &rootfs) {
        let _ = std::fs::remove_dir_all(config.container_dir(name));
        return Err(e);
    }

    sync_workspace(work_dir, &rootfs)?;
    tracing::info!(name, rootfs = %rootfs.display(), "container filesystem built");
    Ok(())
}

/// Extracts a gzip tarball into a rootfs directory.
///
/// Permissions are preserved; numeric ownership is preserved only when
/// running as root, matching `tar --numeric-owner -xzf`.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened or unpacked.
pub fn extract_archive(archive: &Path, rootfs: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| QubeError::Io {
        path: archive.to_path_buf(),
        source: e,
    })?;
    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    tarball.set_preserve_permissions(true);
    tarball.set_preserve_ownerships(nix::unistd::geteuid().is_root());
    tarball.unpack(rootfs).map_err(|e| QubeError::Io {
        path: archive.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(archive = %archive.display(), "image extracted");
    Ok(())
}

/// Copies the user's working directory into `<rootfs>/workspace`.
///
/// Prefers `rsync -a --exclude=.git` for attribute preservation, falling
/// back to an internal recursive copy when rsync is unavailable or fails.
///
/// # Errors
///
/// Returns an error if both the rsync and the fallback copy fail.
pub fn sync_workspace(work_dir: &Path, rootfs: &Path) -> Result<()> {
    let workspace = rootfs.join("workspace");
    std::fs::create_dir_all(&workspace).map_err(|e| QubeError::Io {
        path: workspace.clone(),
        source: e,
    })?;

    let rsync = Command::new("rsync")
        .arg("-a")
        .arg("--exclude=.git")
        .arg(format!("{}/", work_dir.display()))
        .arg(format!("{}/", workspace.display()))
        .status();
    if let Ok(status) = rsync {
        if status.success() {
            return Ok(());
        }
    }

    tracing::debug!("rsync unavailable, using recursive copy");
    copy_dir_recursive(work_dir, &workspace)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst).map_err(|e| QubeError::Io {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let entries = std::fs::read_dir(src).map_err(|e| QubeError::Io {
        path: src.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| QubeError::Io {
            path: src.to_path_buf(),
            source: e,
        })?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if from.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(|e| QubeError::Io {
                path: from.clone(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Removes a container's directory tree.
///
/// # Errors
///
/// Returns an error if the tree exists but cannot be removed.
pub fn remove_container_dir(config: &RuntimeConfig, name: &str) -> Result<()> {
    let dir = config.container_dir(name);
    if dir.exists() {
        std::fs::remove_dir_all(&dir).map_err(|e| QubeError::Io {
            path: dir.clone(),
            source: e,
        })?;
        tracing::debug!(name, "container directory removed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;

    fn config_in(dir: &Path) -> RuntimeConfig {
        RuntimeConfig {
            containers_base: dir.join("containers"),
            ..RuntimeConfig::default()
        }
    }

    fn write_test_archive(path: &Path) {
        let file = File::create(path).expect("create archive");
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let mut header = tar::Header::new_gnu();
        header.set_size(6);
        header.set_mode(0o755);
        header.set_uid(0);
        header.set_gid(0);
        header.set_cksum();
        builder
            .append_data(&mut header, "bin/sh", &b"#!/e/f"[..])
            .expect("append entry");
        builder
            .into_inner()
            .expect("finish tar")
            .finish()
            .expect("finish gzip");
    }

    #[test]
    fn extract_archive_unpacks_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = dir.path().join("img.tar.gz");
        write_test_archive(&archive);

        let rootfs = dir.path().join("rootfs");
        std::fs::create_dir_all(&rootfs).expect("mkdir");
        extract_archive(&archive, &rootfs).expect("extract");
        assert!(rootfs.join("bin/sh").exists());
    }

    #[test]
    fn build_extracts_and_seeds_workspace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());

        let archive = dir.path().join("img.tar.gz");
        write_test_archive(&archive);

        let work = dir.path().join("project");
        std::fs::create_dir_all(work.join("src")).expect("mkdir");
        std::fs::write(work.join("src/main.txt"), "hello").expect("write");

        build(&config, "Qube-build1", &work, &archive).expect("build");

        let rootfs = config.rootfs_dir("Qube-build1");
        assert!(rootfs.join("bin/sh").exists());
        assert!(rootfs.join("workspace/src/main.txt").exists());
    }

    #[test]
    fn build_is_idempotent_for_existing_rootfs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());

        let rootfs = config.rootfs_dir("Qube-idem");
        std::fs::create_dir_all(&rootfs).expect("mkdir");
        std::fs::write(rootfs.join("marker"), "keep").expect("write");

        // the archive path does not even exist; an existing rootfs skips it
        build(&config, "Qube-idem", dir.path(), Path::new("/nonexistent.tar.gz"))
            .expect("skip build");
        assert!(rootfs.join("marker").exists());
    }

    #[test]
    fn build_removes_partial_tree_on_bad_archive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());

        let archive = dir.path().join("broken.tar.gz");
        let mut file = File::create(&archive).expect("create");
        file.write_all(b"this is not gzip").expect("write");

        let err = build(&config, "Qube-bad", dir.path(), &archive);
        assert!(err.is_err());
        assert!(!config.container_dir("Qube-bad").exists());
    }

    #[test]
    fn fallback_copy_recurses() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("nested")).expect("mkdir");
        std::fs::write(src.join("a.txt"), "a").expect("write");
        std::fs::write(src.join("nested/b.txt"), "b").expect("write");

        let dst = dir.path().join("dst");
        copy_dir_recursive(&src, &dst).expect("copy");
        assert_eq!(std::fs::read_to_string(dst.join("a.txt")).expect("read"), "a");
        assert_eq!(
            std::fs::read_to_string(dst.join("nested/b.txt")).expect("read"),
            "b"
        );
    }
}
