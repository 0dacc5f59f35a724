//! Mount plumbing for container rootfs trees.
//!
//! Proc mounts, volume bind mounts, and the best-effort teardown sweep run
//! before a rootfs is deleted.

use std::path::Path;
use std::time::Duration;

use qube_common::error::Result;

/// Pseudo-filesystem mount points swept during teardown, inner-most first.
pub const TEARDOWN_MOUNTS: [&str; 4] = ["proc", "sys", "dev/pts", "dev"];

/// Mounts `proc` at `<rootfs>/proc` with exec, suid, and dev forbidden.
///
/// # Errors
///
/// Returns an error if the mount point cannot be created or the mount
/// syscall fails.
#[cfg(target_os = "linux")]
pub fn mount_proc(rootfs: &Path) -> Result<()> {
    use nix::mount::{mount, MsFlags};
    use qube_common::error::QubeError;

    let proc_path = rootfs.join("proc");
    std::fs::create_dir_all(&proc_path).map_err(|e| QubeError::Io {
        path: proc_path.clone(),
        source: e,
    })?;

    mount(
        Some("proc"),
        &proc_path,
        Some("proc"),
        MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_NODEV,
        None::<&str>,
    )
    .map_err(|errno| QubeError::Kernel {
        op: "mount proc",
        errno,
    })?;
    tracing::debug!(path = %proc_path.display(), "proc mounted");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — mounts require Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_proc(_rootfs: &Path) -> Result<()> {
    Err(qube_common::error::QubeError::Launch {
        message: "Linux required for container mounts".into(),
    })
}

/// Bind-mounts a host path into a container rootfs.
///
/// The host path must exist; the mount point is created under the rootfs
/// and any stale mount there is lazily detached first.
///
/// # Errors
///
/// Returns [`BadVolume`](qube_common::error::QubeError::BadVolume) for a
/// missing host path and a kernel error if the bind mount fails.
#[cfg(target_os = "linux")]
pub fn mount_volume(rootfs: &Path, host: &Path, guest: &str) -> Result<()> {
    use nix::mount::{mount, umount2, MntFlags, MsFlags};
    use qube_common::error::QubeError;

    if !host.exists() {
        return Err(QubeError::BadVolume {
            message: format!("host path '{}' does not exist", host.display()),
        });
    }

    let dest = rootfs.join(guest.trim_start_matches('/'));
    std::fs::create_dir_all(&dest).map_err(|e| QubeError::Io {
        path: dest.clone(),
        source: e,
    })?;

    let _ = umount2(&dest, MntFlags::MNT_DETACH);

    mount(
        Some(host),
        &dest,
        None::<&str>,
        MsFlags::MS_BIND,
        None::<&str>,
    )
    .map_err(|errno| QubeError::Kernel {
        op: "bind mount volume",
        errno,
    })?;
    tracing::debug!(host = %host.display(), dest = %dest.display(), "volume mounted");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — mounts require Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_volume(_rootfs: &Path, _host: &Path, _guest: &str) -> Result<()> {
    Err(qube_common::error::QubeError::Launch {
        message: "Linux required for container mounts".into(),
    })
}

/// Best-effort unmount sweep over a rootfs before deletion.
///
/// Each pseudo-filesystem mount point gets up to five lazy detaches with
/// 50 ms spacing; failures are ignored because the mounts may never have
/// existed.
pub fn unmount_rootfs(rootfs: &Path) {
    for mount_point in TEARDOWN_MOUNTS {
        let path = rootfs.join(mount_point);
        for _ in 0..5 {
            detach_mount(&path);
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

/// Lazily detaches a single mount point, ignoring failure.
#[cfg(target_os = "linux")]
pub fn detach_mount(path: &Path) {
    use nix::mount::{umount2, MntFlags};
    let _ = umount2(path, MntFlags::MNT_DETACH);
}

/// Stub for non-Linux platforms.
#[cfg(not(target_os = "linux"))]
pub fn detach_mount(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teardown_sweeps_inner_mounts_first() {
        assert_eq!(TEARDOWN_MOUNTS, ["proc", "sys", "dev/pts", "dev"]);
        let pts = TEARDOWN_MOUNTS.iter().position(|m| *m == "dev/pts");
        let dev = TEARDOWN_MOUNTS.iter().position(|m| *m == "dev");
        assert!(pts < dev);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn mount_volume_rejects_missing_host_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = mount_volume(dir.path(), Path::new("/definitely/not/here"), "/data");
        assert!(matches!(
            err,
            Err(qube_common::error::QubeError::BadVolume { .. })
        ));
    }

    #[test]
    fn unmount_rootfs_tolerates_unmounted_tree() {
        let dir = tempfile::tempdir().expect("tempdir");
        unmount_rootfs(dir.path());
    }
}
