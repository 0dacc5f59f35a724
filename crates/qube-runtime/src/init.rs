//! The init trampoline.
//!
//! The launch engine re-execs this binary with a sentinel first argument;
//! by then the process already sits inside its fresh namespaces, so the
//! trampoline only has to report its pid, assemble the filesystem view,
//! and exec the workload. It never returns to user code.

use qube_common::error::{QubeError, Result};

/// Environment variable carrying the rootfs path.
pub const ENV_ROOTFS: &str = "ROOTFS";

/// Environment variable signalling that fd 3 expects the pid report.
pub const ENV_PIPE_FD: &str = "PIPE_FD";

/// Prefix of the indexed command-fragment variables.
pub const CMD_ARG_PREFIX: &str = "CMD_ARG_";

/// Prefix of the indexed workload-environment variables.
pub const ENV_PREFIX: &str = "ENV_";

/// Prefix of the indexed `host:guest` volume variables.
pub const VOLUME_PREFIX: &str = "VOLUME_";

/// Returns whether an inherited variable belongs to the injection protocol.
///
/// The launcher strips these from the inherited environment so a daemon
/// restart can never leak one container's arguments into another.
#[must_use]
pub fn is_injected_key(key: &str) -> bool {
    key == ENV_ROOTFS
        || key == ENV_PIPE_FD
        || key.starts_with(CMD_ARG_PREFIX)
        || key.starts_with(ENV_PREFIX)
        || key.starts_with(VOLUME_PREFIX)
}

/// Collects the values of `<prefix>0`, `<prefix>1`, … until the first gap.
fn collect_indexed(prefix: &str) -> Vec<String> {
    let mut values = Vec::new();
    for i in 0.. {
        match std::env::var(format!("{prefix}{i}")) {
            Ok(value) if !value.is_empty() => values.push(value),
            _ => break,
        }
    }
    values
}

/// Runs as pid 1 of the new namespaces and becomes the workload.
///
/// Steps: report own pid over fd 3 (when `PIPE_FD` is set), bind the
/// injected volumes inside the fresh mount namespace, mount proc, chroot,
/// chdir to `/workspace` (falling back to `/`), apply the injected
/// environment, and exec `/bin/sh -c` on the `&&`-joined command fragments.
///
/// # Errors
///
/// Returns an error only when setup fails; on success the call never
/// returns because the process image is replaced.
#[cfg(target_os = "linux")]
pub fn container_init() -> Result<std::convert::Infallible> {
    use std::ffi::CString;
    use std::io::Write;
    use std::os::fd::{FromRawFd, OwnedFd};
    use std::path::{Path, PathBuf};

    if std::env::var(ENV_PIPE_FD).is_ok() {
        // SAFETY: fd 3 is the pipe write end the launcher dup2'd for us and
        // nothing else in this process owns it.
        let fd = unsafe { OwnedFd::from_raw_fd(3) };
        let mut pipe = std::fs::File::from(fd);
        let _ = pipe.write_all(std::process::id().to_string().as_bytes());
    }

    let rootfs = PathBuf::from(std::env::var(ENV_ROOTFS).map_err(|_| QubeError::Launch {
        message: format!("{ENV_ROOTFS} not set for container init"),
    })?);

    for pair in collect_indexed(VOLUME_PREFIX) {
        let (host, guest) = pair.split_once(':').ok_or_else(|| QubeError::BadVolume {
            message: format!("malformed volume mapping '{pair}'"),
        })?;
        qube_core::filesystem::mount::mount_volume(&rootfs, Path::new(host), guest)?;
    }

    qube_core::filesystem::mount::mount_proc(&rootfs)?;

    nix::unistd::chroot(&rootfs).map_err(|errno| QubeError::Kernel { op: "chroot", errno })?;
    if std::env::set_current_dir("/workspace").is_err() {
        std::env::set_current_dir("/").map_err(|e| QubeError::Io {
            path: "/".into(),
            source: e,
        })?;
    }

    for entry in collect_indexed(ENV_PREFIX) {
        if let Some((key, value)) = entry.split_once('=') {
            std::env::set_var(key, value);
        }
    }

    let fragments = collect_indexed(CMD_ARG_PREFIX);
    if fragments.is_empty() {
        return Err(QubeError::NoCommand);
    }
    let script = fragments.join(" && ");

    let shell = CString::new("/bin/sh").map_err(|_| QubeError::Launch {
        message: "shell path contains NUL".into(),
    })?;
    let argv = vec![
        shell.clone(),
        CString::new("-c").map_err(|_| QubeError::Launch {
            message: "argv contains NUL".into(),
        })?,
        CString::new(script).map_err(|_| QubeError::Launch {
            message: "command contains NUL".into(),
        })?,
    ];

    nix::unistd::execv(&shell, &argv).map_err(|errno| QubeError::Kernel {
        op: "exec /bin/sh",
        errno,
    })
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — the trampoline requires Linux namespaces.
#[cfg(not(target_os = "linux"))]
pub fn container_init() -> Result<std::convert::Infallible> {
    Err(QubeError::Launch {
        message: "Linux required for container init".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_keys_are_recognized() {
        assert!(is_injected_key("ROOTFS"));
        assert!(is_injected_key("PIPE_FD"));
        assert!(is_injected_key("CMD_ARG_0"));
        assert!(is_injected_key("ENV_12"));
        assert!(is_injected_key("VOLUME_3"));
    }

    #[test]
    fn ordinary_keys_are_not_injected() {
        assert!(!is_injected_key("PATH"));
        assert!(!is_injected_key("HOME"));
        assert!(!is_injected_key("ENVIRONMENT"));
    }

    #[test]
    fn collect_indexed_stops_at_first_gap() {
        std::env::set_var("QUBE_TEST_IDX_0", "a");
        std::env::set_var("QUBE_TEST_IDX_1", "b");
        std::env::set_var("QUBE_TEST_IDX_3", "d");

        let values = collect_indexed("QUBE_TEST_IDX_");
        assert_eq!(values, vec!["a", "b"]);

        std::env::remove_var("QUBE_TEST_IDX_0");
        std::env::remove_var("QUBE_TEST_IDX_1");
        std::env::remove_var("QUBE_TEST_IDX_3");
    }
}
