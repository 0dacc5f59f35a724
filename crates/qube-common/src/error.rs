//! Unified error types for the Qube workspace.
//!
//! Warnings (failed cgroup limit writes, orphan-sweep hiccups) are logged at
//! the call site and never surface through these variants.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum QubeError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An image spec did not match `<user>:<image>:<version>`.
    #[error("invalid image spec '{spec}': expected <user>:<image>:<version>")]
    BadImageSpec {
        /// The offending spec string.
        spec: String,
    },

    /// A launch request carried no command.
    #[error("no command specified to launch in container")]
    NoCommand,

    /// A volume mapping failed validation.
    #[error("invalid volume: {message}")]
    BadVolume {
        /// Description of the invalid mapping.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// An operation collided with existing state.
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the collision.
        message: String,
    },

    /// A kernel operation (mount, chroot, clone, kill) failed.
    #[error("{op} failed: {errno}")]
    Kernel {
        /// The operation that failed.
        op: &'static str,
        /// Errno reported by the kernel.
        errno: nix::errno::Errno,
    },

    /// The hub answered an image download with a non-success status.
    #[error("image fetch failed with status {status}: {body}")]
    ImageFetch {
        /// HTTP status code returned by the hub.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// A network operation failed before an HTTP status was available.
    #[error("network error: {message}")]
    Network {
        /// Description of the transport failure.
        message: String,
    },

    /// The launch pipeline failed between fork and ledger write.
    #[error("launch failed: {message}")]
    Launch {
        /// Description of the launch failure.
        message: String,
    },

    /// Persisted or user-supplied data could not be parsed.
    #[error("parse error: {message}")]
    Parse {
        /// Description of the malformed input.
        message: String,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, QubeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_image_spec_display_includes_spec() {
        let err = QubeError::BadImageSpec {
            spec: "onlyone".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("onlyone"));
        assert!(msg.contains("<user>:<image>:<version>"));
    }

    #[test]
    fn not_found_display_kind_and_id() {
        let err = QubeError::NotFound {
            kind: "container",
            id: "Qube-abcdef".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("container"));
        assert!(msg.contains("Qube-abcdef"));
    }

    #[test]
    fn image_fetch_display_status_and_body() {
        let err = QubeError::ImageFetch {
            status: 404,
            body: "no such image".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("404"));
        assert!(msg.contains("no such image"));
    }

    #[test]
    fn kernel_display_op_and_errno() {
        let err = QubeError::Kernel {
            op: "mount proc",
            errno: nix::errno::Errno::EPERM,
        };
        let msg = format!("{err}");
        assert!(msg.contains("mount proc"));
    }
}
