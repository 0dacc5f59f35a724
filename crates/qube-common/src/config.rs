//! Global configuration model for the Qube runtime.
//!
//! Every path is a public field so tests can point the whole runtime at
//! throwaway directories.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the Qube runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Base directory holding per-container directories and the image cache.
    pub containers_base: PathBuf,
    /// Root of the per-container cgroup v2 subtree.
    pub cgroup_root: PathBuf,
    /// Directory holding the tracking ledger.
    pub tracking_dir: PathBuf,
    /// Path of the tracking ledger file.
    pub ledger_path: PathBuf,
    /// Hard memory limit per container, in MiB.
    pub memory_max_mb: u64,
    /// Swap limit per container, in MiB.
    pub memory_swap_max_mb: u64,
    /// CPU quota per period, in microseconds.
    pub cpu_quota_us: u64,
    /// CPU period, in microseconds.
    pub cpu_period_us: u64,
    /// Base URL of the image hub.
    pub hub_base_url: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            containers_base: PathBuf::from(crate::constants::DEFAULT_CONTAINERS_BASE),
            cgroup_root: PathBuf::from(crate::constants::DEFAULT_CGROUP_ROOT),
            tracking_dir: PathBuf::from(crate::constants::DEFAULT_TRACKING_DIR),
            ledger_path: PathBuf::from(crate::constants::DEFAULT_LEDGER_PATH),
            memory_max_mb: crate::constants::DEFAULT_MEMORY_MAX_MB,
            memory_swap_max_mb: crate::constants::DEFAULT_MEMORY_SWAP_MAX_MB,
            cpu_quota_us: crate::constants::DEFAULT_CPU_QUOTA_US,
            cpu_period_us: crate::constants::DEFAULT_CPU_PERIOD_US,
            hub_base_url: crate::constants::DEFAULT_HUB_BASE_URL.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Returns the directory owned by a single container.
    #[must_use]
    pub fn container_dir(&self, name: &str) -> PathBuf {
        self.containers_base.join(name)
    }

    /// Returns the rootfs directory of a container.
    #[must_use]
    pub fn rootfs_dir(&self, name: &str) -> PathBuf {
        self.container_dir(name).join("rootfs")
    }

    /// Returns the shared image-cache directory.
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.containers_base.join(crate::constants::IMAGES_DIR_NAME)
    }

    /// Returns the cgroup node of a container.
    #[must_use]
    pub fn cgroup_dir(&self, name: &str) -> PathBuf {
        self.cgroup_root.join(name)
    }

    /// Hard memory limit in bytes.
    #[must_use]
    pub fn memory_max_bytes(&self) -> u64 {
        self.memory_max_mb * 1024 * 1024
    }

    /// Swap limit in bytes.
    #[must_use]
    pub fn memory_swap_max_bytes(&self) -> u64 {
        self.memory_swap_max_mb * 1024 * 1024
    }
}
