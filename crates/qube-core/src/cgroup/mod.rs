//! Cgroup v2 resource management.
//!
//! One subgroup per container under the configured root. Limit writes are
//! warnings, not errors — a container still runs when a controller file is
//! unavailable, just without that cap. Attaching the container process is
//! the only write that must succeed.

pub mod cpu;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use qube_common::config::RuntimeConfig;
use qube_common::error::{QubeError, Result};

use self::cpu::CpuSample;

/// Controller for the per-container cgroup subtree.
#[derive(Debug)]
pub struct CgroupController {
    root: PathBuf,
    memory_max_bytes: u64,
    memory_swap_max_bytes: u64,
    cpu_quota_us: u64,
    cpu_period_us: u64,
    pub(crate) cpu_samples: Mutex<HashMap<i32, CpuSample>>,
}

impl CgroupController {
    /// Creates a controller from the runtime configuration.
    #[must_use]
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            root: config.cgroup_root.clone(),
            memory_max_bytes: config.memory_max_bytes(),
            memory_swap_max_bytes: config.memory_swap_max_bytes(),
            cpu_quota_us: config.cpu_quota_us,
            cpu_period_us: config.cpu_period_us,
            cpu_samples: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cgroup node path of a container.
    #[must_use]
    pub fn node_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Returns the cgroup root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the cgroup root and enables the memory and cpu controllers.
    ///
    /// Enabling controllers is best effort — some hosts delegate the
    /// subtree differently and the write is logged, not fatal.
    ///
    /// # Errors
    ///
    /// Returns an error only if the root directory cannot be created.
    pub fn init_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| QubeError::Io {
            path: self.root.clone(),
            source: e,
        })?;

        let subtree_control = self.root.join("cgroup.subtree_control");
        match std::fs::write(&subtree_control, "+memory +cpu") {
            Ok(()) => tracing::info!("cgroup controllers enabled: memory, cpu"),
            Err(e) => tracing::warn!(error = %e, "failed to enable cgroup controllers"),
        }
        Ok(())
    }

    /// Creates a container's cgroup node and writes its limit files.
    ///
    /// Limit-file writes are warnings: the path is still returned so the
    /// container can be attached and run uncapped.
    ///
    /// # Errors
    ///
    /// Returns an error if the root or node directory cannot be created.
    pub fn setup(&self, name: &str) -> Result<PathBuf> {
        self.init_root()?;

        let node = self.node_path(name);
        std::fs::create_dir_all(&node).map_err(|e| QubeError::Io {
            path: node.clone(),
            source: e,
        })?;

        self.write_limit(&node, "memory.max", &self.memory_max_bytes.to_string());
        self.write_limit(&node, "memory.swap.max", &self.memory_swap_max_bytes.to_string());
        self.write_limit(
            &node,
            "cpu.max",
            &format!("{} {}", self.cpu_quota_us, self.cpu_period_us),
        );

        tracing::debug!(name, path = %node.display(), "cgroup node ready");
        Ok(node)
    }

    fn write_limit(&self, node: &Path, file: &str, value: &str) {
        let path = node.join(file);
        if let Err(e) = std::fs::write(&path, value) {
            tracing::warn!(file, value, error = %e, "failed to set cgroup limit");
        } else {
            tracing::debug!(file, value, "cgroup limit set");
        }
    }

    /// Adds a process to a cgroup node by writing its pid to `cgroup.procs`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; unlike limit writes, a failed
    /// attach leaves the container outside its cgroup and is reported.
    pub fn attach(&self, node: &Path, pid: i32) -> Result<()> {
        let procs = node.join("cgroup.procs");
        std::fs::write(&procs, pid.to_string()).map_err(|e| QubeError::Io {
            path: procs,
            source: e,
        })?;
        tracing::debug!(pid, "process attached to cgroup");
        Ok(())
    }

    /// Reads a container's current memory usage in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `memory.current` is unreadable or non-numeric;
    /// callers fall back to `/proc/<pid>/status`.
    pub fn memory_current(&self, name: &str) -> Result<u64> {
        let path = self.node_path(name).join("memory.current");
        let content = std::fs::read_to_string(&path).map_err(|e| QubeError::Io {
            path: path.clone(),
            source: e,
        })?;
        content.trim().parse::<u64>().map_err(|_| QubeError::Parse {
            message: format!("non-numeric memory.current for {name}"),
        })
    }

    /// Removes a container's cgroup node.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn remove(&self, name: &str) -> Result<()> {
        let node = self.node_path(name);
        if node.exists() {
            std::fs::remove_dir_all(&node).map_err(|e| QubeError::Io {
                path: node.clone(),
                source: e,
            })?;
            tracing::debug!(name, "cgroup node removed");
        }
        Ok(())
    }

    /// Lists the names of all existing cgroup nodes under the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the root exists but cannot be read.
    pub fn list_nodes(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.root).map_err(|e| QubeError::Io {
            path: self.root.clone(),
            source: e,
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| QubeError::Io {
                path: self.root.clone(),
                source: e,
            })?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller_in(dir: &Path) -> CgroupController {
        let config = RuntimeConfig {
            cgroup_root: dir.join("cgroup"),
            ..RuntimeConfig::default()
        };
        CgroupController::new(&config)
    }

    #[test]
    fn setup_writes_limit_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = controller_in(dir.path());

        let node = controller.setup("Qube-abcdef").expect("setup");
        assert!(node.ends_with("Qube-abcdef"));

        let mem = std::fs::read_to_string(node.join("memory.max")).expect("memory.max");
        assert_eq!(mem, (2048u64 * 1024 * 1024).to_string());
        let swap = std::fs::read_to_string(node.join("memory.swap.max")).expect("swap");
        assert_eq!(swap, (1024u64 * 1024 * 1024).to_string());
        let cpu = std::fs::read_to_string(node.join("cpu.max")).expect("cpu.max");
        assert_eq!(cpu, "200000 100000");
    }

    #[test]
    fn attach_writes_pid_to_procs_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = controller_in(dir.path());
        let node = controller.setup("Qube-attach").expect("setup");

        controller.attach(&node, 4242).expect("attach");
        let procs = std::fs::read_to_string(node.join("cgroup.procs")).expect("procs");
        assert_eq!(procs, "4242");
    }

    #[test]
    fn memory_current_reads_node_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = controller_in(dir.path());
        let node = controller.setup("Qube-mem").expect("setup");

        std::fs::write(node.join("memory.current"), "123456\n").expect("write");
        assert_eq!(controller.memory_current("Qube-mem").expect("read"), 123_456);
    }

    #[test]
    fn memory_current_missing_node_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = controller_in(dir.path());
        assert!(controller.memory_current("Qube-none").is_err());
    }

    #[test]
    fn remove_deletes_node() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = controller_in(dir.path());
        let node = controller.setup("Qube-rm").expect("setup");
        assert!(node.exists());

        controller.remove("Qube-rm").expect("remove");
        assert!(!node.exists());
        // removing again is a no-op
        controller.remove("Qube-rm").expect("idempotent remove");
    }

    #[test]
    fn list_nodes_names_subdirectories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = controller_in(dir.path());
        controller.setup("Qube-one").expect("setup");
        controller.setup("Qube-two").expect("setup");

        let mut names = controller.list_nodes().expect("list");
        names.sort();
        assert_eq!(names, vec!["Qube-one", "Qube-two"]);
    }
}
