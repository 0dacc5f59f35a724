//! Lifecycle operations over tracked containers.
//!
//! List, stop, start, delete, eval, info, and snapshot — the operation set
//! shared by the CLI and the control surface.

use std::path::PathBuf;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use qube_common::error::{QubeError, Result};
use qube_common::types::{ContainerStatus, PID_STOPPED};
use qube_core::{filesystem, proc};
use serde::Serialize;

use crate::engine::{epoch_now, Engine, LaunchSpec};
use crate::ledger::ContainerRecord;

/// A tracked container joined with its live stats.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerDetails {
    /// Container name.
    pub name: String,
    /// Ledger pid (may be a sentinel).
    pub pid: i32,
    /// Host working directory.
    pub directory: String,
    /// Shell fragments.
    pub command: Vec<String>,
    /// Image identifier.
    pub image: String,
    /// Epoch seconds at track/update time.
    pub timestamp: u64,
    /// Advisory port list.
    pub ports: String,
    /// Network isolation flag.
    pub isolated: bool,
    /// Bind mounts.
    pub volumes: Vec<(String, String)>,
    /// Workload environment.
    pub environment: Vec<String>,
    /// Classified lifecycle status.
    pub status: ContainerStatus,
    /// Live memory usage in MiB, when observable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
    /// CPU usage percent, when running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
    /// Process uptime in seconds, when running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<u64>,
}

impl Engine {
    /// Finds a ledger record by name or decimal pid.
    ///
    /// # Errors
    ///
    /// Returns [`QubeError::NotFound`] when nothing matches.
    pub fn find_record(&self, name_or_pid: &str) -> Result<ContainerRecord> {
        self.ledger()
            .find(name_or_pid)?
            .ok_or_else(|| QubeError::NotFound {
                kind: "container",
                id: name_or_pid.to_owned(),
            })
    }

    /// Lists every tracked container with live stats.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn list(&self) -> Result<Vec<ContainerDetails>> {
        let records = self.ledger().list()?;
        Ok(records.iter().map(|r| self.details(r)).collect())
    }

    /// Returns one container's record joined with live stats.
    ///
    /// # Errors
    ///
    /// Returns [`QubeError::NotFound`] for an unknown container.
    pub fn info(&self, name_or_pid: &str) -> Result<ContainerDetails> {
        let record = self.find_record(name_or_pid)?;
        Ok(self.details(&record))
    }

    /// Stops a container with SIGKILL and marks it deliberately stopped.
    ///
    /// Stopping an already-stopped container is a success no-op; an exited
    /// one is only marked so the supervisor stops restarting it.
    ///
    /// # Errors
    ///
    /// Returns [`QubeError::NotFound`] for an unknown container and a
    /// kernel error if the signal cannot be delivered.
    pub fn stop(&self, name_or_pid: &str) -> Result<()> {
        let record = self.find_record(name_or_pid)?;
        if record.pid == PID_STOPPED {
            tracing::info!(name = %record.name, "container already stopped");
            return Ok(());
        }

        if record.pid > 0 {
            match kill(Pid::from_raw(record.pid), Signal::SIGKILL) {
                Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
                Err(errno) => return Err(QubeError::Kernel { op: "kill", errno }),
            }
        }

        self.ledger().set_pid(&record.name, PID_STOPPED)?;
        tracing::info!(name = %record.name, pid = record.pid, "container stopped");
        Ok(())
    }

    /// Starts a tracked container that is not currently running.
    ///
    /// Returns `None` when the container is already alive (a no-op) and the
    /// fresh record otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`QubeError::NotFound`] for an unknown container plus any
    /// launch failure.
    pub fn start(&self, name_or_pid: &str) -> Result<Option<ContainerRecord>> {
        let record = self.find_record(name_or_pid)?;
        if proc::alive(record.pid) {
            tracing::info!(name = %record.name, pid = record.pid, "container already running");
            return Ok(None);
        }
        let spec = LaunchSpec::from_record(&record);
        self.run(&spec).map(Some)
    }

    /// Deletes a container: kill, unmount sweep, ledger row, cgroup, tree.
    ///
    /// Returns the name of the deleted container.
    ///
    /// # Errors
    ///
    /// Returns [`QubeError::NotFound`] for an unknown container and an I/O
    /// error if the directory tree survives removal.
    pub fn delete(&self, name_or_pid: &str) -> Result<String> {
        let record = self.find_record(name_or_pid)?;

        if record.pid > 0 && proc::alive(record.pid) {
            let _ = kill(Pid::from_raw(record.pid), Signal::SIGKILL);
            std::thread::sleep(Duration::from_millis(500));
        }

        filesystem::mount::unmount_rootfs(&self.config().rootfs_dir(&record.name));

        self.ledger().remove_by_name(&record.name)?;

        if let Err(e) = self.cgroups().remove(&record.name) {
            tracing::warn!(name = %record.name, error = %e, "failed to remove cgroup");
        }

        filesystem::remove_container_dir(self.config(), &record.name)?;

        tracing::info!(name = %record.name, "container deleted");
        Ok(record.name)
    }

    /// Runs a shell command inside a running container, capturing output.
    ///
    /// # Errors
    ///
    /// Returns [`QubeError::NotFound`] for an unknown container,
    /// [`QubeError::Conflict`] when it is not running, and an I/O error if
    /// `nsenter` cannot be spawned.
    pub fn eval(&self, name_or_pid: &str, command: &str) -> Result<String> {
        let record = self.find_record(name_or_pid)?;
        if record.pid <= 0 || !proc::alive(record.pid) {
            return Err(QubeError::Conflict {
                message: format!("container {} is not running", record.name),
            });
        }

        let rootfs = self.config().rootfs_dir(&record.name);
        let output = nsenter_command(record.pid, &rootfs, command)
            .output()
            .map_err(|e| QubeError::Io {
                path: PathBuf::from("nsenter"),
                source: e,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(combined)
    }

    /// Archives a container's rootfs to `<work_dir>/snapshot_<epoch>.tar.gz`.
    ///
    /// # Errors
    ///
    /// Returns [`QubeError::NotFound`] for an unknown container or a
    /// missing rootfs, and I/O errors from the archive write.
    pub fn snapshot(&self, name_or_pid: &str) -> Result<PathBuf> {
        let record = self.find_record(name_or_pid)?;
        let rootfs = self.config().rootfs_dir(&record.name);
        if !rootfs.exists() {
            return Err(QubeError::NotFound {
                kind: "rootfs",
                id: record.name.clone(),
            });
        }

        let dest = PathBuf::from(&record.work_dir).join(format!("snapshot_{}.tar.gz", epoch_now()));
        let file = std::fs::File::create(&dest).map_err(|e| QubeError::Io {
            path: dest.clone(),
            source: e,
        })?;
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder
            .append_dir_all("rootfs", &rootfs)
            .and_then(|()| builder.into_inner())
            .and_then(flate2::write::GzEncoder::finish)
            .map_err(|e| QubeError::Io {
                path: dest.clone(),
                source: e,
            })?;

        tracing::info!(name = %record.name, dest = %dest.display(), "snapshot created");
        Ok(dest)
    }

    fn details(&self, record: &ContainerRecord) -> ContainerDetails {
        let alive = proc::alive(record.pid);
        let status = ContainerStatus::classify(record.pid, alive);

        let memory_bytes = self
            .cgroups()
            .memory_current(&record.name)
            .ok()
            .or_else(|| {
                (record.pid > 0 && alive)
                    .then(|| proc::vm_rss_bytes(record.pid).ok())
                    .flatten()
            });
        #[allow(clippy::cast_precision_loss)]
        let memory_mb = memory_bytes.map(|bytes| bytes as f64 / (1024.0 * 1024.0));

        let cpu_percent =
            (status == ContainerStatus::Running).then(|| self.cgroups().cpu_percent(record.pid));
        let uptime_secs = (status == ContainerStatus::Running)
            .then(|| proc::process_uptime_secs(record.pid).ok())
            .flatten();

        ContainerDetails {
            name: record.name.clone(),
            pid: record.pid,
            directory: record.work_dir.clone(),
            command: record.command.clone(),
            image: record.image.clone(),
            timestamp: record.created_at,
            ports: record.ports.clone(),
            isolated: record.isolated,
            volumes: record.volumes.clone(),
            environment: record.env.clone(),
            status,
            memory_mb,
            cpu_percent,
            uptime_secs,
        }
    }
}

/// Builds the `nsenter … chroot … /bin/sh -c <cmd>` command used by eval.
///
/// Exposed so the CLI can run it with inherited stdio for interactive use.
#[must_use]
pub fn nsenter_command(pid: i32, rootfs: &std::path::Path, command: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("nsenter");
    cmd.arg("-t")
        .arg(pid.to_string())
        .arg("-m")
        .arg("-u")
        .arg("-i")
        .arg("-p")
        .arg("chroot")
        .arg(rootfs)
        .arg("/bin/sh")
        .arg("-c")
        .arg(command);
    cmd
}
