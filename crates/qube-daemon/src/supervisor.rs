//! The supervision loop.
//!
//! On startup: orphan-directory sweep, cgroup-root init, control surface.
//! Then a five-second tick: dead containers are marked in the ledger and
//! restarted (through crash-loop damping), orphan cgroups are pruned, and
//! SIGINT/SIGTERM end the loop. Every per-container failure is swallowed
//! with a warning so one bad container never stops the daemon.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use qube_common::types::{PID_EXITED, PID_STOPPED};
use qube_core::{filesystem, proc};
use qube_runtime::{ContainerRecord, Engine, LaunchSpec};
use tokio::signal::unix::{signal, SignalKind};

use crate::restart::RestartPolicy;

/// Seconds between supervision scans.
const TICK_SECS: u64 = 5;

/// The supervising daemon.
pub struct Supervisor {
    engine: Arc<Engine>,
    policy: RestartPolicy,
    debug: bool,
}

impl Supervisor {
    /// Creates a supervisor over an engine.
    #[must_use]
    pub fn new(engine: Arc<Engine>, debug: bool) -> Self {
        Self {
            engine,
            policy: RestartPolicy::new(),
            debug,
        }
    }

    /// Runs the daemon until SIGINT or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error only for unrecoverable startup failures (signal
    /// registration, initial blocking-task join).
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        // Children are never waited on; let the kernel reap them so a dead
        // container actually disappears from /proc.
        ignore_sigchld();

        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || cleanup_orphan_dirs(&engine)).await?;

        if let Err(e) = self.engine.cgroups().init_root() {
            tracing::warn!(error = %e, "cgroup root unavailable, containers run without limits");
        }

        let server_engine = self.engine.clone();
        tokio::spawn(async move {
            if let Err(e) = crate::server::serve(server_engine).await {
                tracing::error!(error = %e, "control surface failed");
            }
        });

        let mut interval = tokio::time::interval(Duration::from_secs(TICK_SECS));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tracing::info!("supervisor running, scanning every {TICK_SECS}s");
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = sigint.recv() => {
                    tracing::info!("received SIGINT, stopping daemon");
                    break;
                }
                _ = sigterm.recv() => {
                    tracing::info!("received SIGTERM, stopping daemon");
                    break;
                }
            }
        }
        Ok(())
    }

    async fn tick(&self) {
        let engine = self.engine.clone();
        let records = match tokio::task::spawn_blocking(move || engine.ledger().list()).await {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "ledger scan failed");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "ledger scan task failed");
                return;
            }
        };

        let tracked: HashSet<String> = records.iter().map(|r| r.name.clone()).collect();

        for mut record in records {
            if record.pid == PID_STOPPED {
                continue;
            }
            if record.pid > 0 {
                if proc::alive(record.pid) {
                    continue;
                }
                if self.debug {
                    tracing::debug!(name = %record.name, pid = record.pid, "container exited");
                }
                let engine = self.engine.clone();
                let name = record.name.clone();
                let marked =
                    tokio::task::spawn_blocking(move || engine.ledger().set_pid(&name, PID_EXITED))
                        .await;
                if !matches!(marked, Ok(Ok(()))) {
                    tracing::warn!(name = %record.name, "failed to mark container exited");
                    continue;
                }
                record.pid = PID_EXITED;
            }
            self.schedule_restart(record);
        }

        let engine = self.engine.clone();
        let _ = tokio::task::spawn_blocking(move || sweep_orphan_cgroups(&engine, &tracked)).await;
    }

    fn schedule_restart(&self, record: ContainerRecord) {
        if !self.policy.admit(&record.name) {
            tracing::warn!(name = %record.name, "container is crash-looping, pausing restarts");
            return;
        }

        let engine = self.engine.clone();
        let debug = self.debug;
        tokio::task::spawn_blocking(move || {
            let mut spec = LaunchSpec::from_record(&record);
            spec.debug = debug;
            match engine.run(&spec) {
                Ok(restarted) => {
                    tracing::info!(name = %restarted.name, pid = restarted.pid, "container restarted");
                }
                Err(e) => {
                    tracing::warn!(name = %record.name, error = %e, "restart failed");
                }
            }
        });
    }
}

/// Removes container directories that are not in the ledger.
///
/// Any proc mount still visible in `/proc/mounts` under an orphan rootfs is
/// lazily detached first, with bounded retries.
pub fn cleanup_orphan_dirs(engine: &Engine) {
    let Ok(records) = engine.ledger().list() else {
        tracing::warn!("skipping orphan sweep, ledger unreadable");
        return;
    };
    let tracked: HashSet<String> = records.into_iter().map(|r| r.name).collect();

    let base = &engine.config().containers_base;
    let Ok(entries) = std::fs::read_dir(base) else {
        return;
    };

    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == qube_common::constants::IMAGES_DIR_NAME || tracked.contains(&name) {
            continue;
        }

        tracing::info!(name = %name, "removing orphaned container directory");

        let proc_path = entry.path().join("rootfs/proc");
        let proc_str = proc_path.display().to_string();
        for _ in 0..10 {
            let Ok(mounts) = std::fs::read_to_string("/proc/mounts") else {
                break;
            };
            if !mounts.contains(&proc_str) {
                break;
            }
            filesystem::mount::detach_mount(&proc_path);
            std::thread::sleep(Duration::from_millis(100));
        }

        if let Err(e) = std::fs::remove_dir_all(entry.path()) {
            tracing::warn!(name = %name, error = %e, "failed to remove orphaned container");
        }
    }
}

/// Removes cgroup nodes whose name is not in the ledger.
pub fn sweep_orphan_cgroups(engine: &Engine, tracked: &HashSet<String>) {
    let Ok(nodes) = engine.cgroups().list_nodes() else {
        return;
    };
    for name in nodes {
        if !tracked.contains(&name) {
            tracing::debug!(name = %name, "removing orphaned cgroup");
            if let Err(e) = engine.cgroups().remove(&name) {
                tracing::warn!(name = %name, error = %e, "failed to remove orphaned cgroup");
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn ignore_sigchld() {
    use nix::sys::signal::{signal as set_signal, SigHandler, Signal};
    // SAFETY: installing SIG_IGN for SIGCHLD has no handler to race with.
    if let Err(e) = unsafe { set_signal(Signal::SIGCHLD, SigHandler::SigIgn) } {
        tracing::warn!(error = %e, "failed to ignore SIGCHLD");
    }
}

#[cfg(not(target_os = "linux"))]
fn ignore_sigchld() {}
