//! The container launch engine.
//!
//! Builds the rootfs, prepares the cgroup, clones a re-exec of this binary
//! into fresh namespaces, and records the result in the ledger. The engine
//! never waits on its children — the supervisor polls `/proc`.

use std::path::PathBuf;

use qube_common::config::RuntimeConfig;
use qube_common::constants::CONTAINER_NAME_PREFIX;
use qube_common::error::{QubeError, Result};
use qube_core::cgroup::CgroupController;
use qube_core::filesystem;
use qube_image::ImageStore;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::ledger::{ContainerRecord, Ledger};

/// Everything needed to launch (or relaunch) one container.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Reuse this name and ledger row instead of creating a fresh one.
    pub existing_name: Option<String>,
    /// Host directory seeded into `/workspace`.
    pub work_dir: PathBuf,
    /// Shell fragments, `&&`-joined at execution time.
    pub command: Vec<String>,
    /// Verbose launch reporting.
    pub debug: bool,
    /// Image identifier `user:name:version`.
    pub image: String,
    /// Advisory comma-separated port list.
    pub ports: String,
    /// Whether to add a fresh network namespace.
    pub isolated: bool,
    /// `(host_path, container_path)` bind mounts.
    pub volumes: Vec<(String, String)>,
    /// `KEY=VALUE` environment entries for the workload.
    pub env: Vec<String>,
}

impl LaunchSpec {
    /// Builds a relaunch spec from a ledger record.
    #[must_use]
    pub fn from_record(record: &ContainerRecord) -> Self {
        Self {
            existing_name: Some(record.name.clone()),
            work_dir: PathBuf::from(&record.work_dir),
            command: record.command.clone(),
            debug: false,
            image: record.image.clone(),
            ports: record.ports.clone(),
            isolated: record.isolated,
            volumes: record.volumes.clone(),
            env: record.env.clone(),
        }
    }
}

/// The runtime engine coordinating image store, filesystem, cgroups, and
/// the ledger.
#[derive(Debug)]
pub struct Engine {
    config: RuntimeConfig,
    images: ImageStore,
    cgroups: CgroupController,
    ledger: Ledger,
}

impl Engine {
    /// Creates an engine over the given configuration.
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        let images = ImageStore::new(&config);
        let cgroups = CgroupController::new(&config);
        let ledger = Ledger::new(&config);
        Self {
            config,
            images,
            cgroups,
            ledger,
        }
    }

    /// Creates an engine with production defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RuntimeConfig::default())
    }

    /// Returns the runtime configuration.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Returns the image store.
    #[must_use]
    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    /// Returns the cgroup controller.
    #[must_use]
    pub fn cgroups(&self) -> &CgroupController {
        &self.cgroups
    }

    /// Returns the ledger.
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Generates a fresh container name.
    #[must_use]
    pub fn generate_name() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        format!("{CONTAINER_NAME_PREFIX}{suffix}")
    }

    /// Launches a container and records it in the ledger.
    ///
    /// Rootfs and ledger state are all-or-nothing: a failed build removes
    /// both the partial tree and any ledger row before the error returns.
    /// Cgroup setup is best effort — the container runs uncapped when the
    /// controller files are unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`QubeError::NoCommand`] for an empty command, image and
    /// build errors from the rootfs stage, and [`QubeError::Launch`] when
    /// the child never reports over the pipe.
    pub fn run(&self, spec: &LaunchSpec) -> Result<ContainerRecord> {
        if spec.command.is_empty() {
            return Err(QubeError::NoCommand);
        }

        let restarting = spec.existing_name.is_some();
        let name = spec
            .existing_name
            .clone()
            .unwrap_or_else(Self::generate_name);

        self.build_rootfs(&name, spec)?;

        let cgroup_node = match self.cgroups.setup(&name) {
            Ok(node) => {
                if spec.debug {
                    tracing::debug!(name = %name, node = %node.display(), "cgroup ready");
                }
                Some(node)
            }
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "cgroup setup failed, running without limits");
                None
            }
        };

        let pid = self.spawn_init(&name, spec)?;

        if let Some(node) = &cgroup_node {
            if let Err(e) = self.cgroups.attach(node, pid) {
                tracing::warn!(name = %name, pid, error = %e, "failed to attach process to cgroup");
            }
        }

        let record = ContainerRecord {
            name: name.clone(),
            pid,
            work_dir: spec.work_dir.display().to_string(),
            command: spec.command.clone(),
            created_at: epoch_now(),
            image: spec.image.clone(),
            ports: spec.ports.clone(),
            isolated: spec.isolated,
            volumes: spec.volumes.clone(),
            env: spec.env.clone(),
        };
        if restarting {
            self.ledger.update(&record)?;
        } else {
            self.ledger.insert(&record)?;
        }

        tracing::info!(name = %name, pid, image = %spec.image, "container started");
        Ok(record)
    }

    /// Builds a container's rootfs without launching it.
    ///
    /// This is the dry-run path used by the Dockerfile conversion: the
    /// returned name is tracked with pid -1 and picked up by the daemon.
    ///
    /// # Errors
    ///
    /// Same rootfs-stage failure modes as [`run`](Self::run).
    pub fn build(
        &self,
        existing_name: Option<&str>,
        work_dir: &std::path::Path,
        image: &str,
    ) -> Result<String> {
        let name = existing_name
            .map(ToOwned::to_owned)
            .unwrap_or_else(Self::generate_name);
        let spec = LaunchSpec {
            existing_name: Some(name.clone()),
            work_dir: work_dir.to_path_buf(),
            command: Vec::new(),
            debug: false,
            image: image.to_owned(),
            ports: String::new(),
            isolated: false,
            volumes: Vec::new(),
            env: Vec::new(),
        };
        self.build_rootfs(&name, &spec)?;
        Ok(name)
    }

    fn build_rootfs(&self, name: &str, spec: &LaunchSpec) -> Result<()> {
        let result = self
            .images
            .ensure(&spec.image)
            .and_then(|archive| filesystem::build(&self.config, name, &spec.work_dir, &archive));
        if let Err(e) = result {
            tracing::error!(name, image = %spec.image, error = %e, "rootfs build failed");
            let _ = self.ledger.remove_by_name(name);
            return Err(e);
        }
        Ok(())
    }

    /// Clones a re-exec of this binary into fresh namespaces.
    ///
    /// The child inherits the pipe's write end as fd 3 and reports its
    /// in-namespace pid through it; the parent returns the host-visible pid
    /// without ever waiting on the child.
    #[cfg(target_os = "linux")]
    fn spawn_init(&self, name: &str, spec: &LaunchSpec) -> Result<i32> {
        use std::io::Read;
        use std::os::fd::AsRawFd;

        use nix::sched::clone;
        use nix::sys::signal::Signal;

        let rootfs = self.config.rootfs_dir(name);

        let (pipe_read, pipe_write) =
            nix::unistd::pipe().map_err(|errno| QubeError::Kernel { op: "pipe", errno })?;
        let write_raw = pipe_write.as_raw_fd();

        // argv and envp are fully built before clone; the child callback
        // only dup2s and execs.
        let exe = cstring("/proc/self/exe")?;
        let argv = vec![
            cstring("/proc/self/exe")?,
            cstring(qube_common::constants::INIT_SENTINEL)?,
        ];
        let envp = build_child_env(&rootfs, spec)?;

        let flags = qube_core::namespace::clone_flags(spec.isolated);
        let mut stack = vec![0u8; 1024 * 1024];

        let child = unsafe {
            clone(
                Box::new(|| {
                    if nix::unistd::dup2(write_raw, 3).is_err() {
                        return 127;
                    }
                    let _ = nix::unistd::execve(&exe, &argv, &envp);
                    127
                }),
                &mut stack,
                flags,
                Some(Signal::SIGCHLD as i32),
            )
        }
        .map_err(|errno| QubeError::Kernel { op: "clone", errno })?;

        drop(pipe_write);

        let mut reader = std::fs::File::from(pipe_read);
        let mut buf = [0u8; 16];
        let reported = reader.read(&mut buf).unwrap_or(0);
        if reported == 0 {
            return Err(QubeError::Launch {
                message: format!("container {name} did not report a pid"),
            });
        }
        if spec.debug {
            let inner = String::from_utf8_lossy(&buf[..reported]).into_owned();
            tracing::debug!(name, host_pid = child.as_raw(), inner_pid = %inner, "child reported");
        }

        Ok(child.as_raw())
    }

    /// Stub for non-Linux platforms.
    #[cfg(not(target_os = "linux"))]
    fn spawn_init(&self, _name: &str, _spec: &LaunchSpec) -> Result<i32> {
        Err(QubeError::Launch {
            message: "Linux required to launch containers".into(),
        })
    }
}

/// Environment handed to the init trampoline.
#[cfg(target_os = "linux")]
fn build_child_env(
    rootfs: &std::path::Path,
    spec: &LaunchSpec,
) -> Result<Vec<std::ffi::CString>> {
    let mut envp = Vec::new();
    for (key, value) in std::env::vars() {
        if crate::init::is_injected_key(&key) {
            continue;
        }
        if let Ok(entry) = std::ffi::CString::new(format!("{key}={value}")) {
            envp.push(entry);
        }
    }
    envp.push(cstring(&format!(
        "{}={}",
        crate::init::ENV_ROOTFS,
        rootfs.display()
    ))?);
    envp.push(cstring(&format!("{}=3", crate::init::ENV_PIPE_FD))?);
    for (i, fragment) in spec.command.iter().enumerate() {
        envp.push(cstring(&format!(
            "{}{i}={fragment}",
            crate::init::CMD_ARG_PREFIX
        ))?);
    }
    for (i, entry) in spec.env.iter().enumerate() {
        envp.push(cstring(&format!("{}{i}={entry}", crate::init::ENV_PREFIX))?);
    }
    for (i, (host, guest)) in spec.volumes.iter().enumerate() {
        envp.push(cstring(&format!(
            "{}{i}={host}:{guest}",
            crate::init::VOLUME_PREFIX
        ))?);
    }
    Ok(envp)
}

#[cfg(target_os = "linux")]
fn cstring(value: &str) -> Result<std::ffi::CString> {
    std::ffi::CString::new(value).map_err(|_| QubeError::Parse {
        message: format!("embedded NUL in '{value}'"),
    })
}

pub(crate) fn epoch_now() -> u64 {
    let now = chrono::Utc::now().timestamp();
    u64::try_from(now).unwrap_or(0)
}
