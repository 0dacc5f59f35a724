//! # qube-core
//!
//! Kernel-facing primitives for the Qube runtime:
//!
//! - **Filesystem**: per-container rootfs build (tarball extraction plus
//!   workspace sync), proc and volume bind mounts, teardown sweeps.
//! - **Cgroup**: the unified-hierarchy controller for memory/swap/CPU caps
//!   and live usage metrics.
//! - **Proc**: `/proc` parsing for liveness, RSS, CPU ticks, and uptime.
//! - **Namespace**: the clone-flag set a container is launched with.

pub mod cgroup;
pub mod filesystem;
#[cfg(target_os = "linux")]
pub mod namespace;
pub mod proc;
