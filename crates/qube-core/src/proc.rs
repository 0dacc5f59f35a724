//! `/proc` parsing helpers.
//!
//! The runtime never calls `waitpid`; liveness, CPU ticks, RSS, and uptime
//! are all derived from procfs reads.

use std::path::{Path, PathBuf};

use qube_common::error::{QubeError, Result};

/// Clock ticks per second assumed for `/proc/<pid>/stat` arithmetic.
///
/// Matches `CONFIG_HZ`-independent USER_HZ on effectively all Linux builds.
pub const CLK_TCK: u64 = 100;

/// Returns whether `/proc/<pid>` exists.
#[must_use]
pub fn alive(pid: i32) -> bool {
    pid > 0 && Path::new("/proc").join(pid.to_string()).exists()
}

/// Reads the stat fields following the `(comm)` field.
///
/// The comm field may itself contain spaces and parentheses, so the line is
/// split at the last closing parenthesis rather than on whitespace alone.
/// Index 0 of the returned fields is the process state (overall field 3).
fn stat_after_comm(pid: i32) -> Result<Vec<String>> {
    let path = PathBuf::from(format!("/proc/{pid}/stat"));
    let content = std::fs::read_to_string(&path).map_err(|e| QubeError::Io {
        path: path.clone(),
        source: e,
    })?;
    let rest = content
        .rsplit_once(')')
        .map(|(_, rest)| rest)
        .ok_or_else(|| QubeError::Parse {
            message: format!("malformed stat line for pid {pid}"),
        })?;
    Ok(rest.split_whitespace().map(ToOwned::to_owned).collect())
}

/// Sums `utime` and `stime` (overall stat fields 14 and 15) for a process.
///
/// # Errors
///
/// Returns an error if the stat file is unreadable or malformed.
pub fn total_cpu_ticks(pid: i32) -> Result<u64> {
    let fields = stat_after_comm(pid)?;
    // state is overall field 3, so utime (14) and stime (15) land at 11 and 12
    let utime = parse_tick_field(&fields, 11, pid)?;
    let stime = parse_tick_field(&fields, 12, pid)?;
    Ok(utime + stime)
}

/// Reads `starttime` (overall stat field 22) in clock ticks since boot.
///
/// # Errors
///
/// Returns an error if the stat file is unreadable or malformed.
pub fn start_time_ticks(pid: i32) -> Result<u64> {
    let fields = stat_after_comm(pid)?;
    parse_tick_field(&fields, 19, pid)
}

fn parse_tick_field(fields: &[String], index: usize, pid: i32) -> Result<u64> {
    fields
        .get(index)
        .and_then(|f| f.parse::<u64>().ok())
        .ok_or_else(|| QubeError::Parse {
            message: format!("stat field {index} missing for pid {pid}"),
        })
}

/// Computes a process's uptime from its start ticks and `/proc/uptime`.
///
/// # Errors
///
/// Returns an error if either procfs read fails or parses badly.
pub fn process_uptime_secs(pid: i32) -> Result<u64> {
    let start_secs = start_time_ticks(pid)? / CLK_TCK;

    let path = PathBuf::from("/proc/uptime");
    let content = std::fs::read_to_string(&path).map_err(|e| QubeError::Io {
        path: path.clone(),
        source: e,
    })?;
    let system_uptime = content
        .split_whitespace()
        .next()
        .and_then(|f| f.parse::<f64>().ok())
        .ok_or_else(|| QubeError::Parse {
            message: "malformed /proc/uptime".into(),
        })?;

    Ok((system_uptime as u64).saturating_sub(start_secs))
}

/// Reads a process's resident set size from `/proc/<pid>/status`.
///
/// Used as the memory fallback on hosts without cgroup v2 at the expected
/// path.
///
/// # Errors
///
/// Returns an error if the status file is unreadable or carries no `VmRSS`.
pub fn vm_rss_bytes(pid: i32) -> Result<u64> {
    let path = PathBuf::from(format!("/proc/{pid}/status"));
    let content = std::fs::read_to_string(&path).map_err(|e| QubeError::Io {
        path: path.clone(),
        source: e,
    })?;

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            if let Some(kb) = rest.split_whitespace().next().and_then(|f| f.parse::<u64>().ok()) {
                return Ok(kb * 1024);
            }
        }
    }
    Err(QubeError::Parse {
        message: format!("VmRSS not found for pid {pid}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn own_pid() -> i32 {
        std::process::id() as i32
    }

    #[test]
    fn own_process_is_alive() {
        assert!(alive(own_pid()));
    }

    #[test]
    fn sentinel_pids_are_never_alive() {
        assert!(!alive(-1));
        assert!(!alive(-2));
    }

    #[test]
    fn own_cpu_ticks_are_readable() {
        let ticks = total_cpu_ticks(own_pid()).expect("own stat readable");
        let again = total_cpu_ticks(own_pid()).expect("own stat readable");
        assert!(again >= ticks);
    }

    #[test]
    fn own_rss_is_positive() {
        let rss = vm_rss_bytes(own_pid()).expect("own status readable");
        assert!(rss > 0);
    }

    #[test]
    fn own_uptime_is_sane() {
        // A freshly spawned test process has an uptime far below a year.
        let uptime = process_uptime_secs(own_pid()).expect("uptime readable");
        assert!(uptime < 365 * 24 * 3600);
    }

    #[test]
    fn missing_pid_errors() {
        assert!(total_cpu_ticks(0).is_err());
        assert!(vm_rss_bytes(0).is_err());
    }
}
