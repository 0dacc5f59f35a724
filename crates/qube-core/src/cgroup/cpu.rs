//! CPU usage sampling across two observations of `/proc/<pid>/stat`.

use std::time::Instant;

use crate::proc;

use super::CgroupController;

/// One prior observation of a process's accumulated CPU ticks.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CpuSample {
    total_ticks: u64,
    sampled_at: Instant,
}

/// Deltas shorter than this produce too much jitter to be useful.
const MIN_SAMPLE_INTERVAL_SECS: f64 = 0.1;

impl CgroupController {
    /// Returns a process's CPU usage in percent.
    ///
    /// The first observation of a pid seeds the sample cache and reports
    /// 0.0; later observations divide the tick delta by the wall-clock
    /// delta. Samples closer together than 100 ms are suppressed. A pid
    /// whose stat file has vanished is evicted from the cache.
    #[allow(clippy::cast_precision_loss)]
    pub fn cpu_percent(&self, pid: i32) -> f64 {
        let mut samples = self
            .cpu_samples
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let Ok(total_ticks) = proc::total_cpu_ticks(pid) else {
            samples.remove(&pid);
            return 0.0;
        };
        let now = Instant::now();

        let Some(prev) = samples.get(&pid).copied() else {
            samples.insert(pid, CpuSample { total_ticks, sampled_at: now });
            return 0.0;
        };

        let elapsed = now.duration_since(prev.sampled_at).as_secs_f64();
        if elapsed < MIN_SAMPLE_INTERVAL_SECS {
            return 0.0;
        }

        let delta = total_ticks.saturating_sub(prev.total_ticks);
        samples.insert(pid, CpuSample { total_ticks, sampled_at: now });

        (delta as f64 / proc::CLK_TCK as f64 / elapsed) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use qube_common::config::RuntimeConfig;

    use super::*;

    fn controller() -> CgroupController {
        CgroupController::new(&RuntimeConfig::default())
    }

    #[test]
    fn first_observation_reports_zero() {
        let controller = controller();
        let pid = std::process::id() as i32;
        assert_eq!(controller.cpu_percent(pid), 0.0);
    }

    #[test]
    fn short_delta_is_suppressed() {
        let controller = controller();
        let pid = std::process::id() as i32;
        let _ = controller.cpu_percent(pid);
        // back-to-back samples are under the 100 ms floor
        assert_eq!(controller.cpu_percent(pid), 0.0);
    }

    #[test]
    fn vanished_pid_reports_zero() {
        let controller = controller();
        assert_eq!(controller.cpu_percent(0), 0.0);
    }
}
