//! Namespace selection for container launches.
//!
//! Every container gets fresh PID, mount, IPC, and UTS namespaces; a new
//! network namespace is added only for isolated workloads.

use nix::sched::CloneFlags;

/// Returns the clone flags for a container launch.
#[must_use]
pub fn clone_flags(isolated: bool) -> CloneFlags {
    let mut flags = CloneFlags::CLONE_NEWPID
        | CloneFlags::CLONE_NEWNS
        | CloneFlags::CLONE_NEWIPC
        | CloneFlags::CLONE_NEWUTS;
    if isolated {
        flags |= CloneFlags::CLONE_NEWNET;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_flags_always_present() {
        let flags = clone_flags(false);
        assert!(flags.contains(CloneFlags::CLONE_NEWPID));
        assert!(flags.contains(CloneFlags::CLONE_NEWNS));
        assert!(flags.contains(CloneFlags::CLONE_NEWIPC));
        assert!(flags.contains(CloneFlags::CLONE_NEWUTS));
        assert!(!flags.contains(CloneFlags::CLONE_NEWNET));
    }

    #[test]
    fn isolation_adds_network_namespace() {
        assert!(clone_flags(true).contains(CloneFlags::CLONE_NEWNET));
    }
}
