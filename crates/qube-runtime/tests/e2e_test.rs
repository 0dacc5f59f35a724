//! End-to-end tests for the unprivileged slice of the runtime.
//!
//! Everything here runs against substituted paths in a tempdir — no
//! namespaces, no mounts, no network. The privileged launch path is
//! exercised by the daemon on a real host.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use qube_common::config::RuntimeConfig;
use qube_common::types::{ContainerStatus, PID_STOPPED};
use qube_runtime::{ContainerRecord, Engine};

fn engine_in(dir: &std::path::Path) -> Engine {
    Engine::new(RuntimeConfig {
        containers_base: dir.join("containers"),
        cgroup_root: dir.join("cgroup"),
        tracking_dir: dir.join("tracking"),
        ledger_path: dir.join("tracking/containers.txt"),
        hub_base_url: "http://127.0.0.1:1".into(),
        ..RuntimeConfig::default()
    })
}

fn record(name: &str, pid: i32) -> ContainerRecord {
    ContainerRecord {
        name: name.into(),
        pid,
        work_dir: "/w".into(),
        command: vec!["sh".into(), "-lc echo hi".into()],
        created_at: 1_700_000_000,
        image: "U:I:1.0.0".into(),
        ports: "80,443".into(),
        isolated: true,
        volumes: vec![("/host".into(), "/data".into())],
        env: vec!["K=V".into()],
    }
}

// ── Ledger round-trip ────────────────────────────────────────────────

#[test]
fn pipeline_ledger_round_trip_preserves_every_field() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine_in(dir.path());

    let original = record("Qube-abcdef", 4242);
    engine.ledger().insert(&original).expect("insert");

    let restored = engine
        .find_record("Qube-abcdef")
        .expect("record comes back");
    assert_eq!(restored, original);
}

#[test]
fn pipeline_ledger_name_is_unique() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine_in(dir.path());

    engine.ledger().insert(&record("Qube-one", 1)).expect("first");
    assert!(engine.ledger().insert(&record("Qube-one", 2)).is_err());

    let all = engine.ledger().list().expect("list");
    assert_eq!(all.len(), 1);
}

// ── Lifecycle state transitions ──────────────────────────────────────

#[test]
fn pipeline_stop_then_stop_again_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine_in(dir.path());

    engine.ledger().insert(&record("Qube-halt", -1)).expect("insert");

    engine.stop("Qube-halt").expect("first stop");
    engine.stop("Qube-halt").expect("second stop is a no-op");
    assert_eq!(
        engine.find_record("Qube-halt").expect("record").pid,
        PID_STOPPED
    );

    // the pid that never matched anything stays NotFound
    assert!(engine.stop("424242").is_err());
}

#[test]
fn pipeline_delete_clears_ledger_rootfs_and_cgroup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine_in(dir.path());

    engine.ledger().insert(&record("Qube-gone", -1)).expect("insert");
    std::fs::create_dir_all(engine.config().rootfs_dir("Qube-gone")).expect("rootfs");
    engine.cgroups().setup("Qube-gone").expect("cgroup");

    engine.delete("Qube-gone").expect("delete");

    assert!(engine.ledger().find("Qube-gone").expect("find").is_none());
    assert!(!engine.config().container_dir("Qube-gone").exists());
    assert!(!engine.cgroups().node_path("Qube-gone").exists());
}

#[test]
fn pipeline_list_classifies_all_states() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine_in(dir.path());

    let own_pid = std::process::id() as i32;
    engine.ledger().insert(&record("Qube-run", own_pid)).expect("insert");
    engine.ledger().insert(&record("Qube-exit", -1)).expect("insert");
    engine.ledger().insert(&record("Qube-stop", PID_STOPPED)).expect("insert");

    let details = engine.list().expect("list");
    let status_of = |name: &str| {
        details
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.status)
            .expect("listed")
    };
    assert_eq!(status_of("Qube-run"), ContainerStatus::Running);
    assert_eq!(status_of("Qube-exit"), ContainerStatus::Exited);
    assert_eq!(status_of("Qube-stop"), ContainerStatus::Stopped);
}

#[test]
fn pipeline_start_of_running_container_is_a_noop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine_in(dir.path());

    let own_pid = std::process::id() as i32;
    engine.ledger().insert(&record("Qube-live", own_pid)).expect("insert");

    let relaunched = engine.start("Qube-live").expect("start");
    assert!(relaunched.is_none());
}

// ── Image resolution failures roll the launch back ───────────────────

#[test]
fn pipeline_unfetchable_image_cleans_up_the_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine_in(dir.path());

    engine
        .ledger()
        .insert(&record("Qube-noimg", -1))
        .expect("insert");

    // start relaunches from the ledger; the image pull cannot succeed
    assert!(engine.start("Qube-noimg").is_err());
    assert!(engine.ledger().find("Qube-noimg").expect("find").is_none());
    assert!(!engine.config().container_dir("Qube-noimg").exists());
}

#[test]
fn pipeline_info_of_unknown_container_is_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine_in(dir.path());
    assert!(engine.info("Qube-ghost").is_err());
}
