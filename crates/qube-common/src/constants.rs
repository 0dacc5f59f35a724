//! System-wide constants and default paths.

/// Default base directory for per-container state and the shared image cache.
pub const DEFAULT_CONTAINERS_BASE: &str = "/var/tmp/qube-containers";

/// Default root of the per-container cgroup v2 subtree.
pub const DEFAULT_CGROUP_ROOT: &str = "/sys/fs/cgroup/qube";

/// Default directory holding the tracking ledger.
pub const DEFAULT_TRACKING_DIR: &str = "/var/lib/qube";

/// Default path of the container tracking ledger.
pub const DEFAULT_LEDGER_PATH: &str = "/var/lib/qube/containers.txt";

/// Default base URL of the image hub.
pub const DEFAULT_HUB_BASE_URL: &str = "https://hub.qubecontainers.dev";

/// Default hard memory limit per container, in MiB.
pub const DEFAULT_MEMORY_MAX_MB: u64 = 2048;

/// Default swap limit per container, in MiB.
pub const DEFAULT_MEMORY_SWAP_MAX_MB: u64 = 1024;

/// Default CPU quota per period, in microseconds.
pub const DEFAULT_CPU_QUOTA_US: u64 = 200_000;

/// Default CPU period, in microseconds.
pub const DEFAULT_CPU_PERIOD_US: u64 = 100_000;

/// Prefix of generated container names.
pub const CONTAINER_NAME_PREFIX: &str = "Qube-";

/// Name of the shared image-cache directory under the containers base.
pub const IMAGES_DIR_NAME: &str = "images";

/// Sentinel first argument that routes the binary into the init trampoline.
pub const INIT_SENTINEL: &str = "__container_init__";

/// Loopback address of the control-plane HTTP listener.
pub const CONTROL_ADDR: &str = "127.0.0.1:3030";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "qube";
