//! # qube-daemon
//!
//! The supervision daemon: a five-second scan loop that restarts crashed
//! containers with crash-loop damping, prunes orphan directories and
//! cgroups, and hosts the loopback HTTP/WebSocket control surface.

pub mod handlers;
pub mod restart;
pub mod server;
pub mod supervisor;

pub use restart::RestartPolicy;
pub use supervisor::Supervisor;
