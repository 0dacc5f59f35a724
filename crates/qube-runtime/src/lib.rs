//! Container lifecycle management for the Qube runtime.
//!
//! Hosts the tracking ledger, the launch engine with its re-exec init
//! trampoline, and the lifecycle operations consumed by the CLI and the
//! control surface.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod engine;
pub mod init;
pub mod ledger;
pub mod lifecycle;

pub use engine::{Engine, LaunchSpec};
pub use ledger::{ContainerRecord, Ledger};
pub use lifecycle::ContainerDetails;
