//! # qube-common
//!
//! Shared error definitions, configuration model, constants, and domain
//! types used across the entire Qube workspace.
//!
//! This crate is the leaf of the dependency graph — it depends on no other
//! internal crate and provides the foundational primitives that all other
//! crates build upon.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
