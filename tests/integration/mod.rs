//! Integration test suite for SPU
//!
//! These tests drive the `spu` binary against a temp-dir host layout and
//! mockito stand-ins for GitHub and the script mirrors.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **cli**: argument handling, help and error rendering
//! - **config**: `spu config` init, show and check
//! - **upgrade_flow**: status and upgrade runs against mocked releases
//! - **tools**: gLiveView and library checks

#[path = "../common/mod.rs"]
mod common;

mod cli;
mod config;
mod tools;
mod upgrade_flow;
