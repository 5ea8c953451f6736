//! Node-host tools maintained next to the node itself.
//!
//! - [`cncli`]: the leader-log tool, upgraded through the same orchestrator as
//!   the node but from prebuilt releases only
//! - [`gliveview`]: the Guild LiveView monitoring script and its `env` file
//! - [`node_config`]: the node configuration and genesis files

pub mod cncli;
pub mod gliveview;
pub mod node_config;
