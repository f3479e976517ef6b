//! CLI command implementations.

pub mod serve;

pub use serve::{run_server, ServeConfig};
