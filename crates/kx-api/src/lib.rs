//! # kx-api
//!
//! REST API server for Klaxon.
//!
//! This crate provides the HTTP API for incident queries, dashboard
//! snapshots, gate maintenance, and health probes.

pub mod dto;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::{ApiServer, ApiServerConfig};
pub use state::AppState;
