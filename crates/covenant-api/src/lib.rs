//! Covenant-api: HTTP API layer for Covenant
//!
//! Hosts loan contracts behind a RESTful surface: one write lock per
//! host serializes operations, the host clock stands in for the
//! environment timestamp, and the in-memory asset driver carries the
//! external balances the contracts reconcile against.

pub mod dto;
pub mod routes;
pub mod server;
pub mod state;

pub use server::*;
pub use state::{AppState, Host};
