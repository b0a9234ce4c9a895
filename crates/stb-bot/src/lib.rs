//! stb-bot library target.
//!
//! Exposes the router, state and dispatch for integration tests. The binary
//! `main.rs` depends on this library target.

pub mod api_types;
pub mod commands;
pub mod discord;
pub mod format;
pub mod lock;
pub mod routes;
pub mod scan;
pub mod state;
