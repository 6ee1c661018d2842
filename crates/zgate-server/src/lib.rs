//! zgate server library - HTTP front end for pty-driven game sessions.
//!
//! Routes, configuration and application state live here, apart from
//! main.rs, so the integration tests can build the same router.

pub mod config;
pub mod logging;
pub mod routes;
pub mod state;
