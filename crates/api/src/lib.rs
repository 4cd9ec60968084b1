//! ML Hybrid gateway server library.
//!
//! Exposes the building blocks (config, state, error handling, the task
//! gateway, routes, WebSocket infrastructure) so integration tests and the
//! binary entrypoint can both access them.

pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
