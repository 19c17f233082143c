//! Warden review API library.
//!
//! Exposes config, state, error handling, the review service and routes so
//! integration tests and the binary entrypoint build the same router.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod service;
pub mod state;
