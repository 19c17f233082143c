//! Axum handlers. Routing lives in [`crate::routes`].

pub mod queue;
pub mod review;
pub mod settings;
pub mod stats;
