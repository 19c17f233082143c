//! Domain types and pure logic for the moderation pipeline.
//!
//! Nothing in this crate touches the database or the network; the
//! capability traits describe what the outer crates must provide.

#[macro_use]
pub mod lookup;

pub mod activity;
pub mod capabilities;
pub mod entity;
pub mod error;
pub mod profile;
pub mod queue;
pub mod retry;
pub mod scoring;
pub mod settings;
pub mod types;
