//! Background workers that seed, analyze and maintain moderation state.

pub mod batch;
pub mod clients;
pub mod config;
pub mod supervisor;
pub mod telemetry;
pub mod workers;
