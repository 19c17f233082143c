//! The fetch, analyze and flag pipeline.
//!
//! Checkers consume loaded profiles, consult the [`store::ModerationStore`]
//! and the confidence scorer, and split each batch into flagged records,
//! profiles to pass on, and IDs that failed and should be retried.

pub mod checkers;
pub mod error;
pub mod fanout;
pub mod loader;
pub mod qualifier;
pub mod recorder;
pub mod settings;
pub mod store;

pub use checkers::{CheckOutcome, UserChecker};
pub use error::PipelineError;
pub use store::{ModerationStore, PgStore};
