//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod activity_repo;
pub mod entity_repo;
pub mod queue_repo;
pub mod settings_repo;
pub mod stats_repo;
pub mod tracking_repo;
pub mod vote_repo;

pub use activity_repo::ActivityRepo;
pub use entity_repo::EntityRepo;
pub use queue_repo::QueueRepo;
pub use settings_repo::SettingsRepo;
pub use stats_repo::StatsRepo;
pub use tracking_repo::TrackingRepo;
pub use vote_repo::VoteRepo;
