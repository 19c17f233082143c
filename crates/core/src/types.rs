/// Platform-assigned numeric ID of a user or group (PostgreSQL BIGINT).
pub type EntityId = i64;

/// Surrogate keys for rows we mint ourselves (BIGSERIAL).
pub type DbId = i64;

/// ID of a human reviewer acting through the review surface.
pub type ReviewerId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
