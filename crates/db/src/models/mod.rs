//! Row structs and the conversions between stored values and domain enums.
//!
//! Entity kinds are stored as TEXT (`'user'` / `'group'`); every other enum
//! is a SMALLINT referencing a lookup table.

pub mod activity;
pub mod entity;
pub mod queue;
pub mod stats;
pub mod tracking;
pub mod vote;

use warden_core::entity::EntityKind;
use warden_core::lookup::StatusId;

/// Wrap a conversion failure as a decode error.
pub(crate) fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

pub(crate) fn parse_kind(raw: &str) -> Result<EntityKind, sqlx::Error> {
    raw.parse::<EntityKind>()
        .map_err(|e| decode_error(e.to_string()))
}

/// Resolve a lookup ID read from the database, failing loudly on IDs the
/// code does not know about.
pub(crate) fn lookup<T>(
    id: StatusId,
    table: &str,
    from_id: fn(StatusId) -> Option<T>,
) -> Result<T, sqlx::Error> {
    from_id(id).ok_or_else(|| decode_error(format!("unknown {table} id {id}")))
}
