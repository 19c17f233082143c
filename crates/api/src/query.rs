//! Query parameters and request bodies shared by the handlers.
//!
//! Enum-valued parameters arrive as strings and are parsed here so an
//! unknown value produces the same error body as every other failure.

use serde::Deserialize;
use warden_core::entity::{EntityKind, ReviewSortBy, ReviewTargetMode};
use warden_core::error::CoreError;
use warden_core::queue::QueuePriority;

/// `?sort=&target=` on the review pull endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct NextReviewParams {
    pub sort: Option<String>,
    pub target: Option<String>,
}

impl NextReviewParams {
    pub fn sort(&self) -> Result<Option<ReviewSortBy>, CoreError> {
        self.sort.as_deref().map(str::parse).transpose()
    }

    pub fn target(&self) -> Result<Option<ReviewTargetMode>, CoreError> {
        self.target.as_deref().map(str::parse).transpose()
    }
}

/// `?priority=` on the queue length endpoint. Absent means all classes.
#[derive(Debug, Default, Deserialize)]
pub struct QueueLengthParams {
    pub priority: Option<String>,
}

impl QueueLengthParams {
    pub fn priority(&self) -> Result<Option<QueuePriority>, CoreError> {
        self.priority.as_deref().map(str::parse).transpose()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmRequest {
    /// Replaces the stored reason when present.
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    /// `true` means the reviewer judges the entity inappropriate.
    pub upvote: bool,
}

/// Parse the `{kind}` path segment. Accepts singular and plural forms.
pub fn parse_kind(raw: &str) -> Result<EntityKind, CoreError> {
    raw.parse()
}
