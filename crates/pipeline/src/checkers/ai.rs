use std::sync::Arc;

use warden_core::capabilities::Classifier;
use warden_core::profile::{FlagRecord, ProfileInfo};

use super::{CheckOutcome, Verdict};
use crate::fanout;

const DEFAULT_REASON: &str = "Flagged by content classifier";

/// Asks the classifier about profiles the graph checkers let through.
#[derive(Clone)]
pub struct AiChecker {
    classifier: Arc<dyn Classifier>,
    concurrency: usize,
}

impl AiChecker {
    pub fn new(classifier: Arc<dyn Classifier>, concurrency: usize) -> Self {
        Self {
            classifier,
            concurrency,
        }
    }

    pub async fn process_batch(&self, profiles: Vec<ProfileInfo>) -> CheckOutcome {
        fanout::bounded(profiles, self.concurrency, |profile| self.check(profile))
            .await
            .into_iter()
            .collect()
    }

    async fn check(&self, profile: ProfileInfo) -> Verdict {
        match self.classifier.classify(&profile).await {
            Ok(decision) if decision.should_flag => {
                let reason = if decision.reason.trim().is_empty() {
                    DEFAULT_REASON.to_string()
                } else {
                    decision.reason
                };
                tracing::info!(user_id = profile.id, confidence = decision.confidence, "Classifier flagged user");
                Verdict::Flag(FlagRecord::user(&profile, reason, decision.confidence))
            }
            Ok(_) => Verdict::Pass(profile),
            Err(e) => {
                tracing::warn!(user_id = profile.id, error = %e, "Classification failed");
                Verdict::Failed(profile.id)
            }
        }
    }
}
