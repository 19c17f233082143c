//! Bounded retry bookkeeping for worker batches.

use std::collections::HashMap;

use crate::types::EntityId;

/// What to do with an ID whose processing just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Carry the ID into the next batch.
    Retry { attempt: u32 },
    /// Attempts exhausted; drop the ID.
    DeadLetter { attempts: u32 },
}

/// Counts failed attempts per ID and caps them.
///
/// Lives for the duration of a worker loop. IDs are forgotten once they
/// succeed or are dead-lettered.
#[derive(Debug)]
pub struct RetryLedger {
    max_attempts: u32,
    attempts: HashMap<EntityId, u32>,
    dead_lettered: u64,
}

impl RetryLedger {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            attempts: HashMap::new(),
            dead_lettered: 0,
        }
    }

    /// Record a failure for `id`.
    pub fn record_failure(&mut self, id: EntityId) -> RetryDecision {
        let count = self.attempts.entry(id).or_insert(0);
        *count += 1;
        let attempt = *count;
        if attempt >= self.max_attempts {
            self.attempts.remove(&id);
            self.dead_lettered += 1;
            RetryDecision::DeadLetter { attempts: attempt }
        } else {
            RetryDecision::Retry { attempt }
        }
    }

    /// Split failed IDs into those to retry and those dead-lettered.
    pub fn triage(&mut self, failed: &[EntityId]) -> (Vec<EntityId>, Vec<EntityId>) {
        let mut retry = Vec::new();
        let mut dead = Vec::new();
        for &id in failed {
            match self.record_failure(id) {
                RetryDecision::Retry { .. } => retry.push(id),
                RetryDecision::DeadLetter { .. } => dead.push(id),
            }
        }
        (retry, dead)
    }

    pub fn record_success(&mut self, id: EntityId) {
        self.attempts.remove(&id);
    }

    pub fn attempts(&self, id: EntityId) -> u32 {
        self.attempts.get(&id).copied().unwrap_or(0)
    }

    /// IDs currently awaiting another attempt.
    pub fn pending(&self) -> usize {
        self.attempts.len()
    }

    pub fn dead_lettered(&self) -> u64 {
        self.dead_lettered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_letters_after_max_attempts() {
        let mut ledger = RetryLedger::new(3);
        assert_eq!(ledger.record_failure(7), RetryDecision::Retry { attempt: 1 });
        assert_eq!(ledger.record_failure(7), RetryDecision::Retry { attempt: 2 });
        assert_eq!(ledger.record_failure(7), RetryDecision::DeadLetter { attempts: 3 });
        assert_eq!(ledger.attempts(7), 0);
        assert_eq!(ledger.dead_lettered(), 1);
    }

    #[test]
    fn success_resets_the_count() {
        let mut ledger = RetryLedger::new(2);
        ledger.record_failure(1);
        ledger.record_success(1);
        assert_eq!(ledger.record_failure(1), RetryDecision::Retry { attempt: 1 });
    }

    #[test]
    fn triage_splits_by_attempt_count() {
        let mut ledger = RetryLedger::new(2);
        ledger.record_failure(1);
        let (retry, dead) = ledger.triage(&[1, 2]);
        assert_eq!(retry, vec![2]);
        assert_eq!(dead, vec![1]);
        assert_eq!(ledger.pending(), 1);
    }

    #[test]
    fn zero_cap_behaves_as_single_attempt() {
        let mut ledger = RetryLedger::new(0);
        assert_eq!(ledger.record_failure(5), RetryDecision::DeadLetter { attempts: 1 });
    }
}
