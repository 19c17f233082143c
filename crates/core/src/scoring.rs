//! Confidence scoring for graph-based auto-flagging.
//!
//! Scores are pure functions of counts and account age so that the
//! checkers stay deterministic and testable.

use std::time::Duration;

/// Default cutoff at or above which a friend-network score flags a user.
pub const DEFAULT_FLAG_THRESHOLD: f64 = 0.4;

/// Profiles with fewer friends than this are never scored.
pub const MIN_FRIENDS_FOR_SCORING: usize = 3;

/// Flagged friends count at half the weight of confirmed ones.
const FLAGGED_WEIGHT: f64 = 0.5;

const ABSOLUTE_SHARE: f64 = 0.50;
const RATIO_SHARE: f64 = 0.40;
const AGE_SHARE: f64 = 0.10;

const DAY: u64 = 24 * 60 * 60;

/// Score a user's friend network.
///
/// Returns `0.0` when the network is too small to judge or when no friend
/// is confirmed or flagged. The result is rounded to two decimals.
pub fn score_friend_network(
    confirmed: usize,
    flagged: usize,
    total_friends: usize,
    account_age: Duration,
) -> f64 {
    if total_friends < MIN_FRIENDS_FOR_SCORING || (confirmed == 0 && flagged == 0) {
        return 0.0;
    }

    let weighted = weighted_count(confirmed, flagged);
    let ratio = (weighted / total_friends as f64).min(1.0);

    let score = absolute_tier(confirmed, weighted) * ABSOLUTE_SHARE
        + ratio * RATIO_SHARE
        + age_tier(account_age) * AGE_SHARE;

    round2(score.clamp(0.0, 1.0))
}

/// Confidence for a user who belongs to already-confirmed groups.
pub fn score_group_membership(flagged_groups: usize, total_groups: usize) -> f64 {
    if total_groups == 0 {
        return 0.0;
    }
    round2((flagged_groups as f64 / total_groups as f64).min(1.0))
}

/// Percentage of friends that are confirmed or flagged, for reason text.
pub fn inappropriate_share(confirmed: usize, flagged: usize, total_friends: usize) -> f64 {
    if total_friends == 0 {
        return 0.0;
    }
    (confirmed + flagged) as f64 / total_friends as f64 * 100.0
}

fn weighted_count(confirmed: usize, flagged: usize) -> f64 {
    confirmed as f64 + flagged as f64 * FLAGGED_WEIGHT
}

fn absolute_tier(confirmed: usize, weighted: f64) -> f64 {
    match (confirmed, weighted) {
        (c, w) if c >= 8 || w >= 12.0 => 1.0,
        (c, w) if c >= 6 || w >= 9.0 => 0.8,
        (c, w) if c >= 4 || w >= 6.0 => 0.6,
        (c, w) if c >= 2 || w >= 3.0 => 0.4,
        (c, w) if c >= 1 || w >= 1.0 => 0.2,
        _ => 0.0,
    }
}

/// Newer accounts weigh more.
fn age_tier(age: Duration) -> f64 {
    let days = age.as_secs() / DAY;
    match days {
        d if d < 30 => 1.0,
        d if d < 180 => 0.8,
        d if d < 365 => 0.6,
        d if d < 730 => 0.4,
        _ => 0.2,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn days(n: u64) -> Duration {
        Duration::from_secs(n * DAY)
    }

    #[test]
    fn ten_friends_two_confirmed_one_flagged_young_account() {
        // tier 0.4 * 0.5 + ratio 0.25 * 0.4 + age 1.0 * 0.1
        assert_eq!(score_friend_network(2, 1, 10, days(10)), 0.40);
    }

    #[test]
    fn no_inappropriate_friends_scores_zero() {
        for total in [0, 3, 10, 500] {
            for age in [days(1), days(100), days(5000)] {
                assert_eq!(score_friend_network(0, 0, total, age), 0.0);
            }
        }
    }

    #[test]
    fn small_networks_are_not_scored() {
        assert_eq!(score_friend_network(2, 0, 2, days(1)), 0.0);
        assert!(score_friend_network(2, 0, 3, days(1)) > 0.0);
    }

    #[test]
    fn non_decreasing_in_confirmed_and_flagged() {
        for total in [5usize, 20, 60] {
            for age in [days(3), days(200), days(1000)] {
                let mut previous = 0.0;
                for confirmed in 0..=total {
                    let score = score_friend_network(confirmed, 0, total, age);
                    assert!(score >= previous, "confirmed={confirmed} total={total}");
                    previous = score;
                }
                let mut previous = 0.0;
                for flagged in 0..=total {
                    let score = score_friend_network(1, flagged, total, age);
                    assert!(score >= previous, "flagged={flagged} total={total}");
                    previous = score;
                }
            }
        }
    }

    #[test]
    fn score_stays_within_unit_interval() {
        assert_eq!(score_friend_network(50, 50, 50, days(1)), 1.0);
        assert!(score_friend_network(1, 0, 1000, days(4000)) <= 1.0);
    }

    #[test]
    fn older_accounts_score_lower() {
        let young = score_friend_network(3, 0, 10, days(5));
        let old = score_friend_network(3, 0, 10, days(900));
        assert!(young > old);
    }

    #[test]
    fn group_membership_is_rounded_ratio() {
        assert_eq!(score_group_membership(2, 3), 0.67);
        assert_eq!(score_group_membership(0, 0), 0.0);
        assert_eq!(score_group_membership(4, 4), 1.0);
    }

    #[test]
    fn default_threshold_matches_worked_example() {
        assert!(score_friend_network(2, 1, 10, days(10)) >= DEFAULT_FLAG_THRESHOLD);
    }
}
