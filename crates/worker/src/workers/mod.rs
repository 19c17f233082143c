//! Long-running worker loops.
//!
//! Every loop takes a [`CancellationToken`] and returns once it fires.
//! A loop returning an error is restarted by the supervisor.

pub mod purge;
pub mod queue;
pub mod scan;
pub mod stats;

use std::time::Duration;

use chrono::DateTime;
use tokio_util::sync::CancellationToken;
use warden_core::types::Timestamp;

/// Sleep for `duration` unless cancelled first. Returns `false` on cancel.
pub(crate) async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// `now - window`, saturating at the earliest representable instant.
pub(crate) fn before(now: Timestamp, window: Duration) -> Timestamp {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|w| now.checked_sub_signed(w))
        .unwrap_or(DateTime::<chrono::Utc>::MIN_UTC)
}

pub(crate) fn days(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(86_400))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn huge_windows_saturate() {
        let now = Utc::now();
        assert_eq!(before(now, days(u64::MAX)), DateTime::<Utc>::MIN_UTC);
        assert_eq!(before(now, Duration::from_secs(60)), now - chrono::Duration::seconds(60));
    }
}
