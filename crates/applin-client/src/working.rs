//! Debounced "working" indicator.
//!
//! Once shown, the indicator stays up for at least `MIN_WORKING_DURATION` so a
//! fast response does not make it flicker.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::platform::Platform;

pub const MIN_WORKING_DURATION: Duration = Duration::from_millis(500);

/// A shown indicator. Call `finish` on every path out of the work.
pub struct WorkingIndicator {
    platform: Arc<dyn Platform>,
    started: Instant,
}

impl WorkingIndicator {
    pub fn start(platform: Arc<dyn Platform>) -> Self {
        platform.set_working(true);
        Self {
            platform,
            started: Instant::now(),
        }
    }

    /// Wait out the rest of the minimum duration, then hide the indicator.
    pub async fn finish(self) {
        tokio::time::sleep_until(self.started + MIN_WORKING_DURATION).await;
        self.platform.set_working(false);
    }

    /// Like `finish`, but hides at once when `cancel` fires. Abandoned work
    /// does not hold the indicator up.
    pub async fn finish_until(self, cancel: &CancellationToken) {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep_until(self.started + MIN_WORKING_DURATION) => {}
        }
        self.platform.set_working(false);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::MockPlatform;

    #[tokio::test(start_paused = true)]
    async fn instant_work_still_shows_indicator_for_minimum() {
        let platform = Arc::new(MockPlatform::new());
        let indicator = WorkingIndicator::start(platform.clone());
        indicator.finish().await;

        let transitions = platform.working_transitions();
        assert_eq!(transitions.len(), 2);
        assert!(transitions[0].0);
        assert!(!transitions[1].0);
        assert!(transitions[1].1 - transitions[0].1 >= MIN_WORKING_DURATION);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_work_hides_at_once() {
        let platform = Arc::new(MockPlatform::new());
        let cancel = CancellationToken::new();
        let indicator = WorkingIndicator::start(platform.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        indicator.finish_until(&cancel).await;

        let transitions = platform.working_transitions();
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[1].1 - transitions[0].1, Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_work_is_not_extended() {
        let platform = Arc::new(MockPlatform::new());
        let indicator = WorkingIndicator::start(platform.clone());
        tokio::time::sleep(Duration::from_secs(2)).await;
        indicator.finish().await;

        let transitions = platform.working_transitions();
        let shown = transitions[1].1 - transitions[0].1;
        assert!(shown >= Duration::from_secs(2));
        assert!(shown < Duration::from_secs(2) + MIN_WORKING_DURATION);
    }
}
