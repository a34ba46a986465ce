use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::ChannelId;

/// Per-channel "quiet until" windows.
///
/// Expired windows are removed lazily by `is_muted`, so no background sweep exists.
#[derive(Debug, Default)]
pub struct MuteClock {
    windows: Mutex<HashMap<ChannelId, DateTime<Utc>>>,
}

impl MuteClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Silence `channel` until `now + duration`. A later call replaces any earlier
    /// window; windows do not stack.
    pub async fn mute(
        &self,
        channel: ChannelId,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let span = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        let resume_at = now.checked_add_signed(span).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.windows.lock().await.insert(channel, resume_at);
        resume_at
    }

    /// Remove the window unconditionally. Returns whether one was present.
    pub async fn unmute(&self, channel: ChannelId) -> bool {
        self.windows.lock().await.remove(&channel).is_some()
    }

    pub async fn is_muted(&self, channel: ChannelId, now: DateTime<Utc>) -> bool {
        let mut windows = self.windows.lock().await;
        match windows.get(&channel) {
            Some(resume_at) if now < *resume_at => true,
            Some(_) => {
                windows.remove(&channel);
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    #[tokio::test]
    async fn expires_and_cleans_itself_up() {
        let clock = MuteClock::new();
        let ch = ChannelId(1);
        let now = Utc::now();

        clock.mute(ch, Duration::from_secs(5), now).await;
        assert!(clock.is_muted(ch, now + secs(1)).await);
        assert!(!clock.is_muted(ch, now + secs(6)).await);

        // The expired window was dropped by the check above.
        assert!(!clock.unmute(ch).await);
    }

    #[tokio::test]
    async fn last_mute_wins() {
        let clock = MuteClock::new();
        let ch = ChannelId(1);
        let now = Utc::now();

        clock.mute(ch, Duration::from_secs(600), now).await;
        clock.mute(ch, Duration::from_secs(10), now).await;

        assert!(!clock.is_muted(ch, now + secs(11)).await);
    }

    #[tokio::test]
    async fn unmute_reports_presence() {
        let clock = MuteClock::new();
        let ch = ChannelId(9);
        let now = Utc::now();

        assert!(!clock.unmute(ch).await);
        clock.mute(ch, Duration::from_secs(60), now).await;
        assert!(clock.unmute(ch).await);
        assert!(!clock.is_muted(ch, now).await);
    }

    #[tokio::test]
    async fn resume_is_exclusive() {
        let clock = MuteClock::new();
        let ch = ChannelId(2);
        let now = Utc::now();

        let resume = clock.mute(ch, Duration::from_secs(30), now).await;
        assert_eq!(resume, now + secs(30));
        assert!(!clock.is_muted(ch, resume).await);
    }
}
