use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use tokio::sync::Mutex;

use crate::domain::GuildId;

/// Admission parameters for one guild, looked up per call from its persona.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateParams {
    pub limit: u32,
    pub window: Duration,
}

// ============== Rate Limiter (Sliding Window) ==============

/// Per-guild sliding-window limiter on outbound bot replies.
///
/// Admission depends on how many sends happened within the trailing window,
/// not on fixed calendar buckets.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<GuildId, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn try_admit(&self, guild: GuildId, params: RateParams) -> bool {
        self.try_admit_at(guild, Instant::now(), params).await
    }

    /// Purge entries older than the window, then record `now` if there is room.
    /// A rejected call leaves the bucket untouched.
    pub async fn try_admit_at(&self, guild: GuildId, now: Instant, params: RateParams) -> bool {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(guild).or_default();

        while let Some(oldest) = bucket.front() {
            if now.saturating_duration_since(*oldest) > params.window {
                bucket.pop_front();
            } else {
                break;
            }
        }

        if bucket.len() < params.limit as usize {
            bucket.push_back(now);
            return true;
        }
        false
    }

    /// Sends currently counted against `guild` (as of the last admission check).
    pub async fn in_window(&self, guild: GuildId) -> usize {
        self.buckets
            .lock()
            .await
            .get(&guild)
            .map(VecDeque::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PER_MINUTE: RateParams = RateParams {
        limit: 2,
        window: Duration::from_secs(60),
    };

    #[tokio::test]
    async fn window_slides() {
        let start = Instant::now();
        let rl = RateLimiter::new();
        let g = GuildId(1);
        let at = |s: u64| start + Duration::from_secs(s);

        assert!(rl.try_admit_at(g, at(0), TWO_PER_MINUTE).await);
        assert!(rl.try_admit_at(g, at(1), TWO_PER_MINUTE).await);
        assert!(!rl.try_admit_at(g, at(2), TWO_PER_MINUTE).await);

        assert!(rl.try_admit_at(g, at(65), TWO_PER_MINUTE).await);
    }

    #[tokio::test]
    async fn rejection_is_not_recorded() {
        let start = Instant::now();
        let rl = RateLimiter::new();
        let g = GuildId(1);

        assert!(rl.try_admit_at(g, start, TWO_PER_MINUTE).await);
        assert!(rl.try_admit_at(g, start, TWO_PER_MINUTE).await);
        for s in 1..30 {
            assert!(!rl.try_admit_at(g, start + Duration::from_secs(s), TWO_PER_MINUTE).await);
        }
        assert_eq!(rl.in_window(g).await, 2);

        // Both admitted sends age out together; the rejected attempts left no trace.
        assert!(rl.try_admit_at(g, start + Duration::from_secs(61), TWO_PER_MINUTE).await);
    }

    #[tokio::test]
    async fn guilds_do_not_share_budget() {
        let now = Instant::now();
        let rl = RateLimiter::new();
        let one = RateParams {
            limit: 1,
            window: Duration::from_secs(60),
        };

        assert!(rl.try_admit_at(GuildId(1), now, one).await);
        assert!(!rl.try_admit_at(GuildId(1), now, one).await);
        assert!(rl.try_admit_at(GuildId(2), now, one).await);
    }

    #[tokio::test]
    async fn zero_limit_never_admits() {
        let rl = RateLimiter::new();
        let none = RateParams {
            limit: 0,
            window: Duration::from_secs(60),
        };
        assert!(!rl.try_admit(GuildId(3), none).await);
    }
}
