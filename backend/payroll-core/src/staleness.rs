// src/staleness.rs

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

pub const OVERVIEW_KEY: &str = "overview";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used to simulate elapsed time.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Last successful fetch per logical resource. Entries never expire on
/// their own; staleness is answered on demand.
pub struct StalenessCache {
    clock: Arc<dyn Clock>,
    last_updated: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Default for StalenessCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl StalenessCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_updated: Mutex::new(HashMap::new()),
        }
    }

    pub fn mark_fresh(&self, resource_key: &str) {
        let now = self.clock.now();
        self.last_updated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(resource_key.to_string(), now);
        debug!("Stamped '{}' as fresh at {}", resource_key, now);
    }

    pub fn last_updated(&self, resource_key: &str) -> Option<DateTime<Utc>> {
        self.last_updated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(resource_key)
            .copied()
    }

    /// A key never stamped is always stale. A window too wide for `Duration`
    /// never expires (or always has, when negative).
    pub fn is_stale(&self, resource_key: &str, max_age_minutes: i64) -> bool {
        let Some(stamp) = self.last_updated(resource_key) else {
            return true;
        };
        match Duration::try_minutes(max_age_minutes) {
            Some(max_age) => self.clock.now() - stamp > max_age,
            None => max_age_minutes < 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cache() -> (Arc<ManualClock>, StalenessCache) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ));
        let cache = StalenessCache::new(clock.clone());
        (clock, cache)
    }

    #[test]
    fn unstamped_key_is_stale() {
        let (_, cache) = cache();
        assert!(cache.is_stale(OVERVIEW_KEY, 5));
        assert!(cache.last_updated(OVERVIEW_KEY).is_none());
    }

    #[test]
    fn stamp_is_fresh_until_window_passes() {
        let (clock, cache) = cache();
        cache.mark_fresh(OVERVIEW_KEY);
        assert!(!cache.is_stale(OVERVIEW_KEY, 5));

        clock.advance(Duration::minutes(5));
        assert!(!cache.is_stale(OVERVIEW_KEY, 5));

        clock.advance(Duration::seconds(1));
        assert!(cache.is_stale(OVERVIEW_KEY, 5));
    }

    #[test]
    fn oversized_window_never_expires() {
        let (clock, cache) = cache();
        cache.mark_fresh(OVERVIEW_KEY);
        clock.advance(Duration::days(365 * 50));

        assert!(!cache.is_stale(OVERVIEW_KEY, i64::MAX));
        assert!(cache.is_stale(OVERVIEW_KEY, i64::MIN));
        assert!(cache.is_stale("stats", i64::MAX));
    }

    #[test]
    fn keys_are_tracked_independently() {
        let (clock, cache) = cache();
        cache.mark_fresh("stats");
        clock.advance(Duration::minutes(10));
        cache.mark_fresh(OVERVIEW_KEY);

        assert!(cache.is_stale("stats", 5));
        assert!(!cache.is_stale(OVERVIEW_KEY, 5));
    }
}
