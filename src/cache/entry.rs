//! Cache Entry Types

use tokio::time::Instant;

/// A cached value with its expiry deadline and recency stamp.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    /// Instant at which the entry stops being served
    expires_at: Instant,
    /// Position in the recency index (higher = more recent)
    tick: u64,
    /// Tick of the last insert or refresh, breaks deadline ties
    written: u64,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, expires_at: Instant, tick: u64) -> Self {
        Self {
            value,
            expires_at,
            tick,
            written: tick,
        }
    }

    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    #[inline]
    pub fn into_value(self) -> V {
        self.value
    }

    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Position in the deadline index. Unchanged by reads.
    #[inline]
    pub fn deadline(&self) -> (Instant, u64) {
        (self.expires_at, self.written)
    }

    /// Expired at or after the deadline.
    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Replace the value and restart its lifetime.
    pub fn refresh(&mut self, value: V, expires_at: Instant, tick: u64) {
        self.value = value;
        self.expires_at = expires_at;
        self.tick = tick;
        self.written = tick;
    }

    /// Record an access.
    #[inline]
    pub fn touch(&mut self, tick: u64) {
        self.tick = tick;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_expiry_boundary() {
        let now = Instant::now();
        let entry = CacheEntry::new("v", now + Duration::from_secs(10), 1);

        assert!(!entry.is_expired(now));
        assert!(!entry.is_expired(now + Duration::from_millis(9_999)));
        assert!(entry.is_expired(now + Duration::from_secs(10)));
        assert!(entry.is_expired(now + Duration::from_secs(11)));
    }

    #[test]
    fn test_refresh_resets_state() {
        let now = Instant::now();
        let mut entry = CacheEntry::new(1, now, 1);
        entry.refresh(2, now + Duration::from_secs(5), 7);

        assert_eq!(*entry.value(), 2);
        assert_eq!(entry.tick(), 7);
        assert_eq!(entry.deadline(), (now + Duration::from_secs(5), 7));
        assert!(!entry.is_expired(now));
    }

    #[test]
    fn test_touch_keeps_deadline() {
        let now = Instant::now();
        let mut entry = CacheEntry::new(1, now, 3);
        entry.touch(9);

        assert_eq!(entry.tick(), 9);
        assert_eq!(entry.deadline(), (now, 3));
    }
}
