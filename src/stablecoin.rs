// =====================================================================================
// File: core-oracle/src/stablecoin.rs
// Description: Process-wide USDT/USD rate cache shared across adapters
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::sync::RwLock;
use std::time::{Duration, Instant};

/// TTL after which a cached rate is considered stale.
const TTL: Duration = Duration::from_secs(300);

/// Single-writer, multi-reader USDT/USD rate cache.
///
/// One `usdt/usd` pair observer writes to this cache on every
/// successful aggregation; any number of USDT-routed source adapters
/// read from it concurrently. Readers tolerate staleness (a USDT
/// depeg guard on the reader side decides whether a stale or absent
/// rate is still usable); this cache only tracks freshness.
#[derive(Debug, Default)]
pub struct StablecoinRateCache {
    inner: RwLock<Option<(f64, Instant)>>,
}

impl StablecoinRateCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    pub fn set(&self, rate: f64) {
        let mut guard = self.inner.write().expect("stablecoin cache lock poisoned");
        *guard = Some((rate, Instant::now()));
    }

    /// Returns the cached rate, or `None` if nothing has ever been
    /// written or the write is older than the TTL.
    pub fn get(&self) -> Option<f64> {
        let guard = self.inner.read().expect("stablecoin cache lock poisoned");
        guard.and_then(|(rate, ts)| if ts.elapsed() <= TTL { Some(rate) } else { None })
    }

    pub fn is_stale(&self) -> bool {
        let guard = self.inner.read().expect("stablecoin cache lock poisoned");
        match *guard {
            Some((_, ts)) => ts.elapsed() > TTL,
            None => true,
        }
    }

    pub fn age(&self) -> Option<Duration> {
        let guard = self.inner.read().expect("stablecoin cache lock poisoned");
        guard.map(|(_, ts)| ts.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_has_no_rate_and_is_stale() {
        let cache = StablecoinRateCache::new();
        assert_eq!(cache.get(), None);
        assert!(cache.is_stale());
    }

    #[test]
    fn set_then_get_returns_rate() {
        let cache = StablecoinRateCache::new();
        cache.set(0.998);
        assert_eq!(cache.get(), Some(0.998));
        assert!(!cache.is_stale());
    }

    #[test]
    fn overwriting_replaces_rate_and_resets_age() {
        let cache = StablecoinRateCache::new();
        cache.set(0.998);
        cache.set(1.001);
        assert_eq!(cache.get(), Some(1.001));
    }
}
