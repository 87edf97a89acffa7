// =====================================================================================
// File: core-oracle/src/health.rs
// Description: Per-source exponential backoff health tracking
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Health state for a single source, tracked independently per adapter name.
#[derive(Debug, Clone)]
pub struct SourceHealth {
    pub consecutive_failures: u32,
    pub backoff_until: Option<Instant>,
    pub total_failures: u64,
    pub total_successes: u64,
}

impl Default for SourceHealth {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            backoff_until: None,
            total_failures: 0,
            total_successes: 0,
        }
    }
}

/// Tracks source health and computes exponential backoff windows.
///
/// `backoff = min(base * 2^(consecutive_failures - 1), max)`. A
/// success resets `consecutive_failures` to zero and clears the
/// backoff window immediately.
#[derive(Debug, Clone)]
pub struct SourceHealthTracker {
    sources: HashMap<String, SourceHealth>,
    order: Vec<String>,
    base_backoff: Duration,
    max_backoff: Duration,
}

impl SourceHealthTracker {
    pub fn new(base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            sources: HashMap::new(),
            order: Vec::new(),
            base_backoff,
            max_backoff,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(300))
    }

    pub fn add_source(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.sources.contains_key(&name) {
            self.order.push(name.clone());
            self.sources.insert(name, SourceHealth::default());
        }
    }

    pub fn remove_source(&mut self, name: &str) {
        self.sources.remove(name);
        self.order.retain(|n| n != name);
    }

    pub fn record_failure(&mut self, name: &str) {
        self.add_source(name);
        let backoff = self.base_backoff;
        let max = self.max_backoff;
        let health = self.sources.get_mut(name).expect("just inserted");
        health.consecutive_failures += 1;
        health.total_failures += 1;
        let exp = health.consecutive_failures.saturating_sub(1).min(30);
        let delay = backoff
            .checked_mul(1u32 << exp.min(20))
            .unwrap_or(max)
            .min(max);
        health.backoff_until = Some(Instant::now() + delay);
    }

    pub fn record_success(&mut self, name: &str) {
        self.add_source(name);
        let health = self.sources.get_mut(name).expect("just inserted");
        health.consecutive_failures = 0;
        health.backoff_until = None;
        health.total_successes += 1;
    }

    pub fn is_active(&self, name: &str) -> bool {
        match self.sources.get(name) {
            Some(health) => match health.backoff_until {
                Some(until) => Instant::now() >= until,
                None => true,
            },
            None => true,
        }
    }

    /// Active sources in the order they were added.
    pub fn active_sources(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| self.is_active(name))
            .cloned()
            .collect()
    }

    pub fn backoff_remaining(&self, name: &str) -> Duration {
        match self.sources.get(name).and_then(|h| h.backoff_until) {
            Some(until) => until.saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    pub fn reset(&mut self, name: &str) {
        if let Some(health) = self.sources.get_mut(name) {
            *health = SourceHealth::default();
        }
    }

    pub fn reset_all(&mut self) {
        for health in self.sources.values_mut() {
            *health = SourceHealth::default();
        }
    }

    pub fn health_of(&self, name: &str) -> Option<&SourceHealth> {
        self.sources.get(name)
    }
}
