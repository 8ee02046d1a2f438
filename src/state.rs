use crate::config::AppConfig;
use crate::feeds::quote_api::QuoteClient;
use chrono::{DateTime, Utc};
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared, read-mostly state for the HTTP handlers.
/// No locks: each pricing call owns its own accumulators and random stream.
pub struct AppState {
    pub config: AppConfig,
    pub quotes: QuoteClient,
    pub counters: Counters,
}

impl AppState {
    pub fn new(config: AppConfig) -> Arc<Self> {
        let quotes = QuoteClient::new(&config.quote_api_base_url, config.quote_timeout_secs);
        Arc::new(Self {
            config,
            quotes,
            counters: Counters::new(),
        })
    }
}

/// Lock-free service counters.
#[derive(Debug)]
pub struct Counters {
    pub started_at: DateTime<Utc>,
    pub pricing_requests: AtomicU64,
    pub rejected_requests: AtomicU64,
    pub quote_lookups: AtomicU64,
    pub quote_fallbacks: AtomicU64,
    pub timeouts: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            pricing_requests: AtomicU64::new(0),
            rejected_requests: AtomicU64::new(0),
            quote_lookups: AtomicU64::new(0),
            quote_fallbacks: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds(),
            pricing_requests: self.pricing_requests.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            quote_lookups: self.quote_lookups.load(Ordering::Relaxed),
            quote_fallbacks: self.quote_fallbacks.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CountersSnapshot {
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub pricing_requests: u64,
    pub rejected_requests: u64,
    pub quote_lookups: u64,
    pub quote_fallbacks: u64,
    pub timeouts: u64,
}
