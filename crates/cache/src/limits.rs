use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const DEFAULT_SCAN_CONCURRENCY: usize = 32;
const MAX_SCAN_CONCURRENCY: usize = 256;

pub const SCAN_CONCURRENCY_ENV: &str = "CONTEXT_DOCS_SCAN_CONCURRENCY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConcurrencySnapshot {
    pub limit: usize,
    pub in_flight: usize,
}

/// Counting-semaphore limiter for file stats/reads. Tokio's semaphore is fair, so excess
/// requests queue in FIFO order.
#[derive(Debug, Clone)]
pub struct ScanLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
    in_flight: Arc<AtomicUsize>,
}

pub struct ScanPermit {
    #[allow(dead_code)]
    permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for ScanPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

impl ScanLimiter {
    pub fn new(limit: usize) -> Self {
        let limit = limit.clamp(1, MAX_SCAN_CONCURRENCY);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_env() -> Self {
        let raw = std::env::var(SCAN_CONCURRENCY_ENV).ok();
        Self::new(parse_scan_concurrency(raw.as_deref(), DEFAULT_SCAN_CONCURRENCY))
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn snapshot(&self) -> ScanConcurrencySnapshot {
        ScanConcurrencySnapshot {
            limit: self.limit,
            in_flight: self.in_flight.load(Ordering::Relaxed),
        }
    }

    pub async fn acquire(&self) -> ScanPermit {
        // The semaphore is never closed; acquire failures are not expected.
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .unwrap_or_else(|_| unreachable!("scan concurrency semaphore closed"));
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        ScanPermit {
            permit,
            in_flight: self.in_flight.clone(),
        }
    }
}

impl Default for ScanLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_CONCURRENCY)
    }
}

fn parse_scan_concurrency(raw: Option<&str>, default_value: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
        .clamp(1, MAX_SCAN_CONCURRENCY)
}
