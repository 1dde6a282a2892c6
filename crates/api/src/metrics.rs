use grounding::ValidationSummary;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    // Timing (in microseconds)
    total_validate_time_us: AtomicU64,
    total_merge_time_us: AtomicU64,

    // Grounding
    validation_batches: AtomicUsize,
    triples_validated: AtomicUsize,
    triples_skipped: AtomicUsize,
    mentions_exact: AtomicUsize,
    mentions_fuzzy: AtomicUsize,
    mentions_unresolved: AtomicUsize,
    requested_relations_found: AtomicUsize,

    // Merging
    documents_merged: AtomicUsize,
    merge_failures: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            total_validate_time_us: AtomicU64::new(0),
            total_merge_time_us: AtomicU64::new(0),
            validation_batches: AtomicUsize::new(0),
            triples_validated: AtomicUsize::new(0),
            triples_skipped: AtomicUsize::new(0),
            mentions_exact: AtomicUsize::new(0),
            mentions_fuzzy: AtomicUsize::new(0),
            mentions_unresolved: AtomicUsize::new(0),
            requested_relations_found: AtomicUsize::new(0),
            documents_merged: AtomicUsize::new(0),
            merge_failures: AtomicUsize::new(0),
        })
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_validation(&self, duration: Duration, summary: &ValidationSummary) {
        self.total_validate_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.validation_batches.fetch_add(1, Ordering::Relaxed);
        self.triples_validated.fetch_add(summary.triples, Ordering::Relaxed);
        self.triples_skipped.fetch_add(summary.skipped, Ordering::Relaxed);
        self.mentions_exact.fetch_add(summary.mentions_exact, Ordering::Relaxed);
        self.mentions_fuzzy.fetch_add(summary.mentions_fuzzy, Ordering::Relaxed);
        self.mentions_unresolved.fetch_add(summary.mentions_unresolved, Ordering::Relaxed);
        self.requested_relations_found
            .fetch_add(summary.requested_relation_found, Ordering::Relaxed);
    }

    pub fn record_merge(&self, duration: Duration, success: bool) {
        self.total_merge_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        if success {
            self.documents_merged.fetch_add(1, Ordering::Relaxed);
        } else {
            self.merge_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let merges = self.documents_merged.load(Ordering::Relaxed) + self.merge_failures.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            avg_validate_time_ms: avg_time_ms(
                &self.total_validate_time_us,
                self.validation_batches.load(Ordering::Relaxed),
            ),
            avg_merge_time_ms: avg_time_ms(&self.total_merge_time_us, merges),
            triples_validated: self.triples_validated.load(Ordering::Relaxed),
            triples_skipped: self.triples_skipped.load(Ordering::Relaxed),
            mentions_exact: self.mentions_exact.load(Ordering::Relaxed),
            mentions_fuzzy: self.mentions_fuzzy.load(Ordering::Relaxed),
            mentions_unresolved: self.mentions_unresolved.load(Ordering::Relaxed),
            requested_relations_found: self.requested_relations_found.load(Ordering::Relaxed),
            documents_merged: self.documents_merged.load(Ordering::Relaxed),
            merge_failures: self.merge_failures.load(Ordering::Relaxed),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: usize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    if count > 0 {
        total / count as f64 / 1000.0 // Convert to ms
    } else {
        0.0
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub avg_validate_time_ms: f64,
    pub avg_merge_time_ms: f64,
    pub triples_validated: usize,
    pub triples_skipped: usize,
    pub mentions_exact: usize,
    pub mentions_fuzzy: usize,
    pub mentions_unresolved: usize,
    pub requested_relations_found: usize,
    pub documents_merged: usize,
    pub merge_failures: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
