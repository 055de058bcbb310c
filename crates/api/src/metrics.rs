use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

pub struct Metrics {
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    // Timing (in microseconds)
    total_ingest_time_us: AtomicU64,
    total_search_time_us: AtomicU64,
    total_answer_time_us: AtomicU64,

    total_documents_ingested: AtomicUsize,
    total_chunks_indexed: AtomicUsize,
    total_searches: AtomicUsize,
    total_answers: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            total_ingest_time_us: AtomicU64::new(0),
            total_search_time_us: AtomicU64::new(0),
            total_answer_time_us: AtomicU64::new(0),
            total_documents_ingested: AtomicUsize::new(0),
            total_chunks_indexed: AtomicUsize::new(0),
            total_searches: AtomicUsize::new(0),
            total_answers: AtomicUsize::new(0),
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

    pub fn record_ingest(&self, duration: std::time::Duration, chunks: usize) {
        self.total_ingest_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.total_documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.total_chunks_indexed.fetch_add(chunks, Ordering::Relaxed);
    }

    pub fn record_search(&self, duration: std::time::Duration) {
        self.total_search_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.total_searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_answer(&self, duration: std::time::Duration) {
        self.total_answer_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.total_answers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            avg_ingest_time_ms: avg_time_ms(&self.total_ingest_time_us, &self.total_documents_ingested),
            avg_search_time_ms: avg_time_ms(&self.total_search_time_us, &self.total_searches),
            avg_answer_time_ms: avg_time_ms(&self.total_answer_time_us, &self.total_answers),
            total_documents_ingested: self.total_documents_ingested.load(Ordering::Relaxed),
            total_chunks_indexed: self.total_chunks_indexed.load(Ordering::Relaxed),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: &AtomicUsize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    let cnt = count.load(Ordering::Relaxed) as f64;
    if cnt > 0.0 { total / cnt / 1000.0 } else { 0.0 }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub avg_ingest_time_ms: f64,
    pub avg_search_time_ms: f64,
    pub avg_answer_time_ms: f64,
    pub total_documents_ingested: usize,
    pub total_chunks_indexed: usize,
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

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
