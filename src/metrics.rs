use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing analysis activity.
#[derive(Default)]
pub struct AnalysisMetrics {
    analyses_completed: AtomicU64,
    chunks_summarized: AtomicU64,
}

impl AnalysisMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed analysis and the number of chunks summarized for it.
    pub fn record_analysis(&self, chunk_count: u64) {
        self.analyses_completed.fetch_add(1, Ordering::Relaxed);
        self.chunks_summarized
            .fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            analyses_completed: self.analyses_completed.load(Ordering::Relaxed),
            chunks_summarized: self.chunks_summarized.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of analysis counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of analyses completed since startup.
    pub analyses_completed: u64,
    /// Total chunk summaries produced across all completed analyses.
    pub chunks_summarized: u64,
}
