// Pipeline metrics
// Atomic counters shared by ingress, readers and workers; the status
// printer sees eventually consistent snapshots

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for one server process. All increments are relaxed atomics;
/// no other synchronisation is involved.
pub struct PipelineStats {
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub total_bytes_received: AtomicU64,
    pub total_bytes_processed: AtomicU64,
    pub sequences_accepted: AtomicU64,
    pub validation_errors: AtomicU64,
    pub parsing_errors: AtomicU64,
    pub storage_errors: AtomicU64,
    next_seq_id: AtomicU64,
    start: Instant,
}

impl PipelineStats {
    pub fn new() -> Self {
        PipelineStats {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            total_bytes_received: AtomicU64::new(0),
            total_bytes_processed: AtomicU64::new(0),
            sequences_accepted: AtomicU64::new(0),
            validation_errors: AtomicU64::new(0),
            parsing_errors: AtomicU64::new(0),
            storage_errors: AtomicU64::new(0),
            next_seq_id: AtomicU64::new(1),
            start: Instant::now(),
        }
    }

    /// Allocate the next global sequence id. Strictly increasing across
    /// the whole process, starting at 1.
    pub fn next_seq_id(&self) -> u64 {
        self.next_seq_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.validation_errors.load(Ordering::Relaxed)
            + self.parsing_errors.load(Ordering::Relaxed)
            + self.storage_errors.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Received throughput in KB/s over the process lifetime
    pub fn throughput_kbps(&self) -> f64 {
        let uptime = self.uptime_seconds();
        if uptime < 0.001 {
            return 0.0;
        }
        (self.total_bytes_received.load(Ordering::Relaxed) as f64 / 1024.0) / uptime
    }

    /// One-line status summary for the periodic printer
    pub fn status_line(&self) -> String {
        format!(
            "Connections: {}/{} | Sequences: {} | Received: {} KB | Errors: {} | Throughput: {:.1} KB/s | Uptime: {}s",
            self.active_connections.load(Ordering::Relaxed),
            self.total_connections.load(Ordering::Relaxed),
            self.sequences_accepted.load(Ordering::Relaxed),
            self.total_bytes_received.load(Ordering::Relaxed) / 1024,
            self.error_count(),
            self.throughput_kbps(),
            self.uptime_seconds() as u64,
        )
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}
