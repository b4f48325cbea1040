// Worker thread implementation
// Each worker drains the record queue: validate, checksum, encode, persist

use crate::record_queue::RecordQueue;
use crate::stats::PipelineStats;
use crate::validate;
use inchrosil_common::{checksum, codec, record_file, SequenceRecord};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Everything a worker needs; clones share queue and stats
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: RecordQueue<SequenceRecord>,
    pub stats: Arc<PipelineStats>,
    pub out_dir: PathBuf,
    pub verbosity: u32,
}

/// Worker main loop. Pops until the queue signals shutdown; a failed
/// record is counted and dropped, never propagated, so the only exit is
/// the shutdown signal.
pub fn worker_thread(worker_id: usize, ctx: WorkerContext) {
    while let Some(record) = ctx.queue.pop() {
        process_record(worker_id, &ctx, &record);
    }
}

fn process_record(worker_id: usize, ctx: &WorkerContext, record: &SequenceRecord) {
    // Validate: reject on the first byte outside {A, C, G, T, N}
    if let Some(pos) = validate::first_invalid(&record.sequence) {
        ctx.stats.validation_errors.fetch_add(1, Ordering::Relaxed);
        eprintln!(
            "[WARN] invalid base 0x{:02x} at position {} in sequence {} from {}",
            record.sequence[pos], pos, record.seq_id, record.origin
        );
        return;
    }

    // Checksum covers the validated text, not the packed payload
    let crc = checksum::crc32(&record.sequence);
    let payload = codec::encode(&record.sequence);

    match record_file::write_record(&ctx.out_dir, record, &payload, crc) {
        Ok(_) => {
            ctx.stats
                .total_bytes_processed
                .fetch_add(record.sequence.len() as u64, Ordering::Relaxed);
            if ctx.verbosity > 0 && record.seq_id % 100 == 0 {
                eprintln!(
                    "[worker-{}] processed sequence {} (queue: {})",
                    worker_id,
                    record.seq_id,
                    ctx.queue.len()
                );
            }
        }
        Err(e) => {
            // At-most-once persistence: no retry
            ctx.stats.storage_errors.fetch_add(1, Ordering::Relaxed);
            eprintln!(
                "[WARN] failed to store sequence {}: {}",
                record.seq_id, e
            );
        }
    }
}

/// Spawn the worker pool. Workers exit once the queue is closed and
/// drained; join the returned handles to wait for that.
pub fn spawn_workers(num_workers: usize, ctx: &WorkerContext) -> Vec<JoinHandle<()>> {
    (0..num_workers)
        .map(|worker_id| {
            let ctx = ctx.clone();
            thread::Builder::new()
                .name(format!("worker-{}", worker_id))
                .spawn(move || worker_thread(worker_id, ctx))
                .expect("failed to spawn worker thread")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use inchrosil_common::FormatHint;
    use tempfile::tempdir;

    fn record(seq_id: u64, seq: &[u8]) -> SequenceRecord {
        let mut r = SequenceRecord::new(String::new(), FormatHint::Raw, seq.to_vec(), None);
        r.seq_id = seq_id;
        r.origin = "test".to_string();
        r
    }

    fn test_context(out_dir: PathBuf) -> WorkerContext {
        WorkerContext {
            queue: RecordQueue::new(16),
            stats: Arc::new(PipelineStats::new()),
            out_dir,
            verbosity: 0,
        }
    }

    #[test]
    fn test_workers_drain_and_exit_on_close() {
        let dir = tempdir().unwrap();
        let ctx = test_context(dir.path().to_path_buf());

        let handles = spawn_workers(2, &ctx);
        for i in 1..=8 {
            ctx.queue.push(record(i, b"ACGTACGT")).unwrap();
        }
        ctx.queue.close();
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 1..=8 {
            assert!(dir.path().join(record_file::output_file_name(i)).exists());
        }
        assert_eq!(
            ctx.stats.total_bytes_processed.load(Ordering::Relaxed),
            64
        );
    }

    #[test]
    fn test_invalid_record_counted_not_stored() {
        let dir = tempdir().unwrap();
        let ctx = test_context(dir.path().to_path_buf());

        process_record(0, &ctx, &record(1, b"ACGTX"));
        assert_eq!(ctx.stats.validation_errors.load(Ordering::Relaxed), 1);
        assert!(!dir.path().join("dna_output_1.ich").exists());
    }

    #[test]
    fn test_storage_failure_counted_not_fatal() {
        let ctx = test_context(PathBuf::from("/nonexistent-output-dir"));
        process_record(0, &ctx, &record(1, b"ACGT"));
        assert_eq!(ctx.stats.storage_errors.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_persisted_record_contents() {
        let dir = tempdir().unwrap();
        let ctx = test_context(dir.path().to_path_buf());

        process_record(0, &ctx, &record(5, b"ACGTN"));
        let (stored, payload) =
            record_file::read_record(&dir.path().join("dna_output_5.ich")).unwrap();
        assert_eq!(stored.length, 5);
        assert_eq!(stored.checksum, checksum::crc32(b"ACGTN"));
        // N is coerced to A in the payload
        assert_eq!(record_file::decode_stored(&stored, &payload), b"ACGTA");
    }
}
