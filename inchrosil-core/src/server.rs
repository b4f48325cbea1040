// TCP ingress server
// One accept thread, one reader thread per connection, a shared bounded
// queue and a worker pool; shutdown drives every thread to completion
// through socket close and queue close

use crate::frame_parser::DnaFrameParser;
use crate::record_queue::RecordQueue;
use crate::stats::PipelineStats;
use crate::worker::{spawn_workers, WorkerContext};
use inchrosil_common::{
    PipelineError, SequenceRecord, DEFAULT_MAX_SEQ_LEN, DEFAULT_PORT, MAX_CLIENTS,
    QUEUE_CAPACITY, RECV_CHUNK,
};
use std::collections::HashMap;
use std::io::Read;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone)]
pub struct DnaServerConfig {
    pub port: u16,
    pub max_clients: usize,
    pub queue_capacity: usize,
    pub recv_chunk: usize,
    pub max_seq_len: usize,
    pub num_workers: usize,
    /// Where `dna_output_<seq_id>.ich` files land
    pub out_dir: PathBuf,
    pub verbosity: u32,
}

impl Default for DnaServerConfig {
    fn default() -> Self {
        DnaServerConfig {
            port: DEFAULT_PORT,
            max_clients: MAX_CLIENTS,
            queue_capacity: QUEUE_CAPACITY,
            recv_chunk: RECV_CHUNK,
            max_seq_len: DEFAULT_MAX_SEQ_LEN,
            num_workers: num_cpus::get(),
            out_dir: default_out_dir(),
            verbosity: 1,
        }
    }
}

/// Output directory: `INCHROSIL_OUT_DIR` when set, else the current
/// directory
pub fn default_out_dir() -> PathBuf {
    std::env::var_os("INCHROSIL_OUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Live sockets and reader threads, keyed so a reader can deregister
/// itself on exit
struct ConnectionRegistry {
    sockets: Mutex<HashMap<u64, TcpStream>>,
    readers: Mutex<Vec<JoinHandle<()>>>,
}

pub struct DnaServer {
    config: DnaServerConfig,
    stats: Arc<PipelineStats>,
    queue: RecordQueue<SequenceRecord>,
    running: Arc<AtomicBool>,
    registry: Arc<ConnectionRegistry>,
    local_addr: Option<SocketAddr>,
    accept_handle: Option<JoinHandle<()>>,
    worker_handles: Vec<JoinHandle<()>>,
}

impl DnaServer {
    pub fn new(config: DnaServerConfig) -> Self {
        let queue = RecordQueue::new(config.queue_capacity);
        DnaServer {
            config,
            stats: Arc::new(PipelineStats::new()),
            queue,
            running: Arc::new(AtomicBool::new(false)),
            registry: Arc::new(ConnectionRegistry {
                sockets: Mutex::new(HashMap::new()),
                readers: Mutex::new(Vec::new()),
            }),
            local_addr: None,
            accept_handle: None,
            worker_handles: Vec::new(),
        }
    }

    /// Bind the listening socket, start the worker pool and the accept
    /// thread. Port 0 binds an ephemeral port, see `local_addr`.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        let addr = format!("0.0.0.0:{}", self.config.port);
        let listener = TcpListener::bind(&addr).map_err(|source| PipelineError::Bind {
            addr: addr.clone(),
            source,
        })?;
        self.local_addr = Some(listener.local_addr()?);

        // A missing output directory would turn every record into a
        // storage error
        let _ = std::fs::create_dir_all(&self.config.out_dir);

        let ctx = WorkerContext {
            queue: self.queue.clone(),
            stats: Arc::clone(&self.stats),
            out_dir: self.config.out_dir.clone(),
            verbosity: self.config.verbosity,
        };
        self.worker_handles = spawn_workers(self.config.num_workers, &ctx);

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let stats = Arc::clone(&self.stats);
        let registry = Arc::clone(&self.registry);
        let queue = self.queue.clone();
        let config = self.config.clone();
        self.accept_handle = Some(
            thread::Builder::new()
                .name("accept".to_string())
                .spawn(move || accept_loop(listener, running, stats, registry, queue, config))
                .expect("failed to spawn accept thread"),
        );
        Ok(())
    }

    /// Coordinated shutdown: stop accepting, close every live socket,
    /// close the queue, then join readers, workers and the accept
    /// thread. Every record accepted before the call is persisted or
    /// counted as an error by the time this returns.
    pub fn shutdown(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        // Unblock the accept loop; it checks the running flag per
        // connection
        if let Some(addr) = self.local_addr {
            let wake = ("127.0.0.1", addr.port());
            let _ = TcpStream::connect(wake);
        }
        if let Some(handle) = self.accept_handle.take() {
            let _ = handle.join();
        }

        // Readers observe the socket close as end of stream and flush
        // their parser tails
        for (_, socket) in self.registry.sockets.lock().unwrap().drain() {
            let _ = socket.shutdown(Shutdown::Both);
        }
        let readers: Vec<_> = self.registry.readers.lock().unwrap().drain(..).collect();
        for handle in readers {
            let _ = handle.join();
        }

        // Workers drain what was accepted, then exit
        self.queue.close();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Actual bound address, available after `start`
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn config(&self) -> &DnaServerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for DnaServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(
    listener: TcpListener,
    running: Arc<AtomicBool>,
    stats: Arc<PipelineStats>,
    registry: Arc<ConnectionRegistry>,
    queue: RecordQueue<SequenceRecord>,
    config: DnaServerConfig,
) {
    let mut next_conn_id = 0u64;
    for incoming in listener.incoming() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let stream = match incoming {
            Ok(stream) => stream,
            Err(e) => {
                eprintln!("[WARN] accept failed: {}", e);
                continue;
            }
        };
        let peer = match stream.peer_addr() {
            Ok(peer) => peer,
            Err(_) => continue,
        };

        stats.total_connections.fetch_add(1, Ordering::Relaxed);

        // Soft connection cap: excess clients are accepted and closed
        // immediately, nothing is read from them
        let active = stats.active_connections.load(Ordering::Relaxed);
        if active >= config.max_clients as u64 {
            if config.verbosity > 0 {
                eprintln!("[WARN] connection limit reached, closing {}", peer);
            }
            drop(stream);
            continue;
        }

        stats.active_connections.fetch_add(1, Ordering::Relaxed);
        if config.verbosity > 0 {
            eprintln!("[CONNECT] {} ({} active)", peer, active + 1);
        }

        next_conn_id += 1;
        let conn_id = next_conn_id;
        if let Ok(clone) = stream.try_clone() {
            registry.sockets.lock().unwrap().insert(conn_id, clone);
        }

        let reader_stats = Arc::clone(&stats);
        let reader_registry = Arc::clone(&registry);
        let reader_queue = queue.clone();
        let recv_chunk = config.recv_chunk;
        let max_seq_len = config.max_seq_len;
        let verbosity = config.verbosity;
        let handle = thread::Builder::new()
            .name(format!("reader-{}", conn_id))
            .spawn(move || {
                connection_reader(
                    stream,
                    peer,
                    conn_id,
                    reader_stats,
                    reader_registry,
                    reader_queue,
                    recv_chunk,
                    max_seq_len,
                    verbosity,
                );
            })
            .expect("failed to spawn reader thread");

        let mut readers = registry.readers.lock().unwrap();
        // Reap readers that already finished so the list stays small
        readers.retain(|h| !h.is_finished());
        readers.push(handle);
    }
}

#[allow(clippy::too_many_arguments)]
fn connection_reader(
    mut stream: TcpStream,
    peer: SocketAddr,
    conn_id: u64,
    stats: Arc<PipelineStats>,
    registry: Arc<ConnectionRegistry>,
    queue: RecordQueue<SequenceRecord>,
    recv_chunk: usize,
    max_seq_len: usize,
    verbosity: u32,
) {
    let origin = peer.to_string();
    let mut parser = DnaFrameParser::with_max_seq_len(max_seq_len);
    let mut buf = vec![0u8; recv_chunk];

    'recv: loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            // Treated as connection close, like a zero-byte read
            Err(_) => break,
        };
        stats
            .total_bytes_received
            .fetch_add(n as u64, Ordering::Relaxed);

        parser.feed(&buf[..n]);
        for record in parser.drain() {
            if !enqueue(record, &origin, &queue, &stats) {
                // Queue closed: the pipeline is shutting down, abort the
                // connection
                break 'recv;
            }
        }
    }

    // End of stream: flush a pending tail record. A Closed push here is
    // tolerated, the record was never accepted.
    if let Some(record) = parser.finish() {
        enqueue(record, &origin, &queue, &stats);
    }
    stats
        .parsing_errors
        .fetch_add(parser.parse_errors(), Ordering::Relaxed);

    registry.sockets.lock().unwrap().remove(&conn_id);
    stats.active_connections.fetch_sub(1, Ordering::Relaxed);
    if verbosity > 0 {
        eprintln!(
            "[DISCONNECT] {} ({} active)",
            origin,
            stats.active_connections.load(Ordering::Relaxed)
        );
    }
}

/// Stamp origin and the next global seq_id, then hand the record to the
/// queue. Returns false if the queue is closed.
fn enqueue(
    mut record: SequenceRecord,
    origin: &str,
    queue: &RecordQueue<SequenceRecord>,
    stats: &PipelineStats,
) -> bool {
    record.origin = origin.to_string();
    record.seq_id = stats.next_seq_id();
    match queue.push(record) {
        Ok(()) => {
            stats.sequences_accepted.fetch_add(1, Ordering::Relaxed);
            true
        }
        Err(_) => false,
    }
}
