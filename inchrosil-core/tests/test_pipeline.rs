// End-to-end pipeline tests
// Real sockets, real worker pool, real output files

use inchrosil_core::{DnaClient, DnaServer, DnaServerConfig};
use inchrosil_common::{checksum, record_file, FormatHint};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::{tempdir, TempDir};

fn start_test_server(max_clients: usize) -> (DnaServer, TempDir, u16) {
    let dir = tempdir().unwrap();
    let config = DnaServerConfig {
        port: 0,
        max_clients,
        num_workers: 2,
        out_dir: dir.path().to_path_buf(),
        verbosity: 0,
        ..Default::default()
    };
    let mut server = DnaServer::new(config);
    server.start().expect("failed to start server");
    let port = server.local_addr().unwrap().port();
    (server, dir, port)
}

fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

fn output_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".ich"))
        .collect();
    names.sort();
    names
}

#[test]
fn test_raw_record_roundtrip() {
    let (mut server, dir, port) = start_test_server(16);

    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.write_all(b"ACGTACGTACGTACGT\n").unwrap();
    drop(stream);

    let path = dir.path().join("dna_output_1.ich");
    assert!(wait_for(Duration::from_secs(5), || path.exists()));

    let (stored, payload) = record_file::read_record(&path).unwrap();
    assert_eq!(stored.length, 16);
    assert_eq!(stored.format, FormatHint::Raw);
    assert_eq!(payload, vec![0x1B, 0x1B, 0x1B, 0x1B]);
    assert_eq!(stored.checksum, checksum::crc32(b"ACGTACGTACGTACGT"));
    assert!(stored.client.starts_with("127.0.0.1:"));

    server.shutdown();
}

#[test]
fn test_fasta_stream_two_records() {
    let (mut server, dir, port) = start_test_server(16);

    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.write_all(b">seq1\nACGT\n>seq2\nGGGG\n").unwrap();
    drop(stream);

    assert!(wait_for(Duration::from_secs(5), || {
        output_files(dir.path()).len() == 2
    }));

    // Per-connection order is preserved: seq1 got the lower id
    let (first, payload1) =
        record_file::read_record(&dir.path().join("dna_output_1.ich")).unwrap();
    let (second, payload2) =
        record_file::read_record(&dir.path().join("dna_output_2.ich")).unwrap();
    assert_eq!(first.format, FormatHint::Fasta);
    assert_eq!(first.length, 4);
    assert_eq!(payload1, vec![0x1B]);
    assert_eq!(second.length, 4);
    assert_eq!(payload2, vec![0xAA]);
    assert!(first.seq_id < second.seq_id);

    server.shutdown();
}

#[test]
fn test_fastq_quality_discarded() {
    let (mut server, dir, port) = start_test_server(16);

    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.write_all(b"@r\nACGT\n+\nIIII\n").unwrap();
    drop(stream);

    let path = dir.path().join("dna_output_1.ich");
    assert!(wait_for(Duration::from_secs(5), || path.exists()));

    let (stored, payload) = record_file::read_record(&path).unwrap();
    assert_eq!(stored.format, FormatHint::Fastq);
    assert_eq!(stored.length, 4);
    assert_eq!(payload, vec![0x1B]);

    // The quality string must not appear anywhere in the file
    let bytes = std::fs::read(&path).unwrap();
    assert!(!bytes.windows(4).any(|w| w == b"IIII"));

    server.shutdown();
}

#[test]
fn test_invalid_record_counted_and_dropped() {
    let (mut server, dir, port) = start_test_server(16);
    let stats = server.stats();

    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.write_all(b"ATCGX\n").unwrap();
    drop(stream);

    assert!(wait_for(Duration::from_secs(5), || {
        stats.validation_errors.load(Ordering::Relaxed) == 1
    }));
    assert!(output_files(dir.path()).is_empty());

    server.shutdown();
}

#[test]
fn test_client_file_mode_end_to_end() {
    let (mut server, dir, port) = start_test_server(16);

    let input_dir = tempdir().unwrap();
    let fasta = input_dir.path().join("genome.fasta");
    std::fs::write(&fasta, ">a\nACGT\nACGT\n>b\nTTTT\n@q\nGGGG\n+\nIIII\n").unwrap();

    let mut client = DnaClient::new("127.0.0.1", port);
    client.connect().unwrap();
    let sent = client.send_file(&fasta).unwrap();
    client.disconnect();
    assert_eq!(sent, 3);

    assert!(wait_for(Duration::from_secs(5), || {
        output_files(dir.path()).len() == 3
    }));

    let (a, payload_a) =
        record_file::read_record(&dir.path().join("dna_output_1.ich")).unwrap();
    assert_eq!(a.length, 8);
    assert_eq!(payload_a, vec![0x1B, 0x1B]);
    let (q, _) = record_file::read_record(&dir.path().join("dna_output_3.ich")).unwrap();
    assert_eq!(q.format, FormatHint::Fastq);

    server.shutdown();
}

#[test]
fn test_shutdown_with_open_connection_persists_accepted_records() {
    let (mut server, dir, port) = start_test_server(16);
    let stats = server.stats();

    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    for _ in 0..10 {
        stream.write_all(b"ACGT\n").unwrap();
    }
    stream.flush().unwrap();

    // Wait until the ingress layer has accepted all ten, then shut down
    // while the connection is still open
    assert!(wait_for(Duration::from_secs(5), || {
        stats.sequences_accepted.load(Ordering::Relaxed) == 10
    }));
    server.shutdown();
    assert!(!server.is_running());

    // Every accepted record was persisted (none could fail validation)
    assert_eq!(output_files(dir.path()).len(), 10);
    assert_eq!(stats.storage_errors.load(Ordering::Relaxed), 0);

    drop(stream);
}

#[test]
fn test_connection_cap_closes_excess_clients() {
    let (mut server, _dir, port) = start_test_server(1);
    let stats = server.stats();

    // First client occupies the single slot
    let mut first = TcpStream::connect(("127.0.0.1", port)).unwrap();
    first.write_all(b"ACGT\n").unwrap();
    assert!(wait_for(Duration::from_secs(5), || {
        stats.active_connections.load(Ordering::Relaxed) == 1
    }));

    // The excess client is accepted and closed with nothing read
    let mut second = TcpStream::connect(("127.0.0.1", port)).unwrap();
    second
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut buf = [0u8; 1];
    let closed = matches!(second.read(&mut buf), Ok(0));
    assert!(closed, "excess connection should be closed by the server");
    assert_eq!(stats.total_connections.load(Ordering::Relaxed), 2);

    drop(first);
    server.shutdown();
}

#[test]
fn test_seq_ids_monotonic_across_connections() {
    let (mut server, dir, port) = start_test_server(16);

    for _ in 0..3 {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        stream.write_all(b"ACGT\nTTTT\n").unwrap();
        drop(stream);
    }

    assert!(wait_for(Duration::from_secs(5), || {
        output_files(dir.path()).len() == 6
    }));
    let mut ids: Vec<u64> = output_files(dir.path())
        .iter()
        .map(|name| {
            record_file::read_record(&dir.path().join(name))
                .unwrap()
                .0
                .seq_id
        })
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);

    server.shutdown();
}
