// DNA client driver
// Streams sequences to the ingestion server over TCP; file, interactive
// and stress modes all produce the same newline-delimited framing the
// server's parser expects

use crate::frame_parser::DnaFrameParser;
use inchrosil_common::{FormatHint, PipelineError, SequenceRecord};
use rand::Rng;
use std::fs;
use std::io::{self, BufRead, Write};
use std::net::TcpStream;
use std::path::Path;
use std::time::Instant;

/// Built-in sequence sent when no mode is selected
pub const TEST_SEQUENCE: &[u8] = b"ATCGATCGATCGATCGATCG";

pub struct DnaClient {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
}

impl DnaClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        DnaClient {
            host: host.into(),
            port,
            stream: None,
        }
    }

    pub fn connect(&mut self) -> Result<(), PipelineError> {
        let addr = format!("{}:{}", self.host, self.port);
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .map_err(|source| PipelineError::Connect { addr, source })?;
        self.stream = Some(stream);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.stream = None;
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Frame and send one sequence. FASTQ records without a quality
    /// block get a synthetic all-`I` one (Phred 40).
    pub fn send_sequence(
        &mut self,
        id: &str,
        sequence: &[u8],
        format: FormatHint,
        quality: Option<&[u8]>,
    ) -> Result<(), PipelineError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| PipelineError::Argument("not connected".to_string()))?;

        let mut message = Vec::with_capacity(sequence.len() + 64);
        match format {
            FormatHint::Fasta => {
                message.push(b'>');
                message.extend_from_slice(id.as_bytes());
                message.push(b'\n');
                message.extend_from_slice(sequence);
                message.push(b'\n');
            }
            FormatHint::Fastq => {
                message.push(b'@');
                message.extend_from_slice(id.as_bytes());
                message.push(b'\n');
                message.extend_from_slice(sequence);
                message.extend_from_slice(b"\n+\n");
                match quality {
                    Some(q) => message.extend_from_slice(q),
                    None => message.extend(std::iter::repeat(b'I').take(sequence.len())),
                }
                message.push(b'\n');
            }
            FormatHint::Raw => {
                message.extend_from_slice(sequence);
                message.push(b'\n');
            }
        }

        let result = stream.write_all(&message).and_then(|_| stream.flush());
        if let Err(source) = result {
            self.stream = None;
            return Err(PipelineError::Send(source));
        }
        Ok(())
    }

    /// Send every record of a FASTA/FASTQ/raw file, reassembled with the
    /// same line rules the server applies. Returns the record count.
    pub fn send_file(&mut self, path: &Path) -> Result<u64, PipelineError> {
        let bytes = fs::read(path)?;

        let mut parser = DnaFrameParser::new();
        parser.feed(&bytes);
        let mut records = parser.drain();
        records.extend(parser.finish());

        let mut sent = 0u64;
        for record in &records {
            self.send_record(record)?;
            sent += 1;
            if sent % 100 == 0 {
                eprint!("\rSent {} sequences...", sent);
                let _ = io::stderr().flush();
            }
        }
        eprintln!("\rSent {} sequences from {}", sent, path.display());
        Ok(sent)
    }

    fn send_record(&mut self, record: &SequenceRecord) -> Result<(), PipelineError> {
        self.send_sequence(
            &record.id,
            &record.sequence,
            record.format,
            record.quality.as_deref(),
        )
    }

    /// Read raw sequences from standard input until `quit`, `exit`, `q`
    /// or end of input. Returns the record count.
    pub fn send_interactive(&mut self) -> Result<u64, PipelineError> {
        eprintln!("Enter DNA sequences ('quit' to exit):");
        let stdin = io::stdin();
        let mut sent = 0u64;
        for line in stdin.lock().lines() {
            let line = line?;
            let trimmed = line.trim();
            if matches!(trimmed, "quit" | "exit" | "q") {
                break;
            }
            let sequence: Vec<u8> = line
                .bytes()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            if sequence.is_empty() {
                continue;
            }
            self.send_sequence("", &sequence, FormatHint::Raw, None)?;
            sent += 1;
            eprintln!("Sent sequence #{} ({} bp)", sent, sequence.len());
        }
        eprintln!("Total sequences sent: {}", sent);
        Ok(sent)
    }

    /// Send `count` uniformly random ACGT sequences of `length` bases,
    /// printing a throughput summary. Returns the record count.
    pub fn send_stress(&mut self, count: u64, length: usize) -> Result<u64, PipelineError> {
        eprintln!(
            "Sending {} random sequences of {} bp each...",
            count, length
        );
        let start = Instant::now();
        let mut sent = 0u64;
        for _ in 0..count {
            let sequence = random_sequence(length);
            self.send_sequence("", &sequence, FormatHint::Raw, None)?;
            sent += 1;
            if sent % 100 == 0 {
                eprint!("\rSent {} / {}...", sent, count);
                let _ = io::stderr().flush();
            }
        }
        let elapsed = start.elapsed().as_secs_f64().max(0.001);
        eprintln!(
            "\rStress test complete: {} sequences in {:.2}s ({:.0} seq/s, {:.1} KB/s)",
            sent,
            elapsed,
            sent as f64 / elapsed,
            (sent as f64 * length as f64) / 1024.0 / elapsed
        );
        Ok(sent)
    }

    /// No-mode default: one built-in test sequence
    pub fn send_test_sequence(&mut self) -> Result<(), PipelineError> {
        eprintln!(
            "Sending test sequence: {}",
            String::from_utf8_lossy(TEST_SEQUENCE)
        );
        self.send_sequence("", TEST_SEQUENCE, FormatHint::Raw, None)
    }
}

fn random_sequence(length: usize) -> Vec<u8> {
    const NUCLEOTIDES: [u8; 4] = [b'A', b'C', b'G', b'T'];
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| NUCLEOTIDES[rng.gen_range(0..4)])
        .collect()
}
