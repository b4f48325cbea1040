// Core types and constants
// Shared by the ingestion server, the client and the offline packer

use std::time::Instant;

/// Version information
pub const INCHROSIL_VER_MAJOR: u32 = 1;
pub const INCHROSIL_VER_MINOR: u32 = 0;
pub const INCHROSIL_VER_BUGFIX: u32 = 0;

/// Binary container format version
pub const CONTAINER_VERSION: u32 = 1;

/// Magic bytes opening a binary container file
pub const CONTAINER_MAGIC: &[u8; 8] = b"INCHRSIL";

/// First line of the ASCII single-record file variant
pub const RECORD_MAGIC_LINE: &str = "INCHROSIL";

/// Default TCP port for the ingestion server
pub const DEFAULT_PORT: u16 = 9090;

/// Soft cap on simultaneously served connections
pub const MAX_CLIENTS: usize = 16;

/// Bytes read from a socket per recv call
pub const RECV_CHUNK: usize = 65536;

/// Pending-record queue capacity (records, not bytes)
pub const QUEUE_CAPACITY: usize = 1024;

/// Longest sequence the parser will emit (bases)
pub const DEFAULT_MAX_SEQ_LEN: usize = 1 << 30;

/// Full version string
pub fn inchrosil_version() -> String {
    format!(
        "INCHROSIL DNA pipeline v. {}.{}.{}",
        INCHROSIL_VER_MAJOR, INCHROSIL_VER_MINOR, INCHROSIL_VER_BUGFIX
    )
}

/// Nucleotide encoding (A=0, C=1, G=2, T=3)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
    A = 0,
    C = 1,
    G = 2,
    T = 3,
}

impl Base {
    /// Convert an ASCII byte to a base (A/C/G/T -> 0/1/2/3).
    /// N and anything else is not codeable and returns None.
    #[inline]
    pub fn from_ascii(b: u8) -> Option<Self> {
        match b {
            b'A' => Some(Base::A),
            b'C' => Some(Base::C),
            b'G' => Some(Base::G),
            b'T' => Some(Base::T),
            _ => None,
        }
    }

    /// Convert a base to its ASCII byte (0/1/2/3 -> A/C/G/T)
    #[inline]
    pub fn to_ascii(self) -> u8 {
        match self {
            Base::A => b'A',
            Base::C => b'C',
            Base::G => b'G',
            Base::T => b'T',
        }
    }

    /// Convert a 2-bit code to a base. Only the low two bits are used.
    #[inline]
    pub fn from_code(code: u8) -> Self {
        match code & 0b11 {
            0 => Base::A,
            1 => Base::C,
            2 => Base::G,
            _ => Base::T,
        }
    }
}

/// Wire format a record was observed in. Reporting only; the codec
/// treats every record identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    Raw,
    Fasta,
    Fastq,
}

impl FormatHint {
    pub fn as_str(self) -> &'static str {
        match self {
            FormatHint::Raw => "RAW",
            FormatHint::Fasta => "FASTA",
            FormatHint::Fastq => "FASTQ",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RAW" => Some(FormatHint::Raw),
            "FASTA" => Some(FormatHint::Fasta),
            "FASTQ" => Some(FormatHint::Fastq),
            _ => None,
        }
    }
}

/// One sequence flowing through the pipeline.
///
/// Created by the frame parser, stamped with `seq_id` and `origin` by the
/// ingress layer, consumed by exactly one worker. `sequence` is immutable
/// once enqueued and contains no ASCII whitespace.
#[derive(Debug, Clone)]
pub struct SequenceRecord {
    /// Process-wide monotonic id, assigned when the ingress layer accepts
    /// the record (0 until stamped)
    pub seq_id: u64,
    /// Identifier taken from the FASTA/FASTQ header, may be empty
    pub id: String,
    pub format: FormatHint,
    /// Source descriptor: `ip:port` for network records, file path for
    /// offline input
    pub origin: String,
    pub sequence: Vec<u8>,
    /// Stamped when the record leaves the parser
    pub received_at: Instant,
    /// FASTQ quality block; never persisted
    pub quality: Option<Vec<u8>>,
}

impl SequenceRecord {
    pub fn new(
        id: String,
        format: FormatHint,
        sequence: Vec<u8>,
        quality: Option<Vec<u8>>,
    ) -> Self {
        SequenceRecord {
            seq_id: 0,
            id,
            format,
            origin: String::new(),
            sequence,
            received_at: Instant::now(),
            quality,
        }
    }
}
