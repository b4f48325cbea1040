//! Core engine of the INCHROSIL DNA ingestion and compression pipeline.
//!
//! The server side is a staged pipeline over OS threads: a TCP accept
//! thread hands each connection to a reader that reassembles sequence
//! records from the byte stream, stamps them with a process-wide id and
//! pushes them into a bounded queue; a pool of workers validates,
//! checksums, 2-bit encodes and persists each record. The offline side
//! packs FASTA files into the multi-record binary container and reads
//! them back.
//!
//! # Examples
//!
//! ## Running a server
//!
//! ```no_run
//! use inchrosil_core::{DnaServer, DnaServerConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = DnaServer::new(DnaServerConfig::default());
//! server.start()?;
//! // ... serve until an external signal ...
//! server.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! ## Sending sequences
//!
//! ```no_run
//! use inchrosil_core::DnaClient;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = DnaClient::new("localhost", 9090);
//! client.connect()?;
//! client.send_stress(1000, 500)?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod fasta_io;
pub mod frame_parser;
pub mod packer;
pub mod record_queue;
pub mod server;
pub mod stats;
pub mod validate;
pub mod worker;

// Re-export the main entry points
pub use client::DnaClient;
pub use fasta_io::{FastaReader, FastaRecord};
pub use frame_parser::DnaFrameParser;
pub use packer::{container_info, extract_to_fasta, pack_fasta_files, PackSummary};
pub use record_queue::{PushError, RecordQueue, TryPushError};
pub use server::{default_out_dir, DnaServer, DnaServerConfig};
pub use stats::PipelineStats;
pub use worker::{spawn_workers, WorkerContext};
