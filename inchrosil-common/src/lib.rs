// INCHROSIL Common Library
// Shared types, codec, checksum and container file formats

pub mod checksum;
pub mod codec;
pub mod container;
pub mod error;
pub mod record_file;
pub mod types;

// Re-export commonly used types
pub use types::{Base, FormatHint, SequenceRecord};
pub use types::{
    inchrosil_version, CONTAINER_MAGIC, CONTAINER_VERSION, DEFAULT_MAX_SEQ_LEN, DEFAULT_PORT,
    MAX_CLIENTS, QUEUE_CAPACITY, RECORD_MAGIC_LINE, RECV_CHUNK,
};

// Re-export codec and checksum entry points
pub use checksum::{crc32, crc32_reference};
pub use codec::{decode, encode, encode_into, encoded_len};

// Re-export container I/O
pub use container::{detect_kind, ContainerKind, ContainerReader, ContainerWriter, RecordMeta};
pub use record_file::{output_file_name, read_record, write_record, StoredRecord};

// Re-export the error taxonomy
pub use error::PipelineError;
