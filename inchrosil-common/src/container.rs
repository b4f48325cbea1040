// Binary container I/O
// Self-describing multi-record file: 64-byte header, fixed metadata slots,
// tightly packed 2-bit payloads, optional checksum trailer

use crate::checksum;
use crate::codec;
use crate::error::PipelineError;
use crate::types::{CONTAINER_MAGIC, CONTAINER_VERSION};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Header size on disk
pub const HEADER_LEN: u64 = 64;
/// Per-record metadata slot size on disk
pub const META_SLOT_LEN: u64 = 280;
/// Name field size within a metadata slot
pub const NAME_LEN: usize = 256;
/// Optional trailer size (CRC32 + reserved)
pub const TRAILER_LEN: u64 = 32;

/// Which of the two on-disk forms a `.ich` file carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Multi-record binary container (`INCHRSIL` magic)
    Binary,
    /// ASCII-header single-record file (`INCHROSIL\n` first line)
    SingleRecord,
}

/// Distinguish the two container forms by their first bytes.
pub fn detect_kind(path: &Path) -> Result<ContainerKind, PipelineError> {
    let mut head = [0u8; 10];
    let mut file = File::open(path)?;
    let n = file.read(&mut head)?;
    if head[..n].starts_with(b"INCHROSIL\n") {
        Ok(ContainerKind::SingleRecord)
    } else if n >= 8 && &head[..8] == CONTAINER_MAGIC {
        Ok(ContainerKind::Binary)
    } else {
        Err(PipelineError::corrupt("unrecognized file format"))
    }
}

/// Metadata slot for one record
#[derive(Debug, Clone)]
pub struct RecordMeta {
    pub length_in_bases: u64,
    /// Payload position, in bytes from the end of the metadata block
    pub payload_offset: u64,
    pub name: String,
}

impl RecordMeta {
    /// Packed payload size implied by the base count
    pub fn payload_len(&self) -> u64 {
        (self.length_in_bases + 3) / 4
    }
}

fn read_u32<R: Read>(r: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(r: &mut R) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Accumulates records in memory, then writes the complete file.
///
/// The metadata block is assembled up front, payloads are streamed after it
/// in slot order, and the file only becomes visible under its final name
/// once fully flushed (write to a `.tmp` sibling, then rename).
pub struct ContainerWriter {
    records: Vec<(RecordMeta, Vec<u8>)>,
    total_bases: u64,
    payload_bytes: u64,
}

impl ContainerWriter {
    pub fn new() -> Self {
        ContainerWriter {
            records: Vec::new(),
            total_bases: 0,
            payload_bytes: 0,
        }
    }

    /// Append one record. `payload` must be the 2-bit packing of a
    /// sequence of `bases` nucleotides.
    pub fn add_record(
        &mut self,
        name: &str,
        bases: u64,
        payload: Vec<u8>,
    ) -> Result<(), PipelineError> {
        if payload.len() as u64 != (bases + 3) / 4 {
            return Err(PipelineError::corrupt_record(
                self.records.len(),
                format!(
                    "payload is {} bytes, expected {} for {} bases",
                    payload.len(),
                    (bases + 3) / 4,
                    bases
                ),
            ));
        }
        let meta = RecordMeta {
            length_in_bases: bases,
            payload_offset: self.payload_bytes,
            name: name.to_string(),
        };
        self.total_bases += bases;
        self.payload_bytes += payload.len() as u64;
        self.records.push((meta, payload));
        Ok(())
    }

    pub fn sequence_count(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn total_bases(&self) -> u64 {
        self.total_bases
    }

    pub fn payload_bytes(&self) -> u64 {
        self.payload_bytes
    }

    /// Write header, metadata slots, payloads and trailer, then rename
    /// into place.
    pub fn write_to(&self, path: &Path) -> Result<(), PipelineError> {
        let tmp_path = path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut w = BufWriter::new(file);

            // Header
            w.write_all(CONTAINER_MAGIC)?;
            w.write_all(&CONTAINER_VERSION.to_le_bytes())?;
            w.write_all(&self.sequence_count().to_le_bytes())?;
            w.write_all(&self.total_bases.to_le_bytes())?;
            w.write_all(&self.payload_bytes.to_le_bytes())?;
            w.write_all(&[0u8; 28])?;

            // Metadata slots: length, offset, name, 8 reserved bytes
            for (meta, _) in &self.records {
                w.write_all(&meta.length_in_bases.to_le_bytes())?;
                w.write_all(&meta.payload_offset.to_le_bytes())?;
                let mut name = [0u8; NAME_LEN];
                let bytes = meta.name.as_bytes();
                // Zero terminator at byte 255 is enforced by capping at 255
                let n = bytes.len().min(NAME_LEN - 1);
                name[..n].copy_from_slice(&bytes[..n]);
                w.write_all(&name)?;
                w.write_all(&[0u8; 8])?;
            }

            // Payloads, tightly packed in slot order
            let mut crc = crc32fast::Hasher::new();
            for (_, payload) in &self.records {
                w.write_all(payload)?;
                crc.update(payload);
            }

            // Trailer: payload CRC32 + reserved
            w.write_all(&crc.finalize().to_le_bytes())?;
            w.write_all(&[0u8; 28])?;

            w.flush()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

impl Default for ContainerWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Validating reader over a binary container file.
///
/// `open` checks the magic, version and overall geometry; payloads are
/// read on demand and any shortfall names the offending record.
#[derive(Debug)]
pub struct ContainerReader {
    reader: BufReader<File>,
    sequence_count: u64,
    total_bases: u64,
    compressed_size: u64,
    metadata: Vec<RecordMeta>,
    payload_base: u64,
    trailer_crc: Option<u32>,
}

impl ContainerReader {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        if file_len < HEADER_LEN {
            return Err(PipelineError::corrupt("file shorter than header"));
        }

        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != CONTAINER_MAGIC {
            return Err(PipelineError::corrupt(format!(
                "bad magic {:02x?}",
                magic
            )));
        }
        let version = read_u32(&mut reader)?;
        if version != CONTAINER_VERSION {
            return Err(PipelineError::corrupt(format!(
                "unsupported version {}",
                version
            )));
        }

        let sequence_count = read_u64(&mut reader)?;
        let total_bases = read_u64(&mut reader)?;
        let compressed_size = read_u64(&mut reader)?;
        let mut reserved = [0u8; 28];
        reader.read_exact(&mut reserved)?;

        let payload_base = HEADER_LEN
            .checked_add(sequence_count.checked_mul(META_SLOT_LEN).ok_or_else(
                || PipelineError::corrupt("sequence count overflows metadata size"),
            )?)
            .ok_or_else(|| PipelineError::corrupt("metadata block overflows file offsets"))?;
        if payload_base > file_len {
            return Err(PipelineError::corrupt(format!(
                "{} metadata slots do not fit in a {} byte file",
                sequence_count, file_len
            )));
        }

        let mut metadata = Vec::with_capacity(sequence_count as usize);
        for i in 0..sequence_count as usize {
            let length_in_bases = read_u64(&mut reader)?;
            let payload_offset = read_u64(&mut reader)?;
            let mut name_buf = [0u8; NAME_LEN];
            reader.read_exact(&mut name_buf)?;
            let mut slot_reserved = [0u8; 8];
            reader.read_exact(&mut slot_reserved)?;
            if name_buf[NAME_LEN - 1] != 0 {
                return Err(PipelineError::corrupt_record(
                    i,
                    "record name is not zero-terminated".to_string(),
                ));
            }
            let end = name_buf.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
            let name = std::str::from_utf8(&name_buf[..end])
                .map_err(|_| {
                    PipelineError::corrupt_record(i, "record name is not UTF-8".to_string())
                })?
                .to_string();

            let meta = RecordMeta {
                length_in_bases,
                payload_offset,
                name,
            };
            let payload_end = meta
                .payload_offset
                .checked_add(meta.payload_len())
                .ok_or_else(|| {
                    PipelineError::corrupt_record(i, "payload offset overflows".to_string())
                })?;
            if payload_end > compressed_size {
                return Err(PipelineError::corrupt_record(
                    i,
                    format!(
                        "payload [{}, {}) exceeds compressed size {}",
                        meta.payload_offset, payload_end, compressed_size
                    ),
                ));
            }
            metadata.push(meta);
        }

        // The payload region must be fully present; a checksum trailer may
        // follow it
        let payload_end = payload_base.checked_add(compressed_size).ok_or_else(
            || PipelineError::corrupt("compressed size overflows file offsets"),
        )?;
        let trailer_crc = match file_len.checked_sub(payload_end) {
            Some(0) => None,
            Some(TRAILER_LEN) => {
                reader.seek(SeekFrom::Start(payload_end))?;
                Some(read_u32(&mut reader)?)
            }
            _ => {
                return Err(PipelineError::corrupt(format!(
                    "file length {} does not match {} payload bytes",
                    file_len, compressed_size
                )))
            }
        };

        Ok(ContainerReader {
            reader,
            sequence_count,
            total_bases,
            compressed_size,
            metadata,
            payload_base,
            trailer_crc,
        })
    }

    pub fn sequence_count(&self) -> u64 {
        self.sequence_count
    }

    pub fn total_bases(&self) -> u64 {
        self.total_bases
    }

    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// CRC32 over the payload region, when the file carries a trailer
    pub fn trailer_crc(&self) -> Option<u32> {
        self.trailer_crc
    }

    pub fn record_meta(&self, index: usize) -> Option<&RecordMeta> {
        self.metadata.get(index)
    }

    pub fn metadata(&self) -> &[RecordMeta] {
        &self.metadata
    }

    /// Read the packed payload of one record
    pub fn read_payload(&mut self, index: usize) -> Result<Vec<u8>, PipelineError> {
        let meta = self
            .metadata
            .get(index)
            .ok_or_else(|| PipelineError::corrupt_record(index, "no such record".to_string()))?;
        let mut payload = vec![0u8; meta.payload_len() as usize];
        self.reader
            .seek(SeekFrom::Start(self.payload_base + meta.payload_offset))?;
        self.reader.read_exact(&mut payload).map_err(|_| {
            PipelineError::corrupt_record(index, "payload truncated".to_string())
        })?;
        Ok(payload)
    }

    /// Read and unpack one record back to nucleotide text
    pub fn read_sequence(&mut self, index: usize) -> Result<Vec<u8>, PipelineError> {
        let bases = self.metadata[index].length_in_bases as usize;
        let payload = self.read_payload(index)?;
        Ok(codec::decode(&payload, bases))
    }

    /// Re-read every payload and check it against the trailer checksum.
    /// A file without a trailer verifies trivially.
    pub fn verify_checksum(&mut self) -> Result<(), PipelineError> {
        let Some(expected) = self.trailer_crc else {
            return Ok(());
        };
        self.reader.seek(SeekFrom::Start(self.payload_base))?;
        let mut payloads = vec![0u8; self.compressed_size as usize];
        self.reader.read_exact(&mut payloads)?;
        let actual = checksum::crc32(&payloads);
        if actual != expected {
            return Err(PipelineError::corrupt(format!(
                "payload checksum 0x{:08x} does not match trailer 0x{:08x}",
                actual, expected
            )));
        }
        Ok(())
    }
}
