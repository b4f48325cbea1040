// Single-record .ich file I/O
// Debug-friendly sibling of the binary container: ASCII header block,
// then the raw packed payload. One file per ingested sequence.

use crate::codec;
use crate::error::PipelineError;
use crate::types::{FormatHint, SequenceRecord, RECORD_MAGIC_LINE};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Parsed header of a stored record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub seq_id: u64,
    pub client: String,
    pub format: FormatHint,
    pub length: u64,
    pub checksum: u32,
    pub timestamp: u64,
}

/// File name for a given sequence id
pub fn output_file_name(seq_id: u64) -> String {
    format!("dna_output_{}.ich", seq_id)
}

/// Persist one processed record as `dna_output_<seq_id>.ich` under `dir`.
///
/// Written to a temporary sibling first and renamed, so readers never see
/// a partial file. Returns the final path.
pub fn write_record(
    dir: &Path,
    record: &SequenceRecord,
    payload: &[u8],
    checksum: u32,
) -> Result<PathBuf, PipelineError> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let path = dir.join(output_file_name(record.seq_id));
    let tmp_path = path.with_extension("ich.tmp");

    let write = || -> std::io::Result<()> {
        let file = File::create(&tmp_path)?;
        let mut w = BufWriter::new(file);
        writeln!(w, "{}", RECORD_MAGIC_LINE)?;
        writeln!(w, "ID: {}", record.seq_id)?;
        writeln!(w, "Client: {}", record.origin)?;
        writeln!(w, "Format: {}", record.format.as_str())?;
        writeln!(w, "Length: {}", record.sequence.len())?;
        writeln!(w, "Checksum: 0x{:x}", checksum)?;
        writeln!(w, "Timestamp: {}", timestamp)?;
        writeln!(w, "---")?;
        w.write_all(payload)?;
        w.flush()?;
        Ok(())
    };
    write().map_err(PipelineError::Storage)?;
    fs::rename(&tmp_path, &path).map_err(PipelineError::Storage)?;
    Ok(path)
}

/// Read a single-record file back: parsed header plus packed payload.
pub fn read_record(path: &Path) -> Result<(StoredRecord, Vec<u8>), PipelineError> {
    let bytes = fs::read(path)?;

    let sep = b"\n---\n";
    let sep_pos = bytes
        .windows(sep.len())
        .position(|w| w == sep)
        .ok_or_else(|| PipelineError::corrupt("missing header terminator"))?;
    let header = std::str::from_utf8(&bytes[..sep_pos])
        .map_err(|_| PipelineError::corrupt("header is not UTF-8"))?;
    let payload = bytes[sep_pos + sep.len()..].to_vec();

    let mut lines = header.lines();
    if lines.next() != Some(RECORD_MAGIC_LINE) {
        return Err(PipelineError::corrupt("bad magic line"));
    }

    let mut field = |prefix: &str| -> Result<String, PipelineError> {
        let line = lines
            .next()
            .ok_or_else(|| PipelineError::corrupt(format!("missing {} field", prefix)))?;
        line.strip_prefix(prefix)
            .map(str::to_string)
            .ok_or_else(|| PipelineError::corrupt(format!("expected {} field, got {:?}", prefix, line)))
    };

    let seq_id = field("ID: ")?
        .parse()
        .map_err(|_| PipelineError::corrupt("unparseable ID"))?;
    let client = field("Client: ")?;
    let format = FormatHint::parse(&field("Format: ")?)
        .ok_or_else(|| PipelineError::corrupt("unknown format"))?;
    let length: u64 = field("Length: ")?
        .parse()
        .map_err(|_| PipelineError::corrupt("unparseable length"))?;
    let checksum_text = field("Checksum: ")?;
    let checksum = checksum_text
        .strip_prefix("0x")
        .and_then(|h| u32::from_str_radix(h, 16).ok())
        .ok_or_else(|| PipelineError::corrupt("unparseable checksum"))?;
    let timestamp = field("Timestamp: ")?
        .parse()
        .map_err(|_| PipelineError::corrupt("unparseable timestamp"))?;

    if payload.len() as u64 != (length + 3) / 4 {
        return Err(PipelineError::corrupt(format!(
            "payload is {} bytes, expected {} for {} bases",
            payload.len(),
            (length + 3) / 4,
            length
        )));
    }

    Ok((
        StoredRecord {
            seq_id,
            client,
            format,
            length,
            checksum,
            timestamp,
        },
        payload,
    ))
}

/// Decode a stored record's payload back to nucleotide text
pub fn decode_stored(stored: &StoredRecord, payload: &[u8]) -> Vec<u8> {
    codec::decode(payload, stored.length as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::crc32;
    use crate::codec::encode;
    use tempfile::tempdir;

    fn sample_record() -> SequenceRecord {
        let mut record = SequenceRecord::new(
            "r1".to_string(),
            FormatHint::Fasta,
            b"ACGTACGT".to_vec(),
            None,
        );
        record.seq_id = 7;
        record.origin = "127.0.0.1:5000".to_string();
        record
    }

    #[test]
    fn test_write_read_roundtrip() {
        let dir = tempdir().unwrap();
        let record = sample_record();
        let payload = encode(&record.sequence);
        let checksum = crc32(&record.sequence);

        let path = write_record(dir.path(), &record, &payload, checksum).unwrap();
        assert_eq!(path.file_name().unwrap(), "dna_output_7.ich");

        let (stored, stored_payload) = read_record(&path).unwrap();
        assert_eq!(stored.seq_id, 7);
        assert_eq!(stored.client, "127.0.0.1:5000");
        assert_eq!(stored.format, FormatHint::Fasta);
        assert_eq!(stored.length, 8);
        assert_eq!(stored.checksum, checksum);
        assert_eq!(stored_payload, payload);
        assert_eq!(decode_stored(&stored, &stored_payload), record.sequence);
    }

    #[test]
    fn test_header_is_ascii_and_newline_terminated() {
        let dir = tempdir().unwrap();
        let record = sample_record();
        let payload = encode(&record.sequence);
        let path = write_record(dir.path(), &record, &payload, 0xAB).unwrap();

        let bytes = fs::read(&path).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("INCHROSIL\nID: 7\nClient: 127.0.0.1:5000\n"));
        assert!(text.contains("Format: FASTA\n"));
        assert!(text.contains("Length: 8\n"));
        assert!(text.contains("Checksum: 0xab\n"));
        assert!(text.contains("\n---\n"));
    }

    #[test]
    fn test_quality_never_persisted() {
        let dir = tempdir().unwrap();
        let mut record = SequenceRecord::new(
            "q".to_string(),
            FormatHint::Fastq,
            b"ACGT".to_vec(),
            Some(b"IIII".to_vec()),
        );
        record.seq_id = 1;
        let payload = encode(&record.sequence);
        let path = write_record(dir.path(), &record, &payload, 0).unwrap();

        let bytes = fs::read(&path).unwrap();
        // Payload is the single packed byte; no quality bytes follow
        assert_eq!(bytes.last(), Some(&0x1B));
        let (stored, stored_payload) = read_record(&path).unwrap();
        assert_eq!(stored.format, FormatHint::Fastq);
        assert_eq!(stored_payload, vec![0x1B]);
    }

    #[test]
    fn test_malformed_header_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dna_output_1.ich");
        fs::write(&path, b"NOTMAGIC\nID: 1\n---\n\x1B").unwrap();
        assert!(read_record(&path).is_err());

        fs::write(&path, b"INCHROSIL\nID: 1\nno separator").unwrap();
        assert!(read_record(&path).is_err());
    }
}
