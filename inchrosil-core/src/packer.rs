// Offline container tools
// Pack FASTA input into a binary container; inspect and extract both
// on-disk forms back out

use crate::fasta_io::FastaReader;
use crate::validate;
use anyhow::{bail, Context, Result};
use inchrosil_common::{
    checksum, codec, container::detect_kind, container::ContainerKind, record_file,
    ContainerReader, ContainerWriter,
};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
pub struct PackSummary {
    pub sequences: u64,
    pub total_bases: u64,
    pub payload_bytes: u64,
}

impl PackSummary {
    /// Size ratio versus 1-byte-per-base ASCII
    pub fn ratio(&self) -> f64 {
        if self.payload_bytes == 0 {
            return 0.0;
        }
        self.total_bases as f64 / self.payload_bytes as f64
    }
}

/// Pack every record of the given FASTA files into one binary container.
pub fn pack_fasta_files(inputs: &[PathBuf], output: &Path) -> Result<PackSummary> {
    let mut writer = ContainerWriter::new();

    for input in inputs {
        let mut reader = FastaReader::open(input)
            .with_context(|| format!("failed to open {}", input.display()))?;
        while let Some(record) = reader
            .next_record()
            .with_context(|| format!("failed to read {}", input.display()))?
        {
            if let Some(pos) = validate::first_invalid(&record.sequence) {
                bail!(
                    "{}: record '{}' has invalid base {:?} at position {}",
                    input.display(),
                    record.name,
                    record.sequence[pos] as char,
                    pos
                );
            }
            let payload = codec::encode(&record.sequence);
            writer.add_record(&record.name, record.sequence.len() as u64, payload)?;
        }
    }

    if writer.sequence_count() == 0 {
        bail!("no sequences found in input");
    }

    let summary = PackSummary {
        sequences: writer.sequence_count(),
        total_bases: writer.total_bases(),
        payload_bytes: writer.payload_bytes(),
    };
    writer
        .write_to(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(summary)
}

/// Print header fields and per-record metadata of either container form.
pub fn container_info<W: Write>(path: &Path, out: &mut W) -> Result<()> {
    match detect_kind(path)? {
        ContainerKind::Binary => {
            let reader = ContainerReader::open(path)?;
            writeln!(out, "{}: binary container", path.display())?;
            writeln!(out, "  version:         {}", inchrosil_common::CONTAINER_VERSION)?;
            writeln!(out, "  sequence_count:  {}", reader.sequence_count())?;
            writeln!(out, "  total_bases:     {}", reader.total_bases())?;
            writeln!(out, "  compressed_size: {}", reader.compressed_size())?;
            match reader.trailer_crc() {
                Some(crc) => writeln!(out, "  trailer_crc32:   0x{:08x}", crc)?,
                None => writeln!(out, "  trailer_crc32:   absent")?,
            }
            for (i, meta) in reader.metadata().iter().enumerate() {
                writeln!(
                    out,
                    "  [{}] {}: {} bases, {} payload bytes at offset {}",
                    i,
                    meta.name,
                    meta.length_in_bases,
                    meta.payload_len(),
                    meta.payload_offset
                )?;
            }
        }
        ContainerKind::SingleRecord => {
            let (stored, payload) = record_file::read_record(path)?;
            writeln!(out, "{}: single-record file", path.display())?;
            writeln!(out, "  id:        {}", stored.seq_id)?;
            writeln!(out, "  client:    {}", stored.client)?;
            writeln!(out, "  format:    {}", stored.format.as_str())?;
            writeln!(out, "  length:    {}", stored.length)?;
            writeln!(out, "  checksum:  0x{:x}", stored.checksum)?;
            writeln!(out, "  timestamp: {}", stored.timestamp)?;
            writeln!(out, "  payload:   {} bytes", payload.len())?;
        }
    }
    Ok(())
}

/// Decode either container form back to FASTA text, verifying checksums
/// along the way.
pub fn extract_to_fasta<W: Write>(path: &Path, out: &mut W) -> Result<()> {
    match detect_kind(path)? {
        ContainerKind::Binary => {
            let mut reader = ContainerReader::open(path)?;
            reader.verify_checksum()?;
            for i in 0..reader.sequence_count() as usize {
                let name = reader.metadata()[i].name.clone();
                let sequence = reader.read_sequence(i)?;
                write_fasta_record(out, &name, &sequence)?;
            }
        }
        ContainerKind::SingleRecord => {
            let (stored, payload) = record_file::read_record(path)?;
            let sequence = record_file::decode_stored(&stored, &payload);
            let actual = checksum::crc32(&sequence);
            if actual != stored.checksum {
                bail!(
                    "{}: sequence checksum 0x{:x} does not match stored 0x{:x}",
                    path.display(),
                    actual,
                    stored.checksum
                );
            }
            write_fasta_record(out, &format!("sequence_{}", stored.seq_id), &sequence)?;
        }
    }
    Ok(())
}

fn write_fasta_record<W: Write>(out: &mut W, name: &str, sequence: &[u8]) -> Result<()> {
    writeln!(out, ">{}", name)?;
    for line in sequence.chunks(60) {
        out.write_all(line)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}
