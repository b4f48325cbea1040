// FASTA file I/O for the offline packer
// Buffered multi-record reading with transparent gzip input

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// One FASTA record: full header text (without `>`) and the
/// whitespace-free sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub name: String,
    pub sequence: Vec<u8>,
}

pub struct FastaReader<R> {
    reader: BufReader<R>,
    // Header line read ahead while finishing the previous record
    pending_header: Option<String>,
}

impl<R: Read> FastaReader<R> {
    pub fn new(inner: R) -> Self {
        FastaReader {
            reader: BufReader::with_capacity(1 << 20, inner),
            pending_header: None,
        }
    }

    /// Read the next record, aggregating sequence lines until the next
    /// header or end of file. Records with no sequence data are skipped.
    pub fn next_record(&mut self) -> io::Result<Option<FastaRecord>> {
        loop {
            let name = match self.pending_header.take() {
                Some(header) => header,
                None => match self.find_next_header()? {
                    Some(header) => header,
                    None => return Ok(None),
                },
            };

            let mut sequence = Vec::new();
            let mut line = Vec::new();
            loop {
                line.clear();
                if self.reader.read_until(b'\n', &mut line)? == 0 {
                    break;
                }
                if line.first() == Some(&b'>') {
                    self.pending_header = Some(header_text(&line));
                    break;
                }
                sequence.extend(line.iter().copied().filter(|b| !b.is_ascii_whitespace()));
            }

            if !sequence.is_empty() {
                return Ok(Some(FastaRecord { name, sequence }));
            }
            if self.pending_header.is_none() {
                return Ok(None);
            }
        }
    }

    /// Collect every record of the input
    pub fn read_all(&mut self) -> io::Result<Vec<FastaRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Skip leading non-header lines and return the first header text
    fn find_next_header(&mut self) -> io::Result<Option<String>> {
        let mut line = Vec::new();
        loop {
            line.clear();
            if self.reader.read_until(b'\n', &mut line)? == 0 {
                return Ok(None);
            }
            if line.first() == Some(&b'>') {
                return Ok(Some(header_text(&line)));
            }
        }
    }
}

impl FastaReader<Box<dyn Read>> {
    /// Open a FASTA file, decompressing `.gz` input transparently
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let inner: Box<dyn Read> = if path.extension().is_some_and(|e| e == "gz") {
            Box::new(MultiGzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(FastaReader::new(inner))
    }
}

fn header_text(line: &[u8]) -> String {
    String::from_utf8_lossy(&line[1..]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_records() {
        let input = b">seq1 first\nACGT\nTT\n>seq2\nGGGG\n";
        let mut reader = FastaReader::new(&input[..]);
        let records = reader.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "seq1 first");
        assert_eq!(records[0].sequence, b"ACGTTT");
        assert_eq!(records[1].name, "seq2");
        assert_eq!(records[1].sequence, b"GGGG");
    }

    #[test]
    fn test_whitespace_and_blank_lines() {
        let input = b">s\nAC GT\r\n\nTT\n";
        let mut reader = FastaReader::new(&input[..]);
        let records = reader.read_all().unwrap();
        assert_eq!(records[0].sequence, b"ACGTTT");
    }

    #[test]
    fn test_headers_without_sequence_skipped() {
        let input = b">empty\n>real\nACGT\n>also-empty\n";
        let mut reader = FastaReader::new(&input[..]);
        let records = reader.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "real");
    }

    #[test]
    fn test_leading_junk_ignored() {
        let input = b"; comment\n>s\nACGT";
        let mut reader = FastaReader::new(&input[..]);
        let records = reader.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sequence, b"ACGT");
    }

    #[test]
    fn test_empty_input() {
        let mut reader = FastaReader::new(&b""[..]);
        assert!(reader.next_record().unwrap().is_none());
    }
}
