// Streaming frame parser
// Reassembles FASTA/FASTQ/raw records from an arbitrary byte stream,
// one instance per connection

use inchrosil_common::{FormatHint, SequenceRecord, DEFAULT_MAX_SEQ_LEN};

enum ParseState {
    /// No record in progress
    Idle,
    /// Accumulating FASTA sequence lines until the next header
    Fasta { id: String, seq: Vec<u8> },
    /// Saw `@`, the next line is the sequence
    FastqSeq { id: String },
    /// Have the sequence, the next line is the `+` separator
    FastqPlus { id: String, seq: Vec<u8> },
    /// Separator consumed, the next line is the quality block
    FastqQual { id: String, seq: Vec<u8> },
}

/// Incremental record parser over newline-delimited input.
///
/// Feed raw socket bytes with `feed`, collect completed records with
/// `drain`, and call `finish` once the stream closes to flush a pending
/// tail. The parser strips all ASCII whitespace from sequences, skips
/// empty lines and never validates the alphabet. It does not fail:
/// malformed framing is dropped, and over-long records are counted in
/// `parse_errors` and discarded.
pub struct DnaFrameParser {
    buf: Vec<u8>,
    state: ParseState,
    max_seq_len: usize,
    parse_errors: u64,
}

impl DnaFrameParser {
    pub fn new() -> Self {
        Self::with_max_seq_len(DEFAULT_MAX_SEQ_LEN)
    }

    pub fn with_max_seq_len(max_seq_len: usize) -> Self {
        DnaFrameParser {
            buf: Vec::new(),
            state: ParseState::Idle,
            max_seq_len,
            parse_errors: 0,
        }
    }

    /// Append received bytes to the unconsumed buffer
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Consume every complete line in the buffer and return the records
    /// they completed, in input order.
    pub fn drain(&mut self) -> Vec<SequenceRecord> {
        let mut records = Vec::new();
        let mut consumed = 0;
        while let Some(nl) = self.buf[consumed..].iter().position(|&b| b == b'\n') {
            let line_end = consumed + nl;
            // Borrow the line out of the buffer by copying: lines are
            // short-lived and the buffer compacts below
            let line = trim_line(&self.buf[consumed..line_end]).to_vec();
            consumed = line_end + 1;
            if let Some(record) = self.process_line(&line) {
                records.push(record);
            }
        }
        self.buf.drain(..consumed);
        records
    }

    /// Signal end of stream. Any unterminated final line is processed,
    /// then an in-progress record is flushed: FASTA emits what it
    /// accumulated, and a FASTQ still waiting for its separator or
    /// quality is downgraded to FASTA. Returns at most one record.
    pub fn finish(&mut self) -> Option<SequenceRecord> {
        let tail = trim_line(&std::mem::take(&mut self.buf)).to_vec();
        let mut flushed = if tail.is_empty() {
            None
        } else {
            self.process_line(&tail)
        };

        let state = std::mem::replace(&mut self.state, ParseState::Idle);
        let pending = match state {
            ParseState::Idle | ParseState::FastqSeq { .. } => None,
            ParseState::Fasta { id, seq } => self.emit(id, FormatHint::Fasta, seq, None),
            // Quality never arrived; keep the sequence as FASTA
            ParseState::FastqPlus { id, seq } | ParseState::FastqQual { id, seq } => {
                self.emit(id, FormatHint::Fasta, seq, None)
            }
        };

        // At most one of the two can be present: a tail line either
        // completes or opens the pending record
        flushed = flushed.or(pending);
        flushed
    }

    /// Records dropped for exceeding the length cap
    pub fn parse_errors(&self) -> u64 {
        self.parse_errors
    }

    fn process_line(&mut self, line: &[u8]) -> Option<SequenceRecord> {
        if line.is_empty() {
            return None;
        }

        let state = std::mem::replace(&mut self.state, ParseState::Idle);
        match state {
            ParseState::Idle => match line[0] {
                b'>' => {
                    self.state = ParseState::Fasta {
                        id: header_id(line),
                        seq: Vec::new(),
                    };
                    None
                }
                b'@' => {
                    self.state = ParseState::FastqSeq {
                        id: header_id(line),
                    };
                    None
                }
                // Stray FASTQ separator
                b'+' => None,
                _ => {
                    let seq = strip_whitespace(line);
                    self.emit(String::new(), FormatHint::Raw, seq, None)
                }
            },

            ParseState::Fasta { id, mut seq } => match line[0] {
                b'>' => {
                    let done = self.emit(id, FormatHint::Fasta, seq, None);
                    self.state = ParseState::Fasta {
                        id: header_id(line),
                        seq: Vec::new(),
                    };
                    done
                }
                b'@' => {
                    let done = self.emit(id, FormatHint::Fasta, seq, None);
                    self.state = ParseState::FastqSeq {
                        id: header_id(line),
                    };
                    done
                }
                b'+' => {
                    self.state = ParseState::Fasta { id, seq };
                    None
                }
                _ => {
                    seq.extend(strip_whitespace(line));
                    self.state = ParseState::Fasta { id, seq };
                    None
                }
            },

            // FASTQ is positional: sequence, separator, quality
            ParseState::FastqSeq { id } => {
                self.state = ParseState::FastqPlus {
                    id,
                    seq: strip_whitespace(line),
                };
                None
            }
            ParseState::FastqPlus { id, seq } => {
                self.state = ParseState::FastqQual { id, seq };
                None
            }
            ParseState::FastqQual { id, seq } => {
                self.emit(id, FormatHint::Fastq, seq, Some(line.to_vec()))
            }
        }
    }

    fn emit(
        &mut self,
        id: String,
        format: FormatHint,
        seq: Vec<u8>,
        quality: Option<Vec<u8>>,
    ) -> Option<SequenceRecord> {
        if seq.is_empty() {
            return None;
        }
        if seq.len() > self.max_seq_len {
            self.parse_errors += 1;
            return None;
        }
        Some(SequenceRecord::new(id, format, seq, quality))
    }
}

impl Default for DnaFrameParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip a trailing carriage return
fn trim_line(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

/// First whitespace-separated token after the header marker, may be empty
fn header_id(line: &[u8]) -> String {
    let token = line[1..]
        .split(|b| b.is_ascii_whitespace())
        .next()
        .unwrap_or(b"");
    String::from_utf8_lossy(token).into_owned()
}

fn strip_whitespace(line: &[u8]) -> Vec<u8> {
    line.iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(input: &[u8]) -> Vec<SequenceRecord> {
        let mut parser = DnaFrameParser::new();
        parser.feed(input);
        let mut records = parser.drain();
        records.extend(parser.finish());
        records
    }

    #[test]
    fn test_raw_lines() {
        let records = parse_all(b"ACGT\nTTTT\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence, b"ACGT");
        assert_eq!(records[0].format, FormatHint::Raw);
        assert_eq!(records[0].id, "");
        assert_eq!(records[1].sequence, b"TTTT");
    }

    #[test]
    fn test_fasta_multiline_aggregation() {
        let records = parse_all(b">seq1 \xE6\x8F\x8F\xE8\xBF\xB0 extra\nACGT\nGG TT\n>seq2\nAAAA\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "seq1");
        assert_eq!(records[0].sequence, b"ACGTGGTT");
        assert_eq!(records[0].format, FormatHint::Fasta);
        assert_eq!(records[1].id, "seq2");
        assert_eq!(records[1].sequence, b"AAAA");
    }

    #[test]
    fn test_fasta_tail_flushed_on_finish() {
        let mut parser = DnaFrameParser::new();
        parser.feed(b">tail\nACGT\nAC");
        assert!(parser.drain().is_empty());
        let record = parser.finish().unwrap();
        assert_eq!(record.sequence, b"ACGTAC");
    }

    #[test]
    fn test_fastq_record() {
        let records = parse_all(b"@r\nACGT\n+\nIIII\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "r");
        assert_eq!(records[0].format, FormatHint::Fastq);
        assert_eq!(records[0].sequence, b"ACGT");
        assert_eq!(records[0].quality.as_deref(), Some(&b"IIII"[..]));
    }

    #[test]
    fn test_fastq_missing_quality_downgrades_to_fasta() {
        let records = parse_all(b"@r\nACGT\n+\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].format, FormatHint::Fasta);
        assert_eq!(records[0].sequence, b"ACGT");
        assert!(records[0].quality.is_none());

        // Separator never seen either
        let records = parse_all(b"@r\nACGT\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].format, FormatHint::Fasta);

        // Header alone emits nothing
        assert!(parse_all(b"@r\n").is_empty());
    }

    #[test]
    fn test_stray_plus_and_empty_lines_skipped() {
        let records = parse_all(b"+\n\n\r\nACGT\n+junk\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sequence, b"ACGT");
    }

    #[test]
    fn test_crlf_input() {
        let records = parse_all(b">s\r\nACGT\r\nTT\r\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sequence, b"ACGTTT");
    }

    #[test]
    fn test_no_whitespace_in_output() {
        let records = parse_all(b"  AC GT\t\n>h\n A C\n GT \n");
        for record in &records {
            assert!(record
                .sequence
                .iter()
                .all(|b| !b.is_ascii_whitespace()));
        }
        assert_eq!(records[0].sequence, b"ACGT");
        assert_eq!(records[1].sequence, b"ACGT");
    }

    #[test]
    fn test_byte_at_a_time_matches_whole_stream() {
        let input: &[u8] =
            b">a desc\nAC GT\nGGTT\n@q\nTTTT\n+\nIIII\nRAWSEQ\n+\n\n>b\nCCCC";
        let whole = parse_all(input);

        let mut parser = DnaFrameParser::new();
        let mut dribbled = Vec::new();
        for &byte in input {
            parser.feed(&[byte]);
            dribbled.extend(parser.drain());
        }
        dribbled.extend(parser.finish());

        assert_eq!(whole.len(), dribbled.len());
        for (a, b) in whole.iter().zip(dribbled.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.format, b.format);
            assert_eq!(a.sequence, b.sequence);
            assert_eq!(a.quality, b.quality);
        }
    }

    #[test]
    fn test_unterminated_raw_line_flushed_on_finish() {
        let mut parser = DnaFrameParser::new();
        parser.feed(b"ACGT");
        assert!(parser.drain().is_empty());
        let record = parser.finish().unwrap();
        assert_eq!(record.sequence, b"ACGT");
        assert_eq!(record.format, FormatHint::Raw);
    }

    #[test]
    fn test_oversized_record_counted_and_dropped() {
        let mut parser = DnaFrameParser::with_max_seq_len(8);
        parser.feed(b"ACGTACGTA\nACGT\n");
        let records = parser.drain();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sequence, b"ACGT");
        assert_eq!(parser.parse_errors(), 1);
    }
}
