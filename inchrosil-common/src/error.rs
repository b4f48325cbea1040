// Error taxonomy for the pipeline
// Worker-side kinds are counted, never propagated; CLI-facing kinds are fatal

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad command-line flags or values. Fatal, exit 1.
    #[error("invalid arguments: {0}")]
    Argument(String),

    /// Client could not reach the server. Fatal to the client run.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// TCP send error; terminates the client session.
    #[error("failed to send data: {0}")]
    Send(#[source] io::Error),

    /// Server could not bind its listening socket. Fatal.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// I/O failure while persisting a record. Counted by the worker,
    /// the record is dropped (at-most-once persistence).
    #[error("storage failure: {0}")]
    Storage(#[source] io::Error),

    /// A container file failed validation on read. Fatal to the read.
    #[error("corrupt container{}: {reason}", fmt_record(.record))]
    CorruptContainer {
        /// Index of the offending record, when one can be named
        record: Option<usize>,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn fmt_record(record: &Option<usize>) -> String {
    match record {
        Some(i) => format!(" (record {})", i),
        None => String::new(),
    }
}

impl PipelineError {
    pub fn corrupt(reason: impl Into<String>) -> Self {
        PipelineError::CorruptContainer {
            record: None,
            reason: reason.into(),
        }
    }

    pub fn corrupt_record(record: usize, reason: impl Into<String>) -> Self {
        PipelineError::CorruptContainer {
            record: Some(record),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_display_names_record() {
        let e = PipelineError::corrupt_record(3, "payload truncated");
        assert_eq!(e.to_string(), "corrupt container (record 3): payload truncated");

        let e = PipelineError::corrupt("bad magic");
        assert_eq!(e.to_string(), "corrupt container: bad magic");
    }
}
