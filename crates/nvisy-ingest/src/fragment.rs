//! Fragment and FragmentResult: the ephemeral unit of work dispatched
//! between the stream fragmenter and the worker pool.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::validator::{LineError, RAW_LINE_SAMPLE_LIMIT};

/// A contiguous, line-aligned slice of the input stream.
///
/// Ownership transfers from the fragmenter to a worker on dispatch; the
/// fragmenter must not retain any reference to `bytes` after handing it off.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Monotonically increasing fragment number, starting at 1.
    pub sequence_number: u64,
    /// The raw byte slab, newline-terminated except possibly for the final
    /// fragment of the stream.
    pub bytes: Bytes,
    /// The 1-based line number of the first line in this fragment.
    pub start_line_number: u64,
    /// The number of lines (including empty ones) in this fragment, used to
    /// advance the next fragment's `start_line_number`.
    pub line_count: u64,
}

/// A first-error sample captured by a fragment worker.
///
/// Retained in memory only; never persisted as its own entity. At most one
/// sample survives per job — whichever worker captures one first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstErrorSample {
    /// 1-based line number within the whole file.
    pub line_number: u64,
    /// Error type tag, e.g. `too_few_columns`, `invalid_currencies`.
    pub error_type: String,
    /// Human-readable error message.
    pub error_message: String,
    /// Offending field name, if applicable.
    pub field_name: Option<String>,
    /// Offending field value, if applicable.
    pub field_value: Option<String>,
    /// The raw line, truncated to [`RAW_LINE_SAMPLE_LIMIT`] characters.
    pub raw_line: String,
}

impl FirstErrorSample {
    /// Builds a sample from a validator error plus line context, truncating
    /// `raw_line` to the configured limit.
    pub fn new(line_number: u64, raw_line: &str, error: &LineError) -> Self {
        let raw_line: String = raw_line.chars().take(RAW_LINE_SAMPLE_LIMIT).collect();
        Self {
            line_number,
            error_type: error.error_type.tag(),
            error_message: error.message.clone(),
            field_name: error.field_name.clone(),
            field_value: error.field_value.clone(),
            raw_line,
        }
    }

    /// Builds a sample describing an unexpected worker crash, used when a
    /// fragment's processing panics before any validator error was
    /// captured.
    pub fn worker_crash(line_number: u64) -> Self {
        Self {
            line_number,
            error_type: "worker_crash".to_string(),
            error_message: "fragment worker panicked while validating this fragment".to_string(),
            field_name: None,
            field_value: None,
            raw_line: String::new(),
        }
    }
}

/// The outcome of processing one fragment, produced exactly once per
/// fragment and reduced into the runner's running totals by commutative
/// counter addition.
#[derive(Debug, Clone)]
pub struct FragmentResult {
    /// Which fragment this result corresponds to.
    pub sequence_number: u64,
    /// Which worker produced it, for observability only.
    pub worker_id: usize,
    /// Non-empty lines scanned in this fragment.
    pub processed_lines: u64,
    /// Bytes scanned in this fragment.
    pub processed_bytes: u64,
    /// Lines in this fragment that failed validation.
    pub error_count: u64,
    /// The first validation error encountered in this fragment, if any.
    pub first_error: Option<FirstErrorSample>,
}
