//! Fragment Worker: scans one fragment's lines and validates each one.

use std::panic::AssertUnwindSafe;

use crate::config::ValidatorConfig;
use crate::fragment::{Fragment, FirstErrorSample, FragmentResult};
use crate::reference_data::ReferenceData;
use crate::validator;

/// Tracing target for fragment worker operations.
pub const TRACING_TARGET: &str = "nvisy_ingest::worker";

/// Scans `fragment`'s lines, validating each non-empty one against
/// `ref_data` under `config`.
///
/// This is pure CPU-bound work; callers run it on a blocking thread (see
/// [`crate::pool::WorkerPool`]) so it never occupies an async runtime
/// worker thread for the duration of a large fragment.
pub fn process_fragment(fragment: &Fragment, config: &ValidatorConfig, ref_data: &ReferenceData, worker_id: usize) -> FragmentResult {
    let text = String::from_utf8_lossy(&fragment.bytes);

    let mut processed_lines = 0u64;
    let mut error_count = 0u64;
    let mut first_error = None;
    let mut line_number = fragment.start_line_number;

    for line in text.split('\n') {
        if line.trim_matches(|c: char| c.is_ascii_whitespace()).is_empty() {
            line_number += 1;
            continue;
        }

        processed_lines += 1;

        if let Err(error) = validator::validate(line, config, ref_data) {
            error_count += 1;
            if first_error.is_none() {
                first_error = Some(FirstErrorSample::new(line_number, line, &error));
            }
        }

        line_number += 1;
    }

    FragmentResult {
        sequence_number: fragment.sequence_number,
        worker_id,
        processed_lines,
        processed_bytes: fragment.bytes.len() as u64,
        error_count,
        first_error,
    }
}

/// Runs [`process_fragment`] with panic isolation.
///
/// A worker failing (a panic inside the validator or the scanning loop)
/// must not crash the pool: it is logged, the fragment's lines count as
/// errors, and a synthetic `worker_crash` first-error sample is populated
/// if none was captured before the panic.
pub fn process_fragment_isolated(fragment: &Fragment, config: &ValidatorConfig, ref_data: &ReferenceData, worker_id: usize) -> FragmentResult {
    match std::panic::catch_unwind(AssertUnwindSafe(|| {
        process_fragment(fragment, config, ref_data, worker_id)
    })) {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());

            tracing::error!(
                target: TRACING_TARGET,
                worker_id,
                sequence_number = fragment.sequence_number,
                panic_message = %message,
                "fragment worker panicked; marking fragment as errored and continuing"
            );

            FragmentResult {
                sequence_number: fragment.sequence_number,
                worker_id,
                processed_lines: 0,
                processed_bytes: fragment.bytes.len() as u64,
                error_count: fragment.line_count,
                first_error: Some(FirstErrorSample::worker_crash(fragment.start_line_number)),
            }
        }
    }
}
