//! Stream Fragmenter: cuts an incoming byte stream into line-aligned
//! fragments bounded by a byte threshold.

use std::future::Future;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{IngestError, IngestResult};
use crate::fragment::Fragment;
use crate::pool::WorkerPool;

/// Tracing target for stream fragmenter operations.
pub const TRACING_TARGET: &str = "nvisy_ingest::fragmenter";

/// What the caller's per-dispatch check decided.
pub enum FragmenterControl {
    /// Keep going.
    Continue,
    /// Abort the run with the given terminal error.
    Abort(IngestError),
}

/// Aggregate facts about a completed fragmenter run, independent of the
/// validation outcome (which lives in the [`crate::fragment::FragmentResult`]
/// values the pool produces).
#[derive(Debug, Clone, Copy, Default)]
pub struct FragmenterOutcome {
    /// Total number of fragments emitted.
    pub num_fragments: u64,
    /// Total bytes read from the source stream.
    pub total_bytes_read: u64,
}

/// Reads `stream` in a rolling buffer, slicing off a fragment at the last
/// newline boundary whenever the buffer crosses `max_bytes`, and dispatches
/// each fragment to an acquired worker from `pool`.
///
/// Before acquiring a worker for each fragment (including the final one)
/// the cancellation token is checked; after each dispatch,
/// `on_fragment_dispatched` is called so the runner can enforce fail-fast
/// and memory thresholds. On stream end, any non-empty remainder is
/// flushed as a final fragment.
pub async fn run<S, F, Fut>(
    mut stream: S,
    pool: &WorkerPool,
    max_bytes: usize,
    cancel: &CancellationToken,
    mut on_fragment_dispatched: F,
) -> IngestResult<FragmenterOutcome>
where
    S: Stream<Item = IngestResult<Bytes>> + Unpin,
    F: FnMut() -> Fut,
    Fut: Future<Output = FragmenterControl>,
{
    let mut buffer = BytesMut::new();
    let mut sequence_number = 0u64;
    let mut next_start_line_number = 1u64;
    let mut total_bytes_read = 0u64;

    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }

        let chunk = chunk?;
        total_bytes_read += chunk.len() as u64;
        buffer.extend_from_slice(&chunk);

        while buffer.len() >= max_bytes {
            let Some(newline_pos) = last_newline(&buffer) else {
                // No newline yet even past the threshold: a single line
                // exceeds max_bytes. Wait for more data.
                break;
            };

            sequence_number += 1;
            let emitted = buffer.split_to(newline_pos + 1);
            let line_count = count_lines(&emitted);

            dispatch_fragment(
                pool,
                cancel,
                sequence_number,
                emitted.freeze(),
                next_start_line_number,
                line_count,
            )
            .await?;
            next_start_line_number += line_count;

            match on_fragment_dispatched().await {
                FragmenterControl::Continue => {}
                FragmenterControl::Abort(err) => return Err(err),
            }
        }
    }

    if !buffer.is_empty() {
        sequence_number += 1;
        let line_count = count_lines(&buffer) + if buffer.ends_with(b"\n") { 0 } else { 1 };

        dispatch_fragment(
            pool,
            cancel,
            sequence_number,
            buffer.freeze(),
            next_start_line_number,
            line_count,
        )
        .await?;

        match on_fragment_dispatched().await {
            FragmenterControl::Continue => {}
            FragmenterControl::Abort(err) => return Err(err),
        }
    }

    Ok(FragmenterOutcome {
        num_fragments: sequence_number,
        total_bytes_read,
    })
}

async fn dispatch_fragment(
    pool: &WorkerPool,
    cancel: &CancellationToken,
    sequence_number: u64,
    bytes: Bytes,
    start_line_number: u64,
    line_count: u64,
) -> IngestResult<()> {
    if cancel.is_cancelled() {
        return Err(IngestError::Cancelled);
    }

    let worker = pool.acquire().await?;
    let fragment = Fragment {
        sequence_number,
        bytes,
        start_line_number,
        line_count,
    };

    tracing::debug!(
        target: TRACING_TARGET,
        sequence_number,
        start_line_number,
        line_count,
        "dispatching fragment"
    );

    pool.dispatch(worker, fragment).await
}

/// Finds the byte index of the last `\n` in `buffer`, if any.
fn last_newline(buffer: &[u8]) -> Option<usize> {
    buffer.iter().rposition(|&b| b == b'\n')
}

/// Counts the number of lines in `buffer` by counting newlines, plus one
/// for a trailing unterminated line (none, in the split-to-newline case the
/// caller uses for rolling emission).
fn count_lines(buffer: &[u8]) -> u64 {
    buffer.iter().filter(|&&b| b == b'\n').count() as u64
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;
    use crate::config::ValidatorConfig;
    use crate::reference_data::ReferenceData;

    fn chunks(data: &'static [u8], chunk_size: usize) -> impl Stream<Item = IngestResult<Bytes>> + Unpin {
        let owned: Vec<IngestResult<Bytes>> = data
            .chunks(chunk_size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Box::pin(stream::iter(owned))
    }

    #[tokio::test]
    async fn emits_one_fragment_for_small_input() {
        let pool = WorkerPool::spawn(1, ValidatorConfig::new(3, 0, 1, 2), ReferenceData::default());
        let cancel = CancellationToken::new();

        let outcome = run(chunks(b"a;b;c\nx;y;z\n", 4), &pool, 1024, &cancel, || async { FragmenterControl::Continue })
            .await
            .unwrap();

        assert_eq!(outcome.num_fragments, 1);
        let results = pool.await_all_idle().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].processed_lines, 2);
    }

    #[tokio::test]
    async fn splits_into_multiple_fragments_past_threshold() {
        let pool = WorkerPool::spawn(2, ValidatorConfig::new(3, 0, 1, 2), ReferenceData::default());
        let cancel = CancellationToken::new();

        // Ten lines of 6 bytes each ("a;b;c\n"); max_bytes=20 forces a cut
        // roughly every three lines.
        let mut data = Vec::new();
        for _ in 0..10 {
            data.extend_from_slice(b"a;b;c\n");
        }
        let data: &'static [u8] = Box::leak(data.into_boxed_slice());

        let outcome = run(chunks(data, 7), &pool, 20, &cancel, || async { FragmenterControl::Continue })
            .await
            .unwrap();

        assert!(outcome.num_fragments > 1);
        let results = pool.await_all_idle().await;
        let total_lines: u64 = results.iter().map(|r| r.processed_lines).sum();
        assert_eq!(total_lines, 10);
    }

    #[tokio::test]
    async fn flushes_final_fragment_without_trailing_newline() {
        let pool = WorkerPool::spawn(1, ValidatorConfig::new(3, 0, 1, 2), ReferenceData::default());
        let cancel = CancellationToken::new();

        let outcome = run(chunks(b"a;b;c", 32), &pool, 1024, &cancel, || async { FragmenterControl::Continue })
            .await
            .unwrap();

        assert_eq!(outcome.num_fragments, 1);
        let results = pool.await_all_idle().await;
        assert_eq!(results[0].processed_lines, 1);
    }

    #[tokio::test]
    async fn empty_stream_emits_no_fragments() {
        let pool = WorkerPool::spawn(1, ValidatorConfig::new(3, 0, 1, 2), ReferenceData::default());
        let cancel = CancellationToken::new();

        let outcome = run(chunks(b"", 32), &pool, 1024, &cancel, || async { FragmenterControl::Continue })
            .await
            .unwrap();

        assert_eq!(outcome.num_fragments, 0);
    }

    #[tokio::test]
    async fn single_line_exceeding_threshold_is_not_split() {
        let pool = WorkerPool::spawn(1, ValidatorConfig::new(3, 0, 1, 2), ReferenceData::default());
        let cancel = CancellationToken::new();

        let long_field = "x".repeat(100);
        let line = format!("{long_field};b;c\n");
        let data: &'static str = Box::leak(line.into_boxed_str());

        let outcome = run(chunks(data.as_bytes(), 16), &pool, 8, &cancel, || async { FragmenterControl::Continue })
            .await
            .unwrap();

        assert_eq!(outcome.num_fragments, 1);
    }

    #[tokio::test]
    async fn cancellation_is_observed_before_next_acquire() {
        let pool = WorkerPool::spawn(1, ValidatorConfig::new(3, 0, 1, 2), ReferenceData::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run(chunks(b"a;b;c\n", 32), &pool, 1024, &cancel, || async { FragmenterControl::Continue }).await;
        assert!(matches!(result, Err(IngestError::Cancelled)));
    }
}
