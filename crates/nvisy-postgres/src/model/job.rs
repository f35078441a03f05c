//! Job model for PostgreSQL database operations.

use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use jiff_diesel::Timestamp;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::schema::jobs;

/// Lifecycle state of an ingestion job.
///
/// Corresponds to the `job_status` PostgreSQL enum. Transitions are described
/// in the job runner's state machine; this type only carries the label.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
#[derive(Serialize, Deserialize, DbEnum, Display, EnumIter, EnumString)]
#[ExistingTypePath = "crate::schema::sql_types::JobStatus"]
pub enum JobStatus {
    /// Job row has been created but not yet scheduled.
    #[db_rename = "new"]
    #[serde(rename = "new")]
    #[default]
    New,

    /// Job is waiting for a worker instance to claim it.
    #[db_rename = "queued"]
    #[serde(rename = "queued")]
    Queued,

    /// A worker instance has claimed the job and is streaming it.
    #[db_rename = "processing"]
    #[serde(rename = "processing")]
    Processing,

    /// Job completed without a fatal error.
    #[db_rename = "done"]
    #[serde(rename = "done")]
    Done,

    /// Job stopped due to a fatal or fail-fast error.
    #[db_rename = "error"]
    #[serde(rename = "error")]
    Error,

    /// Job was cancelled before completion.
    #[db_rename = "cancelled"]
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl JobStatus {
    /// Returns whether the job has not yet been queued.
    #[inline]
    pub fn is_new(self) -> bool {
        matches!(self, JobStatus::New)
    }

    /// Returns whether the job is waiting to be claimed.
    #[inline]
    pub fn is_queued(self) -> bool {
        matches!(self, JobStatus::Queued)
    }

    /// Returns whether the job is actively being processed.
    #[inline]
    pub fn is_processing(self) -> bool {
        matches!(self, JobStatus::Processing)
    }

    /// Returns whether the job finished successfully.
    #[inline]
    pub fn is_done(self) -> bool {
        matches!(self, JobStatus::Done)
    }

    /// Returns whether the job finished with an error.
    #[inline]
    pub fn is_error(self) -> bool {
        matches!(self, JobStatus::Error)
    }

    /// Returns whether the job was cancelled.
    #[inline]
    pub fn is_cancelled(self) -> bool {
        matches!(self, JobStatus::Cancelled)
    }

    /// Returns whether the job is still active (queued or processing).
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Processing)
    }

    /// Returns whether the job has reached a terminal state.
    #[inline]
    pub fn is_finished(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error | JobStatus::Cancelled)
    }
}

/// A job row as stored in the `jobs` table.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Job {
    /// Unique job identifier.
    pub id: Uuid,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Display name of the source file.
    pub file_name: String,
    /// Identifier of the item in the remote object store.
    pub source_item_id: String,
    /// Total byte size of the source file, if known up front.
    pub total_bytes: Option<i64>,
    /// Bytes consumed from the source stream so far.
    pub bytes_read: i64,
    /// Total lines observed so far.
    pub lines_total: i64,
    /// Lines that passed validation.
    pub lines_valid: i64,
    /// Lines that failed validation.
    pub lines_invalid: i64,
    /// Fragments emitted by the stream fragmenter so far.
    pub num_fragments: i64,
    /// Fragments whose result has been folded into the counters above.
    pub fragments_done: i64,
    /// Line number of the first invalid line encountered, if any.
    pub first_error_line: Option<i64>,
    /// Field name responsible for the first validation failure.
    pub first_error_field: Option<String>,
    /// Human-readable message for the first validation failure.
    pub first_error_message: Option<String>,
    /// When the job entered the queued state.
    pub queued_at: Option<Timestamp>,
    /// When a worker instance claimed the job.
    pub started_at: Option<Timestamp>,
    /// When the job reached a terminal state.
    pub finished_at: Option<Timestamp>,
    /// Wall-clock duration of the `PROCESSING` phase, in milliseconds.
    pub total_duration_ms: Option<i64>,
    /// Timestamp of the last heartbeat written by the owning worker.
    pub last_heartbeat_at: Option<Timestamp>,
    /// Set by an external caller to request cooperative cancellation.
    pub cancel_requested: bool,
    /// Opaque identifier of the worker instance currently owning the job.
    pub claimed_by: Option<String>,
    /// Fatal error message, set only when `status` is `error`.
    pub error_message: Option<String>,
    /// Whether the job finished with zero invalid lines. Only meaningful
    /// once `status` is `done`.
    pub validation_passed: Option<bool>,
    /// Average validated lines per second over the run.
    pub lines_per_second: Option<f64>,
    /// Average bytes read per second over the run.
    pub bytes_per_second: Option<f64>,
    /// Row creation timestamp.
    pub created_at: Timestamp,
    /// Row last-update timestamp.
    pub updated_at: Timestamp,
}

impl Job {
    /// Returns the job's progress as a fraction in `[0.0, 1.0]`, if the total
    /// size is known.
    pub fn progress_ratio(&self) -> Option<f64> {
        let total = self.total_bytes?;
        if total <= 0 {
            return Some(1.0);
        }
        Some((self.bytes_read as f64 / total as f64).clamp(0.0, 1.0))
    }

    /// Returns whether this job carries a first-error sample.
    pub fn has_first_error(&self) -> bool {
        self.first_error_line.is_some()
    }
}

/// Data for creating a new job row.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewJob {
    /// Unique job identifier, generated by the caller (UUIDv7).
    pub id: Uuid,
    /// Initial status, typically [`JobStatus::New`].
    pub status: JobStatus,
    /// Display name of the source file.
    pub file_name: String,
    /// Identifier of the item in the remote object store.
    pub source_item_id: String,
    /// Total byte size of the source file, if known up front.
    pub total_bytes: Option<i64>,
}

/// Partial update applied to a job row.
///
/// Every field is optional; unset fields leave the corresponding column
/// untouched.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UpdateJob {
    /// New lifecycle state.
    pub status: Option<JobStatus>,
    /// Updated byte-read counter.
    pub bytes_read: Option<i64>,
    /// Updated total-line counter.
    pub lines_total: Option<i64>,
    /// Updated valid-line counter.
    pub lines_valid: Option<i64>,
    /// Updated invalid-line counter.
    pub lines_invalid: Option<i64>,
    /// Updated fragment-emitted counter.
    pub num_fragments: Option<i64>,
    /// Updated fragment-completed counter.
    pub fragments_done: Option<i64>,
    /// First-error line number, set once.
    pub first_error_line: Option<i64>,
    /// First-error field name, set once.
    pub first_error_field: Option<String>,
    /// First-error message, set once.
    pub first_error_message: Option<String>,
    /// Queued timestamp.
    pub queued_at: Option<Timestamp>,
    /// Started (claimed) timestamp.
    pub started_at: Option<Timestamp>,
    /// Finished (terminal) timestamp.
    pub finished_at: Option<Timestamp>,
    /// Total `PROCESSING` duration, in milliseconds, set once at finalize.
    pub total_duration_ms: Option<i64>,
    /// Latest heartbeat timestamp.
    pub last_heartbeat_at: Option<Timestamp>,
    /// Cancellation request flag.
    pub cancel_requested: Option<bool>,
    /// Owning worker instance identifier.
    pub claimed_by: Option<Option<String>>,
    /// Fatal error message.
    pub error_message: Option<Option<String>>,
    /// Whether the job finished with zero invalid lines, set once at
    /// finalize on a successful run.
    pub validation_passed: Option<bool>,
    /// Average validated lines per second, set once at finalize on a
    /// successful run.
    pub lines_per_second: Option<f64>,
    /// Average bytes read per second, set once at finalize on a successful
    /// run.
    pub bytes_per_second: Option<f64>,
    /// Row last-update timestamp, always bumped by the caller.
    pub updated_at: Option<Timestamp>,
}
