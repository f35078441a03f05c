#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod error;
mod fragment;
mod fragmenter;
mod memory;
mod pool;
mod progress;
mod reference_data;
mod registry;
mod runner;
mod scheduler;
mod validator;
mod worker;

pub use config::{IngestConfig, ValidatorConfig};
pub use error::{IngestError, IngestResult};
pub use fragment::{Fragment, FirstErrorSample, FragmentResult};
pub use fragmenter::{FragmenterControl, FragmenterOutcome};
pub use pool::WorkerPool;
pub use progress::{JobProgress, ProgressSnapshot, SharedProgress};
pub use reference_data::{ReferenceData, ReferenceDataLoader};
pub use registry::{JobRegistry, PgJobRegistry};
pub use runner::{JobRunner, RunHandle};
pub use scheduler::JobScheduler;
pub use validator::{LineError, LineErrorType};

pub mod prelude {
    //! Convenience re-export of the most commonly used types and traits.

    pub use crate::{
        FirstErrorSample, Fragment, FragmentResult, IngestConfig, IngestError, IngestResult, JobProgress, JobRegistry, JobRunner,
        JobScheduler, ReferenceData, ReferenceDataLoader, RunHandle, ValidatorConfig, WorkerPool,
    };
}
