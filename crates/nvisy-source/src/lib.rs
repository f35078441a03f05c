#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod client;
mod config;
mod error;
mod provider;

pub use client::{OpenStream, SourceClient};
pub use config::SourceConfig;
pub use error::{SourceError, SourceResult};
pub use provider::DownloadUrlProvider;

pub mod prelude {
    //! Convenience re-export of the most commonly used types and traits.

    pub use crate::{DownloadUrlProvider, OpenStream, SourceClient, SourceConfig, SourceError, SourceResult};
}
