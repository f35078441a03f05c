#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod common;
pub mod error;
pub mod health;

#[doc(hidden)]
pub mod prelude;

pub use common::Timing;
pub use error::BoxedError;
pub use health::{ServiceHealth, ServiceStatus};
