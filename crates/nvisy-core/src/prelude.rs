//! Commonly used items from nvisy-core.

pub use crate::error::BoxedError;
pub use crate::health::{ServiceHealth, ServiceStatus};
pub use crate::Timing;
