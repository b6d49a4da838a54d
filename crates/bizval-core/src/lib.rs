pub mod config;
pub mod decimal;
pub mod error;
pub(crate) mod parallel;
pub mod types;

#[cfg(feature = "valuation")]
pub mod valuation;

#[cfg(feature = "sensitivity")]
pub mod sensitivity;

#[cfg(feature = "forecast")]
pub mod forecast;

pub use error::{BizValError, ErrorKind};
pub use types::*;

/// Standard result type for all bizval operations
pub type BizValResult<T> = Result<T, BizValError>;
