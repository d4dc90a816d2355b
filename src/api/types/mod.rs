//! Control API types

pub mod control;
pub mod error;

pub use control::UpdateResponse;
pub use error::{ApiError, ApiErrorResponse};
