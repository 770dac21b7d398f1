//! API handlers module

pub mod health;
pub mod sessions;

use quro_common::errors::{AppError, Result};
use validator::Validate;

/// Run `validator` rules on a request body
pub(crate) fn validate_request<T: Validate>(request: &T) -> Result<()> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })
}
