//! API handlers module

pub mod chat;
pub mod health;
pub mod search;

use ragforge_common::errors::AppError;
use validator::ValidationErrors;

/// Convert validator output into the API's validation error
pub(crate) fn validation_error(errors: ValidationErrors) -> AppError {
    let field = errors.field_errors().keys().next().map(|field| field.to_string());
    AppError::Validation {
        message: errors.to_string(),
        field,
    }
}
