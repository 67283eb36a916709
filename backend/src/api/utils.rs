//! API utility functions
//!
//! Contains helper functions used by API handlers for request body parsing
//! and validation.

use crate::error::AppError;
use serde::de::DeserializeOwned;

/// Parse an optional JSON body
///
/// An empty body or a literal `null` yields `Ok(None)` so handlers can
/// answer a missing body with their own message.
///
/// # Returns
/// * `Ok(Some(T))` - Body parsed
/// * `Ok(None)` - No body was sent
/// * `Err(AppError::InvalidRequest)` - Body is not valid JSON for `T`
pub fn parse_optional_body<T: DeserializeOwned>(body: &[u8]) -> Result<Option<T>, AppError> {
    let trimmed = std::str::from_utf8(body)
        .map_err(|e| AppError::InvalidRequest(format!("Body is not UTF-8: {}", e)))?
        .trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| AppError::InvalidRequest(e.to_string()))
}

/// Unwrap a required value, answering `Conflict("<subject> required")`
/// when it is missing
pub fn required<T>(value: Option<T>, subject: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::Conflict(format!("{} required", subject)))
}

/// Whether an optional string is missing or empty
pub fn is_null_or_empty(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}
