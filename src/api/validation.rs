use std::str::FromStr;

use super::ApiError;
use crate::constants::limits::{DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
use crate::domain::UserId;

/// Parses a closed-enum field from the request body.
pub fn parse_field<T>(field: &str, value: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ApiError::validation(format!("Invalid {field}: {e}")))
}

/// Same as [`parse_field`] for optional fields; blank counts as absent.
pub fn parse_optional<T>(field: &str, value: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_field(field, v).map(Some),
        None => Ok(None),
    }
}

pub fn validate_limit(limit: Option<u64>) -> Result<u64, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(ApiError::validation(format!(
            "Invalid limit: {}. Limit must be between 1 and {}",
            limit, MAX_HISTORY_LIMIT
        )));
    }
    Ok(limit)
}

pub fn validate_content_id(id: &str) -> Result<&str, ApiError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Content id is required"));
    }
    Ok(trimmed)
}

/// Bodies may carry the caller's id for compatibility with older clients.
/// It must match the authenticated user when present.
pub fn ensure_same_user(claimed: Option<&str>, caller: &UserId) -> Result<(), ApiError> {
    match claimed.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) if id != caller.as_str() => Err(ApiError::forbidden(
            "userId does not match the authenticated user",
        )),
        _ => Ok(()),
    }
}
