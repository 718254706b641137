//! Helpers for writing subscribers

use crate::transport::Response;
use crate::utils::error::HttpError;

/// Whether the `Content-Type` header contains `content_type`
///
/// Reads headers the status-checked way, so error statuses surface as
/// [`HttpError`].
pub fn is_of_content_type(response: &Response, content_type: &str) -> Result<bool, HttpError> {
    Ok(response
        .headers()?
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains(content_type)))
}
