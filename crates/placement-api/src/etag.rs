//! Record versions as HTTP entity tags.
//!
//! The ETag of a record is its version number in quotes. `If-Match` accepts
//! the quoted or bare form, and a weak `W/` prefix is ignored.

use axum::http::{HeaderMap, HeaderValue, header};

use crate::error::ApiError;

pub fn etag(version: u64) -> HeaderValue {
  // Digits and quotes are always valid header bytes.
  HeaderValue::from_str(&format!("\"{version}\"")).unwrap_or(HeaderValue::from_static("\"0\""))
}

fn strip_etag_quotes(s: &str) -> &str {
  let s = s.trim();
  let s = s.strip_prefix("W/").unwrap_or(s);
  s.trim_matches('"')
}

/// The version named by `If-Match`, if the header is present.
pub fn if_match(headers: &HeaderMap) -> Result<Option<u64>, ApiError> {
  let Some(value) = headers.get(header::IF_MATCH) else {
    return Ok(None);
  };
  let raw = value
    .to_str()
    .map_err(|_| ApiError::BadRequest("If-Match is not valid text".into()))?;
  strip_etag_quotes(raw)
    .parse::<u64>()
    .map(Some)
    .map_err(|_| ApiError::PreconditionFailed(format!("If-Match {raw} names no version")))
}

/// Like [`if_match`], but a missing header is an error.
pub fn require_if_match(headers: &HeaderMap) -> Result<u64, ApiError> {
  if_match(headers)?.ok_or(ApiError::PreconditionRequired)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn headers(v: &'static str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::IF_MATCH, HeaderValue::from_static(v));
    h
  }

  #[test]
  fn accepts_quoted_bare_and_weak() {
    assert_eq!(if_match(&headers("\"3\"")).unwrap(), Some(3));
    assert_eq!(if_match(&headers("3")).unwrap(), Some(3));
    assert_eq!(if_match(&headers("W/\"12\"")).unwrap(), Some(12));
  }

  #[test]
  fn missing_and_garbage() {
    assert_eq!(if_match(&HeaderMap::new()).unwrap(), None);
    assert!(matches!(require_if_match(&HeaderMap::new()), Err(ApiError::PreconditionRequired)));
    assert!(matches!(if_match(&headers("\"abc\"")), Err(ApiError::PreconditionFailed(_))));
  }

  #[test]
  fn etag_is_quoted_version() {
    assert_eq!(etag(7), "\"7\"");
  }
}
