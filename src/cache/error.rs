//! Error type shared between the API client and the cache layer.

use thiserror::Error;

/// A failed query.
///
/// Cloneable so that every waiter attached to one in-flight fetch observes
/// the same failure. All variants are retried identically by the cache
/// layer; the split exists for display and logging.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
  /// The request never produced a usable HTTP response.
  #[error("network error: {0}")]
  Transport(String),

  /// The backend answered with a non-2xx status or a `success: false`
  /// envelope.
  #[error("backend error: {0}")]
  Api(String),

  /// The response body did not match the expected shape.
  #[error("malformed response: {0}")]
  Decode(String),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display() {
    let err = QueryError::Api("HTTP 500 Internal Server Error".to_string());
    assert_eq!(err.to_string(), "backend error: HTTP 500 Internal Server Error");
  }
}
