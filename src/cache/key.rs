//! Hierarchical cache keys.
//!
//! A [`QueryKey`] is an ordered sequence of segments. The leading segments
//! name the namespace and resource category, the trailing segments carry the
//! query parameters in call order. Keys are kept structured rather than
//! hashed so that bulk invalidation can match on a key prefix.

use std::fmt;

/// Root namespace for all dashboard resources.
pub const DASHBOARD_NS: &str = "dashboard";

/// One segment of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
  Text(String),
  Number(u64),
}

impl fmt::Display for Segment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Segment::Text(s) => f.write_str(s),
      Segment::Number(n) => write!(f, "{}", n),
    }
  }
}

impl From<&str> for Segment {
  fn from(s: &str) -> Self {
    Segment::Text(s.to_string())
  }
}

impl From<String> for Segment {
  fn from(s: String) -> Self {
    Segment::Text(s)
  }
}

impl From<u64> for Segment {
  fn from(n: u64) -> Self {
    Segment::Number(n)
  }
}

impl From<u32> for Segment {
  fn from(n: u32) -> Self {
    Segment::Number(n as u64)
  }
}

/// An ordered, immutable cache key.
///
/// Two fetches with identical keys share one cache entry; differing
/// parameters always produce different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<Segment>);

impl QueryKey {
  /// Start a key at the dashboard namespace root.
  pub fn dashboard() -> Self {
    Self(vec![Segment::from(DASHBOARD_NS)])
  }

  /// Append a segment, consuming and returning the key.
  pub fn push(mut self, segment: impl Into<Segment>) -> Self {
    self.0.push(segment.into());
    self
  }

  /// Prefix containment: `true` when `prefix` is a leading subsequence of
  /// this key. Invalidating a prefix key covers every key it contains.
  pub fn starts_with(&self, prefix: &QueryKey) -> bool {
    self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
  }
}

/// Renders as `dashboard/projects/recent/5` for logs and debugging.
impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, segment) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str("/")?;
      }
      write!(f, "{}", segment)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parameters_produce_distinct_keys() {
    let five = QueryKey::dashboard().push("projects").push("recent").push(5u32);
    let ten = QueryKey::dashboard().push("projects").push("recent").push(10u32);
    assert_ne!(five, ten);
  }

  #[test]
  fn test_identical_keys_are_equal() {
    let a = QueryKey::dashboard().push("stats");
    let b = QueryKey::dashboard().push("stats");
    assert_eq!(a, b);
  }

  #[test]
  fn test_prefix_containment() {
    let prefix = QueryKey::dashboard().push("projects").push("recent");
    let five = prefix.clone().push(5u32);
    let ten = prefix.clone().push(10u32);
    assert!(five.starts_with(&prefix));
    assert!(ten.starts_with(&prefix));
    assert!(five.starts_with(&QueryKey::dashboard()));
    assert!(!prefix.starts_with(&five));
  }

  #[test]
  fn test_namespace_does_not_match_other_roots() {
    let key = QueryKey::dashboard().push("stats");
    let other = QueryKey(vec![Segment::from("settings")]);
    assert!(!key.starts_with(&other));
  }

  #[test]
  fn test_display_is_path_like() {
    let key = QueryKey::dashboard().push("trends").push("performance").push(30u32);
    assert_eq!(key.to_string(), "dashboard/trends/performance/30");
  }
}
