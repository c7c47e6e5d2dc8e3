//! Cache key management utilities.
//!
//! Two key shapes live in this crate:
//!
//! - [`QueryKey`]: the structured tuple used by the client-side query cache,
//!   e.g. `["posts", {"limit": 10}]` or `["post", 5]`. Keys are canonicalized
//!   to a string for map lookup and prefix-matched segment by segment for
//!   invalidation.
//! - Flat server keys built by [`CacheKeyBuilder`], e.g. `"posts:10"`.

use crate::entity::Resource;
use serde_json::Value;
use std::fmt;

/// Page size used when a list request carries no usable limit.
pub const DEFAULT_LIST_LIMIT: u32 = 10;

/// Structured, canonicalizable query key.
///
/// # Example
///
/// ```
/// use query_kit::key::QueryKey;
/// use serde_json::json;
///
/// let list = QueryKey::new("posts").with(json!({"limit": 10}));
/// assert!(list.starts_with(&QueryKey::new("posts")));
/// assert_eq!(list.canonical(), r#"["posts",{"limit":10}]"#);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct QueryKey {
    segments: Vec<Value>,
}

impl QueryKey {
    /// Start a key from its root segment.
    pub fn new(root: impl Into<String>) -> Self {
        QueryKey {
            segments: vec![Value::String(root.into())],
        }
    }

    /// Append a segment. Scalars, `null` and objects are all valid.
    pub fn with(mut self, segment: impl Into<Value>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Key covering every list query of a resource: `["posts"]`.
    pub fn all<R: Resource>() -> Self {
        QueryKey::new(R::collection())
    }

    /// List query key: `["posts", params]`.
    pub fn list<R: Resource>(params: Value) -> Self {
        QueryKey::all::<R>().with(params)
    }

    /// Single-item key: `["post", id]`, `["post", null]` when the id is absent.
    pub fn item<R: Resource>(id: Option<&R::Id>) -> Self {
        let segment = id
            .and_then(|id| serde_json::to_value(id).ok())
            .unwrap_or(Value::Null);
        QueryKey::new(R::item_prefix()).with(segment)
    }

    pub fn segments(&self) -> &[Value] {
        &self.segments
    }

    /// Canonical string form used as the cache map key.
    ///
    /// Object segments serialize with sorted field names, so
    /// `{"a":1,"b":2}` and `{"b":2,"a":1}` produce the same key.
    pub fn canonical(&self) -> String {
        Value::Array(self.segments.clone()).to_string()
    }

    /// Whether `prefix` selects this key for invalidation.
    ///
    /// Segments are compared in order; an object segment in the prefix
    /// matches when all of its fields match the corresponding object here.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        prefix.segments.len() <= self.segments.len()
            && prefix
                .segments
                .iter()
                .zip(&self.segments)
                .all(|(p, s)| partial_match(s, p))
    }
}

fn partial_match(value: &Value, pattern: &Value) -> bool {
    match (value, pattern) {
        (Value::Object(value), Value::Object(pattern)) => pattern
            .iter()
            .all(|(k, p)| value.get(k).is_some_and(|v| partial_match(v, p))),
        _ => value == pattern,
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<&str> for QueryKey {
    fn from(root: &str) -> Self {
        QueryKey::new(root)
    }
}

/// Builder for flat server-side cache keys.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Build cache key with custom prefix.
    pub fn build_with_prefix(prefix: &str, id: &dyn fmt::Display) -> String {
        format!("{}:{}", prefix, id)
    }

    /// Server key for a list page: `"posts:<limit>"`.
    pub fn list<R: Resource>(limit: u32) -> String {
        Self::build_with_prefix(R::collection(), &limit)
    }
}

/// Resolve a raw `limit` query parameter.
///
/// Anything other than a positive integer (absent, empty, zero, negative,
/// fractional, non-numeric, overflowing) falls back to
/// [`DEFAULT_LIST_LIMIT`].
pub fn normalize_limit(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_LIST_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Post;
    use serde_json::json;

    #[test]
    fn test_list_and_item_keys() {
        let list = QueryKey::list::<Post>(json!({"limit": 20}));
        assert_eq!(list.to_string(), r#"["posts",{"limit":20}]"#);

        let item = QueryKey::item::<Post>(Some(&5));
        assert_eq!(item.to_string(), r#"["post",5]"#);

        let missing = QueryKey::item::<Post>(None);
        assert_eq!(missing.to_string(), r#"["post",null]"#);
    }

    #[test]
    fn test_canonical_ignores_field_order() {
        let a = QueryKey::new("posts").with(json!({"limit": 10, "page": 2}));
        let b = QueryKey::new("posts").with(json!({"page": 2, "limit": 10}));
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_prefix_matches_all_lists() {
        let prefix = QueryKey::all::<Post>();
        assert!(QueryKey::list::<Post>(json!({"limit": 10})).starts_with(&prefix));
        assert!(QueryKey::list::<Post>(json!({"limit": 20})).starts_with(&prefix));
        assert!(!QueryKey::item::<Post>(Some(&5)).starts_with(&prefix));
    }

    #[test]
    fn test_item_prefix_is_exact() {
        let five = QueryKey::item::<Post>(Some(&5));
        assert!(five.starts_with(&QueryKey::item::<Post>(Some(&5))));
        assert!(!QueryKey::item::<Post>(Some(&6)).starts_with(&five));
        // a longer prefix never matches a shorter key
        assert!(!QueryKey::new("post").starts_with(&five));
    }

    #[test]
    fn test_object_segment_partial_match() {
        let key = QueryKey::new("posts").with(json!({"limit": 10, "page": 2}));
        assert!(key.starts_with(&QueryKey::new("posts").with(json!({"limit": 10}))));
        assert!(!key.starts_with(&QueryKey::new("posts").with(json!({"limit": 20}))));
    }

    #[test]
    fn test_server_key_builder() {
        assert_eq!(CacheKeyBuilder::list::<Post>(10), "posts:10");
    }

    #[test]
    fn test_normalize_limit() {
        assert_eq!(normalize_limit(None), 10);
        assert_eq!(normalize_limit(Some("25")), 25);
        assert_eq!(normalize_limit(Some("abc")), 10);
        assert_eq!(normalize_limit(Some("0")), 10);
        assert_eq!(normalize_limit(Some("-3")), 10);
        assert_eq!(normalize_limit(Some("2.5")), 10);
        assert_eq!(normalize_limit(Some("")), 10);
    }
}
