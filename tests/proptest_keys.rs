//! Property-based tests for query keys and list-limit handling.
//!
//! # Properties Tested
//!
//! 1. **Canonical Property**: object field order never changes the key
//! 2. **Prefix Property**: a key always starts with each of its own prefixes
//! 3. **Isolation Property**: `["post", a]` never selects `["post", b]` for a != b
//! 4. **Limit Property**: only positive integers survive normalization

use proptest::prelude::*;
use query_kit::entity::Post;
use query_kit::key::{normalize_limit, CacheKeyBuilder, QueryKey, DEFAULT_LIST_LIMIT};
use serde_json::{json, Map, Value};

fn params() -> impl Strategy<Value = Vec<(String, u32)>> {
    prop::collection::btree_map("[a-z]{1,8}", any::<u32>(), 0..6)
        .prop_map(|m| m.into_iter().collect())
}

fn object(fields: &[(String, u32)]) -> Value {
    let mut map = Map::new();
    for (k, v) in fields {
        map.insert(k.clone(), json!(v));
    }
    Value::Object(map)
}

proptest! {
    #[test]
    fn prop_canonical_ignores_field_order(fields in params()) {
        let forward = object(&fields);
        let mut reversed_fields = fields.clone();
        reversed_fields.reverse();
        let reversed = object(&reversed_fields);

        let a = QueryKey::new("posts").with(forward);
        let b = QueryKey::new("posts").with(reversed);
        prop_assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn prop_key_starts_with_its_prefixes(fields in params(), limit in 1u32..1000) {
        let key = QueryKey::list::<Post>(json!({ "limit": limit })).with(object(&fields));

        let mut prefix = QueryKey::new("posts");
        prop_assert!(key.starts_with(&prefix));
        for segment in key.segments().iter().skip(1) {
            prefix = prefix.with(segment.clone());
            prop_assert!(key.starts_with(&prefix));
        }
    }

    #[test]
    fn prop_item_keys_are_isolated(a in any::<u64>(), b in any::<u64>()) {
        prop_assume!(a != b);
        let key_a = QueryKey::item::<Post>(Some(&a));
        let key_b = QueryKey::item::<Post>(Some(&b));
        prop_assert!(!key_a.starts_with(&key_b));
        prop_assert!(!key_a.starts_with(&QueryKey::all::<Post>()));
    }

    #[test]
    fn prop_positive_limits_kept(limit in 1u32..=u32::MAX) {
        let raw = limit.to_string();
        prop_assert_eq!(normalize_limit(Some(raw.as_str())), limit);
        prop_assert_eq!(CacheKeyBuilder::list::<Post>(limit), format!("posts:{}", limit));
    }

    #[test]
    fn prop_garbage_limits_default(raw in "[^0-9]*|-[0-9]{1,5}|0+") {
        prop_assert_eq!(normalize_limit(Some(raw.as_str())), DEFAULT_LIST_LIMIT);
    }
}
