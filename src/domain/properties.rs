//! Open bag of typed caller metadata carried by a feed request.
//!
//! The scheduler never reads these values; they ride along so callbacks can
//! recover context (event ids, sport, page numbers) without a side table.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Map of tag -> arbitrary shared value.
#[derive(Clone, Default)]
pub struct FeedProperties {
    values: BTreeMap<String, Arc<dyn Any + Send + Sync>>,
}

impl FeedProperties {
    /// Empty property bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. A later insert under the same key replaces the earlier one.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Arc::new(value));
    }

    /// Get a value by key, if present and of type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// True if a value is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of stored properties.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no properties are stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Property keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl fmt::Debug for FeedProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get_typed() {
        let mut props = FeedProperties::new();
        props.insert("event_id", 42u64);
        props.insert("sport", "football".to_string());

        assert_eq!(props.get::<u64>("event_id"), Some(&42));
        assert_eq!(props.get::<String>("sport").map(String::as_str), Some("football"));
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn test_get_wrong_type_is_none() {
        let mut props = FeedProperties::new();
        props.insert("page", 3u32);
        assert!(props.get::<u64>("page").is_none());
        assert!(props.contains("page"));
    }

    #[test]
    fn test_later_insert_wins() {
        let mut props = FeedProperties::new();
        props.insert("page", 1u32);
        props.insert("page", 2u32);
        assert_eq!(props.get::<u32>("page"), Some(&2));
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn test_clone_shares_values() {
        let mut props = FeedProperties::new();
        props.insert("k", vec![1, 2, 3]);
        let cloned = props.clone();
        assert_eq!(cloned.get::<Vec<i32>>("k"), Some(&vec![1, 2, 3]));
        assert_eq!(cloned.keys().collect::<Vec<_>>(), vec!["k"]);
    }

    #[test]
    fn test_debug_lists_keys() {
        let mut props = FeedProperties::new();
        props.insert("b", 1u8);
        props.insert("a", 2u8);
        assert_eq!(format!("{:?}", props), "{\"a\", \"b\"}");
    }
}
