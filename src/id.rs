//! ID generation utilities for feedpull.
//!
//! Provides trace identifiers for feed requests.

use rand::Rng;

/// Generate a trace ID for a feed request.
///
/// Format: `{10 upper hex chars}_{feed_name}`
/// Example: `3FA85F6457_match_detail`
pub fn generate_request_id(feed_name: &str) -> String {
    let random: u64 = rand::rng().random();
    let hex = format!("{:016X}", random);
    format!("{}_{}", &hex[..10], feed_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_id_format() {
        let id = generate_request_id("stage_fixtures");
        let (prefix, name) = id.split_once('_').unwrap();
        assert_eq!(prefix.len(), 10);
        assert!(prefix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        assert_eq!(name, "stage_fixtures");
    }

    #[test]
    fn test_generate_request_id_uniqueness() {
        let ids: std::collections::HashSet<String> = (0..100).map(|_| generate_request_id("feed")).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_generate_request_id_empty_name() {
        let id = generate_request_id("");
        assert_eq!(id.len(), 11);
        assert!(id.ends_with('_'));
    }
}
