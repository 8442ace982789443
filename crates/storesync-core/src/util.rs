//! Shared utility functions used across multiple modules.

/// Trim optional text, treating blank values as absent.
pub fn normalize_text_ref(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current Unix timestamp in milliseconds.
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_ref_trims_and_rejects_blank() {
        assert_eq!(normalize_text_ref(None), None);
        assert_eq!(normalize_text_ref(Some("   ")), None);
        assert_eq!(normalize_text_ref(Some(" SKU-1 ")), Some("SKU-1".to_string()));
    }

    #[test]
    fn is_http_url_accepts_valid_schemes() {
        assert!(is_http_url("http://localhost"));
        assert!(is_http_url("https://shop.example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("shop.example.com"));
    }

    #[test]
    fn compact_text_truncates_long_bodies() {
        let long = "x".repeat(500);
        assert_eq!(compact_text(&long).len(), 180);
        assert_eq!(compact_text("  short  "), "short");
    }
}
