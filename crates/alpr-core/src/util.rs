//! Small text helpers for settings, payload fields and stored error text.

/// Longest error text kept in a violation's `last_error` column.
pub const MAX_ERROR_CHARS: usize = 180;

/// Trim an optional setting or payload field, mapping blank input to `None`.
///
/// Used wherever "unset" and "set to whitespace" must mean the same thing:
/// config values, env overrides, officer names and image paths.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Whether an authority base URL names an `http(s)` scheme and a host.
pub fn is_http_url(value: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        value
            .strip_prefix(scheme)
            .is_some_and(|rest| !rest.is_empty() && !rest.starts_with('/'))
    })
}

/// Collapse server or transport error text onto one line of at most
/// [`MAX_ERROR_CHARS`] characters.
pub fn compact_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_ERROR_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn blank_officer_name_is_unset() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some(" \t ".to_string())), None);
        assert_eq!(
            normalize_text_option(Some("  Officer Salem ".to_string())),
            Some("Officer Salem".to_string())
        );
    }

    #[test]
    fn authority_url_needs_scheme_and_host() {
        assert!(is_http_url("http://127.0.0.1:8080"));
        assert!(is_http_url("https://traffic.example.gov"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("http:///api/violations"));
        assert!(!is_http_url("ftp://traffic.example.gov"));
        assert!(!is_http_url("traffic.example.gov"));
    }

    #[test]
    fn server_error_page_becomes_one_bounded_line() {
        let page = format!("<html>\n  <body>Bad Gateway</body>\n</html>{}", " x".repeat(300));
        let compacted = compact_text(&page);
        assert!(compacted.starts_with("<html> <body>Bad Gateway</body> </html>"));
        assert!(!compacted.contains('\n'));
        assert_eq!(compacted.chars().count(), MAX_ERROR_CHARS);
        assert_eq!(compact_text("  connection refused \n"), "connection refused");
    }
}
