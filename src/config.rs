use std::env;
use std::time::Duration;

/// Marker in a post body that gets replaced with the linked page.
pub const DEFAULT_PLACEHOLDER: &str = "<div class=\"fetchlinks\" />";

/// Environment variable overriding the placeholder marker.
pub const PLACEHOLDER_ENV: &str = "FETCHLINKS_PLACEHOLDER";

pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Settings for fetching links and substituting them into posts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Whole-request timeout. `None` keeps the transport default.
    pub timeout: Option<Duration>,
    /// Redirects followed before the request fails.
    pub max_redirects: usize,
    /// Marker replaced in post bodies.
    pub placeholder: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

impl FetchOptions {
    /// Apply `FETCHLINKS_PLACEHOLDER` when it is set to something non-blank.
    pub fn with_env_overrides(self) -> Self {
        self.with_placeholder_override(env::var(PLACEHOLDER_ENV).ok())
    }

    fn with_placeholder_override(mut self, value: Option<String>) -> Self {
        if let Some(val) = value {
            if !val.trim().is_empty() {
                self.placeholder = val;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_stock_stylesheet() {
        let options = FetchOptions::default();
        assert_eq!(options.placeholder, "<div class=\"fetchlinks\" />");
        assert_eq!(options.timeout, None);
        assert_eq!(options.max_redirects, 10);
    }

    #[test]
    fn placeholder_override_replaces_marker() {
        let options = FetchOptions::default()
            .with_placeholder_override(Some("<!-- fetch -->".to_string()));
        assert_eq!(options.placeholder, "<!-- fetch -->");
    }

    #[test]
    fn blank_placeholder_override_is_ignored() {
        let options = FetchOptions::default().with_placeholder_override(Some("  ".to_string()));
        assert_eq!(options.placeholder, DEFAULT_PLACEHOLDER);

        let options = FetchOptions::default().with_placeholder_override(None);
        assert_eq!(options.placeholder, DEFAULT_PLACEHOLDER);
    }
}
