//! Which navigated-to pages are scanned for consent prompts.

use crate::config::ConsentAgentConfig;
use url::Url;

#[derive(Debug, Clone)]
pub struct UrlFilter {
    skip_prefixes: Vec<String>,
    app_origin: String,
}

impl UrlFilter {
    pub fn new(skip_prefixes: Vec<String>, app_origin: impl Into<String>) -> Self {
        Self {
            skip_prefixes,
            app_origin: app_origin.into(),
        }
    }

    pub fn from_config(config: &ConsentAgentConfig) -> Self {
        Self::new(config.skip_url_prefixes.clone(), config.app_origin.clone())
    }

    /// False for browser-internal schemes and for the consent app's own origin.
    pub fn should_scan(&self, url: &str) -> bool {
        if self.skip_prefixes.iter().any(|prefix| url.starts_with(prefix.as_str())) {
            return false;
        }
        if self.app_origin.is_empty() {
            return true;
        }
        if url.starts_with(self.app_origin.as_str()) {
            return false;
        }
        match Url::parse(url) {
            Ok(parsed) => authority(&parsed).as_deref() != Some(self.app_origin.as_str()),
            Err(_) => true,
        }
    }
}

fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> UrlFilter {
        UrlFilter::from_config(&ConsentAgentConfig::default())
    }

    #[test]
    fn internal_schemes_are_skipped() {
        let filter = filter();
        for url in [
            "chrome://settings",
            "chrome-extension://abc/popup.html",
            "moz-extension://abc/popup.html",
            "about:blank",
        ] {
            assert!(!filter.should_scan(url), "{url}");
        }
    }

    #[test]
    fn own_app_is_skipped_with_or_without_scheme() {
        let filter = filter();
        assert!(!filter.should_scan("localhost:5173/issue"));
        assert!(!filter.should_scan("http://localhost:5173/my-consents"));
        assert!(filter.should_scan("http://localhost:3000/"));
        assert!(filter.should_scan("https://shop.example/checkout"));
    }
}
