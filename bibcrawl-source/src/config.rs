use crate::error::{Result, SourceError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openalex.org";

/// How relation-filtered queries walk through result pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagingMode {
    /// `cursor=*`, then follow `meta.next_cursor` until it disappears.
    #[default]
    Cursor,
    /// `page=1, 2, ...` until `page * per_page >= meta.count`.
    Offset,
}

impl PagingMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cursor" => Some(PagingMode::Cursor),
            "offset" | "page" => Some(PagingMode::Offset),
            _ => None,
        }
    }
}

/// Immutable settings handed to [`crate::OpenAlexClient`] at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub base_url: String,
    /// Contact address for the OpenAlex polite pool.
    pub mailto: Option<String>,
    /// Maximum number of IDs OR-ed into one `filter` expression.
    pub ids_per_filter: usize,
    /// Page size for relation-filtered queries (OpenAlex caps this at 200).
    pub per_page: usize,
    pub paging: PagingMode,
    /// Minimum spacing between any two HTTP calls.
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            mailto: None,
            ids_per_filter: 100,
            per_page: 200,
            paging: PagingMode::Cursor,
            request_delay_ms: 200,
            timeout_secs: 30,
            user_agent: format!("bibcrawl/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetchConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ids_per_filter == 0 {
            return Err(SourceError::InvalidConfig(
                "ids_per_filter must be at least 1".to_string(),
            ));
        }
        if self.per_page == 0 || self.per_page > 200 {
            return Err(SourceError::InvalidConfig(format!(
                "per_page must be between 1 and 200, got {}",
                self.per_page
            )));
        }
        // An ID-filtered call returns everything in one page, so a chunk must fit.
        if self.ids_per_filter > self.per_page {
            return Err(SourceError::InvalidConfig(format!(
                "ids_per_filter ({}) cannot exceed per_page ({})",
                self.ids_per_filter, self.per_page
            )));
        }
        if self.timeout_secs == 0 {
            return Err(SourceError::InvalidConfig(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(FetchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_chunk_larger_than_page_rejected() {
        let config = FetchConfig {
            ids_per_filter: 150,
            per_page: 100,
            ..FetchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SourceError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_paging_mode_from_str() {
        assert_eq!(PagingMode::from_str("Cursor"), Some(PagingMode::Cursor));
        assert_eq!(PagingMode::from_str("page"), Some(PagingMode::Offset));
        assert_eq!(PagingMode::from_str("random"), None);
    }

    #[test]
    fn test_partial_toml_style_json_uses_defaults() {
        let config: FetchConfig = serde_json::from_str(r#"{"per_page": 50}"#).unwrap();
        assert_eq!(config.per_page, 50);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
