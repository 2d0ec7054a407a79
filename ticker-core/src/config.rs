//! Core configuration.

use crate::template::{default_fields, FieldSchema};

/// Tunable parameters for the Ticker core.
///
/// The history cap and the default field set are deliberately configuration
/// rather than constants: deployed builds have shipped both a 100-record and
/// a 20-record cap, and field naming varies between template generations.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Base URL of the remote ticket service.
    pub api_base_url: String,
    /// Style selected before the user picks one.
    pub default_style: String,
    /// Maximum number of history records kept locally.
    pub history_cap: usize,
    /// Quiet window before an edit triggers preview generation.
    pub debounce_window_ms: u64,
    /// Timeout applied to every remote request.
    pub request_timeout_secs: u64,
    /// Whether edits schedule preview generation automatically.
    pub auto_preview: bool,
    /// Fallback field schema when a template yields no placeholders.
    pub default_fields: Vec<FieldSchema>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.sgsky.online".to_string(),
            default_style: "red15".to_string(),
            history_cap: 100,
            debounce_window_ms: 1000,
            request_timeout_secs: 10,
            auto_preview: true,
            default_fields: default_fields(),
        }
    }
}

impl CoreConfig {
    /// Defaults with environment overrides applied.
    ///
    /// Recognised variables: `TICKER_API_URL`, `TICKER_HISTORY_CAP`,
    /// `TICKER_DEBOUNCE_MS`. Unparsable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("TICKER_API_URL") {
            if !url.is_empty() {
                config.api_base_url = url;
            }
        }
        if let Some(cap) = env_parse("TICKER_HISTORY_CAP") {
            config.history_cap = cap;
        }
        if let Some(window) = env_parse("TICKER_DEBOUNCE_MS") {
            config.debounce_window_ms = window;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|raw| raw.parse().ok())
}
