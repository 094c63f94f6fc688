//! Engine configuration.
//!
//! Defaults describe an A4 page at 96 dpi (1123 px tall) with 96 px top and bottom margins,
//! which yields a page budget of 931 px. Hosts can override values programmatically, through
//! serde (e.g. from their own settings file), or from environment variables via
//! [`EngineConfig::from_env`].

use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Default page height in px (A4 at 96 dpi).
pub const DEFAULT_PAGE_HEIGHT: f32 = 1123.0;
/// Default top/bottom page margin in px.
pub const DEFAULT_PAGE_MARGIN: f32 = 96.0;
/// Default quiescence window before a save is issued.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 800;
/// Default upper bound on block moves within one flow pass.
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

/// Physical page format.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PageFormat {
    /// Full page height.
    pub height: f32,
    /// Top margin.
    pub margin_top: f32,
    /// Bottom margin.
    pub margin_bottom: f32,
}

impl PageFormat {
    /// Create a page format with symmetric vertical margins.
    pub fn new(height: f32, margin: f32) -> Self {
        Self {
            height,
            margin_top: margin,
            margin_bottom: margin,
        }
    }

    /// Height available for content (the page budget).
    pub fn content_height(&self) -> f32 {
        (self.height - self.margin_top - self.margin_bottom).max(0.0)
    }
}

impl Default for PageFormat {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_HEIGHT, DEFAULT_PAGE_MARGIN)
    }
}

/// Where the forward-overflow scan resumes after it moved blocks.
///
/// Both policies produce the same tree; they differ only in how much work a pass does on long
/// documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RescanPolicy {
    /// Restart from the first page after every move. Quadratic in the worst case.
    FromStart,
    /// Continue with the page that received the moved blocks.
    #[default]
    FromMovedPage,
}

impl RescanPolicy {
    /// Parse the textual form used by `PAGEFLOW_RESCAN`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "from-start" | "start" => Some(Self::FromStart),
            "from-moved-page" | "moved" => Some(Self::FromMovedPage),
            _ => None,
        }
    }
}

/// Runtime configuration for the flow engine and the editing session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Page geometry.
    pub page: PageFormat,
    /// Forward-overflow rescan policy.
    pub rescan: RescanPolicy,
    /// Guard against runaway passes (counted in block moves).
    pub max_iterations: usize,
    /// Debounce window for persistence, in milliseconds.
    pub save_debounce_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page: PageFormat::default(),
            rescan: RescanPolicy::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to defaults for anything
    /// missing or unparsable.
    ///
    /// - `PAGEFLOW_PAGE_HEIGHT`: page height in px
    /// - `PAGEFLOW_PAGE_MARGIN`: top and bottom margin in px
    /// - `PAGEFLOW_SAVE_DEBOUNCE_MS`: save debounce window
    /// - `PAGEFLOW_RESCAN`: `from-start` or `from-moved-page`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let height = env_parse("PAGEFLOW_PAGE_HEIGHT").unwrap_or(defaults.page.height);
        let margin = env_parse("PAGEFLOW_PAGE_MARGIN").unwrap_or(defaults.page.margin_top);
        Self {
            page: PageFormat::new(height, margin),
            rescan: env::var("PAGEFLOW_RESCAN")
                .ok()
                .and_then(|v| RescanPolicy::parse(&v))
                .unwrap_or(defaults.rescan),
            max_iterations: defaults.max_iterations,
            save_debounce_ms: env_parse("PAGEFLOW_SAVE_DEBOUNCE_MS")
                .unwrap_or(defaults.save_debounce_ms),
        }
    }

    /// The page budget (content height).
    pub fn page_budget(&self) -> f32 {
        self.page.content_height()
    }

    /// The debounce window as a [`Duration`].
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    /// Override the page format.
    pub fn with_page(mut self, page: PageFormat) -> Self {
        self.page = page;
        self
    }

    /// Use a page whose content height is exactly `budget` (no margins).
    pub fn with_budget(mut self, budget: f32) -> Self {
        self.page = PageFormat::new(budget, 0.0);
        self
    }

    /// Override the rescan policy.
    pub fn with_rescan(mut self, rescan: RescanPolicy) -> Self {
        self.rescan = rescan;
        self
    }

    /// Override the debounce window.
    pub fn with_save_debounce(mut self, debounce: Duration) -> Self {
        self.save_debounce_ms = debounce.as_millis() as u64;
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget_is_a4_content_height() {
        assert_eq!(EngineConfig::default().page_budget(), 931.0);
    }

    #[test]
    fn rescan_policy_parses_known_values() {
        assert_eq!(RescanPolicy::parse("from-start"), Some(RescanPolicy::FromStart));
        assert_eq!(
            RescanPolicy::parse(" From-Moved-Page "),
            Some(RescanPolicy::FromMovedPage)
        );
        assert_eq!(RescanPolicy::parse("sometimes"), None);
    }

    #[test]
    fn config_deserializes_with_partial_fields() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"rescan":"from-start","page":{"height":500.0}}"#).unwrap();
        assert_eq!(config.rescan, RescanPolicy::FromStart);
        assert_eq!(config.page.height, 500.0);
        assert_eq!(config.page.margin_top, DEFAULT_PAGE_MARGIN);
        assert_eq!(config.save_debounce_ms, DEFAULT_SAVE_DEBOUNCE_MS);
    }

    #[test]
    fn negative_content_height_is_clamped() {
        assert_eq!(PageFormat::new(100.0, 80.0).content_height(), 0.0);
    }
}
