use std::time::Duration;

use url::Url;

use crate::logging::LogLevel;

const DEFAULT_SHOW_DELAY_MS: u64 = 400;
const DEFAULT_HIDE_DELAY_MS: u64 = 300;
const DEFAULT_PREVIEW_WIDTH: f64 = 320.0;
const DEFAULT_PADDING: f64 = 10.0;
const DEFAULT_TITLE_INLINE_THRESHOLD: usize = 75;
const DEFAULT_MOBILE_MAX_WIDTH: u32 = 768;
const DEFAULT_SUMMARY_ENDPOINT: &str = "https://en.wikipedia.org/api/rest_v1/page/summary/";
const DEFAULT_CONTAINER_SELECTOR: &str = ".main-container";
const DEFAULT_TRIGGER_SELECTOR: &str = r#"a[href*="wikipedia.org/wiki/"]"#;
const DEFAULT_FOOTER_ICON: &str = "./images/W_in_blue.svg";
const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Info;

const DELAY_MS_BOUNDS: (u64, u64) = (0, 5_000);
const PREVIEW_WIDTH_BOUNDS: (f64, f64) = (120.0, 1_200.0);
const PADDING_BOUNDS: (f64, f64) = (0.0, 100.0);
const TITLE_INLINE_THRESHOLD_BOUNDS: (usize, usize) = (0, 1_000);
const MOBILE_MAX_WIDTH_BOUNDS: (u32, u32) = (0, 4_096);

pub(crate) const SHOW_DELAY_KEY: &str = "preview-show-delay-ms";
pub(crate) const HIDE_DELAY_KEY: &str = "preview-hide-delay-ms";
pub(crate) const PREVIEW_WIDTH_KEY: &str = "preview-width";
pub(crate) const PADDING_KEY: &str = "preview-padding";
pub(crate) const TITLE_THRESHOLD_KEY: &str = "preview-title-threshold";
pub(crate) const MOBILE_MAX_WIDTH_KEY: &str = "preview-mobile-max-width";
pub(crate) const SUMMARY_ENDPOINT_KEY: &str = "preview-summary-endpoint";
pub(crate) const CONTAINER_KEY: &str = "preview-container";
pub(crate) const TRIGGER_SELECTOR_KEY: &str = "preview-trigger-selector";
pub(crate) const FOOTER_ICON_KEY: &str = "preview-footer-icon";
pub(crate) const LOG_LEVEL_KEY: &str = "preview-log-level";

/// Tunables for the preview widget. Every value falls back to its default
/// when the page leaves it unset or sets it outside the accepted range.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PreviewConfig {
    pub show_delay: Duration,
    pub hide_delay: Duration,
    pub preview_width: f64,
    pub padding: f64,
    /// Largest character offset at which a title found inside the extract is
    /// styled in place instead of being prepended.
    pub title_inline_threshold: usize,
    pub mobile_max_width: u32,
    pub summary_endpoint: String,
    pub container_selector: String,
    pub trigger_selector: String,
    pub footer_icon: String,
    pub log_level: LogLevel,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            show_delay: Duration::from_millis(DEFAULT_SHOW_DELAY_MS),
            hide_delay: Duration::from_millis(DEFAULT_HIDE_DELAY_MS),
            preview_width: DEFAULT_PREVIEW_WIDTH,
            padding: DEFAULT_PADDING,
            title_inline_threshold: DEFAULT_TITLE_INLINE_THRESHOLD,
            mobile_max_width: DEFAULT_MOBILE_MAX_WIDTH,
            summary_endpoint: DEFAULT_SUMMARY_ENDPOINT.to_string(),
            container_selector: DEFAULT_CONTAINER_SELECTOR.to_string(),
            trigger_selector: DEFAULT_TRIGGER_SELECTOR.to_string(),
            footer_icon: DEFAULT_FOOTER_ICON.to_string(),
            log_level: DEFAULT_LOG_LEVEL,
        }
    }
}

impl PreviewConfig {
    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let show_delay_ms =
            parse_u64_with_bounds(&lookup, SHOW_DELAY_KEY, DEFAULT_SHOW_DELAY_MS, DELAY_MS_BOUNDS);
        let hide_delay_ms =
            parse_u64_with_bounds(&lookup, HIDE_DELAY_KEY, DEFAULT_HIDE_DELAY_MS, DELAY_MS_BOUNDS);
        let preview_width = parse_px_with_bounds(
            &lookup,
            PREVIEW_WIDTH_KEY,
            DEFAULT_PREVIEW_WIDTH,
            PREVIEW_WIDTH_BOUNDS,
        );
        let padding = parse_px_with_bounds(&lookup, PADDING_KEY, DEFAULT_PADDING, PADDING_BOUNDS);
        let title_inline_threshold = parse_usize_with_bounds(
            &lookup,
            TITLE_THRESHOLD_KEY,
            DEFAULT_TITLE_INLINE_THRESHOLD,
            TITLE_INLINE_THRESHOLD_BOUNDS,
        );
        let mobile_max_width = parse_u64_with_bounds(
            &lookup,
            MOBILE_MAX_WIDTH_KEY,
            u64::from(DEFAULT_MOBILE_MAX_WIDTH),
            (
                u64::from(MOBILE_MAX_WIDTH_BOUNDS.0),
                u64::from(MOBILE_MAX_WIDTH_BOUNDS.1),
            ),
        );
        let summary_endpoint = parse_http_url(&lookup, SUMMARY_ENDPOINT_KEY)
            .map(|url| url.to_string())
            .unwrap_or_else(|| DEFAULT_SUMMARY_ENDPOINT.to_string());
        let log_level = parse_non_empty_string(&lookup, LOG_LEVEL_KEY)
            .and_then(|value| LogLevel::parse(&value))
            .unwrap_or(DEFAULT_LOG_LEVEL);

        Self {
            show_delay: Duration::from_millis(show_delay_ms),
            hide_delay: Duration::from_millis(hide_delay_ms),
            preview_width,
            padding,
            title_inline_threshold,
            mobile_max_width: u32::try_from(mobile_max_width).unwrap_or(DEFAULT_MOBILE_MAX_WIDTH),
            summary_endpoint,
            container_selector: parse_non_empty_string(&lookup, CONTAINER_KEY)
                .unwrap_or_else(|| DEFAULT_CONTAINER_SELECTOR.to_string()),
            trigger_selector: parse_non_empty_string(&lookup, TRIGGER_SELECTOR_KEY)
                .unwrap_or_else(|| DEFAULT_TRIGGER_SELECTOR.to_string()),
            footer_icon: parse_non_empty_string(&lookup, FOOTER_ICON_KEY)
                .unwrap_or_else(|| DEFAULT_FOOTER_ICON.to_string()),
            log_level,
        }
    }
}

fn parse_non_empty_string<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| unquote(value.trim()).to_string())
        .filter(|value| !value.is_empty())
}

fn parse_u64_with_bounds<F>(lookup: &F, name: &str, default: u64, bounds: (u64, u64)) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    parse_non_empty_string(lookup, name)
        .and_then(|value| value.trim_end_matches("ms").trim().parse::<u64>().ok())
        .filter(|value| (bounds.0..=bounds.1).contains(value))
        .unwrap_or(default)
}

fn parse_usize_with_bounds<F>(lookup: &F, name: &str, default: usize, bounds: (usize, usize)) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    parse_non_empty_string(lookup, name)
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| (bounds.0..=bounds.1).contains(value))
        .unwrap_or(default)
}

fn parse_px_with_bounds<F>(lookup: &F, name: &str, default: f64, bounds: (f64, f64)) -> f64
where
    F: Fn(&str) -> Option<String>,
{
    parse_non_empty_string(lookup, name)
        .and_then(|value| value.trim_end_matches("px").trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && (bounds.0..=bounds.1).contains(value))
        .unwrap_or(default)
}

fn parse_http_url<F>(lookup: &F, name: &str) -> Option<Url>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_non_empty_string(lookup, name)?;
    let parsed = Url::parse(&value).ok()?;

    if parsed.scheme() == "http" || parsed.scheme() == "https" {
        Some(parsed)
    } else {
        None
    }
}

// CSS custom properties keep their quotes: `--preview-footer-icon: "./w.svg"`.
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| values.get(key).cloned()
    }

    #[test]
    fn empty_lookup_yields_defaults() {
        let config = PreviewConfig::from_lookup(|_| None);

        assert_eq!(config, PreviewConfig::default());
        assert_eq!(config.show_delay, Duration::from_millis(400));
        assert_eq!(config.hide_delay, Duration::from_millis(300));
        assert_eq!(config.title_inline_threshold, 75);
    }

    #[test]
    fn css_style_values_are_accepted() {
        let config = PreviewConfig::from_lookup(lookup_from(&[
            (PREVIEW_WIDTH_KEY, " 360px"),
            (PADDING_KEY, "12"),
            (SHOW_DELAY_KEY, "250ms"),
            (FOOTER_ICON_KEY, "\"/img/w.svg\""),
            (LOG_LEVEL_KEY, "debug"),
        ]));

        assert_eq!(config.preview_width, 360.0);
        assert_eq!(config.padding, 12.0);
        assert_eq!(config.show_delay, Duration::from_millis(250));
        assert_eq!(config.footer_icon, "/img/w.svg");
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn out_of_range_values_fall_back_to_defaults() {
        let config = PreviewConfig::from_lookup(lookup_from(&[
            (PREVIEW_WIDTH_KEY, "40px"),
            (HIDE_DELAY_KEY, "90000"),
            (TITLE_THRESHOLD_KEY, "-3"),
            (MOBILE_MAX_WIDTH_KEY, "not-a-number"),
        ]));

        assert_eq!(config.preview_width, DEFAULT_PREVIEW_WIDTH);
        assert_eq!(config.hide_delay, Duration::from_millis(DEFAULT_HIDE_DELAY_MS));
        assert_eq!(config.title_inline_threshold, DEFAULT_TITLE_INLINE_THRESHOLD);
        assert_eq!(config.mobile_max_width, DEFAULT_MOBILE_MAX_WIDTH);
    }

    #[test]
    fn endpoint_must_be_http() {
        let rejected = PreviewConfig::from_lookup(lookup_from(&[(
            SUMMARY_ENDPOINT_KEY,
            "ftp://example.org/summary/",
        )]));
        assert_eq!(rejected.summary_endpoint, DEFAULT_SUMMARY_ENDPOINT);

        let accepted = PreviewConfig::from_lookup(lookup_from(&[(
            SUMMARY_ENDPOINT_KEY,
            "https://de.wikipedia.org/api/rest_v1/page/summary/",
        )]));
        assert_eq!(
            accepted.summary_endpoint,
            "https://de.wikipedia.org/api/rest_v1/page/summary/"
        );
    }

    #[test]
    fn blank_selectors_keep_defaults() {
        let config = PreviewConfig::from_lookup(lookup_from(&[
            (CONTAINER_KEY, "   "),
            (TRIGGER_SELECTOR_KEY, "a.wiki"),
        ]));

        assert_eq!(config.container_selector, DEFAULT_CONTAINER_SELECTOR);
        assert_eq!(config.trigger_selector, "a.wiki");
    }
}
