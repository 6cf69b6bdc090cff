use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

const ARTICLE_PATH_MARKER: &str = "/wiki/";

// Same unreserved set as `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Decoded article title as it appears after `/wiki/` in a link.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ArticleKey(String);

impl ArticleKey {
    /// Returns `None` for anything that is not an absolute article URL or
    /// whose path does not decode to UTF-8.
    pub(crate) fn from_href(href: &str) -> Option<Self> {
        let url = Url::parse(href).ok()?;
        let path = url.path();
        let start = path.find(ARTICLE_PATH_MARKER)? + ARTICLE_PATH_MARKER.len();
        let encoded = &path[start..];

        if encoded.is_empty() || !has_well_formed_escapes(encoded) {
            return None;
        }

        let decoded = percent_decode_str(encoded).decode_utf8().ok()?;
        Some(Self(decoded.into_owned()))
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn summary_url(&self, endpoint: &str) -> String {
        format!("{endpoint}{}", utf8_percent_encode(&self.0, COMPONENT))
    }
}

fn has_well_formed_escapes(encoded: &str) -> bool {
    let bytes = encoded.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'%' {
            let escape = bytes.get(index + 1..index + 3);
            if !escape.is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit)) {
                return false;
            }
            index += 3;
        } else {
            index += 1;
        }
    }

    true
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "SummaryPayload")]
pub(crate) struct ArticleSummary {
    pub title: String,
    pub extract: String,
    pub thumbnail: Option<String>,
    pub page_url: Option<String>,
}

#[derive(Deserialize)]
struct SummaryPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    thumbnail: Option<ThumbnailPayload>,
    #[serde(default)]
    content_urls: Option<ContentUrlsPayload>,
}

#[derive(Deserialize)]
struct ThumbnailPayload {
    #[serde(default)]
    source: Option<String>,
}

#[derive(Deserialize)]
struct ContentUrlsPayload {
    #[serde(default)]
    desktop: Option<PageUrlPayload>,
}

#[derive(Deserialize)]
struct PageUrlPayload {
    #[serde(default)]
    page: Option<String>,
}

impl From<SummaryPayload> for ArticleSummary {
    fn from(payload: SummaryPayload) -> Self {
        Self {
            title: payload.title.unwrap_or_default(),
            extract: payload.extract.unwrap_or_default(),
            thumbnail: payload
                .thumbnail
                .and_then(|thumbnail| thumbnail.source)
                .filter(|source| !source.is_empty()),
            page_url: payload
                .content_urls
                .and_then(|urls| urls.desktop)
                .and_then(|desktop| desktop.page)
                .filter(|page| !page.is_empty()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub(crate) enum FetchError {
    #[error("summary request failed: {0}")]
    Transport(String),
    #[error("summary endpoint answered with status {0}")]
    Status(u16),
    #[error("summary body could not be decoded: {0}")]
    Decode(String),
}

impl FetchError {
    pub(crate) fn error_class(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status(status) if (400..500).contains(status) => "http_4xx",
            Self::Status(status) if (500..600).contains(status) => "http_5xx",
            Self::Status(_) => "http_other",
            Self::Decode(_) => "decode",
        }
    }
}

/// Where article summaries come from.
pub(crate) trait SummarySource {
    async fn fetch_summary(&self, key: &ArticleKey) -> Result<ArticleSummary, FetchError>;
}

#[cfg(target_arch = "wasm32")]
pub(crate) struct RestSummarySource {
    endpoint: String,
}

#[cfg(target_arch = "wasm32")]
impl RestSummarySource {
    pub(crate) fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl SummarySource for RestSummarySource {
    async fn fetch_summary(&self, key: &ArticleKey) -> Result<ArticleSummary, FetchError> {
        use gloo_net::http::Request;

        let response = Request::get(&key.summary_url(&self.endpoint))
            .send()
            .await
            .map_err(|error| FetchError::Transport(error.to_string()))?;

        if !response.ok() {
            return Err(FetchError::Status(response.status()));
        }

        response
            .json::<ArticleSummary>()
            .await
            .map_err(|error| FetchError::Decode(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDPOINT: &str = "https://en.wikipedia.org/api/rest_v1/page/summary/";

    fn key(href: &str) -> Option<String> {
        ArticleKey::from_href(href).map(|key| key.as_str().to_string())
    }

    #[test]
    fn key_strips_fragment_and_query() {
        assert_eq!(
            key("https://en.wikipedia.org/wiki/Example_Article#History"),
            Some("Example_Article".to_string())
        );
        assert_eq!(
            key("https://en.wikipedia.org/wiki/Example_Article?oldid=12"),
            Some("Example_Article".to_string())
        );
    }

    #[test]
    fn key_decodes_percent_escapes() {
        assert_eq!(
            key("https://en.wikipedia.org/wiki/Caf%C3%A9_au_lait"),
            Some("Café_au_lait".to_string())
        );
        assert_eq!(
            key("https://en.wikipedia.org/wiki/AC%2FDC"),
            Some("AC/DC".to_string())
        );
    }

    #[test]
    fn key_keeps_nested_path_segments() {
        assert_eq!(
            key("https://en.m.wikipedia.org/wiki/Talk:Rust/Archive_1"),
            Some("Talk:Rust/Archive_1".to_string())
        );
    }

    #[test]
    fn malformed_links_yield_no_key() {
        assert_eq!(key("/wiki/Relative_Link"), None);
        assert_eq!(key("https://en.wikipedia.org/w/index.php?title=Rust"), None);
        assert_eq!(key("https://en.wikipedia.org/wiki/"), None);
        assert_eq!(key("https://en.wikipedia.org/wiki/Broken%zzEscape"), None);
        assert_eq!(key("https://en.wikipedia.org/wiki/Truncated%E"), None);
        assert_eq!(key("https://en.wikipedia.org/wiki/Bad%FFUtf8"), None);
    }

    #[test]
    fn extraction_is_deterministic() {
        let href = "https://en.wikipedia.org/wiki/Ren%C3%A9_Descartes";
        assert_eq!(ArticleKey::from_href(href), ArticleKey::from_href(href));
    }

    #[test]
    fn summary_url_encodes_like_uri_component() {
        let descartes = ArticleKey::from_href("https://en.wikipedia.org/wiki/Ren%C3%A9_Descartes")
            .expect("valid key");
        assert_eq!(
            descartes.summary_url(ENDPOINT),
            format!("{ENDPOINT}Ren%C3%A9_Descartes")
        );

        let band = ArticleKey::from_href("https://en.wikipedia.org/wiki/AC%2FDC").expect("valid key");
        assert_eq!(band.summary_url(ENDPOINT), format!("{ENDPOINT}AC%2FDC"));

        let language =
            ArticleKey::from_href("https://en.wikipedia.org/wiki/Rust_(programming_language)")
                .expect("valid key");
        assert_eq!(
            language.summary_url(ENDPOINT),
            format!("{ENDPOINT}Rust_(programming_language)")
        );
    }

    #[test]
    fn summary_decodes_rest_payload() {
        let body = r#"{
            "type": "standard",
            "title": "Rust (programming language)",
            "extract": "Rust is a general-purpose programming language.",
            "thumbnail": { "source": "https://upload.wikimedia.org/rust.png", "width": 320, "height": 320 },
            "content_urls": {
                "desktop": { "page": "https://en.wikipedia.org/wiki/Rust_(programming_language)" },
                "mobile": { "page": "https://en.m.wikipedia.org/wiki/Rust_(programming_language)" }
            }
        }"#;

        let summary: ArticleSummary = serde_json::from_str(body).expect("summary decodes");

        assert_eq!(summary.title, "Rust (programming language)");
        assert_eq!(summary.extract, "Rust is a general-purpose programming language.");
        assert_eq!(
            summary.thumbnail.as_deref(),
            Some("https://upload.wikimedia.org/rust.png")
        );
        assert_eq!(
            summary.page_url.as_deref(),
            Some("https://en.wikipedia.org/wiki/Rust_(programming_language)")
        );
    }

    #[test]
    fn summary_tolerates_missing_optional_parts() {
        let summary: ArticleSummary =
            serde_json::from_str(r#"{ "title": "Stub", "thumbnail": { "source": "" } }"#)
                .expect("summary decodes");

        assert_eq!(summary.title, "Stub");
        assert_eq!(summary.extract, "");
        assert_eq!(summary.thumbnail, None);
        assert_eq!(summary.page_url, None);
    }

    #[test]
    fn fetch_errors_are_classified() {
        assert_eq!(FetchError::Status(404).error_class(), "http_4xx");
        assert_eq!(FetchError::Status(503).error_class(), "http_5xx");
        assert_eq!(FetchError::Status(302).error_class(), "http_other");
        assert_eq!(FetchError::Transport("offline".into()).error_class(), "transport");
        assert_eq!(FetchError::Decode("eof".into()).error_class(), "decode");
        assert_eq!(
            FetchError::Status(404).to_string(),
            "summary endpoint answered with status 404"
        );
    }
}
