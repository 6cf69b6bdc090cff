use crate::article::ArticleSummary;

pub(crate) const LOADING_MESSAGE: &str = "Loading...";
pub(crate) const FAILURE_MESSAGE: &str = "Failed to load preview";
pub(crate) const MISSING_EXTRACT: &str = "No description available.";

/// Everything the shared surface can display.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PreviewView {
    Loading,
    Failed,
    Article(ArticleCard),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ArticleCard {
    pub title: String,
    pub text: ExtractText,
    pub thumbnail: Option<String>,
    pub page_url: Option<String>,
}

impl ArticleCard {
    pub(crate) fn from_summary(summary: &ArticleSummary, title_inline_threshold: usize) -> Self {
        let extract = if summary.extract.is_empty() {
            MISSING_EXTRACT
        } else {
            summary.extract.as_str()
        };

        Self {
            title: summary.title.clone(),
            text: ExtractText::compose(&summary.title, extract, title_inline_threshold),
            thumbnail: summary.thumbnail.clone(),
            page_url: summary.page_url.clone(),
        }
    }
}

/// Extract paragraph with the title marked for styling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ExtractText {
    /// The extract already names the article early on; the title is styled
    /// where it stands.
    Inline {
        before: String,
        title: String,
        after: String,
    },
    /// The styled label is `title` followed by a comma, then the extract.
    Leading { title: String, extract: String },
}

impl ExtractText {
    /// `threshold` counts characters, not bytes.
    pub(crate) fn compose(title: &str, extract: &str, threshold: usize) -> Self {
        if let Some(offset) = extract.find(title) {
            if extract[..offset].chars().count() < threshold {
                return Self::Inline {
                    before: extract[..offset].to_string(),
                    title: title.to_string(),
                    after: extract[offset + title.len()..].to_string(),
                };
            }
        }

        Self::Leading {
            title: title.to_string(),
            extract: extract.to_string(),
        }
    }

    pub(crate) fn styled_label(&self) -> String {
        match self {
            Self::Inline { title, .. } => title.clone(),
            Self::Leading { title, .. } => format!("{title},"),
        }
    }

    #[cfg(test)]
    pub(crate) fn plain(&self) -> String {
        match self {
            Self::Inline {
                before,
                title,
                after,
            } => format!("{before}{title}{after}"),
            Self::Leading { title, extract } => format!("{title}, {extract}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_at_start_is_styled_in_place() {
        let summary = ArticleSummary {
            title: "Example Article".to_string(),
            extract: "Example Article is a sample.".to_string(),
            thumbnail: None,
            page_url: None,
        };

        let card = ArticleCard::from_summary(&summary, 75);

        assert_eq!(
            card.text,
            ExtractText::Inline {
                before: String::new(),
                title: "Example Article".to_string(),
                after: " is a sample.".to_string(),
            }
        );
        assert_eq!(card.text.plain(), "Example Article is a sample.");
        assert_eq!(card.thumbnail, None);
    }

    #[test]
    fn title_inside_threshold_keeps_surrounding_text() {
        let text = ExtractText::compose("Lovelace", "Augusta Ada King, Countess of Lovelace, was a mathematician.", 75);

        assert_eq!(
            text,
            ExtractText::Inline {
                before: "Augusta Ada King, Countess of ".to_string(),
                title: "Lovelace".to_string(),
                after: ", was a mathematician.".to_string(),
            }
        );
        assert_eq!(text.styled_label(), "Lovelace");
    }

    #[test]
    fn late_or_missing_title_is_prepended() {
        let late = format!("{} Turing", "x".repeat(80));
        let text = ExtractText::compose("Turing", &late, 75);
        assert_eq!(
            text,
            ExtractText::Leading {
                title: "Turing".to_string(),
                extract: late.clone(),
            }
        );
        assert_eq!(text.styled_label(), "Turing,");

        let absent = ExtractText::compose("Enigma", "A cipher device.", 75);
        assert_eq!(absent.plain(), "Enigma, A cipher device.");
    }

    #[test]
    fn threshold_counts_characters_not_bytes() {
        // 40 two-byte characters put the title at byte 80 but char 40.
        let extract = format!("{}Zürich", "é".repeat(40));
        let text = ExtractText::compose("Zürich", &extract, 50);

        assert!(matches!(text, ExtractText::Inline { .. }));
    }

    #[test]
    fn offset_equal_to_threshold_is_not_inline() {
        let extract = format!("{}Title", " ".repeat(75));
        let text = ExtractText::compose("Title", &extract, 75);

        assert!(matches!(text, ExtractText::Leading { .. }));
    }

    #[test]
    fn empty_extract_uses_placeholder() {
        let summary = ArticleSummary {
            title: "Stub".to_string(),
            ..ArticleSummary::default()
        };

        let card = ArticleCard::from_summary(&summary, 75);

        assert_eq!(card.text.plain(), format!("Stub, {MISSING_EXTRACT}"));
    }
}
