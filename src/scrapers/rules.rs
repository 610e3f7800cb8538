//! Per-provider extraction rule sets.

use url::Url;

use crate::models::Provider;

/// What pagination does to the cards already on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    /// The next page replaces the current results.
    Replace,
    /// New cards are appended below the ones already seen.
    Append,
}

/// Decides whether an extracted link is actually a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoHeuristic {
    /// The link path must contain this fragment.
    PathContains(&'static str),
    /// Any http(s) link is accepted.
    AnyHttp,
}

impl VideoHeuristic {
    pub fn accepts(&self, link: &Url) -> bool {
        if !matches!(link.scheme(), "http" | "https") {
            return false;
        }
        match self {
            VideoHeuristic::PathContains(fragment) => link.path().contains(fragment),
            VideoHeuristic::AnyHttp => true,
        }
    }
}

/// How to search one provider and map its result cards into records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRuleSet {
    pub provider: Provider,
    /// Search URL prefix; the escaped search term is appended.
    pub search_url: &'static str,
    /// Origin used to absolutize site-relative links.
    pub base_origin: &'static str,
    /// Visible once results have rendered.
    pub loaded_marker: &'static str,
    pub card: &'static str,
    /// Anchor inside a card carrying the record link in `href`.
    pub link: &'static str,
    pub title: &'static str,
    pub date: &'static str,
    pub description: &'static str,
    /// Visible while more results are available.
    pub more_marker: &'static str,
    /// Clicked to advance to the next page of results.
    pub advance: &'static str,
    pub page_mode: PageMode,
    pub heuristic: VideoHeuristic,
}

pub static CNN: ExtractionRuleSet = ExtractionRuleSet {
    provider: Provider::Cnn,
    search_url: "https://www.cnn.com/search?types=video&q=",
    base_origin: "https://www.cnn.com",
    loaded_marker: r#"div[data-uri^="/_components/card/instances/search-"]"#,
    card: r#"div[data-uri^="/_components/card/instances/search-"]"#,
    link: "a.container__link--type-Video[href]",
    title: "span.container__headline-text",
    date: "div.container__date",
    description: "div.container__description",
    more_marker: "div.pagination-arrow.pagination-arrow-right.search__pagination-link.text-active",
    advance: "div.pagination-arrow.pagination-arrow-right.search__pagination-link.text-active",
    page_mode: PageMode::Replace,
    heuristic: VideoHeuristic::PathContains("/video"),
};

pub static FOX_NEWS: ExtractionRuleSet = ExtractionRuleSet {
    provider: Provider::FoxNews,
    search_url: "https://www.foxnews.com/search-results/search#q=",
    base_origin: "https://www.foxnews.com",
    loaded_marker: "article.article",
    card: "article.article",
    link: "div.m a[href]",
    title: "h2.title a",
    date: "header.info-header div.meta span.time",
    description: "div.content p.dek",
    more_marker: "div.button.load-more a",
    advance: "div.button.load-more a",
    page_mode: PageMode::Append,
    heuristic: VideoHeuristic::AnyHttp,
};

impl Provider {
    /// The extraction rule set for this provider.
    pub fn rule_set(&self) -> &'static ExtractionRuleSet {
        match self {
            Provider::Cnn => &CNN,
            Provider::FoxNews => &FOX_NEWS,
        }
    }
}

impl ExtractionRuleSet {
    /// Build the first-page URL for `term`.
    ///
    /// `prefix_override` replaces the rule set's own search URL prefix.
    pub fn search_url_for(&self, term: &str, prefix_override: Option<&str>) -> String {
        let prefix = prefix_override.unwrap_or(self.search_url);
        format!("{}{}", prefix, urlencoding::encode(term.trim()))
    }
}
