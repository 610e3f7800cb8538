//! Result-card extraction from a rendered search page.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::rules::ExtractionRuleSet;

/// A rule set selector failed to parse.
#[derive(Debug, thiserror::Error)]
#[error("invalid selector {selector:?}: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

/// Compiled card selectors for one rule set.
#[derive(Debug)]
pub struct CardSelectors {
    card: Selector,
    link: Selector,
    title: Selector,
    date: Selector,
    description: Selector,
}

fn compile(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|e| SelectorError {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

impl CardSelectors {
    pub fn compile(rules: &ExtractionRuleSet) -> Result<Self, SelectorError> {
        Ok(Self {
            card: compile(rules.card)?,
            link: compile(rules.link)?,
            title: compile(rules.title)?,
            date: compile(rules.date)?,
            description: compile(rules.description)?,
        })
    }
}

/// One result card mapped to record fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardCandidate {
    pub url: String,
    pub title: String,
    pub published_date: String,
    pub description: String,
}

/// Cards extracted from one page.
#[derive(Debug, Default)]
pub struct ExtractedPage {
    /// Cards matched by the card selector.
    pub found: usize,
    pub cards: Vec<CardCandidate>,
    /// Cards dropped for a missing link or a non-video link.
    pub skipped: usize,
}

fn text_of(card: &ElementRef<'_>, selector: &Selector) -> String {
    card.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Extract every usable card from `html`, in document order.
pub fn extract_cards(
    html: &str,
    rules: &ExtractionRuleSet,
    selectors: &CardSelectors,
) -> ExtractedPage {
    let document = Html::parse_document(html);
    let base = Url::parse(rules.base_origin).ok();
    let mut page = ExtractedPage::default();

    for card in document.select(&selectors.card) {
        page.found += 1;

        let href = card
            .select(&selectors.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|h| !h.is_empty());

        let Some(href) = href else {
            page.skipped += 1;
            continue;
        };

        let link = match &base {
            Some(base) => base.join(href),
            None => Url::parse(href),
        };
        let link = match link {
            Ok(link) if rules.heuristic.accepts(&link) => link,
            _ => {
                debug!(href = %href, "Skipping non-video link");
                page.skipped += 1;
                continue;
            }
        };

        page.cards.push(CardCandidate {
            url: link.to_string(),
            title: text_of(&card, &selectors.title),
            published_date: text_of(&card, &selectors.date),
            description: text_of(&card, &selectors.description),
        });
    }

    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::rules::{CNN, FOX_NEWS};

    fn cnn_card(href: Option<&str>, title: &str, date: &str) -> String {
        let link = href
            .map(|h| {
                format!(
                    r#"<a class="container__link container__link--type-Video" href="{}">x</a>"#,
                    h
                )
            })
            .unwrap_or_default();
        format!(
            r#"<div data-uri="/_components/card/instances/search-1">
  {link}
  <span class="container__headline-text">
    {title}
  </span>
  <div class="container__date"> {date} </div>
  <div class="container__description">A description</div>
</div>"#
        )
    }

    #[test]
    fn test_cnn_card_fields_and_relative_link() {
        let html = format!(
            "<html><body>{}</body></html>",
            cnn_card(
                Some("/2025/02/26/world/video/body-on-plane-qatar-airways-digvid"),
                "Passengers say cabin crew put a dead body next to them on flight",
                "Feb 26, 2025"
            )
        );
        let selectors = CardSelectors::compile(&CNN).unwrap();
        let page = extract_cards(&html, &CNN, &selectors);

        assert_eq!(page.found, 1);
        assert_eq!(page.skipped, 0);
        let card = &page.cards[0];
        assert_eq!(
            card.url,
            "https://www.cnn.com/2025/02/26/world/video/body-on-plane-qatar-airways-digvid"
        );
        assert_eq!(
            card.title,
            "Passengers say cabin crew put a dead body next to them on flight"
        );
        assert_eq!(card.published_date, "Feb 26, 2025");
        assert_eq!(card.description, "A description");
    }

    #[test]
    fn test_cards_without_links_or_video_paths_are_skipped() {
        let html = format!(
            "<html><body>{}{}{}</body></html>",
            cnn_card(None, "no link", ""),
            cnn_card(Some("https://www.cnn.com/2025/01/01/us/story"), "article", ""),
            cnn_card(Some("https://www.cnn.com/videos/us/2025/x"), "video", ""),
        );
        let selectors = CardSelectors::compile(&CNN).unwrap();
        let page = extract_cards(&html, &CNN, &selectors);

        assert_eq!(page.found, 3);
        assert_eq!(page.skipped, 2);
        assert_eq!(page.cards.len(), 1);
        assert_eq!(page.cards[0].title, "video");
    }

    #[test]
    fn test_selector_drift_yields_no_cards() {
        let selectors = CardSelectors::compile(&CNN).unwrap();
        let page = extract_cards("<html><body><div>nothing</div></body></html>", &CNN, &selectors);
        assert_eq!(page.found, 0);
        assert!(page.cards.is_empty());
    }

    #[test]
    fn test_fox_card() {
        let html = r#"<html><body>
<article class="article">
  <div class="m"><a href="https://www.foxnews.com/video/6369"><img></a></div>
  <header class="info-header">
    <div class="meta"><span class="time">March 3, 2025</span></div>
    <h2 class="title"><a href="https://www.foxnews.com/video/6369">Search continues</a></h2>
  </header>
  <div class="content"><p class="dek">Police ask for help.</p></div>
</article>
</body></html>"#;
        let selectors = CardSelectors::compile(&FOX_NEWS).unwrap();
        let page = extract_cards(html, &FOX_NEWS, &selectors);

        assert_eq!(page.cards.len(), 1);
        assert_eq!(page.cards[0].url, "https://www.foxnews.com/video/6369");
        assert_eq!(page.cards[0].title, "Search continues");
        assert_eq!(page.cards[0].published_date, "March 3, 2025");
        assert_eq!(page.cards[0].description, "Police ask for help.");
    }

    #[test]
    fn test_builtin_rule_sets_compile() {
        CardSelectors::compile(&CNN).unwrap();
        CardSelectors::compile(&FOX_NEWS).unwrap();
        Selector::parse(CNN.loaded_marker).unwrap();
        Selector::parse(CNN.more_marker).unwrap();
        Selector::parse(FOX_NEWS.more_marker).unwrap();
    }
}
