//! Search-result scraping.
//!
//! Each [`crate::models::Provider`] has a static [`ExtractionRuleSet`]; the
//! [`Scraper`] applies one to a rendered browser session and inserts every
//! new card into the record store.

mod engine;
pub mod extract;
pub mod rules;

pub use engine::{
    DiscoverError, DiscoverOptions, DiscoverSummary, DiscoveryStream, Scraper, ScraperConfig,
};
pub use extract::{extract_cards, CardCandidate, CardSelectors};
pub use rules::{ExtractionRuleSet, PageMode, VideoHeuristic};
