//! Business website profiling.
//!
//! This crate provides:
//! - [`SiteFetcher`]: fetches a home page and classifies failures into [`FetchFailure`]
//! - [`extract_social_links`] / [`extract_summary`]: pattern-based extraction
//! - [`WebsiteProfile`]: the five fields merged into a lead row

mod extract;
mod fetch;

use scraper::Html;

pub use extract::{PageSummary, SocialLinks, extract_social_links, extract_summary, research_brief};
pub use fetch::{FetchFailure, PageSource, SiteFetcher, normalize_url};

/// Social links plus research brief for one business.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebsiteProfile {
    pub social: SocialLinks,
    pub brief: String,
}

impl WebsiteProfile {
    /// Build a profile from fetched HTML.
    pub fn from_html(html: &str, company_name: &str) -> Self {
        let doc = Html::parse_document(html);
        let social = extract_social_links(&doc);
        let summary = extract_summary(&doc);

        Self {
            social,
            brief: research_brief(company_name, &summary),
        }
    }
}
