//! Social-link and summary extraction from a fetched home page.

use std::sync::LazyLock;

use leadenrich_shared::LeadField;
use regex::Regex;
use scraper::{Html, Selector};

/// Bound on the first-paragraph fallback description, in characters.
const PARAGRAPH_CHARS: usize = 300;

/// Bound on the description embedded in a research brief, in characters.
const BRIEF_CHARS: usize = 200;

/// Per-platform href patterns, in the order platforms are reported.
static SOCIAL_PATTERNS: LazyLock<Vec<(LeadField, Regex)>> = LazyLock::new(|| {
    [
        (LeadField::LinkedIn, r"(?i)linkedin\.com/(?:company|in)/[\w-]+"),
        (LeadField::Facebook, r"(?i)(?:facebook|fb)\.com/[\w.-]+"),
        (LeadField::Instagram, r"(?i)instagram\.com/[\w.]+"),
        (LeadField::Twitter, r"(?i)(?:twitter|x)\.com/\w+"),
    ]
    .into_iter()
    .map(|(field, pattern)| (field, Regex::new(pattern).expect("valid regex")))
    .collect()
});

/// Social profile URLs found on a page. Platforms without a match are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocialLinks {
    pub linkedin: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub twitter: Option<String>,
}

impl SocialLinks {
    /// The link for one of the [`LeadField::SOCIAL`] fields.
    pub fn get(&self, field: LeadField) -> Option<&str> {
        match field {
            LeadField::LinkedIn => self.linkedin.as_deref(),
            LeadField::Facebook => self.facebook.as_deref(),
            LeadField::Instagram => self.instagram.as_deref(),
            LeadField::Twitter => self.twitter.as_deref(),
            _ => None,
        }
    }

    fn slot(&mut self, field: LeadField) -> Option<&mut Option<String>> {
        match field {
            LeadField::LinkedIn => Some(&mut self.linkedin),
            LeadField::Facebook => Some(&mut self.facebook),
            LeadField::Instagram => Some(&mut self.instagram),
            LeadField::Twitter => Some(&mut self.twitter),
            _ => None,
        }
    }
}

/// Title and description of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSummary {
    pub title: String,
    pub description: String,
}

/// Match every `<a href>` against the platform patterns; first match per
/// platform wins. Hrefs not starting with `http` are upgraded to `https://`.
pub fn extract_social_links(doc: &Html) -> SocialLinks {
    let link_sel = Selector::parse("a[href]").unwrap();
    let mut links = SocialLinks::default();

    for el in doc.select(&link_sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };

        for (field, pattern) in SOCIAL_PATTERNS.iter() {
            let Some(slot) = links.slot(*field) else {
                continue;
            };
            if slot.is_none() && pattern.is_match(href) {
                *slot = Some(absolute_href(href));
            }
        }
    }

    links
}

fn absolute_href(href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("https://{}", href.trim_start_matches('/'))
    }
}

/// Read `<title>` and `<meta name="description">`, falling back to the text
/// of the first `<p>` when there is no description.
pub fn extract_summary(doc: &Html) -> PageSummary {
    let title_sel = Selector::parse("title").unwrap();
    let meta_sel = Selector::parse(r#"meta[name="description"]"#).unwrap();
    let p_sel = Selector::parse("p").unwrap();

    let title = doc
        .select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let mut description = doc
        .select(&meta_sel)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .unwrap_or_default()
        .to_string();

    if description.is_empty() {
        if let Some(p) = doc.select(&p_sel).next() {
            description = truncate_chars(p.text().collect::<String>().trim(), PARAGRAPH_CHARS);
        }
    }

    PageSummary { title, description }
}

/// `"<name>: <description>"`, else `"<name> - <title>"`, else `"<name>"`.
pub fn research_brief(company_name: &str, summary: &PageSummary) -> String {
    if !summary.description.is_empty() {
        let collapsed = summary.description.split_whitespace().collect::<Vec<_>>().join(" ");
        format!("{company_name}: {}", truncate_chars(&collapsed, BRIEF_CHARS))
    } else if !summary.title.is_empty() {
        format!("{company_name} - {}", summary.title)
    } else {
        company_name.to_string()
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
