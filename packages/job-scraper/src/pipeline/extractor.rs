//! Listing card extraction.
//!
//! Turns the markup of one rendered card into a [`NewJob`]. Only `title` and
//! `company` are required; every other field degrades to an empty string when
//! its element is missing.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::error::InvalidSelector;
use crate::models::NewJob;

/// CSS hooks into the listing site's current markup.
///
/// These class names are generated by the site's build and change whenever
/// it redeploys; a mismatch shows up as skipped cards, not as a crash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSelectors {
    pub card: String,
    pub title: String,
    pub company: String,
    pub location: String,
    /// Defaults to the location selector; stored tags mirror locations.
    pub tags: String,
    pub date_posted: String,
    pub link: String,
    pub logo: String,
    pub next_button: String,
    /// Visible text identifying the next-page control among `next_button` matches
    pub next_label: String,
}

impl Default for CardSelectors {
    fn default() -> Self {
        Self {
            card: ".Job_job-card__YgDAV".to_string(),
            title: ".Job_job-card__position__ic1rc".to_string(),
            company: ".Job_job-card__company__7T9qY".to_string(),
            location: ".Job_job-card__location__bq7jX".to_string(),
            tags: ".Job_job-card__location__bq7jX".to_string(),
            date_posted: ".Job_job-card__posted-on__NCZaJ".to_string(),
            link: ".Job_job-page-link__a5I5g".to_string(),
            logo: "img".to_string(),
            next_button: "button".to_string(),
            next_label: "Next".to_string(),
        }
    }
}

/// Why a card produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingTitle,
    MissingCompany,
    /// The card's markup could not be read from the browser
    Unreadable(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingTitle => write!(f, "missing title"),
            SkipReason::MissingCompany => write!(f, "missing company"),
            SkipReason::Unreadable(reason) => write!(f, "unreadable card: {}", reason),
        }
    }
}

/// Result of extracting one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardExtraction {
    Record(NewJob),
    Skipped(SkipReason),
}

fn compile(selector: &str) -> Result<Selector, InvalidSelector> {
    Selector::parse(selector).map_err(|e| InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{e:?}"),
    })
}

/// Prefix site-relative hrefs with the site origin; pass everything else through.
pub fn absolutize_link(href: &str, origin: &str) -> String {
    if href.starts_with('/') {
        format!("{}{}", origin, href)
    } else {
        href.to_string()
    }
}

/// Compiled field selectors plus the origin used for link normalization.
#[derive(Debug, Clone)]
pub struct CardExtractor {
    title: Selector,
    company: Selector,
    location: Selector,
    tags: Selector,
    date_posted: Selector,
    link: Selector,
    logo: Selector,
    origin: String,
}

impl CardExtractor {
    pub fn new(selectors: &CardSelectors, origin: impl Into<String>) -> Result<Self, InvalidSelector> {
        Ok(Self {
            title: compile(&selectors.title)?,
            company: compile(&selectors.company)?,
            location: compile(&selectors.location)?,
            tags: compile(&selectors.tags)?,
            date_posted: compile(&selectors.date_posted)?,
            link: compile(&selectors.link)?,
            logo: compile(&selectors.logo)?,
            origin: origin.into(),
        })
    }

    /// Parse a card's outer HTML and extract it.
    pub fn extract_html(&self, html: &str) -> CardExtraction {
        let fragment = Html::parse_fragment(html);
        self.extract(fragment.root_element())
    }

    /// Extract a posting from a card subtree.
    pub fn extract(&self, card: ElementRef<'_>) -> CardExtraction {
        let Some(title) = first_text(card, &self.title).filter(|t| !t.is_empty()) else {
            return CardExtraction::Skipped(SkipReason::MissingTitle);
        };
        let Some(company) = first_text(card, &self.company).filter(|c| !c.is_empty()) else {
            return CardExtraction::Skipped(SkipReason::MissingCompany);
        };

        let link = first_attr(card, &self.link, "href")
            .map(|href| absolutize_link(&href, &self.origin))
            .unwrap_or_default();

        CardExtraction::Record(NewJob {
            title,
            company,
            location: joined_text(card, &self.location),
            tags: joined_text(card, &self.tags),
            date_posted: first_text(card, &self.date_posted).unwrap_or_default(),
            link,
            logo: first_attr(card, &self.logo, "src").unwrap_or_default(),
        })
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn first_text(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector).next().map(element_text)
}

fn first_attr(card: ElementRef<'_>, selector: &Selector, name: &str) -> Option<String> {
    card.select(selector)
        .next()
        .and_then(|el| el.value().attr(name))
        .map(str::to_string)
}

fn joined_text(card: ElementRef<'_>, selector: &Selector) -> String {
    card.select(selector)
        .map(element_text)
        .collect::<Vec<_>>()
        .join(", ")
}
