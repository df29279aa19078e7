//! HTML builders for fixture listing pages.
//!
//! Class names match the default card selectors, so pages built here run
//! through an unmodified `ScrapeConfig`.

use std::time::Duration;

use job_scraper::ScrapeConfig;
use url::Url;

pub const TARGET_URL: &str = "https://fixture.test/jobs";

/// Config pointed at the fixture site with no pacing delay.
pub fn fixture_config() -> ScrapeConfig {
    ScrapeConfig::new(Url::parse(TARGET_URL).unwrap()).with_rate_limit_delay(Duration::ZERO)
}

/// Builder for one listing card.
#[derive(Clone)]
pub struct Card {
    title: Option<String>,
    company: Option<String>,
    location: Vec<String>,
    date_posted: Option<String>,
    href: Option<String>,
    logo: Option<String>,
    stale: bool,
}

impl Card {
    pub fn new(title: &str, company: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            company: Some(company.to_string()),
            location: vec!["Remote".to_string()],
            date_posted: Some("1d ago".to_string()),
            href: Some(format!(
                "/actuarial-jobs/{}",
                title.to_lowercase().replace(' ', "-")
            )),
            logo: Some("https://cdn.fixture.test/logo.png".to_string()),
            stale: false,
        }
    }

    pub fn without_company(mut self) -> Self {
        self.company = None;
        self
    }

    pub fn without_title(mut self) -> Self {
        self.title = None;
        self
    }

    pub fn with_href(mut self, href: &str) -> Self {
        self.href = Some(href.to_string());
        self
    }

    pub fn with_locations(mut self, locations: &[&str]) -> Self {
        self.location = locations.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn bare(mut self) -> Self {
        self.location.clear();
        self.date_posted = None;
        self.href = None;
        self.logo = None;
        self
    }

    /// Card detaches before it can be read.
    pub fn stale(mut self) -> Self {
        self.stale = true;
        self
    }

    pub fn render(&self) -> String {
        let mut inner = String::new();
        if let Some(logo) = &self.logo {
            inner.push_str(&format!(r#"<img src="{logo}">"#));
        }
        if let Some(title) = &self.title {
            inner.push_str(&format!(
                r#"<p class="Job_job-card__position__ic1rc">{title}</p>"#
            ));
        }
        if let Some(company) = &self.company {
            inner.push_str(&format!(
                r#"<p class="Job_job-card__company__7T9qY">{company}</p>"#
            ));
        }
        for location in &self.location {
            inner.push_str(&format!(
                r#"<a class="Job_job-card__location__bq7jX">{location}</a>"#
            ));
        }
        if let Some(date) = &self.date_posted {
            inner.push_str(&format!(
                r#"<span class="Job_job-card__posted-on__NCZaJ">{date}</span>"#
            ));
        }
        if let Some(href) = &self.href {
            inner.push_str(&format!(
                r#"<a class="Job_job-page-link__a5I5g" href="{href}">View</a>"#
            ));
        }

        let stale = if self.stale { r#" data-fixture-stale="1""# } else { "" };
        format!(r#"<div class="Job_job-card__YgDAV"{stale}>{inner}</div>"#)
    }
}

/// How a page's next-page control renders.
#[derive(Clone, Copy)]
pub enum Next {
    Enabled,
    Disabled,
    AriaDisabled,
    Absent,
}

pub fn listing_page(cards: &[Card], next: Next) -> String {
    let cards: String = cards.iter().map(Card::render).collect();
    let controls = match next {
        Next::Enabled => "<button>Previous</button><button>Next</button>",
        Next::Disabled => "<button>Previous</button><button disabled>Next</button>",
        Next::AriaDisabled => r#"<button>Previous</button><button aria-disabled="true">Next</button>"#,
        Next::Absent => "<button>Previous</button>",
    };
    format!(
        r#"<html><body><main><div class="listings">{cards}</div><nav>{controls}</nav></main></body></html>"#
    )
}

/// A page whose listings never render.
pub fn empty_page() -> String {
    r#"<html><body><main><p>Loading...</p></main></body></html>"#.to_string()
}
