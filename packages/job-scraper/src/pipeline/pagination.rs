//! Pagination driver.
//!
//! ```text
//! HasMore { page: 1 } --next enabled--> HasMore { page: n + 1 }
//!        |
//!        +--no control / disabled / lookup error / page cap--> Exhausted
//! ```
//!
//! Running out of pages is normal completion. The only failure here is the
//! page-load timeout, which aborts the cycle.

use browser_session::RenderSession;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ScrapeConfig;
use crate::error::CycleError;

/// Why pagination stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionReason {
    NoNextControl,
    NextDisabled,
    /// Locating, reading or clicking the control failed
    LookupFailed,
    PageCap,
}

impl std::fmt::Display for ExhaustionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExhaustionReason::NoNextControl => write!(f, "no_next_control"),
            ExhaustionReason::NextDisabled => write!(f, "next_disabled"),
            ExhaustionReason::LookupFailed => write!(f, "lookup_failed"),
            ExhaustionReason::PageCap => write!(f, "page_cap"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationState {
    HasMore { page: u32 },
    Exhausted { page: u32, reason: ExhaustionReason },
}

impl PaginationState {
    pub fn page(&self) -> u32 {
        match self {
            PaginationState::HasMore { page } | PaginationState::Exhausted { page, .. } => *page,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, PaginationState::Exhausted { .. })
    }
}

enum NextControl<E> {
    Enabled(E),
    Disabled,
}

/// Walks the result pages of one session.
pub struct Paginator<'a> {
    config: &'a ScrapeConfig,
    state: PaginationState,
}

impl<'a> Paginator<'a> {
    pub fn new(config: &'a ScrapeConfig) -> Self {
        Self {
            config,
            state: PaginationState::HasMore { page: 1 },
        }
    }

    pub fn state(&self) -> PaginationState {
        self.state
    }

    pub fn page(&self) -> u32 {
        self.state.page()
    }

    /// Wait, bounded by the page-load timeout, for the current page's cards.
    pub async fn await_listings<R: RenderSession>(&self, session: &mut R) -> Result<(), CycleError> {
        session
            .wait_for_element(&self.config.selectors.card, self.config.page_load_timeout)
            .await
            .map_err(|source| CycleError::PageLoadTimeout {
                page: self.page(),
                source,
            })
    }

    /// Move past the current page, or decide there is nothing left.
    pub async fn advance<R: RenderSession>(&mut self, session: &mut R) -> PaginationState {
        let PaginationState::HasMore { page } = self.state else {
            return self.state;
        };

        if self.config.max_pages.is_some_and(|cap| page >= cap) {
            warn!(page, "Page cap reached, ending pagination");
            return self.finish(page, ExhaustionReason::PageCap);
        }

        let control = match self.locate_next(session).await {
            Ok(control) => control,
            Err(e) => {
                info!(page, error = %e, "No more pages to scrape");
                return self.finish(page, ExhaustionReason::LookupFailed);
            }
        };

        match control {
            None => {
                info!(page, "Reached the last page: no next control");
                self.finish(page, ExhaustionReason::NoNextControl)
            }
            Some(NextControl::Disabled) => {
                info!(page, "Reached the last page: next control disabled");
                self.finish(page, ExhaustionReason::NextDisabled)
            }
            Some(NextControl::Enabled(button)) => {
                if let Err(e) = session.click(&button).await {
                    info!(page, error = %e, "No more pages to scrape");
                    return self.finish(page, ExhaustionReason::LookupFailed);
                }
                tokio::time::sleep(self.config.rate_limit_delay).await;
                self.state = PaginationState::HasMore { page: page + 1 };
                self.state
            }
        }
    }

    fn finish(&mut self, page: u32, reason: ExhaustionReason) -> PaginationState {
        self.state = PaginationState::Exhausted { page, reason };
        self.state
    }

    async fn locate_next<R: RenderSession>(
        &self,
        session: &mut R,
    ) -> browser_session::Result<Option<NextControl<R::Element>>> {
        let selectors = &self.config.selectors;
        for candidate in session.find_elements(&selectors.next_button).await? {
            if session.read_text(&candidate).await?.trim() != selectors.next_label {
                continue;
            }

            let disabled = session.read_attribute(&candidate, "disabled").await?.is_some()
                || session
                    .read_attribute(&candidate, "aria-disabled")
                    .await?
                    .is_some_and(|v| v == "true");

            return Ok(Some(if disabled {
                NextControl::Disabled
            } else {
                NextControl::Enabled(candidate)
            }));
        }
        Ok(None)
    }
}
