//! Scrape cycle orchestrator.
//!
//! One cycle = open a store session and a browser, crawl page 1 through
//! exhaustion, close both. Every failure ends in a [`CycleReport`]; nothing
//! propagates to the caller, and both sessions are released on every path,
//! panics included.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use async_trait::async_trait;
use browser_session::{RenderSession, RenderingEngine};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::ScrapeConfig;
use crate::error::{panic_message, CycleError, InvalidSelector};
use crate::pipeline::dedup::{self, Admission};
use crate::pipeline::extractor::{CardExtraction, CardExtractor, SkipReason};
use crate::pipeline::pagination::{ExhaustionReason, PaginationState, Paginator};
use crate::pipeline::writer;
use crate::scheduler::CycleRunner;
use crate::store::{JobStore, StoreSession};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed { reason: ExhaustionReason },
    Aborted { error: String },
}

/// Metrics for one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub pages_visited: u32,
    pub cards_seen: usize,
    pub records_added: usize,
    pub duplicates: usize,
    pub cards_skipped: usize,
    pub persist_failures: usize,
    pub duration_ms: u64,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Completed { .. })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    pages_visited: u32,
    cards_seen: usize,
    added: usize,
    duplicates: usize,
    skipped: usize,
    failed: usize,
}

impl Tally {
    fn record(&mut self, outcome: CardOutcome) {
        match outcome {
            CardOutcome::Added => self.added += 1,
            CardOutcome::Duplicate => self.duplicates += 1,
            CardOutcome::Skipped => self.skipped += 1,
            CardOutcome::Failed => self.failed += 1,
        }
    }

    /// Counts accumulated since `earlier`.
    fn since(&self, earlier: &Tally) -> Tally {
        Tally {
            pages_visited: self.pages_visited - earlier.pages_visited,
            cards_seen: self.cards_seen - earlier.cards_seen,
            added: self.added - earlier.added,
            duplicates: self.duplicates - earlier.duplicates,
            skipped: self.skipped - earlier.skipped,
            failed: self.failed - earlier.failed,
        }
    }
}

enum CardOutcome {
    Added,
    Duplicate,
    Skipped,
    Failed,
}

/// Everything one crawl pass needs, injected.
pub struct ScrapeCycle<E, S> {
    engine: E,
    store: S,
    config: ScrapeConfig,
    extractor: CardExtractor,
}

impl<E, S> ScrapeCycle<E, S>
where
    E: RenderingEngine,
    S: JobStore,
{
    pub fn new(engine: E, store: S, config: ScrapeConfig) -> Result<Self, InvalidSelector> {
        let extractor = CardExtractor::new(&config.selectors, config.site_origin())?;
        Ok(Self {
            engine,
            store,
            config,
            extractor,
        })
    }

    /// Run one full crawl. Never fails; see the report's outcome.
    pub async fn run(&self) -> CycleReport {
        let cycle_id = Uuid::now_v7();
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut tally = Tally::default();
        let span = info_span!("scrape_cycle", %cycle_id);

        let outcome = async {
            info!(target_url = %self.config.target_url, "Starting job scrape");
            match self.crawl(&mut tally).await {
                Ok(reason) => CycleOutcome::Completed { reason },
                Err(e) => {
                    error!(error = %e, "Scraping failed");
                    CycleOutcome::Aborted {
                        error: e.to_string(),
                    }
                }
            }
        }
        .instrument(span.clone())
        .await;

        let report = CycleReport {
            cycle_id,
            started_at,
            pages_visited: tally.pages_visited,
            cards_seen: tally.cards_seen,
            records_added: tally.added,
            duplicates: tally.duplicates,
            cards_skipped: tally.skipped,
            persist_failures: tally.failed,
            duration_ms: clock.elapsed().as_millis() as u64,
            outcome,
        };

        span.in_scope(|| {
            info!(
                pages = report.pages_visited,
                added = report.records_added,
                duplicates = report.duplicates,
                skipped = report.cards_skipped,
                failed = report.persist_failures,
                duration_ms = report.duration_ms,
                completed = report.is_completed(),
                "Scrape cycle finished"
            )
        });
        report
    }

    async fn crawl(&self, tally: &mut Tally) -> Result<ExhaustionReason, CycleError> {
        let mut store = self
            .store
            .open_session()
            .await
            .map_err(CycleError::StoreAcquisition)?;

        let mut browser = match self.engine.open_session().await {
            Ok(session) => session,
            Err(e) => {
                store.close().await;
                return Err(CycleError::SessionAcquisition(e));
            }
        };

        let result = AssertUnwindSafe(self.drive(&mut browser, &mut store, tally))
            .catch_unwind()
            .await;

        if let Err(e) = browser.close().await {
            warn!(error = %e, "Failed to release rendering session");
        }
        store.close().await;

        match result {
            Ok(result) => result,
            Err(payload) => Err(CycleError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    async fn drive(
        &self,
        browser: &mut E::Session,
        store: &mut S::Session,
        tally: &mut Tally,
    ) -> Result<ExhaustionReason, CycleError> {
        browser
            .navigate(self.config.target_url.as_str())
            .await
            .map_err(CycleError::Navigation)?;

        let mut pager = Paginator::new(&self.config);
        loop {
            let page = pager.page();
            info!(page, "Scraping page");

            pager.await_listings(browser).await?;
            tally.pages_visited += 1;

            let cards = browser
                .find_elements(&self.config.selectors.card)
                .await
                .map_err(|source| CycleError::CardLookup { page, source })?;
            info!(page, cards = cards.len(), "Found job cards");

            let before = *tally;
            self.process_page(browser, store, page, &cards, tally).await;
            let page_tally = tally.since(&before);
            info!(
                page,
                added = page_tally.added,
                duplicates = page_tally.duplicates,
                skipped = page_tally.skipped,
                failed = page_tally.failed,
                "Scraped new jobs from page"
            );

            if let PaginationState::Exhausted { reason, .. } = pager.advance(browser).await {
                return Ok(reason);
            }
        }
    }

    async fn process_page(
        &self,
        browser: &mut E::Session,
        store: &mut S::Session,
        page: u32,
        cards: &[<E::Session as RenderSession>::Element],
        tally: &mut Tally,
    ) {
        tally.cards_seen += cards.len();
        // Per card: a mid-page abort must still report committed rows.
        for (index, card) in cards.iter().enumerate() {
            let outcome = self.process_card(browser, store, page, index + 1, card).await;
            tally.record(outcome);
        }
    }

    async fn process_card(
        &self,
        browser: &mut E::Session,
        store: &mut S::Session,
        page: u32,
        position: usize,
        card: &<E::Session as RenderSession>::Element,
    ) -> CardOutcome {
        let extraction = match browser.outer_html(card).await {
            Ok(html) => self.extractor.extract_html(&html),
            Err(e) => CardExtraction::Skipped(SkipReason::Unreadable(e.to_string())),
        };

        let candidate = match extraction {
            CardExtraction::Record(job) => job,
            CardExtraction::Skipped(reason @ SkipReason::Unreadable(_)) => {
                error!(page, card = position, %reason, "Error parsing job card");
                return CardOutcome::Skipped;
            }
            CardExtraction::Skipped(reason) => {
                warn!(page, card = position, %reason, "Skipping job card");
                return CardOutcome::Skipped;
            }
        };

        match dedup::admit(store, &candidate).await {
            Ok(Admission::New) => {}
            Ok(Admission::Duplicate) => {
                debug!(page, card = position, key = %candidate.key(), "Job already stored");
                return CardOutcome::Duplicate;
            }
            Err(e) => {
                error!(page, card = position, key = %candidate.key(), error = %e, "Duplicate check failed");
                return CardOutcome::Failed;
            }
        }

        if writer::persist(store, &candidate).await.is_committed() {
            CardOutcome::Added
        } else {
            CardOutcome::Failed
        }
    }
}

#[async_trait]
impl<E, S> CycleRunner for ScrapeCycle<E, S>
where
    E: RenderingEngine,
    S: JobStore,
{
    async fn run_cycle(&self) -> anyhow::Result<CycleReport> {
        Ok(self.run().await)
    }
}
