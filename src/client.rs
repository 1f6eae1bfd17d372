use tokio::sync::Semaphore;
use tracing::{debug, instrument};

use crate::cdp::Browser;
use crate::config::ScrapeConfig;
use crate::error::Result;
use crate::model::DeckRecord;
use crate::scraper::{self, StageContext};
use crate::sink::DeckSink;
use crate::window::ReportWindow;

/// The main entry point for harvesting Bushi Navi tournament results.
///
/// `NaviClient` drives an already-running headless Chromium over the
/// DevTools protocol and reads the JSON payloads of the site's internal API
/// calls instead of the rendered pages.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> bushinavi_scraper::Result<()> {
/// use bushinavi_scraper::{Browser, NaviClient, ReportWindow};
///
/// let ws_url = Browser::discover("127.0.0.1:9222").await?;
/// let browser = Browser::connect(&ws_url).await?;
/// let client = NaviClient::new(browser);
///
/// let window = ReportWindow::previous_week_in(&chrono_tz::Asia::Tokyo);
/// let records = client.collect_decks(&window).await?;
/// println!("Found {} decks", records.len());
/// # Ok(())
/// # }
/// ```
pub struct NaviClient {
    browser: Browser,
    config: ScrapeConfig,
    event_pages: Semaphore,
    deck_pages: Semaphore,
}

impl NaviClient {
    /// Create a client over an established browser connection with default
    /// settings.
    pub fn new(browser: Browser) -> Self {
        Self::with_config(browser, ScrapeConfig::default())
    }

    /// Create a client with explicit configuration.
    pub fn with_config(browser: Browser, config: ScrapeConfig) -> Self {
        let event_pages = Semaphore::new(config.max_concurrent_events);
        let deck_pages = Semaphore::new(config.max_concurrent_decks);
        Self {
            browser,
            config,
            event_pages,
            deck_pages,
        }
    }

    /// Harvest every qualifying deck from the events of `window`.
    ///
    /// Each event, and each deck within it, fails independently; the
    /// returned records are whatever subset resolved.
    #[instrument(skip(self))]
    pub async fn collect_decks(&self, window: &ReportWindow) -> Result<Vec<DeckRecord>> {
        let sink = DeckSink::new();
        let ctx = StageContext {
            browser: &self.browser,
            config: &self.config,
            event_pages: &self.event_pages,
            deck_pages: &self.deck_pages,
        };
        scraper::events::run(&ctx, window, &sink).await?;
        let records = sink.into_records();
        debug!(count = records.len(), "run complete");
        Ok(records)
    }
}
