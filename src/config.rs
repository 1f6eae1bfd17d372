use std::time::Duration;

use crate::window::ReportWindow;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Tunable parameters of one harvesting run.
///
/// The defaults mirror the production deployment; tests shrink the timeouts
/// to milliseconds.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Base URL of the Bushi Navi web app.
    pub navi_base: String,
    /// Base URL of the Decklog deck viewer.
    pub decklog_base: String,
    /// Game title filter of the listing query.
    pub game_title_id: u32,
    /// Series type filter of the listing query (shop tournaments).
    pub series_type: u32,
    /// Maximum number of events requested from the listing endpoint.
    pub list_limit: u32,
    /// How long the listing page may take to render its ready marker.
    pub list_ready_timeout: Duration,
    /// How long an event result page may take to render its deck buttons.
    pub detail_ready_timeout: Duration,
    /// Deck pages render fast; a stuck one is retried instead of waited on.
    pub deck_ready_timeout: Duration,
    /// Bound on waiting for an intercepted response once a page is ready.
    pub response_timeout: Duration,
    /// Pause between deck fetch attempts.
    pub retry_delay: Duration,
    /// Total deck fetch attempts (the first try plus retries).
    pub max_deck_attempts: u32,
    /// Event result pages open at once.
    pub max_concurrent_events: usize,
    /// Deck pages open at once.
    pub max_concurrent_decks: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            navi_base: "https://www.bushi-navi.com".to_owned(),
            decklog_base: "https://decklog.bushiroad.com".to_owned(),
            game_title_id: 6,
            series_type: 3,
            list_limit: 500,
            list_ready_timeout: Duration::from_secs(3600),
            detail_ready_timeout: Duration::from_secs(3600),
            deck_ready_timeout: Duration::from_secs(60),
            response_timeout: Duration::from_secs(30),
            retry_delay: Duration::from_millis(500),
            max_deck_attempts: 4,
            max_concurrent_events: 4,
            max_concurrent_decks: 8,
        }
    }
}

impl ScrapeConfig {
    /// Listing URL for all shop-tournament results inside `window`.
    pub fn listing_url(&self, window: &ReportWindow) -> String {
        format!(
            "{}/event/result/list?game_title_id[]={}&limit={}&offset=0&series_type[]={}&end_date={}&start_date={}",
            self.navi_base,
            self.game_title_id,
            self.list_limit,
            self.series_type,
            window.end.format(DATE_FORMAT),
            window.start.format(DATE_FORMAT),
        )
    }

    /// Result page of one event.
    pub fn event_result_url(&self, event_id: u64) -> String {
        format!("{}/event/result/{event_id}", self.navi_base)
    }

    /// Public viewer page of one deck.
    pub fn deck_view_url(&self, deck_id: &str) -> String {
        format!("{}/view/{deck_id}", self.decklog_base)
    }
}
