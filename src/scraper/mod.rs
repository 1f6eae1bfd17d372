pub(crate) mod deck;
pub(crate) mod event_detail;
pub(crate) mod events;

use tokio::sync::Semaphore;

use crate::cdp::Browser;
use crate::config::ScrapeConfig;

/// Handles shared by every stage of one run.
///
/// Event pages and deck pages draw from separate budgets: an event stage
/// keeps its page (and permit) across the join of its deck children, so the
/// children must never compete with it for the same pool.
pub(crate) struct StageContext<'a> {
    pub(crate) browser: &'a Browser,
    pub(crate) config: &'a ScrapeConfig,
    pub(crate) event_pages: &'a Semaphore,
    pub(crate) deck_pages: &'a Semaphore,
}
