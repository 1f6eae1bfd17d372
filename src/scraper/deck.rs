use tokio::time::{sleep, timeout};
use tracing::{debug, error, instrument, warn};

use crate::cdp::HttpMethod;
use crate::error::{NaviError, Result};
use crate::model::{DeckRecord, DeckViewPayload, TeamMember};
use crate::scraper::StageContext;
use crate::sink::DeckSink;

const DECK_ENDPOINT: &str = "/app/api/view";
const DECK_READY_SELECTOR: &str = ".card-detail";

/// Terminal state of one deck branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeckOutcome {
    /// Deck decoded and recorded.
    Resolved,
    /// The member never registered a deck; nothing to fetch.
    Skipped,
    /// Every attempt failed; the deck is absent from the results.
    Exhausted,
}

/// Fetch one member's deck under a bounded attempt budget and record it.
///
/// Every attempt runs on a fresh page which the attempt itself closes, so a
/// late response from an abandoned try can never satisfy a later one.
#[instrument(skip(ctx, member, sink), fields(player = %member.player_name))]
pub(crate) async fn run(
    ctx: &StageContext<'_>,
    member: TeamMember,
    rank: u32,
    sink: &DeckSink,
) -> DeckOutcome {
    let deck_id = match member.deck_recipe_id.as_deref() {
        Some(id) if !id.is_empty() => id,
        _ => {
            warn!("member has no deck recipe, skipping");
            return DeckOutcome::Skipped;
        }
    };

    for attempt in 1..=ctx.config.max_deck_attempts {
        match fetch_deck(ctx, deck_id).await {
            Ok(payload) => {
                sink.push(DeckRecord::from_payload(payload, &member.player_name, rank))
                    .await;
                debug!(deck_id, attempt, "deck recorded");
                return DeckOutcome::Resolved;
            }
            Err(e) if attempt < ctx.config.max_deck_attempts => {
                warn!(error = %e, deck_id, attempt, "deck fetch failed, retrying");
                sleep(ctx.config.retry_delay).await;
            }
            Err(e) => {
                error!(error = %e, deck_id, attempts = attempt, "deck fetch failed, giving up");
            }
        }
    }
    DeckOutcome::Exhausted
}

/// One attempt: open a page, intercept the deck api, navigate, wait, decode.
async fn fetch_deck(ctx: &StageContext<'_>, deck_id: &str) -> Result<DeckViewPayload> {
    let _permit = ctx.deck_pages.acquire().await?;
    let mut page = ctx.browser.new_page().await?;
    let mut interceptor = page.interceptor(DECK_ENDPOINT, HttpMethod::Post)?;

    let outcome = async {
        page.goto(&ctx.config.deck_view_url(deck_id)).await?;
        page.wait_for_selector(DECK_READY_SELECTOR, ctx.config.deck_ready_timeout)
            .await?;
        timeout(
            ctx.config.response_timeout,
            interceptor.next::<DeckViewPayload>(),
        )
        .await
        .map_err(|_| NaviError::ResponseTimeout {
            endpoint: DECK_ENDPOINT,
        })?
    }
    .await;

    if let Err(e) = page.close().await {
        warn!(error = %e, deck_id, "failed to close deck page");
    }

    outcome
}
