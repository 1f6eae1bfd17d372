use futures::future::join_all;
use itertools::Itertools;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::cdp::HttpMethod;
use crate::error::{NaviError, Result};
use crate::model::{EventDetailBody, EventDetailPayload, TeamMember};
use crate::scraper::deck::{self, DeckOutcome};
use crate::scraper::StageContext;
use crate::sink::DeckSink;

const DETAIL_ENDPOINT: &str = "/api/user/event/result/detail/";
const DETAIL_READY_SELECTOR: &str = ".showDeckButton";

/// Harvest one event: decode its ranking payload, keep the standings that
/// beat the cutoff and fetch each qualifying member's deck.
///
/// Failures are contained here. An event whose detail cannot be fetched
/// contributes nothing and never disturbs its siblings.
#[instrument(skip(ctx, sink))]
pub(crate) async fn run(ctx: &StageContext<'_>, event_id: u64, sink: &DeckSink) {
    match harvest_event(ctx, event_id, sink).await {
        Ok(outcomes) => {
            let resolved = count(&outcomes, DeckOutcome::Resolved);
            let skipped = count(&outcomes, DeckOutcome::Skipped);
            let exhausted = count(&outcomes, DeckOutcome::Exhausted);
            debug!(event_id, resolved, skipped, exhausted, "event harvested");
        }
        Err(e) => warn!(error = %e, event_id, "skipping event, detail unavailable"),
    }
}

async fn harvest_event(
    ctx: &StageContext<'_>,
    event_id: u64,
    sink: &DeckSink,
) -> Result<Vec<DeckOutcome>> {
    let _permit = ctx.event_pages.acquire().await?;
    let url = ctx.config.event_result_url(event_id);
    let mut page = ctx.browser.new_page().await?;
    let mut interceptor = page.interceptor(DETAIL_ENDPOINT, HttpMethod::Get)?;

    let decoded = async {
        page.goto(&url).await?;
        page.wait_for_selector(DETAIL_READY_SELECTOR, ctx.config.detail_ready_timeout)
            .await?;
        timeout(
            ctx.config.response_timeout,
            interceptor.next::<EventDetailPayload>(),
        )
        .await
        .map_err(|_| NaviError::ResponseTimeout {
            endpoint: DETAIL_ENDPOINT,
        })?
    }
    .await;

    let outcomes = match decoded {
        Ok(payload) => {
            let player_count = payload.success.joined_player_count;
            let cutoff = rank_cutoff(player_count);
            let members = qualifying_members(payload.success, cutoff);
            debug!(
                event_id,
                player_count,
                cutoff,
                decks = members.len(),
                "event detail decoded"
            );
            Ok(join_all(
                members
                    .into_iter()
                    .map(|(rank, member)| deck::run(ctx, member, rank, sink)),
            )
            .await)
        }
        Err(e) => Err(e),
    };

    if let Err(e) = page.close().await {
        warn!(error = %e, event_id, "failed to close event page");
    }

    outcomes
}

/// Top ranks that qualify for deck harvesting, by participant count.
fn rank_cutoff(player_count: u32) -> u32 {
    match player_count {
        0..=7 => 1,
        8..=16 => 4,
        _ => 8,
    }
}

/// Members of the unnamed ranking group whose rank beats the cutoff, in
/// ascending rank order.
fn qualifying_members(mut body: EventDetailBody, cutoff: u32) -> Vec<(u32, TeamMember)> {
    body.grouped_rankings
        .remove("")
        .unwrap_or_default()
        .into_values()
        .filter(|ranking| ranking.rank <= cutoff)
        .sorted_by_key(|ranking| ranking.rank)
        .flat_map(|ranking| {
            let rank = ranking.rank;
            ranking
                .team_member
                .into_iter()
                .map(move |member| (rank, member))
        })
        .collect()
}

fn count(outcomes: &[DeckOutcome], which: DeckOutcome) -> usize {
    outcomes.iter().filter(|o| **o == which).count()
}
