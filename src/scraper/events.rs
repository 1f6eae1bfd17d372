use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, error, instrument, warn};

use crate::cdp::HttpMethod;
use crate::error::{NaviError, Result};
use crate::model::EventListPayload;
use crate::scraper::{event_detail, StageContext};
use crate::sink::DeckSink;
use crate::window::ReportWindow;

const LIST_ENDPOINT: &str = "/event/result/list";
const LIST_READY_SELECTOR: &str = ".btn-to-detail";

/// Discover the events of the report window and harvest each of them.
///
/// A listing page that never renders its ready marker aborts the run. A
/// listing payload that cannot be decoded ends the run with zero events.
#[instrument(skip(ctx, sink))]
pub(crate) async fn run(
    ctx: &StageContext<'_>,
    window: &ReportWindow,
    sink: &DeckSink,
) -> Result<()> {
    let event_ids = discover_events(ctx, window).await?;
    debug!(count = event_ids.len(), "events in report window");
    join_all(
        event_ids
            .into_iter()
            .map(|event_id| event_detail::run(ctx, event_id, sink)),
    )
    .await;
    Ok(())
}

async fn discover_events(ctx: &StageContext<'_>, window: &ReportWindow) -> Result<Vec<u64>> {
    let url = ctx.config.listing_url(window);
    let mut page = ctx.browser.new_page().await?;
    let mut interceptor = page.interceptor(LIST_ENDPOINT, HttpMethod::Get)?;

    let outcome = async {
        page.goto(&url).await?;
        page.wait_for_selector(LIST_READY_SELECTOR, ctx.config.list_ready_timeout)
            .await?;
        timeout(
            ctx.config.response_timeout,
            interceptor.next::<EventListPayload>(),
        )
        .await
        .map_err(|_| NaviError::ResponseTimeout {
            endpoint: LIST_ENDPOINT,
        })?
    }
    .await;

    if let Err(e) = page.close().await {
        warn!(error = %e, "failed to close listing page");
    }

    match outcome {
        Ok(payload) => Ok(payload
            .success
            .events
            .into_iter()
            .map(|event| event.event_id)
            .collect()),
        Err(
            e @ (NaviError::NotJson { .. }
            | NaviError::Decode(_)
            | NaviError::BodyUnavailable { .. }
            | NaviError::ResponseTimeout { .. }),
        ) => {
            error!(error = %e, "event listing payload unusable, treating as empty");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}
