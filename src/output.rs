use std::fs::File;
use std::path::Path;

use tracing::{debug, error, info};

use crate::error::{NaviError, Result};
use crate::model::DeckRecord;

const DEBUG_FILE: &str = "debug_decks.json";
const POST_FILE: &str = "post_decks.json";

/// Where one run's records end up.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    /// Write `debug_decks.json` instead of delivering remotely.
    pub debug: bool,
    /// Also dump the delivery body to `post_decks.json`.
    pub dump_post_body: bool,
    /// Endpoint receiving the records as a JSON array.
    pub post_url: Option<String>,
}

/// Deliver one run's records according to `options`.
///
/// Remote delivery with no endpoint configured is an error; debug runs skip
/// delivery entirely.
pub async fn deliver(records: &[DeckRecord], options: &OutputOptions) -> Result<()> {
    if options.dump_post_body {
        write_json(Path::new(POST_FILE), records)?;
        info!(file = POST_FILE, count = records.len(), "wrote delivery body");
    }
    if options.debug {
        write_json(Path::new(DEBUG_FILE), records)?;
        info!(
            file = DEBUG_FILE,
            count = records.len(),
            "debug run, skipping remote delivery"
        );
        return Ok(());
    }
    let url = options.post_url.as_deref().ok_or(NaviError::MissingPostUrl)?;
    post_records(url, records).await
}

fn write_json(path: &Path, records: &[DeckRecord]) -> Result<()> {
    let file = File::create(path).map_err(|e| NaviError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::to_writer_pretty(file, records).map_err(NaviError::Serialize)
}

async fn post_records(url: &str, records: &[DeckRecord]) -> Result<()> {
    debug!(url, count = records.len(), "posting records");
    let response = reqwest::Client::new()
        .post(url)
        .json(records)
        .send()
        .await
        .map_err(|e| NaviError::Http {
            url: url.to_owned(),
            source: e,
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(%status, body = %body, "delivery endpoint rejected the records");
        return Err(NaviError::UnexpectedStatus {
            url: url.to_owned(),
            status,
        });
    }
    info!(count = records.len(), "records delivered");
    Ok(())
}
