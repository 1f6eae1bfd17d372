use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bushinavi_scraper::{output, Browser, NaviClient, OutputOptions, ReportWindow};

#[derive(Parser)]
#[command(name = "bushinavi-scraper")]
#[command(version)]
#[command(about = "Harvest last week's Bushi Navi tournament decks through a headless Chrome")]
struct Cli {
    /// DevTools websocket URL. Discovered from --devtools when omitted
    #[arg(long, value_name = "URL")]
    ws_url: Option<String>,

    /// DevTools HTTP endpoint of a Chrome started with --remote-debugging-port
    #[arg(long, default_value = "127.0.0.1:9222", value_name = "HOST:PORT")]
    devtools: String,

    /// Write debug_decks.json and skip remote delivery
    #[arg(long)]
    debug: bool,

    /// Also dump the delivery body to post_decks.json
    #[arg(long)]
    output_post_json: bool,

    /// Delivery endpoint. Falls back to the GAS_POST_URL environment variable
    #[arg(long, value_name = "URL")]
    post_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("bushinavi_scraper={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ws_url = match cli.ws_url {
        Some(url) => url,
        None => Browser::discover(&cli.devtools)
            .await
            .with_context(|| format!("no devtools endpoint at {}", cli.devtools))?,
    };
    let browser = Browser::connect(&ws_url).await?;
    let client = NaviClient::new(browser);

    let window = ReportWindow::previous_week_in(&chrono_tz::Asia::Tokyo);
    info!(start = %window.start, end = %window.end, "harvesting report window");

    let records = client.collect_decks(&window).await?;
    info!(count = records.len(), "collected deck records");

    let options = OutputOptions {
        debug: cli.debug,
        dump_post_body: cli.output_post_json,
        post_url: cli.post_url.or_else(|| std::env::var("GAS_POST_URL").ok()),
    };
    output::deliver(&records, &options).await?;

    Ok(())
}
