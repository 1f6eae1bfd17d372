pub use cdp::{Browser, HttpMethod, Page, ResponseInterceptor};
pub use client::NaviClient;
pub use config::ScrapeConfig;
pub use error::{NaviError, Result};
pub use model::{Card, DeckRecord};
pub use output::OutputOptions;
pub use window::ReportWindow;

pub mod cdp;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub(crate) mod scraper;
pub(crate) mod sink;
pub mod window;
