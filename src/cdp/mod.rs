mod browser;
pub(crate) mod client;
mod intercept;

pub use browser::{Browser, Page};
pub use intercept::ResponseInterceptor;

use serde_json::Value;

/// HTTP method filter for response interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::AsRefStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

/// A protocol event addressed to one page session.
#[derive(Debug, Clone)]
pub(crate) struct CdpEvent {
    pub(crate) method: String,
    pub(crate) params: Value,
}
