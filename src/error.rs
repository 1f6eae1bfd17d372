use std::time::Duration;

/// All errors that can occur while harvesting tournament results.
#[derive(thiserror::Error, Debug)]
pub enum NaviError {
    /// The DevTools websocket connection could not be established.
    #[error("failed to connect to devtools at {url}: {source}")]
    Connect {
        url: String,
        source: tokio_tungstenite::tungstenite::Error,
    },

    /// The DevTools connection dropped while work was still in flight.
    #[error("devtools connection closed")]
    TransportClosed,

    /// The browser rejected a protocol command.
    #[error("devtools command {method} failed with code {code}: {message}")]
    Command {
        method: String,
        code: i64,
        message: String,
    },

    /// The browser answered a command without a field the protocol requires.
    #[error("malformed devtools reply: {context}")]
    Protocol { context: &'static str },

    /// The browser refused to navigate the page.
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// The page never rendered the element that signals it is ready.
    #[error("timed out after {timeout:?} waiting for {selector:?}")]
    ReadyTimeout { selector: String, timeout: Duration },

    /// The intercepted endpoint produced no finished response in time.
    #[error("no response from {endpoint} before the deadline")]
    ResponseTimeout { endpoint: &'static str },

    /// A matched response carried a non-JSON content type.
    #[error("expected a JSON response, got {mime_type:?}")]
    NotJson { mime_type: Option<String> },

    /// A matched response finished but its body could not be retrieved.
    #[error("response body unavailable: {reason}")]
    BodyUnavailable { reason: String },

    /// A response body did not decode into the expected payload shape.
    #[error("failed to decode intercepted payload: {0}")]
    Decode(serde_json::Error),

    /// A second interceptor was requested for the same page.
    #[error("page already has an interceptor attached")]
    InterceptorTaken,

    /// A page budget semaphore was closed underneath a waiting stage.
    #[error("page budget unavailable: {0}")]
    Limiter(#[from] tokio::sync::AcquireError),

    /// HTTP request failed (network, DNS, TLS, timeout, etc.).
    #[error("http request failed for {url}: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    /// Server returned a non-success HTTP status code.
    #[error("unexpected status {status} for {url}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// Remote delivery was requested without a configured endpoint.
    #[error("no delivery endpoint configured, set --post-url or GAS_POST_URL")]
    MissingPostUrl,

    /// Writing a result artifact to disk failed.
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// The final records could not be serialized.
    #[error("failed to serialize records: {0}")]
    Serialize(serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NaviError>;
