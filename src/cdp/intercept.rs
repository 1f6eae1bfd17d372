use std::collections::HashMap;

use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::cdp::client::CdpClient;
use crate::cdp::{CdpEvent, HttpMethod};
use crate::error::{NaviError, Result};

/// Loading state of one matched request.
struct PendingRequest {
    mime_type: Option<String>,
}

/// Watches one page's network traffic for responses of an internal API call
/// and decodes their JSON bodies.
///
/// Created before navigation and bound to a single page session, so a
/// response can never be attributed to an earlier navigation attempt. The
/// interceptor never navigates or closes its page.
pub struct ResponseInterceptor {
    cdp: CdpClient,
    session_id: String,
    url_fragment: String,
    method: HttpMethod,
    events: mpsc::UnboundedReceiver<CdpEvent>,
    matched: HashMap<String, PendingRequest>,
}

impl ResponseInterceptor {
    pub(crate) fn new(
        cdp: CdpClient,
        session_id: String,
        url_fragment: String,
        method: HttpMethod,
        events: mpsc::UnboundedReceiver<CdpEvent>,
    ) -> Self {
        Self {
            cdp,
            session_id,
            url_fragment,
            method,
            events,
            matched: HashMap::new(),
        }
    }

    /// Wait for the next matching response to finish loading and decode its
    /// body as `T`.
    ///
    /// A matched response with a non-JSON content type, an unretrievable
    /// body or an undecodable payload is an error; the caller decides
    /// whether that ends the stage or triggers another attempt.
    pub async fn next<T: DeserializeOwned>(&mut self) -> Result<T> {
        loop {
            let event = self.events.recv().await.ok_or(NaviError::TransportClosed)?;
            match event.method.as_str() {
                "Network.requestWillBeSent" => self.on_request(&event.params),
                "Network.responseReceived" => self.on_response(&event.params),
                "Network.loadingFailed" => {
                    let request_id = request_id_of(&event.params);
                    if self.matched.remove(request_id).is_some() {
                        let reason = event
                            .params
                            .get("errorText")
                            .and_then(Value::as_str)
                            .unwrap_or("loading failed")
                            .to_owned();
                        warn!(request_id, reason = %reason, "matched request failed to load");
                        return Err(NaviError::BodyUnavailable { reason });
                    }
                }
                "Network.loadingFinished" => {
                    let request_id = request_id_of(&event.params).to_owned();
                    if let Some(pending) = self.matched.remove(&request_id) {
                        trace!(request_id = %request_id, "matched response finished");
                        return self.decode_body(&request_id, pending.mime_type).await;
                    }
                }
                _ => {}
            }
        }
    }

    fn on_request(&mut self, params: &Value) {
        // The navigation itself can hit the intercepted path (the listing
        // page URL contains the listing endpoint); only api-style requests
        // count, never the document.
        if params.get("type").and_then(Value::as_str) == Some("Document") {
            return;
        }
        let url = params
            .pointer("/request/url")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let method = params
            .pointer("/request/method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !url.contains(&self.url_fragment) || !method.eq_ignore_ascii_case(self.method.as_ref()) {
            return;
        }
        let request_id = request_id_of(params);
        if request_id.is_empty() {
            return;
        }
        trace!(request_id, url, "matched api request");
        self.matched
            .insert(request_id.to_owned(), PendingRequest { mime_type: None });
    }

    fn on_response(&mut self, params: &Value) {
        if let Some(pending) = self.matched.get_mut(request_id_of(params)) {
            pending.mime_type = params
                .pointer("/response/mimeType")
                .and_then(Value::as_str)
                .map(str::to_owned);
        }
    }

    async fn decode_body<T: DeserializeOwned>(
        &self,
        request_id: &str,
        mime_type: Option<String>,
    ) -> Result<T> {
        match mime_type.as_deref() {
            Some(mime) if mime.contains("json") => {}
            _ => return Err(NaviError::NotJson { mime_type }),
        }

        let result = self
            .cdp
            .command(
                Some(&self.session_id),
                "Network.getResponseBody",
                json!({ "requestId": request_id }),
            )
            .await?;
        let raw = result.get("body").and_then(Value::as_str).unwrap_or_default();
        let body = if result
            .get("base64Encoded")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(raw)
                .map_err(|e| NaviError::BodyUnavailable {
                    reason: e.to_string(),
                })?;
            String::from_utf8_lossy(&bytes).into_owned()
        } else {
            raw.to_owned()
        };

        serde_json::from_str(&body).map_err(NaviError::Decode)
    }
}

fn request_id_of(params: &Value) -> &str {
    params
        .get("requestId")
        .and_then(Value::as_str)
        .unwrap_or_default()
}
