use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};
use tracing::debug;

use crate::cdp::client::CdpClient;
use crate::cdp::intercept::ResponseInterceptor;
use crate::cdp::{CdpEvent, HttpMethod};
use crate::error::{NaviError, Result};

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// A running Chromium instance reached over the DevTools protocol.
///
/// The tool never launches or kills the browser process; it attaches to one
/// started elsewhere with `--remote-debugging-port`.
#[derive(Clone)]
pub struct Browser {
    cdp: CdpClient,
}

impl Browser {
    /// Connect to a DevTools websocket URL.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let cdp = CdpClient::connect(ws_url).await?;
        Ok(Self { cdp })
    }

    /// Ask a DevTools HTTP endpoint (`host:port`) for its websocket URL.
    pub async fn discover(devtools_addr: &str) -> Result<String> {
        let url = format!("http://{devtools_addr}/json/version");
        let response = reqwest::get(&url).await.map_err(|e| NaviError::Http {
            url: url.clone(),
            source: e,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(NaviError::UnexpectedStatus { url, status });
        }
        let info: VersionInfo = response.json().await.map_err(|e| NaviError::Http {
            url: url.clone(),
            source: e,
        })?;
        Ok(info.web_socket_debugger_url)
    }

    /// Open a new page, attach to it and enable network tracking.
    pub async fn new_page(&self) -> Result<Page> {
        let created = self
            .cdp
            .command(None, "Target.createTarget", json!({ "url": "about:blank" }))
            .await?;
        let target_id = created
            .get("targetId")
            .and_then(Value::as_str)
            .ok_or(NaviError::Protocol {
                context: "Target.createTarget returned no targetId",
            })?
            .to_owned();

        let attached = self
            .cdp
            .command(
                None,
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session_id = attached
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or(NaviError::Protocol {
                context: "Target.attachToTarget returned no sessionId",
            })?
            .to_owned();

        // Subscribe before Network.enable so no event can slip past.
        let events = self.cdp.register_session(&session_id);
        self.cdp
            .command(Some(&session_id), "Network.enable", json!({}))
            .await?;

        debug!(%target_id, %session_id, "page opened");
        Ok(Page {
            cdp: self.cdp.clone(),
            target_id,
            session_id,
            events: Some(events),
        })
    }
}

/// One browser tab, owned by the stage attempt that opened it.
pub struct Page {
    cdp: CdpClient,
    target_id: String,
    session_id: String,
    events: Option<mpsc::UnboundedReceiver<CdpEvent>>,
}

impl Page {
    /// Turn the page's network event stream into a response interceptor.
    ///
    /// A page has exactly one event stream, so this succeeds once; asking
    /// again yields [`NaviError::InterceptorTaken`].
    pub fn interceptor(
        &mut self,
        url_fragment: &str,
        method: HttpMethod,
    ) -> Result<ResponseInterceptor> {
        let events = self.events.take().ok_or(NaviError::InterceptorTaken)?;
        Ok(ResponseInterceptor::new(
            self.cdp.clone(),
            self.session_id.clone(),
            url_fragment.to_owned(),
            method,
            events,
        ))
    }

    /// Start navigating to `url`. Rendering continues in the background;
    /// await readiness with [`Page::wait_for_selector`].
    pub async fn goto(&self, url: &str) -> Result<()> {
        debug!(url, "navigating");
        let result = self
            .cdp
            .command(Some(&self.session_id), "Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(reason) = result.get("errorText").and_then(Value::as_str) {
            if !reason.is_empty() {
                return Err(NaviError::Navigation {
                    url: url.to_owned(),
                    reason: reason.to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Poll until `selector` matches an element, or fail after `limit`.
    pub async fn wait_for_selector(&self, selector: &str, limit: Duration) -> Result<()> {
        timeout(limit, self.poll_selector(selector))
            .await
            .map_err(|_| NaviError::ReadyTimeout {
                selector: selector.to_owned(),
                timeout: limit,
            })?
    }

    async fn poll_selector(&self, selector: &str) -> Result<()> {
        loop {
            if self.selector_exists(selector).await? {
                return Ok(());
            }
            sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn selector_exists(&self, selector: &str) -> Result<bool> {
        let quoted = Value::String(selector.to_owned()).to_string();
        let expression = format!("document.querySelector({quoted}) !== null");
        let result = match self
            .cdp
            .command(
                Some(&self.session_id),
                "Runtime.evaluate",
                json!({ "expression": expression, "returnByValue": true }),
            )
            .await
        {
            Ok(result) => result,
            // Evaluation races the navigation; a rejected command only
            // means the page cannot answer yet.
            Err(NaviError::Command { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        Ok(result
            .pointer("/result/value")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    /// Close the tab. Its event subscription dies with it.
    pub async fn close(self) -> Result<()> {
        self.cdp
            .command(
                None,
                "Target.closeTarget",
                json!({ "targetId": self.target_id }),
            )
            .await?;
        debug!(target_id = %self.target_id, "page closed");
        Ok(())
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        self.cdp.unregister_session(&self.session_id);
    }
}
