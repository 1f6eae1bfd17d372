//! An in-process DevTools endpoint for pipeline tests.
//!
//! Speaks just enough of the protocol for the scraper: targets, sessions,
//! navigation, selector polling and network events. Each navigation replays
//! the script matching the URL, so tests control readiness and API bodies
//! per attempt without a browser.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

/// Ready-poll threshold that never triggers, pinning an attempt to a
/// selector timeout.
pub const NEVER_READY: u32 = u32::MAX;

/// Scripted behavior for pages whose navigation URL contains `url_contains`.
pub struct PageScript {
    pub url_contains: String,
    /// Polls answered `false` before the ready marker appears, indexed by
    /// navigation attempt (the last entry repeats).
    pub ready_after_polls: Vec<u32>,
    pub api: Option<ApiScript>,
}

impl PageScript {
    /// Page that is ready on the first poll and replays `api` on every
    /// navigation.
    pub fn new(url_contains: impl Into<String>, api: ApiScript) -> Self {
        Self {
            url_contains: url_contains.into(),
            ready_after_polls: vec![0],
            api: Some(api),
        }
    }

    /// Page with no scripted API exchange.
    pub fn silent(url_contains: impl Into<String>) -> Self {
        Self {
            url_contains: url_contains.into(),
            ready_after_polls: vec![0],
            api: None,
        }
    }

    pub fn ready_after_polls(mut self, per_attempt: Vec<u32>) -> Self {
        self.ready_after_polls = per_attempt;
        self
    }
}

/// One API exchange replayed on every navigation of its page.
pub struct ApiScript {
    pub url: String,
    pub method: &'static str,
    /// Response per navigation attempt (the last entry repeats).
    pub bodies: Vec<ScriptedBody>,
    /// Non-matching requests emitted before the real one.
    pub noise: Vec<NoiseRequest>,
}

impl ApiScript {
    pub fn get(url: impl Into<String>, bodies: Vec<ScriptedBody>) -> Self {
        Self {
            url: url.into(),
            method: "GET",
            bodies,
            noise: vec![],
        }
    }

    pub fn post(url: impl Into<String>, bodies: Vec<ScriptedBody>) -> Self {
        Self {
            url: url.into(),
            method: "POST",
            bodies,
            noise: vec![],
        }
    }

    pub fn noise(
        mut self,
        url: impl Into<String>,
        method: &'static str,
        body: ScriptedBody,
    ) -> Self {
        self.noise.push(NoiseRequest {
            url: url.into(),
            method,
            body,
        });
        self
    }
}

/// How one scripted request plays out on the wire.
#[derive(Clone)]
pub enum ScriptedBody {
    /// Finishes as application/json with this body.
    Json(String),
    /// Finishes as text/html with this body, failing the JSON gate.
    Html(String),
    /// Aborts with Network.loadingFailed and this error text.
    Aborted(&'static str),
}

impl ScriptedBody {
    pub fn json(value: Value) -> Self {
        Self::Json(value.to_string())
    }
}

pub struct NoiseRequest {
    pub url: String,
    pub method: &'static str,
    pub body: ScriptedBody,
}

#[derive(Default)]
struct SessionState {
    script: Option<usize>,
    attempt: usize,
    polls: u32,
}

struct ServerState {
    scripts: Vec<PageScript>,
    nav_counts: Vec<AtomicUsize>,
    navigations: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    sessions: Mutex<HashMap<String, SessionState>>,
    bodies: Mutex<HashMap<String, String>>,
}

pub struct FakeChrome {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl FakeChrome {
    pub async fn start(scripts: Vec<PageScript>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let nav_counts = scripts.iter().map(|_| AtomicUsize::new(0)).collect();
        let state = Arc::new(ServerState {
            scripts,
            nav_counts,
            navigations: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            sessions: Mutex::new(HashMap::new()),
            bodies: Mutex::new(HashMap::new()),
        });
        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&accept_state)));
            }
        });
        Self { addr, state }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/devtools/browser/test", self.addr)
    }

    /// Navigation attempts made against the script matching `url_contains`.
    pub fn navigations(&self, url_contains: &str) -> usize {
        self.state
            .scripts
            .iter()
            .position(|script| script.url_contains == url_contains)
            .map(|index| self.state.nav_counts[index].load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Every URL any page navigated to, in order.
    pub fn all_navigations(&self) -> Vec<String> {
        self.state.navigations.lock().unwrap().clone()
    }
}

async fn serve(stream: TcpStream, state: Arc<ServerState>) {
    let mut ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(_) => return,
    };
    while let Some(Ok(frame)) = ws.next().await {
        let Message::Text(text) = frame else { continue };
        let Ok(command) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        for reply in handle(&state, &command) {
            if ws.send(Message::Text(reply.to_string())).await.is_err() {
                return;
            }
        }
    }
}

fn handle(state: &ServerState, command: &Value) -> Vec<Value> {
    let Some(id) = command.get("id").and_then(Value::as_u64) else {
        return vec![];
    };
    let method = command
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let params = command.get("params").cloned().unwrap_or(Value::Null);
    let session_id = command
        .get("sessionId")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match method {
        "Target.createTarget" => {
            let n = state.next_id.fetch_add(1, Ordering::Relaxed);
            vec![reply(id, json!({ "targetId": format!("target-{n}") }))]
        }
        "Target.attachToTarget" => {
            let target = params
                .get("targetId")
                .and_then(Value::as_str)
                .unwrap_or("target-0");
            let session = format!("session-{}", target.trim_start_matches("target-"));
            state
                .sessions
                .lock()
                .unwrap()
                .insert(session.clone(), SessionState::default());
            vec![reply(id, json!({ "sessionId": session }))]
        }
        "Page.navigate" => {
            let url = params.get("url").and_then(Value::as_str).unwrap_or_default();
            state.navigations.lock().unwrap().push(url.to_owned());
            let mut frames = vec![reply(id, json!({ "frameId": "frame-0" }))];
            if let Some(index) = state
                .scripts
                .iter()
                .position(|script| url.contains(&script.url_contains))
            {
                let attempt = state.nav_counts[index].fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(session) = state.sessions.lock().unwrap().get_mut(session_id) {
                    session.script = Some(index);
                    session.attempt = attempt;
                    session.polls = 0;
                }
                push_navigation_traffic(state, &mut frames, session_id, url, index, attempt);
            }
            frames
        }
        "Runtime.evaluate" => {
            let ready = {
                let mut sessions = state.sessions.lock().unwrap();
                match sessions.get_mut(session_id) {
                    Some(session) => {
                        let threshold = session
                            .script
                            .map(|index| {
                                per_attempt(&state.scripts[index].ready_after_polls, session.attempt)
                            })
                            .unwrap_or(0);
                        let ready = threshold != NEVER_READY && session.polls >= threshold;
                        session.polls += 1;
                        ready
                    }
                    None => true,
                }
            };
            vec![reply(id, json!({ "result": { "type": "boolean", "value": ready } }))]
        }
        "Network.getResponseBody" => {
            let request_id = params
                .get("requestId")
                .and_then(Value::as_str)
                .unwrap_or_default();
            match state.bodies.lock().unwrap().get(request_id) {
                Some(body) => vec![reply(id, json!({ "body": body, "base64Encoded": false }))],
                None => vec![json!({
                    "id": id,
                    "error": { "code": -32000, "message": "No resource with given identifier was found" }
                })],
            }
        }
        _ => vec![reply(id, json!({}))],
    }
}

fn push_navigation_traffic(
    state: &ServerState,
    frames: &mut Vec<Value>,
    session: &str,
    page_url: &str,
    script_index: usize,
    attempt: usize,
) {
    let script = &state.scripts[script_index];
    // The navigation's own document request. Interceptors must never match
    // it, even when the page URL contains the endpoint path.
    push_request(
        state,
        frames,
        session,
        page_url,
        "GET",
        "Document",
        &ScriptedBody::Html("<html></html>".to_owned()),
    );
    if let Some(api) = &script.api {
        for noise in &api.noise {
            push_request(state, frames, session, &noise.url, noise.method, "XHR", &noise.body);
        }
        let body = api
            .bodies
            .get(attempt.saturating_sub(1))
            .or_else(|| api.bodies.last())
            .expect("api script needs at least one body");
        push_request(state, frames, session, &api.url, api.method, "XHR", body);
    }
}

fn push_request(
    state: &ServerState,
    frames: &mut Vec<Value>,
    session: &str,
    url: &str,
    method: &str,
    resource_type: &str,
    body: &ScriptedBody,
) {
    let request_id = format!("request-{}", state.next_id.fetch_add(1, Ordering::Relaxed));
    frames.push(event(
        session,
        "Network.requestWillBeSent",
        json!({
            "requestId": request_id,
            "type": resource_type,
            "request": { "url": url, "method": method },
        }),
    ));
    let (mime, text) = match body {
        ScriptedBody::Json(text) => ("application/json", text.as_str()),
        ScriptedBody::Html(text) => ("text/html", text.as_str()),
        ScriptedBody::Aborted(reason) => {
            frames.push(event(
                session,
                "Network.loadingFailed",
                json!({ "requestId": request_id, "errorText": reason }),
            ));
            return;
        }
    };
    state
        .bodies
        .lock()
        .unwrap()
        .insert(request_id.clone(), text.to_owned());
    frames.push(event(
        session,
        "Network.responseReceived",
        json!({
            "requestId": request_id,
            "type": resource_type,
            "response": { "url": url, "status": 200, "mimeType": mime },
        }),
    ));
    frames.push(event(
        session,
        "Network.loadingFinished",
        json!({ "requestId": request_id }),
    ));
}

fn reply(id: u64, result: Value) -> Value {
    json!({ "id": id, "result": result })
}

fn event(session: &str, method: &str, params: Value) -> Value {
    json!({ "method": method, "params": params, "sessionId": session })
}

fn per_attempt(values: &[u32], attempt: usize) -> u32 {
    values
        .get(attempt.saturating_sub(1))
        .or_else(|| values.last())
        .copied()
        .unwrap_or(0)
}
