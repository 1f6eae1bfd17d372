use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::cdp::CdpEvent;
use crate::error::{NaviError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reply to a single protocol command.
enum CommandReply {
    Result(Value),
    Error { code: i64, message: String },
}

struct CdpShared {
    next_id: AtomicU64,
    /// Commands awaiting their reply, keyed by command id.
    pending: DashMap<u64, oneshot::Sender<CommandReply>>,
    /// Event subscribers, keyed by session id.
    sessions: DashMap<String, mpsc::UnboundedSender<CdpEvent>>,
    outgoing: mpsc::UnboundedSender<Message>,
}

/// Low-level DevTools protocol connection.
///
/// One websocket carries every command and event for the whole browser;
/// replies are correlated by command id and events are routed to the page
/// session they belong to.
#[derive(Clone)]
pub(crate) struct CdpClient {
    shared: Arc<CdpShared>,
}

impl CdpClient {
    pub(crate) async fn connect(ws_url: &str) -> Result<Self> {
        let (stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| NaviError::Connect {
                url: ws_url.to_owned(),
                source: e,
            })?;
        debug!(url = ws_url, "devtools connected");

        let (sink, source) = stream.split();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(CdpShared {
            next_id: AtomicU64::new(1),
            pending: DashMap::new(),
            sessions: DashMap::new(),
            outgoing,
        });

        tokio::spawn(write_loop(sink, outgoing_rx));
        tokio::spawn(read_loop(source, Arc::clone(&shared)));

        Ok(Self { shared })
    }

    /// Send one command and wait for its reply, optionally scoped to a page
    /// session.
    pub(crate) async fn command(
        &self,
        session_id: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let mut frame = json!({ "id": id, "method": method, "params": params });
        if let Some(session_id) = session_id {
            frame["sessionId"] = Value::String(session_id.to_owned());
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.shared.pending.insert(id, reply_tx);
        if self
            .shared
            .outgoing
            .send(Message::Text(frame.to_string()))
            .is_err()
        {
            self.shared.pending.remove(&id);
            return Err(NaviError::TransportClosed);
        }

        match reply_rx.await {
            Ok(CommandReply::Result(result)) => Ok(result),
            Ok(CommandReply::Error { code, message }) => Err(NaviError::Command {
                method: method.to_owned(),
                code,
                message,
            }),
            Err(_) => Err(NaviError::TransportClosed),
        }
    }

    /// Subscribe to the events of one page session.
    pub(crate) fn register_session(&self, session_id: &str) -> mpsc::UnboundedReceiver<CdpEvent> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.shared.sessions.insert(session_id.to_owned(), event_tx);
        event_rx
    }

    pub(crate) fn unregister_session(&self, session_id: &str) {
        self.shared.sessions.remove(session_id);
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(frame) = outgoing.recv().await {
        if let Err(e) = sink.send(frame).await {
            warn!(error = %e, "devtools send failed, stopping writer");
            break;
        }
    }
}

async fn read_loop(mut source: SplitStream<WsStream>, shared: Arc<CdpShared>) {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<Value>(&text) {
                Ok(value) => dispatch(&shared, value),
                Err(e) => warn!(error = %e, "dropping undecodable devtools frame"),
            },
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    debug!("devtools connection closed");
    // Waking every pending command and subscriber with a closed channel
    // turns the lost connection into TransportClosed at each call site.
    shared.pending.clear();
    shared.sessions.clear();
}

fn dispatch(shared: &CdpShared, frame: Value) {
    // Frames with an id answer a command; the rest are events.
    if let Some(id) = frame.get("id").and_then(Value::as_u64) {
        let reply = match frame.get("error") {
            Some(error) => CommandReply::Error {
                code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
            },
            None => CommandReply::Result(frame.get("result").cloned().unwrap_or(Value::Null)),
        };
        if let Some((_, reply_tx)) = shared.pending.remove(&id) {
            let _ = reply_tx.send(reply);
        }
        return;
    }

    let Some(method) = frame.get("method").and_then(Value::as_str) else {
        return;
    };
    let event = CdpEvent {
        method: method.to_owned(),
        params: frame.get("params").cloned().unwrap_or(Value::Null),
    };
    match frame.get("sessionId").and_then(Value::as_str) {
        Some(session_id) => {
            if let Some(subscriber) = shared.sessions.get(session_id) {
                let _ = subscriber.send(event);
            }
        }
        None => trace!(method = %event.method, "ignoring browser-level event"),
    }
}
