//! The `/ws` upgrade handler: one JSON-RPC peer per connection (§6).
//!
//! A select-loop shape (forward bus events to the client, parse and
//! dispatch commands from the client), generalized here to multiplex *N*
//! sessions' notification buses (a connection may `startSession` more than
//! once) onto one outbound writer task instead of a single fixed bus.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::rpc::{Dispatcher, JsonRpcRequest, ServerNotification};

pub async fn ws_handler(ws: WebSocketUpgrade, State(dispatcher): State<Arc<Dispatcher>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, dispatcher))
}

async fn handle_socket(mut socket: WebSocket, dispatcher: Arc<Dispatcher>) {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let mut subscribed: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                match frame {
                    Some(text) => {
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_inbound(&text, &dispatcher, &outbound_tx, &mut subscribed).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
}

async fn handle_inbound(
    raw: &str,
    dispatcher: &Arc<Dispatcher>,
    outbound_tx: &mpsc::UnboundedSender<String>,
    subscribed: &mut HashSet<String>,
) {
    let request: JsonRpcRequest = match serde_json::from_str(raw) {
        Ok(r) => r,
        Err(e) => {
            let error = json!({
                "jsonrpc": "2.0",
                "id": Value::Null,
                "error": {"code": crate::error::rpc_code::PARSE_ERROR, "message": e.to_string()},
            });
            let _ = outbound_tx.send(error.to_string());
            return;
        }
    };
    let response = dispatcher.dispatch(request).await;

    if let Some(result) = &response.result
        && let Some(session_id) = result.get("sessionId").and_then(Value::as_str)
        && subscribed.insert(session_id.to_string())
        && let Ok(handle) = dispatcher.sessions().find(session_id)
    {
        spawn_notification_forwarder(handle, outbound_tx.clone());
    }

    if let Ok(text) = serde_json::to_string(&response) {
        let _ = outbound_tx.send(text);
    }
}

/// Forward every notification a session's bus publishes as a JSON-RPC
/// notification frame (no `id`) until the bus closes.
fn spawn_notification_forwarder(
    handle: Arc<crate::session::SessionHandle>,
    outbound_tx: mpsc::UnboundedSender<String>,
) {
    tokio::spawn(async move {
        let mut rx = handle.subscribe().await;
        loop {
            match rx.recv().await {
                Ok(notification) => {
                    if !forward_notification(&outbound_tx, &notification) {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn forward_notification(outbound_tx: &mpsc::UnboundedSender<String>, notification: &ServerNotification) -> bool {
    let Ok(params) = serde_json::to_value(notification) else { return true };
    let frame = json!({"jsonrpc": "2.0", "method": "notification", "params": params});
    let Ok(text) = serde_json::to_string(&frame) else { return true };
    outbound_tx.send(text).is_ok()
}
