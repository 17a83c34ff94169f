//! WebSocket notification channel.
//!
//! One room per user: the connection authenticates, subscribes to the
//! caller's notification room, and streams `{"event", "data"}` messages
//! until either side closes. Delivery is best-effort; clients poll
//! `queue/me` as the authoritative view.
//!
//! Browsers cannot set headers on a WebSocket handshake, so the token is
//! accepted both as `Authorization: Bearer <token>` and as a `?token=`
//! query parameter.

use crate::api::ApiError;
use crate::server::state::AppState;
use crate::types::UserId;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Keep-alive ping cadence.
const PING_INTERVAL_SECS: u64 = 30;

/// Optional query-string auth for browser clients.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    /// Access token, alternative to the Authorization header.
    pub token: Option<String>,
}

/// `GET /ws`: upgrade into the caller's notification room.
pub async fn notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = bearer_or_query_token(&headers, query.token.as_deref())
        .ok_or_else(|| ApiError::unauthorized("Missing access token"))?;

    let token = Uuid::parse_str(&token)
        .map_err(|_| ApiError::unauthorized("Invalid access token format"))?;

    let session = state.sessions.validate(token).await.map_err(ApiError::from)?;
    let user_id = session.user_id;
    let hub = Arc::clone(&state.hub);

    info!(user_id = %user_id, "WebSocket connection authenticated");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, hub, user_id)))
}

fn bearer_or_query_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .or_else(|| query_token.map(str::to_string))
        .filter(|token| !token.is_empty())
}

async fn handle_socket(
    socket: WebSocket,
    hub: Arc<crate::notify::NotificationHub>,
    user_id: UserId,
) {
    let (mut sender, mut receiver) = socket.split();
    let mut room = hub.subscribe(user_id);
    let mut ping = tokio::time::interval(std::time::Duration::from_secs(PING_INTERVAL_SECS));
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            notification = room.recv() => {
                match notification {
                    Ok(notification) => {
                        let message = match serde_json::to_string(&notification) {
                            Ok(json) => Message::Text(json),
                            Err(e) => {
                                warn!(error = %e, "Failed to serialize notification");
                                continue;
                            }
                        };
                        if sender.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Best-effort channel: the client resyncs by polling.
                        debug!(user_id = %user_id, skipped, "Notification receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(payload))) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        // The channel is server-push only.
                    }
                    Some(Err(e)) => {
                        debug!(user_id = %user_id, error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    info!(user_id = %user_id, "WebSocket connection closed");
}
