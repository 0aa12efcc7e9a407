//! Live conversation channel.
//!
//! One socket per (user, conversation). The token travels in the query string
//! because browsers cannot set headers on websocket handshakes.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use super::error::ApiQuery;
use crate::domain::DomainError;
use crate::infrastructure::auth::decode_jwt;
use crate::infrastructure::AppState;
use crate::services::messaging_service;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SocketQuery {
    pub token: Option<String>,
}

/// Frames a client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientFrame {
    #[serde(rename = "typing")]
    Typing {
        #[serde(rename = "isTyping", default)]
        is_typing: bool,
    },
    #[serde(rename = "markRead")]
    MarkRead,
    #[serde(rename = "ping")]
    Ping,
}

pub async fn connect(
    State(state): State<AppState>,
    Path(conversation_id): Path<i32>,
    ApiQuery(query): ApiQuery<SocketQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, DomainError> {
    let token = query.token.ok_or(DomainError::Unauthorized)?;
    let claims = decode_jwt(&token).map_err(|e| {
        tracing::debug!("Rejected socket token: {}", e);
        DomainError::Unauthorized
    })?;
    messaging_service::find_for_participant(state.db(), claims.uid, conversation_id).await?;

    let user_id = claims.uid;
    Ok(ws.on_upgrade(move |socket| session(socket, state, conversation_id, user_id)))
}

async fn session(socket: WebSocket, state: AppState, conversation_id: i32, user_id: i32) {
    let mut events = state.hub.subscribe(conversation_id);
    let (mut outgoing, mut incoming) = socket.split();
    tracing::debug!("User {} joined live conversation {}", user_id, conversation_id);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if event.revokes(user_id) {
                        tracing::debug!(
                            "User {} removed from conversation {}, closing socket",
                            user_id,
                            conversation_id
                        );
                        let _ = outgoing.send(Message::Close(None)).await;
                        break;
                    }
                    if event.suppressed_for(user_id) {
                        continue;
                    }
                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if outgoing.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "Live receiver of user {} skipped {} events in conversation {}",
                        user_id,
                        skipped,
                        conversation_id
                    );
                }
                Err(RecvError::Closed) => break,
            },
            frame = incoming.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_frame(&state, conversation_id, user_id, &text).await
                        && outgoing.send(Message::Text(reply)).await.is_err()
                    {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    drop(events);
    state.hub.release(conversation_id);
    tracing::debug!("User {} left live conversation {}", user_id, conversation_id);
}

/// Applies one client frame; returns the direct reply, if any.
async fn handle_frame(
    state: &AppState,
    conversation_id: i32,
    user_id: i32,
    text: &str,
) -> Option<String> {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(_) => {
            return Some(json!({"type": "error", "error": "Unsupported frame"}).to_string());
        }
    };

    match frame {
        ClientFrame::Ping => Some(json!({"type": "pong"}).to_string()),
        ClientFrame::Typing { is_typing } => {
            messaging_service::publish_typing(&state.hub, conversation_id, user_id, is_typing);
            None
        }
        ClientFrame::MarkRead => {
            match messaging_service::mark_read(state.db(), &state.hub, user_id, conversation_id)
                .await
            {
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("Live mark-read failed for user {}: {}", user_id, e);
                    Some(json!({"type": "error", "error": e.to_string()}).to_string())
                }
            }
        }
    }
}
