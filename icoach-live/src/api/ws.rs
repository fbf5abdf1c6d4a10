//! Live interview WebSocket
//!
//! `GET /ws/interview?candidate_id=...` upgrades to the interview protocol.
//! Outbound events are queued on a bounded channel and written by a separate
//! task, so a slow client never blocks the session's receive loop mid-message.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use icoach_common::events::ServerEvent;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::session::SessionConnection;
use crate::AppState;

/// Outbound events buffered per session
const OUTBOUND_QUEUE: usize = 64;

#[derive(Debug, Default, Deserialize)]
pub struct InterviewQuery {
    pub candidate_id: Option<String>,
}

/// GET /ws/interview
pub async fn interview_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<InterviewQuery>,
) -> Response {
    let candidate_id = query.candidate_id.filter(|id| !id.trim().is_empty());
    ws.on_upgrade(move |socket| handle_socket(socket, state, candidate_id))
}

async fn load_resume(state: &AppState, candidate_id: Option<&str>) -> Option<String> {
    let candidate_id = candidate_id?;
    match state.services.store.get_candidate(candidate_id).await {
        Ok(Some(candidate)) => Some(candidate.resume_text),
        Ok(None) => {
            warn!(candidate_id, "Unknown candidate, interviewing without résumé");
            None
        }
        Err(e) => {
            warn!(candidate_id, "Candidate lookup failed, interviewing without résumé: {}", e);
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, candidate_id: Option<String>) {
    let (mut ws_tx, ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerEvent>(OUTBOUND_QUEUE);

    let writer = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    error!(event = event.kind(), "Failed to serialize event: {}", e);
                    continue;
                }
            };
            if ws_tx.send(Message::Text(payload)).await.is_err() {
                debug!("Client went away, stopping writer");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let resume_text = load_resume(&state, candidate_id.as_deref()).await;
    match SessionConnection::accept(state.services.clone(), candidate_id, resume_text, out_tx).await {
        Ok((connection, cancel)) => connection.run(ws_rx, cancel).await,
        Err(e) => warn!("Session not started: {}", e),
    }

    let _ = writer.await;
}

pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws/interview", get(interview_upgrade))
}
