use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::api::rest::extract::ApiPath;
use crate::error::AppError;
use crate::models::public::PublicTrackingEvent;
use crate::models::tracking::TrackingUpdate;
use crate::state::AppState;

/// Live feed of public tracking events for one tracking number.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ApiPath(tracking_number): ApiPath<String>,
) -> Result<impl IntoResponse, AppError> {
    let tracking_number = tracking_number.trim().to_string();
    state.registry.find_by_tracking_number(&tracking_number)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, tracking_number)))
}

/// Public JSON frame for `update` if it belongs to the watched parcel.
fn public_frame(watched: &str, update: &TrackingUpdate) -> Option<String> {
    if update.tracking_number != watched {
        return None;
    }

    match serde_json::to_string(&PublicTrackingEvent::from(&update.event)) {
        Ok(json) => Some(json),
        Err(err) => {
            warn!(error = %err, "failed to serialize tracking event for ws");
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, tracking_number: String) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.tracking_events_tx.subscribe();

    info!(tracking_number = %tracking_number, "websocket client connected");

    let watched = tracking_number.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let update = match rx.recv().await {
                Ok(update) => update,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(tracking_number = %watched, skipped, "websocket client lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let Some(json) = public_frame(&watched, &update) else {
                continue;
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(tracking_number = %tracking_number, "websocket client disconnected");
}
