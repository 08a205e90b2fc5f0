//! WebSocket streaming of committed star changes.
//!
//! Connect to `/api/v1/ws/stars` to receive every committed update as JSON.
//! Each socket owns one store subscription, released when the socket closes.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use starbazaar_store::{Delivery, Star, StarFilter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::node::StarState;

/// Heartbeat period.
const HEARTBEAT: Duration = Duration::from_secs(30);

/// WebSocket message types.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StarEvent {
    /// A row was updated
    Change { previous: Star, current: Star },
    /// Notifications were dropped; the client should reload
    Lagged { missed: u64 },
    /// Heartbeat to keep connection alive
    Heartbeat { timestamp: i64 },
}

impl From<Delivery> for StarEvent {
    fn from(delivery: Delivery) -> Self {
        match delivery {
            Delivery::Change(event) => StarEvent::Change {
                previous: event.previous,
                current: event.current,
            },
            Delivery::Lagged(missed) => StarEvent::Lagged { missed },
        }
    }
}

/// WebSocket handler for star updates
pub async fn ws_stars_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<StarState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_star_socket(socket, state))
}

async fn handle_star_socket(socket: WebSocket, state: Arc<StarState>) {
    info!("WebSocket client connected for star updates");

    let mut subscription = state.store.subscribe_changes(StarFilter::all());
    let (mut sender, mut receiver) = socket.split();
    let mut heartbeat = tokio::time::interval(HEARTBEAT);

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Received from client: {}", text);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            warn!("Failed to send pong: {}", e);
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            delivery = subscription.next() => {
                let Some(delivery) = delivery else {
                    info!("Change feed closed");
                    break;
                };
                if let Err(e) = send_event(&mut sender, delivery.into()).await {
                    warn!("Failed to send change: {}", e);
                    break;
                }
            }
            _ = heartbeat.tick() => {
                let event = StarEvent::Heartbeat {
                    timestamp: chrono::Utc::now().timestamp(),
                };
                if let Err(e) = send_event(&mut sender, event).await {
                    warn!("Failed to send heartbeat: {}", e);
                    break;
                }
            }
        }
    }
    // subscription dropped here
}

async fn send_event<S>(sender: &mut S, event: StarEvent) -> Result<(), axum::Error>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(&event).map_err(axum::Error::new)?;
    sender.send(Message::Text(json)).await
}
