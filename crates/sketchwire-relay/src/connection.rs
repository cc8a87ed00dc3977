//! WebSocket connection lifecycle: join, read loop, leave.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures::{FutureExt, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::fanout;
use crate::state::RelayState;

/// How long the writer gets to flush queued frames and the close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Handle one drawing participant.
///
/// Every text frame is relayed as-is to all other participants; the relay
/// never inspects or acknowledges frames on this path.
pub async fn handle_ws_connection(state: Arc<RelayState>, ws: WebSocket) {
    let conn_id = Uuid::new_v4().to_string();

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Utf8Bytes>();

    let replayed = fanout::join(&state, &conn_id, frame_tx).await;
    info!(conn_id = %conn_id, replayed, "Participant joined");

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            if ws_tx.send(Message::Text(frame)).await.is_err() {
                return;
            }
        }
        // The registry entry is gone.
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    let mut shutdown = state.shutdown_watch();
    loop {
        tokio::select! {
            msg_result = ws_rx.next() => match msg_result {
                Some(Ok(Message::Text(text))) => {
                    fanout::relay_frame(&state, &conn_id, text).await;
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(conn_id = %conn_id, len = data.len(), "Ignoring binary frame");
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!(conn_id = %conn_id, "Client closed the connection");
                    break;
                }
                Some(Err(e)) => {
                    error!(conn_id = %conn_id, %e, "WebSocket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
            _ = shutdown.wait_for(|stop| *stop).map(|_| ()) => {
                debug!(conn_id = %conn_id, "Relay stopping");
                break;
            }
        }
    }

    // Leaving drops the registry's sender, which lets the writer finish.
    fanout::leave(&state, &conn_id).await;
    if tokio::time::timeout(CLOSE_GRACE, &mut send_task).await.is_err() {
        send_task.abort();
    }
    info!(conn_id = %conn_id, "Participant left");
}
