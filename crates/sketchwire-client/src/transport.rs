//! WebSocket transport to the relay.
//!
//! `connect` spawns a reader and a writer task. Outbound frames go through an
//! unbounded channel (fire-and-forget); inbound frames and lifecycle changes
//! come back as [`TransportEvent`]s.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};

/// Something that happened on the relay connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// An inbound text frame.
    Message(String),
    /// A transport error. The connection may still be usable.
    Error(String),
    /// The connection is gone. Sent exactly once, last.
    Closed,
}

/// Handle to a live relay connection.
pub struct Transport {
    outbound: mpsc::UnboundedSender<String>,
    tasks: Vec<JoinHandle<()>>,
}

impl Transport {
    /// Wrap a bare outbound channel. Used for in-process transports.
    pub fn from_sender(outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            outbound,
            tasks: Vec::new(),
        }
    }

    /// Queue a text frame. Fails only if the writer has stopped.
    pub fn send(&self, frame: String) -> Result<()> {
        self.outbound
            .send(frame)
            .map_err(|_| ClientError::Transport("connection writer stopped".into()))
    }

    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Open a relay connection.
pub async fn connect(url: &str) -> Result<(Transport, mpsc::UnboundedReceiver<TransportEvent>)> {
    let (ws, _) = connect_async(url).await?;
    info!(url, "Connected to relay");

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let writer_events = event_tx.clone();
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                warn!(%e, "Relay send failed");
                let _ = writer_events.send(TransportEvent::Error(e.to_string()));
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let reader = tokio::spawn(async move {
        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if event_tx.send(TransportEvent::Message(text.to_string())).is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Relay closed the connection");
                    break;
                }
                Err(e) => {
                    let _ = event_tx.send(TransportEvent::Error(e.to_string()));
                    break;
                }
                _ => {}
            }
        }
        let _ = event_tx.send(TransportEvent::Closed);
    });

    Ok((
        Transport {
            outbound: out_tx,
            tasks: vec![writer, reader],
        },
        event_rx,
    ))
}
