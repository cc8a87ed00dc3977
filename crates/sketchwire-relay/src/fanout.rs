//! Frame fan-out to every connected peer, plus late-joiner replay.

use std::sync::atomic::Ordering;

use axum::extract::ws::Utf8Bytes;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use sketchwire_core::SyncMessage;

use crate::state::{ConnectionState, RelayLog, RelayState};

/// Result of relaying one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    pub seq: u64,
    pub delivered: usize,
    pub pruned: usize,
}

/// Register a connection so it receives subsequent frames.
///
/// With replay enabled, every frame since the last `clear` is queued to the
/// new connection first. Both happen under the sequencer lock, so no frame
/// can be missed or duplicated between the replay and live traffic.
/// Returns the number of replayed frames.
pub async fn join(
    state: &RelayState,
    conn_id: &str,
    frame_tx: mpsc::UnboundedSender<Utf8Bytes>,
) -> usize {
    let log = state.log.lock().await;

    let mut replayed = 0;
    if log.replay_enabled {
        for frame in &log.history {
            if frame_tx.send(frame.clone()).is_err() {
                break;
            }
            replayed += 1;
        }
    }

    state.connections.write().await.insert(
        conn_id.to_string(),
        ConnectionState {
            conn_id: conn_id.to_string(),
            frame_tx,
            joined_at: Utc::now(),
        },
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_connect();

    replayed
}

/// Remove a connection. Safe to call more than once; returns whether this
/// call removed it.
pub async fn leave(state: &RelayState, conn_id: &str) -> bool {
    let removed = state.connections.write().await.remove(conn_id);
    match removed {
        Some(conn) => {
            forget(&conn, "Connection left relay");
            true
        }
        None => false,
    }
}

/// Bookkeeping for a connection that just left the registry, whichever way.
fn forget(conn: &ConnectionState, why: &str) {
    let connected_secs = (Utc::now() - conn.joined_at).num_seconds();
    debug!(conn_id = %conn.conn_id, connected_secs, "{why}");

    #[cfg(feature = "metrics")]
    crate::metrics::record_disconnect();
}

/// Relay one inbound frame, unmodified, to every connection except `from`.
///
/// Connections whose outbound channel is gone are pruned; they never stop
/// delivery to the rest.
pub async fn relay_frame(state: &RelayState, from: &str, frame: Utf8Bytes) -> RelayOutcome {
    let mut log = state.log.lock().await;
    log.seq += 1;
    let seq = log.seq;

    if log.replay_enabled {
        record_history(&mut log, &frame);
    }

    let mut delivered = 0;
    let mut failed = Vec::new();
    {
        let connections = state.connections.read().await;
        for conn in connections.values() {
            if conn.conn_id == from {
                continue;
            }
            if conn.frame_tx.send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                failed.push(conn.conn_id.clone());
            }
        }
    }

    if !failed.is_empty() {
        let mut connections = state.connections.write().await;
        for conn_id in &failed {
            if let Some(conn) = connections.remove(conn_id) {
                forget(&conn, "Pruned dead peer");
            }
        }
        state
            .deliveries_dropped
            .fetch_add(failed.len() as u64, Ordering::Relaxed);
    }
    drop(log);

    state.frames_relayed.fetch_add(1, Ordering::Relaxed);

    #[cfg(feature = "metrics")]
    crate::metrics::record_relay(delivered, failed.len());

    debug!(seq, from, delivered, pruned = failed.len(), "Relayed frame");
    RelayOutcome {
        seq,
        delivered,
        pruned: failed.len(),
    }
}

/// A `clear` empties the history; everything else is appended.
/// Frames that do not parse are still kept, receivers ignore them anyway.
/// The history is bounded both in frames and in bytes.
fn record_history(log: &mut RelayLog, frame: &Utf8Bytes) {
    if matches!(SyncMessage::decode(frame.as_str()), Ok(SyncMessage::Clear)) {
        log.history.clear();
        log.history_bytes = 0;
        return;
    }

    let len = frame.len();
    if log.max_history == 0 || len > log.max_history_bytes {
        return;
    }
    while log.history.len() >= log.max_history
        || log.history_bytes + len > log.max_history_bytes
    {
        let Some(oldest) = log.history.pop_front() else {
            break;
        };
        log.history_bytes -= oldest.len();
        log.trimmed += 1;
        if log.trimmed == 1 {
            warn!(
                max_frames = log.max_history,
                max_bytes = log.max_history_bytes,
                "Replay history full; oldest frames are being dropped"
            );
        }
    }
    log.history_bytes += len;
    log.history.push_back(frame.clone());
}
