//! Relay shared state.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch, Mutex, RwLock};

use sketchwire_core::config::ServerConfig;
use sketchwire_core::diagram::DiagramStore;

/// Shared relay state accessible from all connections and handlers.
pub struct RelayState {
    pub config: ServerConfig,
    pub store: Arc<dyn DiagramStore>,
    pub connections: RwLock<HashMap<String, ConnectionState>>,
    /// Sequencer for fan-out. Held for the whole of one relay so every
    /// receiver observes frames from different senders in the same order.
    pub(crate) log: Mutex<RelayLog>,
    pub frames_relayed: AtomicU64,
    pub deliveries_dropped: AtomicU64,
    pub started_at: DateTime<Utc>,
    /// Flips to `true` once the server stops; open sockets are then closed.
    shutdown: watch::Sender<bool>,
    #[cfg(feature = "metrics")]
    pub metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

/// Per-connection state.
pub struct ConnectionState {
    pub conn_id: String,
    pub frame_tx: mpsc::UnboundedSender<Utf8Bytes>,
    pub joined_at: DateTime<Utc>,
}

/// Relay sequence counter plus the replay history for late joiners.
#[derive(Debug, Default)]
pub(crate) struct RelayLog {
    pub seq: u64,
    pub history: VecDeque<Utf8Bytes>,
    /// Total length of the frames in `history`.
    pub history_bytes: usize,
    pub replay_enabled: bool,
    pub max_history: usize,
    pub max_history_bytes: usize,
    pub trimmed: u64,
}

impl RelayState {
    pub fn new(config: ServerConfig, store: Arc<dyn DiagramStore>) -> Self {
        let log = RelayLog {
            replay_enabled: config.replay_on_join,
            max_history: config.max_replay_frames,
            max_history_bytes: config.max_replay_bytes,
            ..Default::default()
        };

        Self {
            config,
            store,
            connections: RwLock::new(HashMap::new()),
            log: Mutex::new(log),
            frames_relayed: AtomicU64::new(0),
            deliveries_dropped: AtomicU64::new(0),
            started_at: Utc::now(),
            shutdown: watch::Sender::new(false),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Number of frames currently held for late-joiner replay.
    pub async fn replay_len(&self) -> usize {
        self.log.lock().await.history.len()
    }

    pub fn frames_relayed(&self) -> u64 {
        self.frames_relayed.load(Ordering::Relaxed)
    }

    pub fn deliveries_dropped(&self) -> u64 {
        self.deliveries_dropped.load(Ordering::Relaxed)
    }

    /// Ask every open participant socket to close.
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub(crate) fn shutdown_watch(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}
