//! Client sync agent.
//!
//! Owns one participant's canvas: applies local gestures and broadcasts them,
//! applies frames relayed from peers, and runs the cleanup and save
//! round-trips. All mutation goes through `&mut self`, so one task owns the
//! agent and events are applied strictly in arrival order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use sketchwire_core::diagram::{CreatedDiagram, DiagramSummary, NewDiagram};
use sketchwire_core::{Point, Stroke, StrokeTag, SyncMessage};

use crate::canvas::{CanvasState, Renderer};
use crate::error::{ClientError, Result};
use crate::gateway::{CleanupGateway, DiagramGateway};
use crate::transport::{Transport, TransportEvent};

/// Relay connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Notifications for whoever observes the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    StatusChanged(ConnectionStatus),
    TransportError(String),
    /// A relayed frame was applied to the canvas.
    RemoteApplied { kind: &'static str },
    /// The canvas was replaced wholesale (diagram load or cleanup).
    CanvasReplaced { strokes: usize },
}

pub struct ClientSyncAgent<R: Renderer> {
    canvas: CanvasState,
    renderer: R,
    /// Anonymous identity used on the wire until a username is set.
    client_id: String,
    username: Option<String>,
    current: Option<StrokeTag>,
    status: ConnectionStatus,
    transport: Option<Transport>,
    cleanup_gateway: Arc<dyn CleanupGateway>,
    diagram_gateway: Arc<dyn DiagramGateway>,
    observer: Option<mpsc::UnboundedSender<ClientEvent>>,
}

impl<R: Renderer> ClientSyncAgent<R> {
    pub fn new(
        renderer: R,
        cleanup_gateway: Arc<dyn CleanupGateway>,
        diagram_gateway: Arc<dyn DiagramGateway>,
    ) -> Self {
        Self {
            canvas: CanvasState::new(),
            renderer,
            client_id: Uuid::new_v4().to_string(),
            username: None,
            current: None,
            status: ConnectionStatus::Disconnected,
            transport: None,
            cleanup_gateway,
            diagram_gateway,
            observer: None,
        }
    }

    /// Subscribe to agent events. Replaces any previous subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ClientEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observer = Some(tx);
        rx
    }

    pub fn canvas(&self) -> &CanvasState {
        &self.canvas
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Set the active user. Surrounding whitespace is dropped; an empty name
    /// clears the active user.
    pub fn set_username(&mut self, name: &str) {
        let name = name.trim();
        self.username = (!name.is_empty()).then(|| name.to_string());
        info!(username = ?self.username, "Active user changed");
    }

    /// Identity stamped on outgoing strokes.
    pub fn author(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.client_id)
    }

    // --- connection lifecycle ---

    /// Mark a connection attempt as in flight.
    pub fn set_connecting(&mut self) {
        self.set_status(ConnectionStatus::Connecting);
    }

    /// Take ownership of a live transport; the agent is now connected.
    pub fn attach(&mut self, transport: Transport) {
        self.transport = Some(transport);
        self.set_status(ConnectionStatus::Connected);
    }

    /// Report a failed connection attempt.
    pub fn connect_failed(&mut self, err: &ClientError) {
        self.notify(ClientEvent::TransportError(err.to_string()));
        self.set_status(ConnectionStatus::Disconnected);
    }

    /// Apply one event from the transport.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(text) => self.apply_remote_frame(&text),
            TransportEvent::Error(e) => {
                warn!(error = %e, "Relay transport error");
                self.notify(ClientEvent::TransportError(e));
            }
            TransportEvent::Closed => {
                if self.canvas.abandon_local() {
                    debug!("Local stroke abandoned on disconnect");
                }
                self.current = None;
                self.drop_transport();
            }
        }
    }

    fn drop_transport(&mut self) {
        self.transport = None;
        self.set_status(ConnectionStatus::Disconnected);
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status != status {
            info!(?status, "Relay connection status");
            self.status = status;
            self.notify(ClientEvent::StatusChanged(status));
        }
    }

    fn notify(&self, event: ClientEvent) {
        if let Some(observer) = &self.observer {
            let _ = observer.send(event);
        }
    }

    /// Broadcast when connected; otherwise the change stays local.
    fn emit(&mut self, msg: SyncMessage) {
        let Some(transport) = &self.transport else {
            debug!(kind = msg.kind(), "Not connected; not broadcasting");
            return;
        };
        let frame = match msg.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode frame");
                return;
            }
        };
        if let Err(e) = transport.send(frame) {
            self.notify(ClientEvent::TransportError(e.to_string()));
            self.drop_transport();
        }
    }

    // --- local authoring ---

    /// Gesture start. An unfinished local stroke is finished first.
    pub fn begin_stroke(&mut self, at: Point) {
        if self.canvas.is_drawing() {
            self.end_stroke();
        }
        let tag = StrokeTag::new(self.author());
        self.canvas.begin_local(at, &mut self.renderer);
        self.emit(SyncMessage::stroke_start(at, &tag));
        self.current = Some(tag);
    }

    /// Gesture move. No-op when no stroke is open.
    pub fn extend_stroke(&mut self, to: Point) {
        if !self.canvas.extend_local(to, &mut self.renderer) {
            return;
        }
        if let Some(tag) = self.current.clone() {
            self.emit(SyncMessage::stroke_point(to, &tag));
        }
    }

    /// Gesture end. No-op when no stroke is open.
    pub fn end_stroke(&mut self) {
        if !self.canvas.finish_local() {
            return;
        }
        if let Some(tag) = self.current.take() {
            self.emit(SyncMessage::stroke_end(&tag));
        }
    }

    /// Erase the canvas here and on every peer.
    pub fn clear(&mut self) {
        self.canvas.clear(&mut self.renderer);
        self.current = None;
        self.emit(SyncMessage::Clear);
    }

    // --- remote application ---

    /// Decode and apply one relayed frame. Malformed frames are dropped.
    pub fn apply_remote_frame(&mut self, text: &str) {
        match SyncMessage::decode(text) {
            Ok(msg) => self.apply_remote(msg),
            Err(e) => warn!(error = %e, "Dropping malformed frame"),
        }
    }

    /// Apply a peer's message. Never re-broadcast.
    pub fn apply_remote(&mut self, msg: SyncMessage) {
        let kind = msg.kind();
        match &msg {
            SyncMessage::StrokeStart { x, y, .. } => {
                if let Some(key) = msg.path_key() {
                    self.canvas
                        .remote_start(key, Point::new(*x, *y), &mut self.renderer);
                }
            }
            SyncMessage::StrokePoint { x, y, .. } => {
                if let Some(key) = msg.path_key() {
                    self.canvas
                        .remote_point(key, Point::new(*x, *y), &mut self.renderer);
                }
            }
            SyncMessage::StrokeEnd { .. } => {
                if let Some(key) = msg.path_key() {
                    self.canvas.remote_end(&key);
                }
            }
            SyncMessage::Clear => {
                self.canvas.clear(&mut self.renderer);
                self.current = None;
            }
            SyncMessage::Unknown => {
                debug!("Ignoring unknown message type");
                return;
            }
        }
        self.notify(ClientEvent::RemoteApplied { kind });
    }

    // --- whole-canvas operations ---

    /// Replace the canvas with `strokes` and redraw. Local only.
    pub fn load_diagram(&mut self, strokes: Vec<Stroke>) {
        let count = strokes.len();
        self.canvas.load(strokes, &mut self.renderer);
        self.current = None;
        self.notify(ClientEvent::CanvasReplaced { strokes: count });
    }

    /// Send the visible strokes, including peers' open paths, through the
    /// cleanup gateway and replace the canvas with the result. On failure the
    /// canvas is untouched.
    pub async fn cleanup(&mut self) -> Result<()> {
        let snapshot = self.canvas.snapshot();
        if snapshot.is_empty() {
            return Err(ClientError::Precondition("Draw something first!".into()));
        }

        let cleaned = self.cleanup_gateway.cleanup(snapshot).await?;
        info!(strokes = cleaned.len(), "Cleanup applied");
        self.load_diagram(cleaned);
        Ok(())
    }

    /// Save the visible strokes as a diagram owned by the active user.
    pub async fn save(&mut self, title: &str, is_shared: bool) -> Result<CreatedDiagram> {
        let Some(owner) = self.username.clone() else {
            return Err(ClientError::Precondition(
                "Set a username before saving".into(),
            ));
        };
        let title = title.trim();
        if title.is_empty() {
            return Err(ClientError::Precondition("A title is required".into()));
        }

        let created = self
            .diagram_gateway
            .create(NewDiagram {
                owner,
                title: title.to_string(),
                strokes: self.canvas.snapshot(),
                is_shared,
            })
            .await?;
        info!(id = created.id, "Diagram saved");
        Ok(created)
    }

    /// The active user's diagrams; empty when no user is set.
    pub async fn list_mine(&self) -> Result<Vec<DiagramSummary>> {
        match &self.username {
            Some(owner) => self.diagram_gateway.list_by_owner(owner).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn list_shared(&self) -> Result<Vec<DiagramSummary>> {
        self.diagram_gateway.list_shared().await
    }

    /// Fetch a diagram and load it onto the canvas.
    pub async fn open_diagram(&mut self, id: u64) -> Result<()> {
        let diagram = self.diagram_gateway.fetch(id).await?;
        info!(id, title = %diagram.title, "Opening diagram");
        self.load_diagram(diagram.strokes);
        Ok(())
    }
}
