//! Client side of sketchwire.
//!
//! The [`ClientSyncAgent`] keeps a participant's canvas in sync with the
//! relay. It is transport- and renderer-agnostic: frames arrive as
//! [`TransportEvent`]s, drawing goes through a [`Renderer`], and the cleanup
//! and diagram round-trips go through gateway traits.

pub mod agent;
pub mod canvas;
pub mod error;
pub mod gateway;
pub mod reconnect;
pub mod transport;

pub use agent::{ClientEvent, ClientSyncAgent, ConnectionStatus};
pub use canvas::{CanvasState, RecordingRenderer, Renderer, TracingRenderer};
pub use error::ClientError;
pub use gateway::{CleanupGateway, DiagramGateway, HttpGateway};
pub use reconnect::{connect_with_backoff, ReconnectPolicy};
pub use transport::{Transport, TransportEvent};
