//! Stroke relay server.
//!
//! Hosts the `/ws/draw` broadcast relay that keeps every participant's
//! canvas in sync, plus the stateless cleanup endpoint and the diagram
//! REST endpoints backed by a [`DiagramStore`](sketchwire_core::diagram::DiagramStore).

pub mod cleanup;
pub mod connection;
pub mod diagrams;
pub mod fanout;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod server;
pub mod state;

pub use server::{router, serve, start_relay};
pub use state::RelayState;
