//! Core types for sketchwire: the stroke model, the stroke sync wire protocol,
//! diagrams and their stores, the cleanup transform, config, and errors.

pub mod cleanup;
pub mod config;
pub mod diagram;
pub mod diagram_store;
pub mod error;
pub mod protocol;
pub mod stroke;

pub use protocol::{PathKey, StrokeTag, SyncMessage};
pub use stroke::{OpenStroke, Point, Stroke};
