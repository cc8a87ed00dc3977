//! Stroke sync wire protocol.
//!
//! Every message is one self-contained JSON text frame tagged by `type`:
//!
//! ```text
//! {"type": "stroke-start", "x": 10, "y": 10, "stroke_id": "…", "author": "alice"}
//! {"type": "stroke-point", "x": 20, "y": 20, "stroke_id": "…", "author": "alice"}
//! {"type": "stroke-end", "stroke_id": "…", "author": "alice"}
//! {"type": "clear"}
//! ```
//!
//! `stroke_id` and `author` are optional. Frames without them are legacy frames
//! and are applied to a single shared "current path" on the receiver. Unknown
//! `type` values decode to [`SyncMessage::Unknown`] and are ignored.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::stroke::Point;

/// A stroke sync message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncMessage {
    /// Begin a new path at (x, y).
    #[serde(rename = "stroke-start")]
    StrokeStart {
        x: f64,
        y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stroke_id: Option<Uuid>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
    },

    /// Extend the matching open path to (x, y).
    #[serde(rename = "stroke-point")]
    StrokePoint {
        x: f64,
        y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stroke_id: Option<Uuid>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
    },

    /// The author finished the gesture; the path can be committed.
    #[serde(rename = "stroke-end")]
    StrokeEnd {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stroke_id: Option<Uuid>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
    },

    /// Erase every completed and in-progress stroke.
    #[serde(rename = "clear")]
    Clear,

    /// Any `type` this build does not know.
    #[serde(other)]
    Unknown,
}

/// Identity attached to every frame of one locally drawn stroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrokeTag {
    pub stroke_id: Uuid,
    pub author: String,
}

impl StrokeTag {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            stroke_id: Uuid::new_v4(),
            author: author.into(),
        }
    }

    pub fn path_key(&self) -> PathKey {
        PathKey::Stroke {
            author: Some(self.author.clone()),
            stroke_id: self.stroke_id,
        }
    }
}

/// Which in-progress path a frame addresses on the receiving side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathKey {
    /// No identity on the frame: the single shared "current path".
    Legacy,
    /// Author known, stroke id missing: one current path per author.
    Author(String),
    /// Fully identified stroke.
    Stroke {
        author: Option<String>,
        stroke_id: Uuid,
    },
}

impl PathKey {
    /// Author named by the key, if any.
    pub fn author(&self) -> Option<&str> {
        match self {
            Self::Legacy => None,
            Self::Author(author) => Some(author),
            Self::Stroke { author, .. } => author.as_deref(),
        }
    }

    fn from_parts(stroke_id: Option<Uuid>, author: Option<&String>) -> Self {
        match (stroke_id, author) {
            (Some(stroke_id), author) => Self::Stroke {
                author: author.cloned(),
                stroke_id,
            },
            (None, Some(author)) => Self::Author(author.clone()),
            (None, None) => Self::Legacy,
        }
    }
}

impl SyncMessage {
    pub fn stroke_start(point: Point, tag: &StrokeTag) -> Self {
        Self::StrokeStart {
            x: point.x,
            y: point.y,
            stroke_id: Some(tag.stroke_id),
            author: Some(tag.author.clone()),
        }
    }

    pub fn stroke_point(point: Point, tag: &StrokeTag) -> Self {
        Self::StrokePoint {
            x: point.x,
            y: point.y,
            stroke_id: Some(tag.stroke_id),
            author: Some(tag.author.clone()),
        }
    }

    pub fn stroke_end(tag: &StrokeTag) -> Self {
        Self::StrokeEnd {
            stroke_id: Some(tag.stroke_id),
            author: Some(tag.author.clone()),
        }
    }

    /// A `stroke-start` without identity, as sent by legacy peers.
    pub fn legacy_start(point: Point) -> Self {
        Self::StrokeStart {
            x: point.x,
            y: point.y,
            stroke_id: None,
            author: None,
        }
    }

    /// A `stroke-point` without identity, as sent by legacy peers.
    pub fn legacy_point(point: Point) -> Self {
        Self::StrokePoint {
            x: point.x,
            y: point.y,
            stroke_id: None,
            author: None,
        }
    }

    /// Wire name of the message kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StrokeStart { .. } => "stroke-start",
            Self::StrokePoint { .. } => "stroke-point",
            Self::StrokeEnd { .. } => "stroke-end",
            Self::Clear => "clear",
            Self::Unknown => "unknown",
        }
    }

    /// Coordinates carried by the message, if any.
    pub fn point(&self) -> Option<Point> {
        match self {
            Self::StrokeStart { x, y, .. } | Self::StrokePoint { x, y, .. } => {
                Some(Point::new(*x, *y))
            }
            _ => None,
        }
    }

    /// Path addressed by a stroke message. `None` for `clear` and unknown kinds.
    pub fn path_key(&self) -> Option<PathKey> {
        match self {
            Self::StrokeStart {
                stroke_id, author, ..
            }
            | Self::StrokePoint {
                stroke_id, author, ..
            }
            | Self::StrokeEnd { stroke_id, author } => {
                Some(PathKey::from_parts(*stroke_id, author.as_ref()))
            }
            Self::Clear | Self::Unknown => None,
        }
    }

    pub fn is_clear(&self) -> bool {
        matches!(self, Self::Clear)
    }

    /// Encode to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        if matches!(self, Self::Unknown) {
            return Err(ProtocolError::UnsendableKind);
        }
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Decode a JSON text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}

/// Protocol encode/decode errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("unknown message kinds cannot be sent")]
    UnsendableKind,
}
