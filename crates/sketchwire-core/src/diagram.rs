//! Diagram model: persisted snapshots of a canvas, and the store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SketchError};
use crate::stroke::Stroke;

/// A saved diagram. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    pub id: u64,
    pub owner: String,
    pub title: String,
    #[serde(default)]
    pub strokes: Vec<Stroke>,
    #[serde(default)]
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
}

/// Listing entry, a diagram without its strokes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramSummary {
    pub id: u64,
    pub title: String,
    pub owner: String,
    #[serde(default)]
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Diagram> for DiagramSummary {
    fn from(d: &Diagram) -> Self {
        Self {
            id: d.id,
            title: d.title.clone(),
            owner: d.owner.clone(),
            is_shared: d.is_shared,
            created_at: d.created_at,
        }
    }
}

/// Payload for creating a diagram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDiagram {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub strokes: Vec<Stroke>,
    #[serde(default)]
    pub is_shared: bool,
}

impl NewDiagram {
    /// Owner and title are required; surrounding whitespace does not count.
    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() || self.title.trim().is_empty() {
            return Err(SketchError::InvalidDiagram(
                "Owner and title are required".into(),
            ));
        }
        Ok(())
    }
}

/// Identity returned after a successful create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedDiagram {
    pub id: u64,
    #[serde(default)]
    pub message: String,
}

/// Persistence contract for diagrams.
#[async_trait]
pub trait DiagramStore: Send + Sync {
    /// Persist a new diagram and return its id.
    async fn create(&self, diagram: NewDiagram) -> Result<u64>;

    /// Diagrams owned by `owner`, newest first.
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<DiagramSummary>>;

    /// Shared diagrams of every owner, newest first.
    async fn list_shared(&self) -> Result<Vec<DiagramSummary>>;

    /// Full diagram, or `None` if no such id.
    async fn get(&self, id: u64) -> Result<Option<Diagram>>;
}

/// Newest first; ties resolved by higher id.
pub(crate) fn sort_newest_first(summaries: &mut [DiagramSummary]) {
    summaries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
