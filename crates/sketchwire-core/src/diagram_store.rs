//! Diagram store implementations: JSON files on disk, or process memory.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::diagram::{sort_newest_first, Diagram, DiagramStore, DiagramSummary, NewDiagram};
use crate::error::{Result, SketchError};

/// File-based diagram store.
///
/// Layout:
/// - `<base>/index.json`: array of `DiagramSummary`
/// - `<base>/diagrams/<id>.json`: one full `Diagram` per file
pub struct JsonDiagramStore {
    base: PathBuf,
    /// Serializes id allocation and index rewrites.
    write_lock: Mutex<()>,
}

impl JsonDiagramStore {
    pub fn new(base: PathBuf) -> Self {
        Self {
            base,
            write_lock: Mutex::new(()),
        }
    }

    fn index_path(&self) -> PathBuf {
        self.base.join("index.json")
    }

    fn diagram_dir(&self) -> PathBuf {
        self.base.join("diagrams")
    }

    fn diagram_path(&self, id: u64) -> PathBuf {
        self.diagram_dir().join(format!("{id}.json"))
    }

    async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(self.diagram_dir()).await?;
        Ok(())
    }

    async fn load_index(&self) -> Result<Vec<DiagramSummary>> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(&path).await?;
        let index: Vec<DiagramSummary> = serde_json::from_str(&data)
            .map_err(|e| SketchError::Store(format!("corrupt diagram index: {e}")))?;
        Ok(index)
    }

    async fn write_atomic(&self, path: PathBuf, data: String) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl DiagramStore for JsonDiagramStore {
    async fn create(&self, new: NewDiagram) -> Result<u64> {
        new.validate()?;
        let _guard = self.write_lock.lock().await;
        self.ensure_dirs().await?;

        let mut index = self.load_index().await?;
        let id = index.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        let diagram = Diagram {
            id,
            owner: new.owner,
            title: new.title,
            strokes: new.strokes,
            is_shared: new.is_shared,
            created_at: chrono::Utc::now(),
        };

        // Body first, so the index never points at a missing file.
        self.write_atomic(self.diagram_path(id), serde_json::to_string(&diagram)?)
            .await?;
        index.push(DiagramSummary::from(&diagram));
        self.write_atomic(self.index_path(), serde_json::to_string_pretty(&index)?)
            .await?;

        debug!(id, owner = %diagram.owner, strokes = diagram.strokes.len(), "Saved diagram");
        Ok(id)
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<DiagramSummary>> {
        let mut list: Vec<_> = self
            .load_index()
            .await?
            .into_iter()
            .filter(|s| s.owner == owner)
            .collect();
        sort_newest_first(&mut list);
        Ok(list)
    }

    async fn list_shared(&self) -> Result<Vec<DiagramSummary>> {
        let mut list: Vec<_> = self
            .load_index()
            .await?
            .into_iter()
            .filter(|s| s.is_shared)
            .collect();
        sort_newest_first(&mut list);
        Ok(list)
    }

    async fn get(&self, id: u64) -> Result<Option<Diagram>> {
        let path = self.diagram_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(&path).await?;
        let diagram: Diagram = serde_json::from_str(&data)
            .map_err(|e| SketchError::Store(format!("corrupt diagram {id}: {e}")))?;
        Ok(Some(diagram))
    }
}

/// In-memory diagram store. Contents vanish with the process.
#[derive(Default)]
pub struct MemoryDiagramStore {
    diagrams: RwLock<Vec<Diagram>>,
}

impl MemoryDiagramStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn summaries(diagrams: &[Diagram], keep: impl Fn(&Diagram) -> bool) -> Vec<DiagramSummary> {
        let mut list: Vec<_> = diagrams
            .iter()
            .filter(|d| keep(d))
            .map(DiagramSummary::from)
            .collect();
        sort_newest_first(&mut list);
        list
    }
}

#[async_trait]
impl DiagramStore for MemoryDiagramStore {
    async fn create(&self, new: NewDiagram) -> Result<u64> {
        new.validate()?;
        let mut diagrams = self.diagrams.write().await;
        let id = diagrams.len() as u64 + 1;
        diagrams.push(Diagram {
            id,
            owner: new.owner,
            title: new.title,
            strokes: new.strokes,
            is_shared: new.is_shared,
            created_at: chrono::Utc::now(),
        });
        Ok(id)
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<DiagramSummary>> {
        let diagrams = self.diagrams.read().await;
        Ok(Self::summaries(&diagrams, |d| d.owner == owner))
    }

    async fn list_shared(&self) -> Result<Vec<DiagramSummary>> {
        let diagrams = self.diagrams.read().await;
        Ok(Self::summaries(&diagrams, |d| d.is_shared))
    }

    async fn get(&self, id: u64) -> Result<Option<Diagram>> {
        let diagrams = self.diagrams.read().await;
        Ok(diagrams.iter().find(|d| d.id == id).cloned())
    }
}
