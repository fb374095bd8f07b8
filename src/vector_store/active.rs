//! The index currently serving queries.

use super::FlatIndex;
use crate::error::{PulsError, Result};
use std::sync::{Arc, RwLock};
use tracing::info;

/// Shared cell holding the serving index.
///
/// Readers clone the `Arc` and keep using the index they got even if a
/// rebuild installs another one meanwhile. A rebuild constructs its index
/// in isolation and calls [`ActiveIndex::install`]; the lock is held only
/// for the pointer swap.
#[derive(Default)]
pub struct ActiveIndex {
    slot: RwLock<Option<Arc<FlatIndex>>>,
}

impl ActiveIndex {
    /// An empty cell; queries fail with `NotBuilt` until an index is installed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_index(index: FlatIndex) -> Self {
        Self {
            slot: RwLock::new(Some(Arc::new(index))),
        }
    }

    /// The serving index, if any.
    pub fn current(&self) -> Result<Option<Arc<FlatIndex>>> {
        let slot = self
            .slot
            .read()
            .map_err(|e| PulsError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
        Ok(slot.clone())
    }

    /// The serving index, or `NotBuilt`.
    pub fn get(&self) -> Result<Arc<FlatIndex>> {
        self.current()?.ok_or(PulsError::NotBuilt)
    }

    /// Swap in a new index, returning the one it replaces.
    pub fn install(&self, index: FlatIndex) -> Result<Option<Arc<FlatIndex>>> {
        let index = Arc::new(index);
        let mut slot = self
            .slot
            .write()
            .map_err(|e| PulsError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
        let previous = slot.replace(index);
        drop(slot);

        info!("Installed new active index");
        Ok(previous)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.current(), Ok(Some(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{Chunk, ChunkMetadata};
    use crate::embedding::{Embedder, HashingEmbedder};
    use crate::vector_store::VectorIndex;

    fn chunks(prefix: &str, n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| {
                Chunk::from_document(
                    format!("{} événement numéro {}", prefix, i),
                    ChunkMetadata {
                        event_id: format!("{}-{}", prefix, i),
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    async fn index(prefix: &str, n: usize) -> FlatIndex {
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(64));
        let index = FlatIndex::new(embedder);
        index.build(chunks(prefix, n)).await.unwrap();
        index
    }

    #[tokio::test]
    async fn test_empty_cell() {
        let active = ActiveIndex::empty();
        assert!(!active.is_loaded());
        assert!(matches!(active.get(), Err(PulsError::NotBuilt)));
    }

    #[tokio::test]
    async fn test_install_returns_previous() {
        let active = ActiveIndex::with_index(index("ancien", 2).await);
        let held = active.get().unwrap();

        let previous = active.install(index("nouveau", 3).await).unwrap();
        assert_eq!(previous.unwrap().len().unwrap(), 2);
        assert_eq!(held.len().unwrap(), 2);
        assert_eq!(active.get().unwrap().len().unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_searches_during_swap_see_one_corpus() {
        let active = Arc::new(ActiveIndex::with_index(index("ancien", 20).await));

        let mut readers = Vec::new();
        for _ in 0..8 {
            let active = Arc::clone(&active);
            readers.push(tokio::spawn(async move {
                for _ in 0..25 {
                    let index = active.get().unwrap();
                    let results = index.search("événement numéro", 50, None, None).await.unwrap();
                    let old = results.iter().filter(|r| r.document.text.starts_with("ancien")).count();
                    let new = results.iter().filter(|r| r.document.text.starts_with("nouveau")).count();
                    assert!(old == 0 || new == 0, "mixed corpora in one search");
                    assert!(old == 20 || new == 30, "partially populated index");
                    tokio::task::yield_now().await;
                }
            }));
        }

        let replacement = index("nouveau", 30).await;
        active.install(replacement).unwrap();

        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(active.get().unwrap().len().unwrap(), 30);
    }
}
