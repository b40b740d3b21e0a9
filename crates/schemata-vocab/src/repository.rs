//! Process-wide vocabulary handle.
//!
//! [`VocabularyRepository`] hands out `Arc` snapshots of the current graph.
//! A reload builds a complete new graph before swapping the handle, so
//! readers never observe a partial vocabulary. Reloads are serialized by a
//! try-lock gate: a second reload started while one is running is rejected
//! with [`Error::ReloadInProgress`].

use crate::graph::VocabularyGraph;
use crate::loader::{VocabularySource, load_vocabulary};
use schemata_core::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, TryLockError};

/// Shared, swappable vocabulary.
#[derive(Debug, Default)]
pub struct VocabularyRepository {
    current: RwLock<Arc<VocabularyGraph>>,
    reload_gate: Mutex<()>,
    generation: AtomicU64,
}

impl VocabularyRepository {
    /// Repository holding an already-built graph.
    pub fn new(graph: VocabularyGraph) -> Self {
        Self {
            current: RwLock::new(Arc::new(graph)),
            reload_gate: Mutex::new(()),
            generation: AtomicU64::new(1),
        }
    }

    /// Repository loaded from a catalog source.
    pub fn load(source: &VocabularySource) -> Result<Self> {
        Ok(Self::new(load_vocabulary(source)?))
    }

    /// Snapshot of the current vocabulary.
    pub fn current(&self) -> Arc<VocabularyGraph> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of successful loads so far (0 for an empty repository).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Reload from a catalog source.
    pub fn reload(&self, source: &VocabularySource) -> Result<Arc<VocabularyGraph>> {
        self.reload_with(|| load_vocabulary(source))
    }

    /// Reload using an arbitrary graph producer.
    ///
    /// The producer runs while the reload gate is held. On error the
    /// previous snapshot stays current.
    pub fn reload_with<F>(&self, build: F) -> Result<Arc<VocabularyGraph>>
    where
        F: FnOnce() -> Result<VocabularyGraph>,
    {
        let _gate = match self.reload_gate.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                log::warn!("vocabulary reload rejected: another reload is running");
                return Err(Error::ReloadInProgress);
            }
        };

        let graph = match build() {
            Ok(graph) => Arc::new(graph),
            Err(e) => {
                log::error!("vocabulary reload failed, keeping previous snapshot: {e}");
                return Err(e);
            }
        };

        self.swap(graph.clone());
        Ok(graph)
    }

    /// Replace the current vocabulary outright.
    pub fn replace(&self, graph: VocabularyGraph) -> Arc<VocabularyGraph> {
        let graph = Arc::new(graph);
        self.swap(graph.clone());
        graph
    }

    fn swap(&self, graph: Arc<VocabularyGraph>) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        log::info!(
            "vocabulary generation {generation}: {} types, {} properties",
            graph.type_count(),
            graph.property_count()
        );
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = graph;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::VocabularyBuilder;
    use crate::types::VocabularyType;
    use std::sync::mpsc;
    use std::thread;

    fn graph_with(ids: &[&str]) -> VocabularyGraph {
        let mut builder = VocabularyBuilder::new();
        for id in ids {
            builder.add_type(VocabularyType::new(*id));
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_default_is_empty() {
        let repo = VocabularyRepository::default();
        assert_eq!(repo.current().type_count(), 0);
        assert_eq!(repo.generation(), 0);
    }

    #[test]
    fn test_reload_swaps_snapshot() {
        let repo = VocabularyRepository::new(graph_with(&["Thing"]));
        let before = repo.current();

        repo.reload_with(|| Ok(graph_with(&["Thing", "Event"])))
            .unwrap();

        assert_eq!(before.type_count(), 1);
        assert_eq!(repo.current().type_count(), 2);
        assert_eq!(repo.generation(), 2);
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let repo = VocabularyRepository::new(graph_with(&["Thing"]));
        let err = repo
            .reload_with(|| Err(Error::vocabulary("bad catalog")))
            .unwrap_err();
        assert!(matches!(err, Error::VocabularyLoad(_)));
        assert_eq!(repo.current().type_count(), 1);
        assert_eq!(repo.generation(), 1);
    }

    #[test]
    fn test_reload_from_inline_source() {
        let repo = VocabularyRepository::default();
        let source = VocabularySource::inline("id,label\nThing,Thing\n", "id,label\n");
        repo.reload(&source).unwrap();
        assert!(repo.current().get_type("Thing").is_some());
    }

    #[test]
    fn test_concurrent_reload_rejected() {
        let repo = Arc::new(VocabularyRepository::new(graph_with(&["Thing"])));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let worker = {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                repo.reload_with(|| {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok(graph_with(&["Thing", "Place"]))
                })
            })
        };

        started_rx.recv().unwrap();
        let second = repo.reload_with(|| Ok(graph_with(&["Other"])));
        assert!(matches!(second, Err(Error::ReloadInProgress)));

        release_tx.send(()).unwrap();
        worker.join().unwrap().unwrap();
        assert_eq!(repo.current().type_count(), 2);
        assert!(repo.current().get_type("Place").is_some());
    }

    #[test]
    fn test_reader_keeps_old_snapshot_across_swap() {
        let repo = VocabularyRepository::new(graph_with(&["Thing"]));
        let held = repo.current();
        repo.replace(graph_with(&["A", "B", "C"]));
        assert!(held.get_type("Thing").is_some());
        assert_eq!(repo.current().type_count(), 3);
    }
}
