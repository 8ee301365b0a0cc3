//! Generation-counted snapshot cache for the query engine.
//!
//! Each query invocation wants a cleaned store snapshot, but the
//! presentation layer may poll on every UI tick. The cache holds the
//! last snapshot together with a generation counter: queries reuse the
//! snapshot until [`SnapshotCache::invalidate`] bumps the generation,
//! which forces the next access to re-read the store. "Stale until
//! told otherwise" semantics, without hidden global state.

use std::sync::Arc;

use crate::reading::Reading;

/// Cached store snapshot with explicit invalidation.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    /// The cached cleaned snapshot, if one has been taken.
    snapshot: Option<Arc<Vec<Reading>>>,
    /// Current generation; bumped on every invalidation.
    generation: u64,
    /// Generation the cached snapshot was taken at.
    snapshot_generation: u64,
}

impl SnapshotCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current generation counter.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Invalidates the cached snapshot.
    ///
    /// The snapshot itself is kept until replaced so in-flight clones
    /// stay valid; only the generation moves.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    /// Returns the cached snapshot, or refreshes it via `load` when
    /// the cache is empty or a newer generation was requested.
    ///
    /// The load function runs at most once per generation.
    pub fn get_or_load<E>(
        &mut self,
        load: impl FnOnce() -> std::result::Result<Vec<Reading>, E>,
    ) -> std::result::Result<Arc<Vec<Reading>>, E> {
        if let Some(snapshot) = &self.snapshot {
            if self.snapshot_generation == self.generation {
                return Ok(Arc::clone(snapshot));
            }
        }

        let fresh = Arc::new(load()?);
        self.snapshot = Some(Arc::clone(&fresh));
        self.snapshot_generation = self.generation;
        Ok(fresh)
    }
}
