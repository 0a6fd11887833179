//! Static embedding assets.
//!
//! Owns the vocabulary, word-vector table and topic centroids, plus the
//! load-once cache that hands the same `Arc<EmbeddingStore>` to every caller
//! bound to one asset directory.

pub mod npy;
pub mod store;

pub use npy::Matrix;
pub use store::EmbeddingStore;

use smartfind_core::LoadError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Load-once cache for an [`EmbeddingStore`].
///
/// The lock is held for the whole load, so concurrent first callers wait and
/// then observe the same cached store. Asking for a different directory
/// replaces the cached store.
#[derive(Debug, Default)]
pub struct AssetCache {
    cached: Mutex<Option<(PathBuf, Arc<EmbeddingStore>)>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the store for `asset_dir`, loading it on first use.
    pub fn get_or_load(&self, asset_dir: &Path) -> Result<Arc<EmbeddingStore>, LoadError> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some((path, store)) = cached.as_ref() {
            if path == asset_dir {
                return Ok(Arc::clone(store));
            }
            tracing::info!(
                "Asset directory changed from {:?} to {:?}, reloading",
                path,
                asset_dir
            );
        }

        let store = Arc::new(EmbeddingStore::load(asset_dir)?);
        *cached = Some((asset_dir.to_path_buf(), Arc::clone(&store)));
        Ok(store)
    }

    /// Cached store, if one is loaded.
    pub fn current(&self) -> Option<Arc<EmbeddingStore>> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, store)| Arc::clone(store))
    }

    /// Drop the cached store so the next call reloads from disk.
    pub fn invalidate(&self) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
