//! Cache of loaded model instances keyed by (model name, version)

use crate::error::Result;
use crate::models::ModelHandle;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Cached model entry
#[derive(Clone)]
pub struct CachedModel {
    pub model_name: String,
    pub version: String,
    pub handle: Arc<ModelHandle>,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub cached_models: usize,
    pub generation: u64,
}

/// Loaded model instances.
///
/// Loads run outside the lock. Every invalidation bumps a generation
/// counter, and a load only inserts its handle if the generation it started
/// under is still current, so a handle loaded across an invalidation is
/// returned to its caller but never cached.
#[derive(Default)]
pub struct ModelCache {
    entries: RwLock<HashMap<(String, String), CachedModel>>,
    generation: AtomicU64,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached handle, or run `loader` on the blocking pool and cache its result
    pub async fn get_or_load<F>(&self, model_name: &str, version: &str, loader: F) -> Result<Arc<ModelHandle>>
    where
        F: FnOnce() -> Result<ModelHandle> + Send + 'static,
    {
        let key = (model_name.to_string(), version.to_string());
        if let Some(cached) = self.entries.read().get(&key) {
            debug!("Model {} version {} found in cache", model_name, version);
            return Ok(Arc::clone(&cached.handle));
        }

        info!("Model {} version {} not in cache, loading...", model_name, version);
        let generation = self.generation.load(Ordering::SeqCst);
        let handle = Arc::new(tokio::task::spawn_blocking(loader).await??);

        let mut entries = self.entries.write();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(
                "Cache invalidated while loading {} version {}, not caching",
                model_name, version
            );
            return Ok(handle);
        }
        let cached = entries.entry(key).or_insert_with(|| CachedModel {
            model_name: model_name.to_string(),
            version: version.to_string(),
            handle,
        });
        Ok(Arc::clone(&cached.handle))
    }

    /// Drop every cached instance
    pub fn invalidate_all(&self) {
        let mut entries = self.entries.write();
        let dropped = entries.len();
        entries.clear();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Model cache invalidated ({} entries dropped, generation {})", dropped, generation);
    }

    pub fn get(&self, model_name: &str, version: &str) -> Option<CachedModel> {
        self.entries
            .read()
            .get(&(model_name.to_string(), version.to_string()))
            .cloned()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cached_models: self.entries.read().len(),
            generation: self.generation.load(Ordering::SeqCst),
        }
    }
}
