//! Cache invalidation across tiers.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{CacheType, MemoryCache, PersistentCache};
use crate::error::ImageError;
use crate::key::CacheKey;

/// Removes entries from one or both cache tiers.
#[derive(Clone)]
pub struct InvalidationService {
    memory: Arc<MemoryCache>,
    disk: Arc<dyn PersistentCache>,
}

impl InvalidationService {
    pub fn new(memory: Arc<MemoryCache>, disk: Arc<dyn PersistentCache>) -> Self {
        Self { memory, disk }
    }

    /// Clear every entry in the tiers selected by `scope`.
    ///
    /// Returns once the clears have completed.
    pub async fn invalidate(&self, scope: CacheType) -> Result<(), ImageError> {
        if scope.includes_memory() {
            let entries = self.memory.entry_count();
            self.memory.clear();
            debug!(entries, "Memory cache cleared");
        }

        if scope.includes_disk() {
            self.disk.clear().await?;
        }

        info!(scope = ?scope, "Cache invalidated");
        Ok(())
    }

    /// Remove `key` from the tiers selected by `scope`.
    ///
    /// The memory removal is always synchronous. With `wait_for_completion`
    /// false the persistent removal is spawned and not awaited; its failure
    /// is only logged.
    pub async fn invalidate_entry(
        &self,
        key: &CacheKey,
        scope: CacheType,
        wait_for_completion: bool,
    ) -> Result<(), ImageError> {
        if scope.includes_memory() {
            self.memory.remove(key);
        }

        if scope.includes_disk() {
            if wait_for_completion {
                self.disk.remove(key).await?;
            } else {
                let disk = Arc::clone(&self.disk);
                let key = key.clone();
                tokio::spawn(async move {
                    if let Err(e) = disk.remove(&key).await {
                        warn!(key = %key, error = %e, "Background cache entry removal failed");
                    }
                });
            }
        }

        debug!(key = %key, scope = ?scope, wait_for_completion, "Cache entry invalidated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DiskCache, DiskCacheConfig};
    use crate::decode::DecodedImage;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Arc<MemoryCache>, Arc<DiskCache>, InvalidationService) {
        let temp_dir = TempDir::new().unwrap();
        let memory = Arc::new(MemoryCache::new(1_000_000));
        let disk = DiskCache::start(
            DiskCacheConfig::new(temp_dir.path()).with_gc_interval(Duration::from_secs(3600)),
        )
        .await
        .unwrap();
        let service = InvalidationService::new(memory.clone(), disk.clone());
        (temp_dir, memory, disk, service)
    }

    async fn populate(memory: &MemoryCache, disk: &DiskCache, key: &CacheKey) {
        memory.put(key.clone(), Arc::new(DecodedImage::new(1, 1, vec![0; 4])));
        disk.write(key, vec![1, 2, 3]).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalidate_memory_only() {
        let (_dir, memory, disk, service) = setup().await;
        let key = CacheKey::derive_str("a");
        populate(&memory, &disk, &key).await;

        service.invalidate(CacheType::Memory).await.unwrap();

        assert!(!memory.contains(&key));
        assert!(disk.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_disk_only() {
        let (_dir, memory, disk, service) = setup().await;
        let key = CacheKey::derive_str("a");
        populate(&memory, &disk, &key).await;

        service.invalidate(CacheType::Disk).await.unwrap();

        assert!(memory.contains(&key));
        assert!(!disk.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let (_dir, memory, disk, service) = setup().await;
        let key = CacheKey::derive_str("a");
        populate(&memory, &disk, &key).await;

        service.invalidate(CacheType::All).await.unwrap();

        assert!(!memory.contains(&key));
        assert!(!disk.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_entry_leaves_others() {
        let (_dir, memory, disk, service) = setup().await;
        let a = CacheKey::derive_str("a");
        let b = CacheKey::derive_str("b");
        populate(&memory, &disk, &a).await;
        populate(&memory, &disk, &b).await;

        service.invalidate_entry(&a, CacheType::All, true).await.unwrap();

        assert!(!memory.contains(&a));
        assert!(!disk.exists(&a).await.unwrap());
        assert!(memory.contains(&b));
        assert!(disk.exists(&b).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_entry_without_waiting() {
        let (_dir, memory, disk, service) = setup().await;
        let key = CacheKey::derive_str("a");
        populate(&memory, &disk, &key).await;

        service.invalidate_entry(&key, CacheType::All, false).await.unwrap();

        // Memory removal is synchronous regardless
        assert!(!memory.contains(&key));

        for _ in 0..50 {
            if !disk.exists(&key).await.unwrap() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!disk.exists(&key).await.unwrap());
    }
}
