//! Registry of named in-process image resources.

use dashmap::DashMap;
use std::sync::Arc;

/// Named resources served for `embedded://name` sources.
///
/// Cheap to clone; clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedResources {
    resources: Arc<DashMap<String, Arc<[u8]>>>,
}

impl EmbeddedResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a resource.
    pub fn insert(&self, name: impl Into<String>, data: impl Into<Arc<[u8]>>) {
        self.resources.insert(name.into(), data.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(self, name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        self.insert(name, data);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<[u8]>> {
        self.resources.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, name: &str) -> bool {
        self.resources.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let resources = EmbeddedResources::new().with("logo", vec![1u8, 2, 3]);

        assert_eq!(resources.get("logo").as_deref(), Some(&[1u8, 2, 3][..]));
        assert!(resources.get("missing").is_none());
        assert_eq!(resources.len(), 1);
    }

    #[test]
    fn test_clones_share_registry() {
        let a = EmbeddedResources::new();
        let b = a.clone();

        a.insert("icon", vec![9u8]);
        assert!(b.contains("icon"));

        assert!(b.remove("icon"));
        assert!(a.is_empty());
    }
}
