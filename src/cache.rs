use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::analyzer::FileAnalysis;

struct CacheEntry {
    hash: String,
    analysis: Arc<FileAnalysis>,
}

/// File analyses from earlier compiles, keyed by path and validated against
/// the SHA-256 of the source text. Owned by a [`crate::compiler::Compiler`];
/// shared across discovery workers.
#[derive(Default)]
pub struct CompileCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl CompileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute_hash(source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, file_path: &str, source: &str) -> Option<Arc<FileAnalysis>> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(file_path)?;
        if entry.hash == Self::compute_hash(source) {
            debug!(file = file_path, "analysis cache hit");
            Some(Arc::clone(&entry.analysis))
        } else {
            None
        }
    }

    pub fn insert(&self, file_path: &str, source: &str, analysis: Arc<FileAnalysis>) {
        let hash = Self::compute_hash(source);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(file_path.to_string(), CacheEntry { hash, analysis });
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn reset(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze_file;

    const SRC: &str = "export function A() { return <div>a</div> }";

    fn cached(cache: &CompileCache) {
        let analysis = analyze_file(SRC, "/src/A.tsx", "use client");
        cache.insert("/src/A.tsx", SRC, Arc::new(analysis));
    }

    #[test]
    fn test_hit_requires_same_source() {
        let cache = CompileCache::new();
        cached(&cache);
        let hit = cache.get("/src/A.tsx", SRC).expect("hit");
        assert_eq!(hit.components[0].name, "A");
        assert!(cache.get("/src/A.tsx", "export function A() { return <p/> }").is_none());
        assert!(cache.get("/src/B.tsx", SRC).is_none());
    }

    #[test]
    fn test_reset_clears_entries() {
        let cache = CompileCache::new();
        cached(&cache);
        assert_eq!(cache.len(), 1);
        cache.reset();
        assert!(cache.is_empty());
        assert!(cache.get("/src/A.tsx", SRC).is_none());
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = CompileCache::compute_hash("");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
