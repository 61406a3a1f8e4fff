//! Content-addressed memoization of detector output.
//!
//! Entries are keyed by the SHA-256 hex digest of the input, so identical
//! patches analyzed twice (for example, the same commit in two sessions that
//! share a cache) are only inspected once. The cache is an ordinary value
//! owned by its caller.

use std::collections::HashMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use tracing::{trace, warn};

use super::BreakingChangeRecord;
use super::detect::BreakingChangeDetector;
use crate::types::FileChange;

/// Map from content digest to a cached value.
#[derive(Debug, Clone)]
pub struct AnnotationCache<V> {
    entries: HashMap<String, V>,
}

impl<V> Default for AnnotationCache<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V> AnnotationCache<V> {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// SHA-256 hex digest used as the key for `content`.
    #[must_use]
    pub fn key_for(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        format!("{:x}", hasher.finalize())
    }

    /// Cached value for `content`.
    #[must_use]
    pub fn get(&self, content: &[u8]) -> Option<&V> {
        self.entries.get(&Self::key_for(content))
    }

    /// Store `value` for `content`, returning the previous value.
    pub fn insert(&mut self, content: &[u8], value: V) -> Option<V> {
        self.entries.insert(Self::key_for(content), value)
    }

    /// Cached value for `content`, computing and storing it on a miss.
    pub fn get_or_insert_with(&mut self, content: &[u8], compute: impl FnOnce() -> V) -> &V {
        let key = Self::key_for(content);
        self.entries.entry(key).or_insert_with(compute)
    }

    /// Drop the entry for `content`. Returns `true` if one existed.
    pub fn invalidate(&mut self, content: &[u8]) -> bool {
        self.entries.remove(&Self::key_for(content)).is_some()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Detector wrapper that memoizes findings per change content.
///
/// The cache sits behind a `Mutex` so the wrapper stays `Send + Sync` like the
/// detector it wraps.
#[derive(Debug)]
pub struct CachedDetector<D> {
    inner: D,
    cache: Mutex<AnnotationCache<Vec<BreakingChangeRecord>>>,
}

impl<D: BreakingChangeDetector> CachedDetector<D> {
    /// Wrap `inner` with an empty cache.
    #[must_use]
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            cache: Mutex::new(AnnotationCache::new()),
        }
    }

    /// The wrapped detector.
    #[must_use]
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Number of cached changes. Zero if the cache lock is poisoned.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.lock().map_or(0, |cache| cache.len())
    }

    /// Drop all cached findings.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

/// Bytes that identify a change for caching: path, status, and patch text.
fn change_content(change: &FileChange) -> Vec<u8> {
    let mut content = Vec::with_capacity(
        change.file_path.len() + change.patch.as_ref().map_or(0, String::len) + 16,
    );
    content.extend_from_slice(change.file_path.as_bytes());
    content.push(0);
    content.extend_from_slice(change.status.as_str().as_bytes());
    content.push(0);
    if let Some(patch) = &change.patch {
        content.extend_from_slice(patch.as_bytes());
    }
    content
}

impl<D: BreakingChangeDetector> BreakingChangeDetector for CachedDetector<D> {
    fn detect(&self, change: &FileChange) -> Vec<BreakingChangeRecord> {
        let content = change_content(change);
        let Ok(mut cache) = self.cache.lock() else {
            warn!(file = %change.file_path, "annotation cache lock poisoned, detecting uncached");
            return self.inner.detect(change);
        };
        if let Some(hit) = cache.get(&content) {
            trace!(file = %change.file_path, "annotation cache hit");
            return hit.clone();
        }
        let findings = self.inner.detect(change);
        cache.insert(&content, findings.clone());
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn key_is_sha256_hex() {
        assert_eq!(
            AnnotationCache::<()>::key_for(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn get_or_insert_with_computes_once() {
        let mut cache = AnnotationCache::new();
        let mut calls = 0;

        let first = *cache.get_or_insert_with(b"patch", || {
            calls += 1;
            7
        });
        let second = *cache.get_or_insert_with(b"patch", || {
            calls += 1;
            9
        });

        assert_eq!((first, second, calls), (7, 7, 1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_and_clear() {
        let mut cache = AnnotationCache::new();
        cache.insert(b"a", 1);
        cache.insert(b"b", 2);

        assert!(cache.invalidate(b"a"));
        assert!(!cache.invalidate(b"a"));
        assert_eq!(cache.get(b"b"), Some(&2));

        cache.clear();
        assert!(cache.is_empty());
    }

    struct CountingDetector {
        calls: AtomicUsize,
    }

    impl BreakingChangeDetector for CountingDetector {
        fn detect(&self, change: &FileChange) -> Vec<BreakingChangeRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            vec![BreakingChangeRecord::new(
                "field_removed",
                change.file_path.clone(),
                Severity::MAX,
                "email",
            )]
        }
    }

    #[test]
    fn cached_detector_reuses_findings_for_identical_changes() {
        let detector = CachedDetector::new(CountingDetector {
            calls: AtomicUsize::new(0),
        });
        let change = FileChange::modified("models.py").with_patch("-    email = Column(String)");

        let first = detector.detect(&change);
        let second = detector.detect(&change.clone());

        assert_eq!(first, second);
        assert_eq!(detector.inner().calls.load(Ordering::SeqCst), 1);
        assert_eq!(detector.cached(), 1);
    }

    #[test]
    fn different_patch_text_misses_the_cache() {
        let detector = CachedDetector::new(CountingDetector {
            calls: AtomicUsize::new(0),
        });

        detector.detect(&FileChange::modified("models.py").with_patch("-a = Column(String)"));
        detector.detect(&FileChange::modified("models.py").with_patch("-b = Column(String)"));

        assert_eq!(detector.inner().calls.load(Ordering::SeqCst), 2);

        detector.clear();
        assert_eq!(detector.cached(), 0);
    }
}
