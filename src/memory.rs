//! In-memory content-addressed store, for tests and embedding.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, RwLock};

use crate::provider::looks_binary;
use crate::{ByteStream, ContentProvider, Error, FilterOptions, FilterRegistry, Oid, Result};

/// HashMap-backed content store.
///
/// Objects live behind a `RwLock` and are handed out as cheap `Arc`
/// clones. Content-addressing makes writes idempotent: the same bytes
/// always land under the same id.
pub struct MemoryStore {
    objects: RwLock<HashMap<Oid, Arc<[u8]>>>,
    filters: FilterRegistry,
}

impl MemoryStore {
    /// Create an empty store with no filter rules.
    pub fn new() -> Self {
        Self::with_filters(FilterRegistry::new())
    }

    /// Create an empty store whose filtered reads run through `filters`.
    pub fn with_filters(filters: FilterRegistry) -> Self {
        MemoryStore {
            objects: RwLock::new(HashMap::new()),
            filters,
        }
    }

    /// Store content under its digest and return the id.
    pub fn put(&self, content: impl Into<Vec<u8>>) -> Oid {
        let content: Vec<u8> = content.into();
        let oid = Oid::from_content(&content);
        let mut map = self.objects.write().expect("lock poisoned");
        map.entry(oid).or_insert_with(|| content.into());
        oid
    }

    /// Whether an object is present.
    pub fn contains(&self, oid: &Oid) -> bool {
        self.objects.read().expect("lock poisoned").contains_key(oid)
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    fn fetch(&self, oid: &Oid) -> Result<Arc<[u8]>> {
        self.objects
            .read()
            .expect("lock poisoned")
            .get(oid)
            .cloned()
            .ok_or(Error::NotFound(*oid))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("object_count", &self.len())
            .finish()
    }
}

impl ContentProvider for MemoryStore {
    fn raw_size(&self, oid: &Oid) -> Result<u64> {
        Ok(self.fetch(oid)?.len() as u64)
    }

    fn is_binary(&self, oid: &Oid) -> Result<bool> {
        Ok(looks_binary(&self.fetch(oid)?))
    }

    fn open_raw(&self, oid: &Oid) -> Result<ByteStream> {
        let content = self.fetch(oid)?;
        Ok(Box::new(Cursor::new(content)))
    }

    fn open_filtered(&self, oid: &Oid, options: &FilterOptions) -> Result<ByteStream> {
        let content = self.fetch(oid)?;
        let filtered = self.filters.apply(options, content.to_vec())?;
        Ok(Box::new(Cursor::new(filtered)))
    }
}
