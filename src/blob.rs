//! Blob - the binary content of a tracked file.

use std::io::Read;
use std::sync::Arc;

use crate::lazy::{AttributeGroup, LazyHandle};
use crate::{ByteStream, ContentProvider, Error, FilterOptions, Oid, Result};

const ATTR_SIZE: &str = "size";
const ATTR_IS_BINARY: &str = "is_binary";

/// Stores the binary content of a tracked file.
///
/// `size` and `is_binary` are loaded lazily and together: the first access
/// to either runs both loaders in one batched pass, since both need the
/// same trip into the backing store. Content reads are never cached; every
/// call opens a fresh stream.
pub struct Blob {
    inner: Inner,
}

enum Inner {
    /// Inert variant for test doubles; carries no id or provider.
    Detached,
    Attached(Attached),
}

struct Attached {
    oid: Oid,
    provider: Arc<dyn ContentProvider>,
    size: LazyHandle<u64>,
    is_binary: LazyHandle<bool>,
}

impl Blob {
    /// Bind a blob to an object id and the store that resolves it.
    ///
    /// No store access happens here; attributes load on first demand.
    pub fn new(oid: Oid, provider: Arc<dyn ContentProvider>) -> Result<Self> {
        let mut group = AttributeGroup::new(oid);
        {
            let provider = Arc::clone(&provider);
            group.register(ATTR_SIZE, move |oid: &Oid| provider.raw_size(oid))?;
        }
        {
            let provider = Arc::clone(&provider);
            group.register(ATTR_IS_BINARY, move |oid: &Oid| provider.is_binary(oid))?;
        }
        let group = Arc::new(group);

        Ok(Blob {
            inner: Inner::Attached(Attached {
                oid,
                provider,
                size: LazyHandle::new(Arc::clone(&group), ATTR_SIZE),
                is_binary: LazyHandle::new(group, ATTR_IS_BINARY),
            }),
        })
    }

    /// A blob bound to nothing, for test substitution.
    ///
    /// Every attribute or content access fails with [`Error::Detached`];
    /// [`Blob::id`] returns `None`.
    pub fn detached() -> Self {
        Blob {
            inner: Inner::Detached,
        }
    }

    /// Whether this blob is the detached test-double variant.
    pub fn is_detached(&self) -> bool {
        matches!(self.inner, Inner::Detached)
    }

    /// The blob's object id, or `None` for a detached blob.
    pub fn id(&self) -> Option<&Oid> {
        match &self.inner {
            Inner::Attached(a) => Some(&a.oid),
            Inner::Detached => None,
        }
    }

    fn attached(&self) -> Result<&Attached> {
        match &self.inner {
            Inner::Attached(a) => Ok(a),
            Inner::Detached => Err(Error::Detached),
        }
    }

    /// Size in bytes of the raw content.
    pub fn size(&self) -> Result<u64> {
        self.attached()?.size.value()
    }

    /// Whether the content is most certainly binary.
    pub fn is_binary(&self) -> Result<bool> {
        self.attached()?.is_binary.value()
    }

    /// Open a stream over the raw stored bytes.
    ///
    /// The stream's length equals [`Blob::size`]. Re-reads the store on
    /// every call and never touches the attribute cache.
    pub fn open_raw_content(&self) -> Result<ByteStream> {
        let a = self.attached()?;
        a.provider.open_raw(&a.oid)
    }

    /// Open a stream over the content as it would be checked out to the
    /// working directory.
    pub fn open_filtered_content(&self, options: &FilterOptions) -> Result<ByteStream> {
        let a = self.attached()?;
        a.provider.open_filtered(&a.oid, options)
    }

    /// Read the raw content into a buffer.
    pub fn raw_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open_raw_content()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Read the filtered content into a buffer.
    pub fn filtered_content(&self, options: &FilterOptions) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open_filtered_content(options)?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Inner::Detached => f.debug_struct("Blob").field("detached", &true).finish(),
            Inner::Attached(a) => f.debug_struct("Blob").field("oid", &a.oid).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider wrapper counting calls into the backing store.
    struct CountingProvider {
        inner: MemoryStore,
        size_calls: AtomicUsize,
        binary_calls: AtomicUsize,
    }

    impl CountingProvider {
        fn new(inner: MemoryStore) -> Self {
            CountingProvider {
                inner,
                size_calls: AtomicUsize::new(0),
                binary_calls: AtomicUsize::new(0),
            }
        }
    }

    impl ContentProvider for CountingProvider {
        fn raw_size(&self, oid: &Oid) -> Result<u64> {
            self.size_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.raw_size(oid)
        }

        fn is_binary(&self, oid: &Oid) -> Result<bool> {
            self.binary_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.is_binary(oid)
        }

        fn open_raw(&self, oid: &Oid) -> Result<ByteStream> {
            self.inner.open_raw(oid)
        }

        fn open_filtered(&self, oid: &Oid, options: &FilterOptions) -> Result<ByteStream> {
            self.inner.open_filtered(oid, options)
        }
    }

    #[test]
    fn test_attributes_load_once_and_together() {
        let store = MemoryStore::new();
        let oid = store.put(&b"some file content"[..]);
        let provider = Arc::new(CountingProvider::new(store));

        let blob = Blob::new(oid, Arc::clone(&provider) as Arc<dyn ContentProvider>).unwrap();
        assert_eq!(provider.size_calls.load(Ordering::SeqCst), 0);

        // First access runs both loaders in one pass.
        assert!(!blob.is_binary().unwrap());
        assert_eq!(provider.size_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.binary_calls.load(Ordering::SeqCst), 1);

        // Further accesses are served from the cache.
        assert_eq!(blob.size().unwrap(), 17);
        assert!(!blob.is_binary().unwrap());
        assert_eq!(provider.size_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.binary_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_content_reads_bypass_attribute_cache() {
        let store = MemoryStore::new();
        let oid = store.put(&b"stream me"[..]);
        let provider = Arc::new(CountingProvider::new(store));

        let blob = Blob::new(oid, Arc::clone(&provider) as Arc<dyn ContentProvider>).unwrap();

        // Streaming twice re-reads the store and never evaluates attributes.
        assert_eq!(blob.raw_content().unwrap(), b"stream me");
        assert_eq!(blob.raw_content().unwrap(), b"stream me");
        assert_eq!(provider.size_calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.binary_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_object_streams_not_found() {
        let provider = Arc::new(CountingProvider::new(MemoryStore::new()));
        let oid = Oid::from_content(b"absent");

        let blob = Blob::new(oid, Arc::clone(&provider) as Arc<dyn ContentProvider>).unwrap();
        let err = blob.open_raw_content().map(|_| ()).unwrap_err();
        assert!(matches!(err, Error::NotFound(missing) if missing == oid));

        // The failed stream did not touch the attribute group.
        assert_eq!(provider.size_calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.binary_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_detached_blob_fails_all_access() {
        let blob = Blob::detached();
        assert!(blob.is_detached());
        assert!(blob.id().is_none());

        assert!(matches!(blob.size().unwrap_err(), Error::Detached));
        assert!(matches!(blob.is_binary().unwrap_err(), Error::Detached));
        assert!(matches!(
            blob.open_raw_content().map(|_| ()).unwrap_err(),
            Error::Detached
        ));
        assert!(matches!(
            blob.open_filtered_content(&FilterOptions::new("a.txt"))
                .map(|_| ())
                .unwrap_err(),
            Error::Detached
        ));
    }

    #[test]
    fn test_binary_blob_attributes() {
        let store = MemoryStore::new();
        let oid = store.put(&b"ELF\x00\x01\x02"[..]);
        let blob = Blob::new(oid, Arc::new(store)).unwrap();

        assert_eq!(blob.size().unwrap(), 6);
        assert!(blob.is_binary().unwrap());
    }

    #[test]
    fn test_id_matches_construction() {
        let store = MemoryStore::new();
        let oid = store.put(&b"identified"[..]);
        let blob = Blob::new(oid, Arc::new(store)).unwrap();
        assert_eq!(blob.id(), Some(&oid));
        assert!(!blob.is_detached());
    }
}
