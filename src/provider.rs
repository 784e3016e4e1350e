//! Content provider boundary - the trait the backing store implements.

use std::io::Read;

use crate::{FilterOptions, Oid, Result};

/// Streaming read over an object's bytes.
pub type ByteStream = Box<dyn Read + Send>;

/// Number of leading bytes the binary heuristic inspects.
pub(crate) const BINARY_SNIFF_LEN: usize = 8000;

/// Backing store supplying content and metadata for object ids.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once stored; the same id always resolves to the
///   same bytes.
/// - Every call acquires and releases its own backing resource; concurrent
///   reads are always safe.
/// - An id that does not resolve fails with [`crate::Error::NotFound`].
///   Backend failures surface as [`crate::Error::Store`] or
///   [`crate::Error::Io`] and are never swallowed.
pub trait ContentProvider: Send + Sync {
    /// Byte length of the stored content.
    fn raw_size(&self, oid: &Oid) -> Result<u64>;

    /// Heuristic classification of the stored content.
    fn is_binary(&self, oid: &Oid) -> Result<bool>;

    /// Open a stream over the raw stored bytes.
    fn open_raw(&self, oid: &Oid) -> Result<ByteStream>;

    /// Open a stream over the stored bytes after the filter pipeline
    /// selected by `options` has been applied.
    fn open_filtered(&self, oid: &Oid, options: &FilterOptions) -> Result<ByteStream>;
}

/// Classify content as binary: a NUL byte within the first 8000 bytes.
pub fn looks_binary(content: &[u8]) -> bool {
    let sniff = &content[..content.len().min(BINARY_SNIFF_LEN)];
    sniff.contains(&0)
}
