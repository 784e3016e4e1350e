//! # odb-blob
//!
//! Blob accessors over a content-addressed object database.
//!
//! This crate provides:
//! - Blob metadata (`size`, `is_binary`) loaded lazily and batched into a
//!   single store round-trip per object
//! - Uncached streaming reads of raw and checkout-filtered content
//! - A [`ContentProvider`] trait abstracting the backing store, with
//!   in-memory and loose-object file implementations
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use odb_blob::{Blob, MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new());
//! let oid = store.put(&b"hello, blob"[..]);
//!
//! let blob = Blob::new(oid, store).unwrap();
//! assert_eq!(blob.size().unwrap(), 11);
//! assert!(!blob.is_binary().unwrap());
//! assert_eq!(blob.raw_content().unwrap(), b"hello, blob");
//! ```

mod blob;
mod error;
mod filter;
mod fs;
mod lazy;
mod memory;
mod oid;
mod provider;

pub use blob::Blob;
pub use error::{Error, Result};
pub use filter::{FilterDirection, FilterDriver, FilterOptions, FilterRegistry};
pub use fs::{FsObjectStore, StoreWriter};
pub use lazy::{AttributeGroup, AttributeValue, LazyHandle};
pub use memory::MemoryStore;
pub use oid::Oid;
pub use provider::{looks_binary, ByteStream, ContentProvider};
