//! File-backed content-addressed object store.
//!
//! Objects are stored loose, fanned out by digest prefix:
//! `<base>/<oid[0:2]>/<oid[2:4]>/<oid>`

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::provider::{looks_binary, BINARY_SNIFF_LEN};
use crate::{ByteStream, ContentProvider, Error, FilterOptions, FilterRegistry, Oid, Result};

/// Loose-object store rooted at a base directory.
///
/// Writes are atomic: content lands in a temp file and is renamed into
/// place, so a concurrent reader never observes a partial object.
pub struct FsObjectStore {
    base_path: PathBuf,
    filters: FilterRegistry,
}

impl FsObjectStore {
    /// Create a store rooted at `base_path` with no filter rules.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self::with_filters(base_path, FilterRegistry::new())
    }

    /// Create a store whose filtered reads run through `filters`.
    pub fn with_filters<P: AsRef<Path>>(base_path: P, filters: FilterRegistry) -> Self {
        FsObjectStore {
            base_path: base_path.as_ref().to_path_buf(),
            filters,
        }
    }

    /// Path an object with the given id is stored at.
    pub fn object_path(&self, oid: &Oid) -> PathBuf {
        object_path_in(&self.base_path, oid)
    }

    /// Whether an object is present.
    pub fn contains(&self, oid: &Oid) -> bool {
        self.object_path(oid).exists()
    }

    /// Store a buffer and return its id.
    pub fn put(&self, content: &[u8]) -> Result<Oid> {
        let mut writer = self.writer()?;
        writer.write_all(content)?;
        writer.finish()
    }

    /// Create a streaming writer into the store.
    ///
    /// The object id is derived from the bytes written, so it is only
    /// known once [`StoreWriter::finish`] returns. Dropping an unfinished
    /// writer removes the temp file.
    pub fn writer(&self) -> Result<StoreWriter> {
        fs::create_dir_all(&self.base_path)?;

        static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);
        let temp_path = self.base_path.join(format!(
            "tmp_{}_{}",
            std::process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let file = File::create(&temp_path)?;

        Ok(StoreWriter {
            file,
            temp_path,
            base_path: self.base_path.clone(),
            hasher: Sha256::new(),
            written: 0,
            finished: false,
        })
    }

    fn open_object(&self, oid: &Oid) -> Result<File> {
        match File::open(self.object_path(oid)) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound(*oid)),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

fn object_path_in(base: &Path, oid: &Oid) -> PathBuf {
    let hex = oid.to_hex();
    base.join(&hex[0..2]).join(&hex[2..4]).join(&hex)
}

impl ContentProvider for FsObjectStore {
    fn raw_size(&self, oid: &Oid) -> Result<u64> {
        match fs::metadata(self.object_path(oid)) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound(*oid)),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn is_binary(&self, oid: &Oid) -> Result<bool> {
        let file = self.open_object(oid)?;
        let mut sniff = Vec::with_capacity(BINARY_SNIFF_LEN);
        file.take(BINARY_SNIFF_LEN as u64).read_to_end(&mut sniff)?;
        Ok(looks_binary(&sniff))
    }

    fn open_raw(&self, oid: &Oid) -> Result<ByteStream> {
        Ok(Box::new(self.open_object(oid)?))
    }

    fn open_filtered(&self, oid: &Oid, options: &FilterOptions) -> Result<ByteStream> {
        let mut raw = Vec::new();
        self.open_object(oid)?.read_to_end(&mut raw)?;
        let filtered = self.filters.apply(options, raw)?;
        Ok(Box::new(io::Cursor::new(filtered)))
    }
}

impl std::fmt::Debug for FsObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsObjectStore")
            .field("base_path", &self.base_path)
            .finish()
    }
}

/// Writer streaming content into the store.
///
/// Hashes incrementally while writing; the final path is not known until
/// the content has been seen in full.
pub struct StoreWriter {
    file: File,
    temp_path: PathBuf,
    base_path: PathBuf,
    hasher: Sha256,
    written: u64,
    finished: bool,
}

impl StoreWriter {
    /// Finish writing, derive the object id and move the object into place.
    pub fn finish(mut self) -> Result<Oid> {
        self.file.sync_all()?;

        let digest = self.hasher.finalize_reset();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        let oid = Oid::from_bytes(bytes);

        let final_path = object_path_in(&self.base_path, &oid);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }

        if final_path.exists() {
            // Already stored; content-addressing guarantees identical bytes.
            fs::remove_file(&self.temp_path)?;
        } else {
            fs::rename(&self.temp_path, &final_path)?;
        }
        self.finished = true;

        debug!(oid = %oid.short(), bytes = self.written, "stored object");
        Ok(oid)
    }
}

impl Write for StoreWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Drop for StoreWriter {
    fn drop(&mut self) {
        if !self.finished {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}
