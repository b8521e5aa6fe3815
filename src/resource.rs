//! Static payload sources.
//!
//! The event loop only needs "give me up to N bytes". Anything past the
//! limit is dropped, never partially copied.

use bytes::Bytes;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// A readable byte source for the response body.
pub trait Resource: Send + Sync {
    /// Load at most `limit` bytes of content.
    fn load(&self, limit: usize) -> io::Result<Bytes>;
}

/// File on disk, re-read on every request.
#[derive(Debug, Clone)]
pub struct StaticFile {
    path: PathBuf,
}

impl StaticFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Resource for StaticFile {
    fn load(&self, limit: usize) -> io::Result<Bytes> {
        let file = File::open(&self.path)?;
        let mut buf = Vec::with_capacity(limit);
        file.take(limit as u64).read_to_end(&mut buf)?;
        Ok(Bytes::from(buf))
    }
}

/// In-memory payload.
impl Resource for Bytes {
    fn load(&self, limit: usize) -> io::Result<Bytes> {
        Ok(self.slice(..self.len().min(limit)))
    }
}
