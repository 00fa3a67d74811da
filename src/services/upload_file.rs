//! Sources of upload bytes.
//!
//! The engine only needs the resume key of a file and a way to read an
//! arbitrary byte range of it, so anything implementing [`UploadFile`] can
//! be uploaded.

use crate::models::ResumeKey;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    future::Future,
    io::{self, ErrorKind, SeekFrom},
    path::{Path, PathBuf},
};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt},
};

/// Read-only view of the bytes to upload.
pub trait UploadFile: Sync {
    fn size(&self) -> u64;

    fn name(&self) -> &str;

    /// Last modification time, milliseconds since the Unix epoch.
    fn modified_time(&self) -> i64;

    /// Read bytes `[start, end)`. Returns exactly `end - start` bytes or an
    /// error.
    fn read_range(&self, start: u64, end: u64) -> impl Future<Output = io::Result<Bytes>> + Send;

    fn resume_key(&self) -> ResumeKey {
        ResumeKey::new(self.size(), self.name(), self.modified_time())
    }
}

/// A file on the local filesystem.
///
/// Size and modification time are captured at open; a file that changes
/// afterwards is read as it is at chunk time.
#[derive(Clone, Debug)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
    size: u64,
    modified: i64,
}

impl LocalFile {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let meta = tokio::fs::metadata(&path).await?;
        if !meta.is_file() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "file name is not UTF-8"))?;
        let modified = DateTime::<Utc>::from(meta.modified()?).timestamp_millis();

        Ok(Self {
            path,
            name,
            size: meta.len(),
            modified,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UploadFile for LocalFile {
    fn size(&self) -> u64 {
        self.size
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn modified_time(&self) -> i64 {
        self.modified
    }

    async fn read_range(&self, start: u64, end: u64) -> io::Result<Bytes> {
        let len = range_len(start, end)?;
        let mut file = File::open(&self.path).await?;
        file.seek(SeekFrom::Start(start)).await?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

/// An in-memory file, handy for generated content.
#[derive(Clone, Debug)]
pub struct MemoryFile {
    name: String,
    modified: i64,
    data: Bytes,
}

impl MemoryFile {
    pub fn new(name: impl Into<String>, modified: i64, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            modified,
            data: data.into(),
        }
    }
}

impl UploadFile for MemoryFile {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn modified_time(&self) -> i64 {
        self.modified
    }

    async fn read_range(&self, start: u64, end: u64) -> io::Result<Bytes> {
        range_len(start, end)?;
        if end > self.size() {
            return Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("range {}..{} past end of {} bytes", start, end, self.size()),
            ));
        }
        Ok(self.data.slice(start as usize..end as usize))
    }
}

fn range_len(start: u64, end: u64) -> io::Result<usize> {
    end.checked_sub(start)
        .and_then(|len| usize::try_from(len).ok())
        .ok_or_else(|| {
            io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid byte range {}..{}", start, end),
            )
        })
}
