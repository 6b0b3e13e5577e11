// src/cursor.rs
//! Read position over the tailed file, plus the identity used to detect
//! rotation.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use crate::error::TailError;

/// Device + inode of a file.
///
/// Stable across appends and renames, different after delete + recreate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    pub fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }

    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }

    pub fn from_file(file: &File) -> io::Result<Self> {
        Ok(Self::from_metadata(&file.metadata()?))
    }

    /// Stat the path without opening it
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::from_metadata(&fs::metadata(path)?))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dev, self.ino)
    }
}

/// The open log file and the byte offset of the next unread line.
///
/// `read_line` never blocks: it returns `None` unless a complete,
/// newline-terminated line is available. Bytes of a trailing partial line are
/// kept and completed on a later call, so `offset` only ever points at a line
/// boundary.
pub struct FileCursor {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    id: FileId,
    offset: u64,
    partial: Vec<u8>,
}

impl FileCursor {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TailError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| TailError::Open {
            path: path.clone(),
            source,
        })?;
        let id = FileId::from_file(&file).map_err(|source| TailError::Open {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(path = %path.display(), file_id = %id, "opened log file");

        Ok(Self {
            path,
            reader: Some(BufReader::new(file)),
            id,
            offset: 0,
            partial: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identity of the file this cursor holds open
    pub fn identity(&self) -> FileId {
        self.id
    }

    /// Byte offset of the next line to be returned
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    pub fn seek_to_end(&mut self) -> Result<u64, TailError> {
        self.seek(SeekFrom::End(0))
    }

    pub fn seek_to_start(&mut self) -> Result<u64, TailError> {
        self.seek(SeekFrom::Start(0))
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, TailError> {
        let path = &self.path;
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| TailError::Closed { path: path.clone() })?;
        let offset = reader.seek(pos).map_err(|source| TailError::Read {
            path: path.clone(),
            source,
        })?;
        self.partial.clear();
        self.offset = offset;
        Ok(offset)
    }

    /// Next complete line without its line terminator, or `None`
    pub fn read_line(&mut self) -> Result<Option<String>, TailError> {
        let path = &self.path;
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| TailError::Closed { path: path.clone() })?;

        reader
            .read_until(b'\n', &mut self.partial)
            .map_err(|source| TailError::Read {
                path: path.clone(),
                source,
            })?;

        if self.partial.last() != Some(&b'\n') {
            // Nothing new, or the writer hasn't finished the line yet
            return Ok(None);
        }

        self.offset += self.partial.len() as u64;
        let mut bytes = std::mem::take(&mut self.partial);
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Current size of the open file (not of whatever the path points at now)
    pub fn file_size(&self) -> Result<u64, TailError> {
        let reader = self.reader.as_ref().ok_or_else(|| TailError::Closed {
            path: self.path.clone(),
        })?;
        reader
            .get_ref()
            .metadata()
            .map(|m| m.len())
            .map_err(|source| TailError::Read {
                path: self.path.clone(),
                source,
            })
    }

    /// True when the configured path now names a different file.
    ///
    /// A missing path is not a rotation yet: the writer may not have
    /// recreated it.
    pub fn has_rotated(&self) -> Result<bool, TailError> {
        match FileId::from_path(&self.path) {
            Ok(current) => Ok(current != self.id),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(TailError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Close and open the path again, positioned at the start.
    ///
    /// On failure the cursor stays closed.
    pub fn reopen(&mut self) -> Result<(), TailError> {
        self.close();
        let mut fresh = FileCursor::open(&self.path)?;
        fresh.seek_to_start()?;
        *self = fresh;
        Ok(())
    }

    /// Release the file handle. Further calls are no-ops.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            tracing::debug!(path = %self.path.display(), offset = self.offset, "closed log file");
        }
        self.partial.clear();
    }
}

impl fmt::Debug for FileCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCursor")
            .field("path", &self.path)
            .field("id", &self.id)
            .field("offset", &self.offset)
            .field("open", &self.reader.is_some())
            .finish()
    }
}
