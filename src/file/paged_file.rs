use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::error::{FileError, FileResult};
use super::{PAGE_SIZE, PageId};

/// A single file on disk addressed in `PAGE_SIZE` units.
///
/// Page `n` lives at byte offset `n * PAGE_SIZE`. Reads past the end of the
/// file are rejected rather than zero-filled: a page that was never written
/// does not exist yet.
#[derive(Debug)]
pub struct PagedFile {
    file: File,
    path: PathBuf,
}

impl PagedFile {
    /// Create a new empty file, failing if it already exists
    pub fn create<P: AsRef<Path>>(path: P) -> FileResult<Self> {
        let path = path.as_ref();

        if path.exists() {
            return Err(FileError::FileAlreadyExists(path.display().to_string()));
        }

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing file
    pub fn open<P: AsRef<Path>>(path: P) -> FileResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FileError::FileNotFound(path.display().to_string()));
        }

        let file = OpenOptions::new().read(true).write(true).open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Open the file if it exists, otherwise create it
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> FileResult<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a full page into `buffer`
    pub fn read_page(&mut self, page: PageId, buffer: &mut [u8]) -> FileResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(FileError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }

        let page_count = self.page_count()?;
        if page.page_no >= page_count {
            return Err(FileError::PageOutOfRange { page, page_count });
        }

        self.file.seek(SeekFrom::Start(page.offset()))?;

        // The last page may be short if the file was truncated externally
        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = self.file.read(&mut buffer[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buffer[filled..].fill(0);

        Ok(())
    }

    /// Write a full page, extending the file if needed
    pub fn write_page(&mut self, page: PageId, buffer: &[u8]) -> FileResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(FileError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }

        let offset = page.offset();
        let required_size = offset + PAGE_SIZE as u64;

        let current_size = self.file.metadata()?.len();
        if current_size < required_size {
            self.file.set_len(required_size)?;
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buffer)?;
        // Durability is deferred to sync(), called from BufferPool::flush_all

        Ok(())
    }

    /// Number of pages currently on disk
    pub fn page_count(&self) -> FileResult<usize> {
        let file_size = self.file.metadata()?.len();
        Ok(file_size.div_ceil(PAGE_SIZE as u64) as usize)
    }

    /// Sync the file to disk (flush all OS buffers)
    pub fn sync(&mut self) -> FileResult<()> {
        self.file.sync_data()?;
        Ok(())
    }
}
