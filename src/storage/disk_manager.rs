use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;

use super::error::{StorageError, StorageResult};
use super::{PageNo, PAGE_SIZE};

/// Handle to an open file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(usize);

impl FileHandle {
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

/// Owns every open record file and performs raw page I/O and page-number
/// allocation within each file.
pub struct DiskManager {
    /// Map from file handles to open files
    open_files: HashMap<FileHandle, FileEntry>,
    /// Map from file paths to handles (for checking if already open)
    path_to_handle: HashMap<PathBuf, FileHandle>,
    /// Next available file handle
    next_handle: usize,
    /// Maximum number of open files
    max_open_files: usize,
}

struct FileEntry {
    file: File,
    path: PathBuf,
    /// Page number handed out by the next `allocate_page` call
    next_page_no: PageNo,
}

impl DiskManager {
    pub fn new() -> Self {
        Self::with_max_files(128)
    }

    /// Create a new disk manager with specified max open files
    pub fn with_max_files(max_open_files: usize) -> Self {
        Self {
            open_files: HashMap::new(),
            path_to_handle: HashMap::new(),
            next_handle: 0,
            max_open_files,
        }
    }

    /// Create a new file
    pub fn create_file<P: AsRef<Path>>(&mut self, path: P) -> StorageResult<()> {
        let path = path.as_ref();

        if path.exists() {
            return Err(StorageError::FileAlreadyExists(path.display().to_string()));
        }

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        File::create(path)?;
        debug!("created file {}", path.display());
        Ok(())
    }

    /// Open an existing file
    pub fn open_file<P: AsRef<Path>>(&mut self, path: P) -> StorageResult<FileHandle> {
        let path_ref = path.as_ref();
        let path = path_ref
            .canonicalize()
            .map_err(|_| StorageError::FileNotFound(path_ref.display().to_string()))?;

        // Check if file is already open
        if let Some(&handle) = self.path_to_handle.get(&path) {
            return Ok(handle);
        }

        if self.open_files.len() >= self.max_open_files {
            return Err(StorageError::TooManyOpenFiles);
        }

        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        // Seed the page allocator from the file's current size; callers that
        // persist a page count re-sync it through `set_page_counter`.
        let size = file.metadata()?.len();
        let next_page_no = size.div_ceil(PAGE_SIZE as u64) as PageNo;

        let handle = FileHandle(self.next_handle);
        self.next_handle += 1;

        self.open_files.insert(
            handle,
            FileEntry {
                file,
                path: path.clone(),
                next_page_no,
            },
        );
        self.path_to_handle.insert(path, handle);

        Ok(handle)
    }

    /// Close a file
    pub fn close_file(&mut self, handle: FileHandle) -> StorageResult<()> {
        let entry = self
            .open_files
            .remove(&handle)
            .ok_or(StorageError::InvalidHandle(handle.0))?;

        self.path_to_handle.remove(&entry.path);
        Ok(())
    }

    /// Remove (delete) a file
    pub fn remove_file<P: AsRef<Path>>(&mut self, path: P) -> StorageResult<()> {
        let path = path.as_ref();

        // If file is open, close it first
        if let Ok(canonical_path) = path.canonicalize() {
            if let Some(&handle) = self.path_to_handle.get(&canonical_path) {
                self.close_file(handle)?;
            }
        }

        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Read a page from a file. Bytes past the end of the file read as zero.
    pub fn read_page(
        &mut self,
        handle: FileHandle,
        page_no: PageNo,
        buffer: &mut [u8],
    ) -> StorageResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(StorageError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }
        if page_no < 0 {
            return Err(StorageError::InvalidPageNo(page_no));
        }

        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(StorageError::InvalidHandle(handle.0))?;

        let offset = page_no as u64 * PAGE_SIZE as u64;
        entry.file.seek(SeekFrom::Start(offset))?;

        let bytes_read = entry.file.read(buffer)?;

        // If we read less than PAGE_SIZE, fill the rest with zeros
        if bytes_read < PAGE_SIZE {
            buffer[bytes_read..].fill(0);
        }

        Ok(())
    }

    /// Write a page to a file, extending the file if necessary
    pub fn write_page(
        &mut self,
        handle: FileHandle,
        page_no: PageNo,
        buffer: &[u8],
    ) -> StorageResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(StorageError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }
        if page_no < 0 {
            return Err(StorageError::InvalidPageNo(page_no));
        }

        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(StorageError::InvalidHandle(handle.0))?;

        let offset = page_no as u64 * PAGE_SIZE as u64;
        let required_size = offset + PAGE_SIZE as u64;

        let current_size = entry.file.metadata()?.len();
        if current_size < required_size {
            entry.file.set_len(required_size)?;
        }

        entry.file.seek(SeekFrom::Start(offset))?;
        entry.file.write_all(buffer)?;
        // No per-write sync; sync_file / sync_all batch it

        Ok(())
    }

    /// Hand out the next page number in the file
    pub fn allocate_page(&mut self, handle: FileHandle) -> StorageResult<PageNo> {
        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(StorageError::InvalidHandle(handle.0))?;

        let page_no = entry.next_page_no;
        entry.next_page_no += 1;
        debug!("allocated page {} in file {}", page_no, handle.0);
        Ok(page_no)
    }

    /// Return a page number to the allocator. Only the most recently
    /// allocated number can actually be reclaimed; data pages in the middle
    /// of a file are never physically reclaimed.
    pub fn deallocate_page(&mut self, handle: FileHandle, page_no: PageNo) {
        if let Some(entry) = self.open_files.get_mut(&handle) {
            if entry.next_page_no == page_no + 1 {
                entry.next_page_no = page_no;
            }
        }
    }

    /// Re-seed the page allocator, e.g. from a page count persisted in a
    /// file header
    pub fn set_page_counter(&mut self, handle: FileHandle, next_page_no: PageNo) -> StorageResult<()> {
        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(StorageError::InvalidHandle(handle.0))?;

        entry.next_page_no = next_page_no;
        Ok(())
    }

    /// Get the number of pages in a file, from its on-disk size
    pub fn page_count(&mut self, handle: FileHandle) -> StorageResult<usize> {
        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(StorageError::InvalidHandle(handle.0))?;

        let file_size = entry.file.metadata()?.len();
        Ok(file_size.div_ceil(PAGE_SIZE as u64) as usize)
    }

    /// Sync a file to disk (flush all OS buffers)
    pub fn sync_file(&mut self, handle: FileHandle) -> StorageResult<()> {
        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(StorageError::InvalidHandle(handle.0))?;

        entry.file.sync_data()?;
        Ok(())
    }

    /// Sync all open files to disk
    pub fn sync_all(&mut self) -> StorageResult<()> {
        for entry in self.open_files.values_mut() {
            entry.file.sync_data()?;
        }
        Ok(())
    }

    /// Check if a file is open
    pub fn is_file_open(&self, handle: FileHandle) -> bool {
        self.open_files.contains_key(&handle)
    }

    /// Get the number of currently open files
    pub fn open_file_count(&self) -> usize {
        self.open_files.len()
    }
}

impl Default for DiskManager {
    fn default() -> Self {
        Self::new()
    }
}
