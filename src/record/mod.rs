pub mod bitmap;
mod error;
mod file_handle;
mod page;
mod scan;

pub use error::{RecordError, RecordResult};
pub use file_handle::RecordFile;
pub use page::{FileHeader, PageHeader, PageLayout, SlotPage};
pub use scan::RecordScan;

use std::path::Path;
use std::sync::{Arc, Mutex};

use log::debug;

use crate::storage::{BufferPool, PageId, PageNo, PAGE_SIZE};

/// Free-chain terminator
pub const NO_PAGE: PageNo = -1;

/// First data page of a record file; page 0 holds the file header
pub const FIRST_DATA_PAGE: PageNo = 1;

/// Slot number within a data page; -1 is the scan cursor's "before first"
pub type SlotNo = i32;

/// Physical identifier for a record (page + slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rid {
    pub page_no: PageNo,
    pub slot_no: SlotNo,
}

impl Rid {
    pub fn new(page_no: PageNo, slot_no: SlotNo) -> Self {
        Self { page_no, slot_no }
    }
}

/// Creates, opens, and closes record files over a shared buffer pool.
///
/// The `Arc<Mutex<BufferPool>>` is the store's single concurrency boundary:
/// callers lock it for the full duration of each record operation.
pub struct RecordFileManager {
    pool: Arc<Mutex<BufferPool>>,
}

impl RecordFileManager {
    pub fn new(pool: Arc<Mutex<BufferPool>>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<Mutex<BufferPool>> {
        &self.pool
    }

    /// Create a record file with the default page geometry for `record_size`
    pub fn create_file<P: AsRef<Path>>(&self, path: P, record_size: usize) -> RecordResult<()> {
        let slots_per_page = FileHeader::default_slots_per_page(record_size);
        self.create_file_with(path, record_size, slots_per_page)
    }

    /// Create a record file with an explicit slots-per-page
    pub fn create_file_with<P: AsRef<Path>>(
        &self,
        path: P,
        record_size: usize,
        slots_per_page: usize,
    ) -> RecordResult<()> {
        if record_size == 0 || slots_per_page == 0 {
            return Err(RecordError::InvalidGeometry {
                record_size,
                slots_per_page,
            });
        }
        let header = FileHeader::new(record_size as u32, slots_per_page as u32);
        if !header.layout().fits_page() {
            return Err(RecordError::InvalidGeometry {
                record_size,
                slots_per_page,
            });
        }

        let mut pool = self.pool.lock().unwrap();
        let disk = pool.disk_manager_mut();
        disk.create_file(&path)?;
        let file = disk.open_file(&path)?;

        // The file is not shared yet; write the header page directly
        let mut buf = vec![0u8; PAGE_SIZE];
        buf[..FileHeader::SIZE].copy_from_slice(&header.serialize());
        disk.write_page(file, 0, &buf)?;
        disk.close_file(file)?;

        debug!(
            "created record file {} (record_size={}, slots_per_page={})",
            path.as_ref().display(),
            record_size,
            slots_per_page
        );
        Ok(())
    }

    /// Open a record file, validating its header
    pub fn open_file<P: AsRef<Path>>(&self, path: P) -> RecordResult<RecordFile> {
        let mut pool = self.pool.lock().unwrap();
        let file = pool.disk_manager_mut().open_file(&path)?;

        let header = {
            let page = pool.acquire(PageId::new(file, 0))?;
            FileHeader::deserialize(page.data())?
        };
        if let Err(err) = header.validate() {
            pool.disk_manager_mut().close_file(file)?;
            return Err(err);
        }

        // The header's page count is authoritative for allocation
        pool.disk_manager_mut()
            .set_page_counter(file, header.num_pages as PageNo)?;

        debug!(
            "opened record file {} ({} pages)",
            path.as_ref().display(),
            header.num_pages
        );
        Ok(RecordFile::new(file, header))
    }

    /// Write the header back, flush every page of the file, and close it
    pub fn close_file(&self, file: RecordFile) -> RecordResult<()> {
        let mut pool = self.pool.lock().unwrap();
        file.write_header_page(&mut pool)?;
        pool.flush_all_pages(file.file_handle())?;
        pool.disk_manager_mut().close_file(file.file_handle())?;
        Ok(())
    }

    /// Delete a record file from disk
    pub fn remove_file<P: AsRef<Path>>(&self, path: P) -> RecordResult<()> {
        let mut pool = self.pool.lock().unwrap();
        pool.disk_manager_mut().remove_file(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DiskManager;
    use tempfile::TempDir;

    fn setup() -> (TempDir, RecordFileManager) {
        let temp_dir = tempfile::tempdir().unwrap();
        let disk = DiskManager::new();
        let pool = Arc::new(Mutex::new(BufferPool::with_capacity(disk, 8)));
        (temp_dir, RecordFileManager::new(pool))
    }

    #[test]
    fn test_create_and_open_file() {
        let (temp_dir, manager) = setup();
        let path = temp_dir.path().join("t.db");

        manager.create_file(&path, 23).unwrap();
        let file = manager.open_file(&path).unwrap();

        assert_eq!(file.record_size(), 23);
        assert_eq!(file.slots_per_page(), FileHeader::default_slots_per_page(23));
        assert_eq!(file.num_pages(), 1);
        assert_eq!(file.first_free_page_no(), NO_PAGE);
    }

    #[test]
    fn test_create_rejects_bad_geometry() {
        let (temp_dir, manager) = setup();
        let path = temp_dir.path().join("t.db");

        assert!(matches!(
            manager.create_file(&path, 0),
            Err(RecordError::InvalidGeometry { .. })
        ));
        assert!(matches!(
            manager.create_file_with(&path, 8, 0),
            Err(RecordError::InvalidGeometry { .. })
        ));
        // 100k slots of 8 bytes cannot fit one page
        assert!(matches!(
            manager.create_file_with(&path, 8, 100_000),
            Err(RecordError::InvalidGeometry { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_open_rejects_garbage_header() {
        let (temp_dir, manager) = setup();
        let path = temp_dir.path().join("junk.db");

        {
            let mut pool = manager.pool().lock().unwrap();
            let disk = pool.disk_manager_mut();
            disk.create_file(&path).unwrap();
            let file = disk.open_file(&path).unwrap();
            let buf = vec![0xabu8; PAGE_SIZE];
            disk.write_page(file, 0, &buf).unwrap();
            disk.close_file(file).unwrap();
        }

        assert!(matches!(
            manager.open_file(&path),
            Err(RecordError::BadHeader(_))
        ));
    }

    #[test]
    fn test_records_survive_close_and_reopen() {
        let (temp_dir, manager) = setup();
        let path = temp_dir.path().join("t.db");

        manager.create_file_with(&path, 8, 4).unwrap();
        let mut file = manager.open_file(&path).unwrap();

        let rids: Vec<Rid> = {
            let mut pool = manager.pool().lock().unwrap();
            (0..6u8)
                .map(|i| file.insert_record(&mut pool, &[i; 8]).unwrap())
                .collect()
        };
        let head_before = file.first_free_page_no();
        let pages_before = file.num_pages();
        manager.close_file(file).unwrap();

        let file = manager.open_file(&path).unwrap();
        assert_eq!(file.num_pages(), pages_before);
        assert_eq!(file.first_free_page_no(), head_before);

        let mut pool = manager.pool().lock().unwrap();
        for (i, rid) in rids.iter().enumerate() {
            assert_eq!(file.get_record(&mut pool, *rid).unwrap(), [i as u8; 8]);
        }
    }

    #[test]
    fn test_reopen_continues_allocation_correctly() {
        let (temp_dir, manager) = setup();
        let path = temp_dir.path().join("t.db");

        manager.create_file_with(&path, 8, 2).unwrap();
        let mut file = manager.open_file(&path).unwrap();
        {
            let mut pool = manager.pool().lock().unwrap();
            for i in 0..4u8 {
                file.insert_record(&mut pool, &[i; 8]).unwrap();
            }
        }
        manager.close_file(file).unwrap();

        // New pages after reopen continue past the persisted page count
        let mut file = manager.open_file(&path).unwrap();
        let mut pool = manager.pool().lock().unwrap();
        let rid = file.insert_record(&mut pool, &[9; 8]).unwrap();
        assert_eq!(rid, Rid::new(3, 0));
        assert_eq!(file.num_pages(), 4);
    }

    #[test]
    fn test_remove_file() {
        let (temp_dir, manager) = setup();
        let path = temp_dir.path().join("t.db");

        manager.create_file(&path, 8).unwrap();
        assert!(path.exists());
        manager.remove_file(&path).unwrap();
        assert!(!path.exists());
    }
}
