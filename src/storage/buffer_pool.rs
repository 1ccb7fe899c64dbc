use std::collections::{HashMap, VecDeque};

use log::debug;

use super::disk_manager::{DiskManager, FileHandle};
use super::error::{StorageError, StorageResult};
use super::frame::Frame;
use super::replacer::{LruReplacer, Replacer};
use super::{FrameId, PageId, BUFFER_POOL_SIZE};

/// Buffer pool mediating all access to disk pages through a fixed array of
/// in-memory frames.
///
/// Every frame id is in exactly one of the page table's range or the free
/// list. A resident frame with `pin_count == 0` sits in the page table and in
/// the replacer's eligible set; victim selection drains the free list first
/// and consults the replacer only when it is empty.
///
/// The pool's methods take `&mut self`; share it across threads behind an
/// `Arc<Mutex<BufferPool>>` and hold the lock for the full duration of each
/// record operation.
pub struct BufferPool {
    disk: DiskManager,
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    replacer: Box<dyn Replacer>,
}

impl BufferPool {
    pub fn new(disk: DiskManager) -> Self {
        Self::with_capacity(disk, BUFFER_POOL_SIZE)
    }

    pub fn with_capacity(disk: DiskManager, capacity: usize) -> Self {
        Self::with_replacer(disk, capacity, Box::new(LruReplacer::new(capacity)))
    }

    pub fn with_replacer(disk: DiskManager, capacity: usize, replacer: Box<dyn Replacer>) -> Self {
        Self {
            disk,
            frames: (0..capacity).map(|_| Frame::new()).collect(),
            page_table: HashMap::new(),
            free_list: (0..capacity).collect(),
            replacer,
        }
    }

    pub fn disk_manager(&self) -> &DiskManager {
        &self.disk
    }

    pub fn disk_manager_mut(&mut self) -> &mut DiskManager {
        &mut self.disk
    }

    /// Number of frames in the pool
    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    /// Check if a page is resident
    pub fn contains_page(&self, pid: PageId) -> bool {
        self.page_table.contains_key(&pid)
    }

    /// Read-only view of the frame holding a page, if resident
    pub fn page_frame(&self, pid: PageId) -> Option<&Frame> {
        self.page_table.get(&pid).map(|&frame_id| &self.frames[frame_id])
    }

    /// Fetch a page into the pool and pin it.
    ///
    /// On a hit the frame's pin count is incremented; on a miss a victim
    /// frame is found (free list first, then replacer), written back if
    /// dirty, and refilled from disk with `pin_count = 1`.
    pub fn fetch_page(&mut self, pid: PageId) -> StorageResult<&mut Frame> {
        let frame_id = self.fetch_frame(pid)?;
        Ok(&mut self.frames[frame_id])
    }

    /// Allocate a brand-new page in `file` and pin a zeroed frame for it.
    ///
    /// If no frame can be found the fresh page number is returned to the
    /// allocator before the error surfaces.
    pub fn new_page(&mut self, file: FileHandle) -> StorageResult<(PageId, &mut Frame)> {
        let (pid, frame_id) = self.new_frame(file)?;
        Ok((pid, &mut self.frames[frame_id]))
    }

    /// Fetch a page and wrap it in a guard that unpins on drop.
    pub fn acquire(&mut self, pid: PageId) -> StorageResult<PinnedPage<'_>> {
        let frame_id = self.fetch_frame(pid)?;
        Ok(PinnedPage {
            pid,
            frame_id,
            dirty: false,
            pool: self,
        })
    }

    /// Allocate a new page and wrap it in a guard that unpins on drop.
    pub fn acquire_new(&mut self, file: FileHandle) -> StorageResult<PinnedPage<'_>> {
        let (pid, frame_id) = self.new_frame(file)?;
        Ok(PinnedPage {
            pid,
            frame_id,
            dirty: false,
            pool: self,
        })
    }

    /// Drop one pin on a resident page.
    ///
    /// Returns `true` for a non-resident page (idempotent no-op) and `false`
    /// for a resident page whose pin count is already zero; in both cases
    /// pool state is untouched. The dirty flag is sticky: `is_dirty = false`
    /// never clears it.
    pub fn unpin_page(&mut self, pid: PageId, is_dirty: bool) -> bool {
        let Some(&frame_id) = self.page_table.get(&pid) else {
            return true;
        };
        let frame = &mut self.frames[frame_id];
        if frame.pin_count == 0 {
            return false;
        }
        frame.pin_count -= 1;
        if is_dirty {
            frame.dirty = true;
        }
        if frame.pin_count == 0 {
            self.replacer.unpin(frame_id);
        }
        true
    }

    /// Write a resident page back to disk and clear its dirty flag,
    /// regardless of pin count. Returns `false` if the page is not resident.
    pub fn flush_page(&mut self, pid: PageId) -> StorageResult<bool> {
        let Some(&frame_id) = self.page_table.get(&pid) else {
            return Ok(false);
        };
        let frame = &mut self.frames[frame_id];
        self.disk.write_page(pid.file, pid.page_no, &frame.data)?;
        frame.dirty = false;
        Ok(true)
    }

    /// Write every resident page of `file` back to disk, dirty or not,
    /// clearing dirty flags. Pin state is not inspected.
    pub fn flush_all_pages(&mut self, file: FileHandle) -> StorageResult<()> {
        debug!("flushing all pages of file {}", file.as_usize());
        for frame in &mut self.frames {
            let Some(pid) = frame.id else { continue };
            if pid.file != file {
                continue;
            }
            self.disk.write_page(pid.file, pid.page_no, &frame.data)?;
            frame.dirty = false;
        }
        Ok(())
    }

    /// Evict a page from the pool and deallocate it on disk.
    ///
    /// Non-resident pages count as deleted (`true`); a pinned page cannot be
    /// deleted (`false`).
    pub fn delete_page(&mut self, pid: PageId) -> StorageResult<bool> {
        let Some(&frame_id) = self.page_table.get(&pid) else {
            return Ok(true);
        };
        if self.frames[frame_id].pin_count > 0 {
            return Ok(false);
        }
        self.page_table.remove(&pid);
        // The frame moves to the free list; it must leave the replacer's
        // eligible set or it could be handed out twice.
        self.replacer.pin(frame_id);
        self.frames[frame_id].reset();
        self.free_list.push_back(frame_id);
        self.disk.deallocate_page(pid.file, pid.page_no);
        Ok(true)
    }

    fn fetch_frame(&mut self, pid: PageId) -> StorageResult<FrameId> {
        if let Some(&frame_id) = self.page_table.get(&pid) {
            self.frames[frame_id].pin_count += 1;
            self.replacer.pin(frame_id);
            return Ok(frame_id);
        }

        let frame_id = self.find_victim_frame().ok_or(StorageError::PoolExhausted)?;
        self.reclaim_victim(frame_id)?;

        let frame = &mut self.frames[frame_id];
        if let Err(err) = self.disk.read_page(pid.file, pid.page_no, &mut frame.data) {
            // The victim's old image is safely on disk; retire the frame
            self.frames[frame_id].reset();
            self.free_list.push_back(frame_id);
            return Err(err);
        }

        let frame = &mut self.frames[frame_id];
        frame.id = Some(pid);
        frame.pin_count = 1;
        frame.dirty = false;
        self.page_table.insert(pid, frame_id);
        self.replacer.pin(frame_id);
        Ok(frame_id)
    }

    fn new_frame(&mut self, file: FileHandle) -> StorageResult<(PageId, FrameId)> {
        let page_no = self.disk.allocate_page(file)?;
        let pid = PageId::new(file, page_no);

        let Some(frame_id) = self.find_victim_frame() else {
            self.disk.deallocate_page(file, page_no);
            return Err(StorageError::PoolExhausted);
        };
        if let Err(err) = self.reclaim_victim(frame_id) {
            self.disk.deallocate_page(file, page_no);
            return Err(err);
        }

        let frame = &mut self.frames[frame_id];
        frame.data.fill(0);
        frame.id = Some(pid);
        frame.pin_count = 1;
        frame.dirty = false;
        self.page_table.insert(pid, frame_id);
        self.replacer.pin(frame_id);
        Ok((pid, frame_id))
    }

    /// Free-list drain, else replacer victim
    fn find_victim_frame(&mut self) -> Option<FrameId> {
        if let Some(frame_id) = self.free_list.pop_front() {
            return Some(frame_id);
        }
        self.replacer.victim()
    }

    /// Write back a victim frame if dirty and drop its page-table entry.
    /// On a write error the frame is returned to wherever it came from.
    fn reclaim_victim(&mut self, frame_id: FrameId) -> StorageResult<()> {
        if let Err(err) = self.write_back(frame_id) {
            if self.frames[frame_id].id.is_some() {
                self.replacer.unpin(frame_id);
            } else {
                self.free_list.push_front(frame_id);
            }
            return Err(err);
        }
        if let Some(old) = self.frames[frame_id].id {
            self.page_table.remove(&old);
        }
        Ok(())
    }

    fn write_back(&mut self, frame_id: FrameId) -> StorageResult<()> {
        let frame = &mut self.frames[frame_id];
        if frame.dirty {
            if let Some(pid) = frame.id {
                debug!(
                    "evicting dirty page {} of file {} from frame {}",
                    pid.page_no,
                    pid.file.as_usize(),
                    frame_id
                );
                self.disk.write_page(pid.file, pid.page_no, &frame.data)?;
            }
            frame.dirty = false;
        }
        Ok(())
    }
}

/// Scoped page pin: releases its pin when dropped, reporting dirtiness that
/// was declared through `mark_dirty`.
pub struct PinnedPage<'a> {
    pool: &'a mut BufferPool,
    pid: PageId,
    frame_id: FrameId,
    dirty: bool,
}

impl PinnedPage<'_> {
    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn data(&self) -> &[u8] {
        &self.pool.frames[self.frame_id].data
    }

    /// Mutable page bytes. Does not mark the page dirty by itself; mutation
    /// paths call `mark_dirty` before the guard drops.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.pool.frames[self.frame_id].data
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl Drop for PinnedPage<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.pid, self.dirty);
    }
}
