use log::debug;

use crate::storage::{BufferPool, FileHandle, PageId, PageNo, PinnedPage};

use super::error::{RecordError, RecordResult};
use super::page::{FileHeader, SlotPage};
use super::scan::RecordScan;
use super::{Rid, SlotNo, FIRST_DATA_PAGE, NO_PAGE};

/// Handle to an open record file: record CRUD by `Rid` plus maintenance of
/// the free-page chain rooted in the file header.
///
/// The in-memory header is authoritative while the file is open;
/// `RecordFileManager::close_file` writes it back. Every operation pins
/// exactly one page at a time through a guard, so the pin is released on
/// every exit path; mutation paths mark the page dirty before the guard
/// drops, and all checks precede mutation.
pub struct RecordFile {
    file: FileHandle,
    header: FileHeader,
}

impl RecordFile {
    pub(super) fn new(file: FileHandle, header: FileHeader) -> Self {
        Self { file, header }
    }

    pub fn file_handle(&self) -> FileHandle {
        self.file
    }

    pub(super) fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Size of every record in this file
    pub fn record_size(&self) -> usize {
        self.header.record_size as usize
    }

    pub fn slots_per_page(&self) -> usize {
        self.header.num_records_per_page as usize
    }

    /// Total pages, header page included
    pub fn num_pages(&self) -> u32 {
        self.header.num_pages
    }

    /// Head of the free-page chain, `NO_PAGE` when every data page is full
    pub fn first_free_page_no(&self) -> PageNo {
        self.header.first_free_page_no
    }

    /// Copy the record at `rid` out of its slot
    pub fn get_record(&self, pool: &mut BufferPool, rid: Rid) -> RecordResult<Vec<u8>> {
        let layout = self.header.layout();
        let mut page = self.fetch_page_handle(pool, rid.page_no)?;
        let slot = self.checked_slot(rid)?;
        let view = SlotPage::attach(page.data_mut(), layout);
        if !view.is_occupied(slot) {
            return Err(RecordError::RecordNotFound(rid.page_no, rid.slot_no));
        }
        Ok(view.slot(slot).to_vec())
    }

    /// Insert a record into the first free slot of the free-chain head,
    /// creating a fresh data page when the chain is empty
    pub fn insert_record(&mut self, pool: &mut BufferPool, buf: &[u8]) -> RecordResult<Rid> {
        self.check_record_size(buf)?;
        let layout = self.header.layout();

        let mut page = self.create_page_handle(pool)?;
        let page_no = page.id().page_no;
        let mut view = SlotPage::attach(page.data_mut(), layout);

        let slot = view.first_free_slot();
        debug_assert!(slot < layout.slots_per_page);
        view.slot_mut(slot).copy_from_slice(buf);
        view.occupy(slot);
        if view.is_full() {
            // Last slot taken: the head leaves the free chain
            self.header.first_free_page_no = view.next_free_page_no();
        }
        page.mark_dirty();
        Ok(Rid::new(page_no, slot as SlotNo))
    }

    /// Insert a record at a caller-chosen position, growing the file until
    /// the page exists. Used by replay paths that must reproduce rids.
    pub fn insert_record_at(
        &mut self,
        pool: &mut BufferPool,
        rid: Rid,
        buf: &[u8],
    ) -> RecordResult<()> {
        self.check_record_size(buf)?;
        let slot = self.checked_slot(rid)?;
        if rid.page_no < FIRST_DATA_PAGE {
            return Err(RecordError::PageNotExists(rid.page_no));
        }

        // Grow until the target page exists; every fresh page joins the
        // free chain as its header is initialized
        while rid.page_no as u32 >= self.header.num_pages {
            self.create_new_page_handle(pool)?;
        }

        let layout = self.header.layout();
        let mut page = self.fetch_page_handle(pool, rid.page_no)?;
        let mut view = SlotPage::attach(page.data_mut(), layout);
        if view.is_occupied(slot) {
            return Err(RecordError::SlotOccupied(rid.page_no, rid.slot_no));
        }
        view.slot_mut(slot).copy_from_slice(buf);
        view.occupy(slot);
        let became_full = view.is_full();
        let next = view.next_free_page_no();
        page.mark_dirty();
        drop(page);

        if became_full {
            // The target is not necessarily the chain head after growth
            self.unlink_free_page(pool, rid.page_no, next)?;
        }
        Ok(())
    }

    /// Delete the record at `rid`; a page that was full re-enters the free
    /// chain at its head
    pub fn delete_record(&mut self, pool: &mut BufferPool, rid: Rid) -> RecordResult<()> {
        let layout = self.header.layout();
        let mut page = self.fetch_page_handle(pool, rid.page_no)?;
        let slot = self.checked_slot(rid)?;
        let mut view = SlotPage::attach(page.data_mut(), layout);
        if !view.is_occupied(slot) {
            return Err(RecordError::RecordNotFound(rid.page_no, rid.slot_no));
        }

        let was_full = view.is_full();
        view.vacate(slot);
        if was_full {
            view.set_next_free_page_no(self.header.first_free_page_no);
            self.header.first_free_page_no = rid.page_no;
        }
        page.mark_dirty();
        Ok(())
    }

    /// Overwrite the record at `rid`
    pub fn update_record(&mut self, pool: &mut BufferPool, rid: Rid, buf: &[u8]) -> RecordResult<()> {
        self.check_record_size(buf)?;
        let layout = self.header.layout();
        let mut page = self.fetch_page_handle(pool, rid.page_no)?;
        let slot = self.checked_slot(rid)?;
        let mut view = SlotPage::attach(page.data_mut(), layout);
        if !view.is_occupied(slot) {
            return Err(RecordError::RecordNotFound(rid.page_no, rid.slot_no));
        }
        view.slot_mut(slot).copy_from_slice(buf);
        page.mark_dirty();
        Ok(())
    }

    /// Collect every record in `(page_no, slot_no)` order
    pub fn scan(&self, pool: &mut BufferPool) -> RecordResult<Vec<(Rid, Vec<u8>)>> {
        let mut results = Vec::new();
        let mut scan = RecordScan::new(self, pool)?;
        while !scan.is_end() {
            let rid = scan.rid();
            results.push((rid, self.get_record(pool, rid)?));
            scan.next(pool)?;
        }
        Ok(results)
    }

    /// Pin an existing data page
    pub(super) fn fetch_page_handle<'p>(
        &self,
        pool: &'p mut BufferPool,
        page_no: PageNo,
    ) -> RecordResult<PinnedPage<'p>> {
        if page_no < FIRST_DATA_PAGE || page_no as u32 >= self.header.num_pages {
            return Err(RecordError::PageNotExists(page_no));
        }
        Ok(pool.acquire(PageId::new(self.file, page_no))?)
    }

    /// Pin a page with at least one free slot: the chain head, or a fresh
    /// page when the chain is empty
    fn create_page_handle<'p>(&mut self, pool: &'p mut BufferPool) -> RecordResult<PinnedPage<'p>> {
        if self.header.first_free_page_no == NO_PAGE {
            self.create_new_page_handle(pool)
        } else {
            self.fetch_page_handle(pool, self.header.first_free_page_no)
        }
    }

    /// Allocate and format a fresh data page and prepend it to the free chain
    fn create_new_page_handle<'p>(
        &mut self,
        pool: &'p mut BufferPool,
    ) -> RecordResult<PinnedPage<'p>> {
        let layout = self.header.layout();
        let mut page = pool.acquire_new(self.file)?;
        let page_no = page.id().page_no;
        debug_assert_eq!(page_no, self.header.num_pages as PageNo);

        let mut view = SlotPage::init(page.data_mut(), layout);
        view.set_next_free_page_no(self.header.first_free_page_no);
        page.mark_dirty();

        self.header.num_pages += 1;
        self.header.first_free_page_no = page_no;
        debug!(
            "grew record file {} to {} pages",
            self.file.as_usize(),
            self.header.num_pages
        );
        Ok(page)
    }

    /// Remove a now-full page from the free chain, wherever it sits
    fn unlink_free_page(
        &mut self,
        pool: &mut BufferPool,
        page_no: PageNo,
        next: PageNo,
    ) -> RecordResult<()> {
        if self.header.first_free_page_no == page_no {
            self.header.first_free_page_no = next;
            return Ok(());
        }
        let layout = self.header.layout();
        let mut cur = self.header.first_free_page_no;
        while cur != NO_PAGE {
            let mut page = self.fetch_page_handle(pool, cur)?;
            let mut view = SlotPage::attach(page.data_mut(), layout);
            let cur_next = view.next_free_page_no();
            if cur_next == page_no {
                view.set_next_free_page_no(next);
                page.mark_dirty();
                return Ok(());
            }
            cur = cur_next;
        }
        Ok(())
    }

    /// Serialize the in-memory header onto page 0
    pub(super) fn write_header_page(&self, pool: &mut BufferPool) -> RecordResult<()> {
        let mut page = pool.acquire(PageId::new(self.file, 0))?;
        let data = page.data_mut();
        data.fill(0);
        data[..FileHeader::SIZE].copy_from_slice(&self.header.serialize());
        page.mark_dirty();
        Ok(())
    }

    fn check_record_size(&self, buf: &[u8]) -> RecordResult<()> {
        if buf.len() != self.header.record_size as usize {
            return Err(RecordError::RecordSizeMismatch {
                expected: self.header.record_size as usize,
                actual: buf.len(),
            });
        }
        Ok(())
    }

    fn checked_slot(&self, rid: Rid) -> RecordResult<usize> {
        if rid.slot_no < 0 || rid.slot_no as u32 >= self.header.num_records_per_page {
            return Err(RecordError::InvalidSlot(rid.page_no, rid.slot_no));
        }
        Ok(rid.slot_no as usize)
    }
}
