use crate::storage::BufferPool;

use super::bitmap;
use super::error::RecordResult;
use super::file_handle::RecordFile;
use super::{Rid, SlotNo, FIRST_DATA_PAGE, NO_PAGE};

/// Forward cursor over the occupied slots of a record file, in ascending
/// `(page_no, slot_no)` order.
///
/// The cursor holds a `Rid`; `slot_no == -1` means "before the first slot of
/// this page", and `page_no == NO_PAGE` means exhausted. Each call observes
/// the file as it is then; there is no snapshot, and concurrent mutation is
/// undefined.
pub struct RecordScan<'f> {
    file: &'f RecordFile,
    rid: Rid,
}

impl<'f> RecordScan<'f> {
    /// Position on the first occupied slot of the file, if any
    pub fn new(file: &'f RecordFile, pool: &mut BufferPool) -> RecordResult<Self> {
        let mut scan = Self {
            file,
            rid: Rid::new(FIRST_DATA_PAGE, -1),
        };
        scan.next(pool)?;
        Ok(scan)
    }

    /// Advance to the next occupied slot
    pub fn next(&mut self, pool: &mut BufferPool) -> RecordResult<()> {
        let layout = self.file.header().layout();
        let slots = layout.slots_per_page;

        while self.rid.page_no != NO_PAGE && (self.rid.page_no as u32) < self.file.num_pages() {
            let slot = {
                let page = self.file.fetch_page_handle(pool, self.rid.page_no)?;
                bitmap::next_bit(
                    true,
                    &page.data()[layout.bitmap_range()],
                    slots,
                    self.rid.slot_no,
                )
            };
            if slot < slots {
                self.rid.slot_no = slot as SlotNo;
                return Ok(());
            }
            self.rid = Rid::new(self.rid.page_no + 1, -1);
        }

        self.rid = Rid::new(NO_PAGE, -1);
        Ok(())
    }

    pub fn is_end(&self) -> bool {
        self.rid.page_no == NO_PAGE
    }

    /// Current position; valid only while `!is_end()`
    pub fn rid(&self) -> Rid {
        self.rid
    }
}
