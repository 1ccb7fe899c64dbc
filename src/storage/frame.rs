use super::{PageId, PAGE_SIZE};

/// One slot of the buffer pool: a page-sized buffer plus the bookkeeping the
/// pool needs to decide when the buffer can be reused.
///
/// Only the buffer pool mutates the identity, pin count, and dirty flag;
/// callers see them read-only and write page bytes through `data_mut`.
pub struct Frame {
    pub(super) data: Vec<u8>,
    pub(super) id: Option<PageId>,
    pub(super) pin_count: u32,
    pub(super) dirty: bool,
}

impl Frame {
    pub(super) fn new() -> Self {
        Self {
            data: vec![0u8; PAGE_SIZE],
            id: None,
            pin_count: 0,
            dirty: false,
        }
    }

    /// Identity of the page currently held, if any
    pub fn id(&self) -> Option<PageId> {
        self.id
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Clear identity and bookkeeping and zero the buffer
    pub(super) fn reset(&mut self) {
        self.id = None;
        self.pin_count = 0;
        self.dirty = false;
        self.data.fill(0);
    }
}
