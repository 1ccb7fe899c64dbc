use std::io;
use thiserror::Error;

use crate::storage::{PageNo, StorageError};

use super::SlotNo;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Page does not exist: page_no={0}")]
    PageNotExists(PageNo),

    #[error("Record not found: page_no={0}, slot_no={1}")]
    RecordNotFound(PageNo, SlotNo),

    #[error("Invalid slot: page_no={0}, slot_no={1}")]
    InvalidSlot(PageNo, SlotNo),

    #[error("Slot already occupied: page_no={0}, slot_no={1}")]
    SlotOccupied(PageNo, SlotNo),

    #[error("Record size mismatch: expected {expected}, got {actual}")]
    RecordSizeMismatch { expected: usize, actual: usize },

    #[error("Invalid page geometry: record_size={record_size}, slots_per_page={slots_per_page}")]
    InvalidGeometry {
        record_size: usize,
        slots_per_page: usize,
    },

    #[error("Bad file header: {0}")]
    BadHeader(String),
}

pub type RecordResult<T> = Result<T, RecordError>;
