pub mod record;
pub mod storage;

pub use record::{RecordFile, RecordFileManager, RecordScan, Rid};
pub use storage::{
    BufferPool, DiskManager, FileHandle, LruReplacer, PageId, Replacer, BUFFER_POOL_SIZE, PAGE_SIZE,
};
