use std::io;
use thiserror::Error;

use super::PageNo;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("Invalid file handle: {0}")]
    InvalidHandle(usize),

    #[error("Invalid page number: {0}")]
    InvalidPageNo(PageNo),

    #[error("Buffer pool exhausted: every frame is pinned")]
    PoolExhausted,

    #[error("Invalid page buffer size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("File handle limit reached")]
    TooManyOpenFiles,
}

pub type StorageResult<T> = Result<T, StorageError>;
