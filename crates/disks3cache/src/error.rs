//! Error types for the tiered cache
//!
//! Only construction can fail. Per-operation tier failures are absorbed by
//! the tier adapters and never surface as errors.

use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    Config(String),
    Io(Box<std::io::Error>),
    Local(file_blob_cache::BlobCacheError),
    Remote(object_store::Error),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CacheError::Io(err) => write!(f, "IO error: {}", err),
            CacheError::Local(err) => write!(f, "Local tier error: {}", err),
            CacheError::Remote(err) => write!(f, "Remote tier error: {}", err),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err.as_ref()),
            CacheError::Local(err) => Some(err),
            CacheError::Remote(err) => Some(err),
            CacheError::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

impl From<file_blob_cache::BlobCacheError> for CacheError {
    fn from(err: file_blob_cache::BlobCacheError) -> Self {
        CacheError::Local(err)
    }
}

impl From<object_store::Error> for CacheError {
    fn from(err: object_store::Error) -> Self {
        CacheError::Remote(err)
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
