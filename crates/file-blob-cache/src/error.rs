//! Error types for the file blob cache

use std::fmt;

#[derive(Debug)]
pub enum BlobCacheError {
    Io(Box<std::io::Error>),
    /// The blob is larger than the whole cache capacity
    TooLarge { size: u64, max_size: u64 },
}

impl fmt::Display for BlobCacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobCacheError::Io(err) => write!(f, "IO error: {}", err),
            BlobCacheError::TooLarge { size, max_size } => write!(
                f,
                "Blob of {} bytes exceeds cache capacity of {} bytes",
                size, max_size
            ),
        }
    }
}

impl std::error::Error for BlobCacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlobCacheError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BlobCacheError {
    fn from(err: std::io::Error) -> Self {
        BlobCacheError::Io(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, BlobCacheError>;
