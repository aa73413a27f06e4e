use thiserror::Error;

#[derive(Error, Debug)]
pub enum PositionError {
    #[error("invalid position: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("search depth must be between 1 and 63, got {0}")]
    InvalidDepth(u32),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unrecognised cache magic {0:?}")]
    BadMagic(String),
    #[error("unsupported cache version {0}")]
    BadVersion(u32),
    #[error("cache checksum mismatch")]
    ChecksumMismatch,
    #[error("malformed cache entry for key {0:?}")]
    BadEntry(String),
}
