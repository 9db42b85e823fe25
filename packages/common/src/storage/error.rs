use std::fmt;

/// Errors that can occur during object storage operations.
///
/// `NotFound` is deliberately its own variant: rollback paths treat a
/// missing object as already deleted, which must not look like a transient
/// backend failure.
#[derive(Debug)]
pub enum StorageError {
    /// The requested object does not exist.
    NotFound(String),
    /// The storage backend rejected or failed the request.
    Backend(String),
    /// An I/O error occurred while moving bytes.
    Io(std::io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(key) => write!(f, "object not found: {key}"),
            Self::Backend(msg) => write!(f, "storage backend error: {msg}"),
            Self::Io(err) => write!(f, "storage IO error: {err}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl StorageError {
    /// True when the error means the object simply is not there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
