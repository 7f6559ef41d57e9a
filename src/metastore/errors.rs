use std::fmt;

/// Errors raised by the metadata store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaError {
    /// The backing store could not be opened (fatal at startup)
    OpenFailed(String),
    /// Any other failure reported by the backend
    OtherDBError(String),
    /// A stored value could not be encoded or decoded
    Codec(String),
}

impl fmt::Display for MetaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaError::OpenFailed(e) => write!(f, "failed to open metadata store: {}", e),
            MetaError::OtherDBError(e) => write!(f, "metadata store error: {}", e),
            MetaError::Codec(e) => write!(f, "metadata codec error: {}", e),
        }
    }
}

impl std::error::Error for MetaError {}

impl From<fjall::Error> for MetaError {
    fn from(err: fjall::Error) -> Self {
        MetaError::OtherDBError(err.to_string())
    }
}
