use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures while persisting results at shutdown.
///
/// Nothing on the instrumentation path returns an error; these only surface from
/// [`crate::persist`] and are logged and dropped by the session.
#[derive(Debug)]
pub enum Error {
    /// The output destination could not be created or opened.
    Open { path: PathBuf, reason: io::Error },
    /// Writing or flushing the output failed after it was opened.
    Write { path: PathBuf, reason: io::Error },
}

impl Error {
    pub fn path(&self) -> &PathBuf {
        match self {
            Error::Open { path, .. } | Error::Write { path, .. } => path,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Open { path, reason } => {
                write!(f, "failed to open {}: {}", path.display(), reason)
            }
            Error::Write { path, reason } => {
                write!(f, "error occurred while writing {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { reason, .. } | Error::Write { reason, .. } => Some(reason),
        }
    }
}
