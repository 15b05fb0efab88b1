//! ## Host Filesystem Adapter
//!
//! Directory creation and path-traversal guarding for extracted entries.

use std::path::{Path,PathBuf};

/// Errors raised while creating directories or writing extracted files
/// on the host filesystem.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("unsafe path in directory entry: {0}")]
    PathUnsafe(String),

    #[error("could not create directory or write extracted file: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T,Error>;

/// Create all missing directory components; an already-existing
/// directory is not an error.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Join `parent` with `name`, rejecting directory-entry names that could
/// escape `parent` via `..`, `./`, `.\`, or a POSIX-absolute path.
pub fn safe_join(parent: &Path, name: &str) -> Result<PathBuf> {
    if name.contains("..") || name.contains("./") || name.contains(".\\") || name.starts_with('/') {
        return Err(Error::PathUnsafe(name.to_string()));
    }
    Ok(parent.join(name))
}
