//! # Error Module
//!
//! Each component in this crate (`crypto`, `container`, `vhd`, `ntfs`,
//! `exfat`, `host`) owns a `thiserror`-derived error enum for its own
//! fallible operations. This top-level `Error` composes them via
//! `#[from]`, following spec section 7's taxonomy and the teacher's
//! convention of one error enum per module. Every kind aborts processing
//! of the current input; the CLI driver continues with the next input
//! file (see `commands::run`).

/// The error type returned by this crate's public, orchestration-level
/// entry points (`pipeline::decrypt_container`, `commands::run::run`).
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("could not open, seek, or read input: {0}")]
    InputNotReadable(String),

    #[error(transparent)]
    Crypto(#[from] crate::crypto::Error),

    #[error(transparent)]
    Container(#[from] crate::container::Error),

    #[error(transparent)]
    Vhd(#[from] crate::vhd::Error),

    #[error(transparent)]
    Ntfs(#[from] crate::ntfs::Error),

    #[error(transparent)]
    Exfat(#[from] crate::exfat::Error),

    #[error(transparent)]
    Host(#[from] crate::host::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::InputNotReadable(e.to_string())
    }
}

pub type BootResult<T> = Result<T,Error>;
