//! # `bootctl`
//!
//! Decrypts vendor boot containers and unpacks the NTFS or exFAT volume
//! image inside them to the host filesystem.
//!
//! ## Architecture
//!
//! Data flows strictly forward and the stages share no state beyond
//! filenames on disk:
//!
//! 1. [`container`] parses the 96-byte descriptor and classifies it.
//! 2. [`crypto`] derives per-page IVs and performs the AES-128-CBC work;
//!    [`crypto::keys`] resolves the decryption key for a container.
//! 3. [`pipeline`] drives page-wise decryption of the payload into a raw
//!    volume image.
//! 4. [`vhd`] exposes that image (or a VHD wrapping it) as a linear
//!    block device.
//! 5. [`ntfs`] and [`exfat`] walk their respective volume formats and
//!    extract files and directories through [`host`].

pub mod error;
pub mod crypto;
pub mod container;
pub mod pipeline;
pub mod vhd;
pub mod ntfs;
pub mod exfat;
pub mod host;
pub mod commands;

pub use error::{Error,BootResult};
