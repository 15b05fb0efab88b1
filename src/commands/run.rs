//! Orchestrates one input file: decrypt the container, then (unless
//! suppressed) extract its NTFS or exFAT volume image.

use std::fs::File;

use crate::container::ContainerType;
use crate::error::BootResult;
use crate::{exfat,ntfs,pipeline};

pub fn run(input_file: &str, extract: bool) -> BootResult<()> {
    log::info!("decrypting {input_file}");
    let decrypted = pipeline::decrypt_container(std::path::Path::new(input_file))?;
    log::info!("wrote {}",decrypted.output_path.display());

    if !extract {
        return Ok(());
    }

    let root = ntfs::extraction_root(decrypted.output_path.to_string_lossy().as_ref());
    log::info!("extracting into {}",root.display());

    match decrypted.container_type {
        ContainerType::Os | ContainerType::App => {
            let file = File::open(&decrypted.output_path)?;
            let mut ctx = ntfs::NtfsContext::open(file)?;
            ctx.extract_all(&root)?;
            ntfs::extract_nested_vhd(&root)?;
        },
        ContainerType::Option => {
            let file = File::open(&decrypted.output_path)?;
            let mut ctx = exfat::ExfatContext::open(file)?;
            ctx.extract_all(&root)?;
        },
    }

    Ok(())
}
