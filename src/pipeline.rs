//! ## Container Decryption Pipeline
//!
//! Drives the end-to-end decrypt of one container file: parse the
//! header, resolve the key and file IV, and stream page-wise AES-CBC
//! decryption to an output file.

use std::io::{Read,Seek,SeekFrom,Write};

use crate::container::{self,BootId,ContainerType};
use crate::crypto::{self,keys,PAGE_SIZE};
use crate::host;
use crate::error::BootResult;

const PAGES_PER_CHUNK: usize = 256;

/// What the pipeline produced: the decrypted image's path and the
/// container type, so the caller can decide how to extract it.
pub struct DecryptedContainer {
    pub output_path: std::path::PathBuf,
    pub container_type: ContainerType,
}

/// Decrypt `input_path` into its output filename (computed from the
/// header) in the same directory.
pub fn decrypt_container(input_path: &std::path::Path) -> BootResult<DecryptedContainer> {
    let mut input = std::fs::File::open(input_path)?;

    let mut header_ct = [0u8;96];
    input.read_exact(&mut header_ct).map_err(|_| container::Error::HeaderCorrupt("short read of 96-byte header".into()))?;
    let header_pt = crypto::decrypt_header(&header_ct)?;
    let header = BootId::parse(&header_pt)?;

    let (key, mut file_iv): ([u8;16],Option<[u8;16]>) = match header.container_type {
        ContainerType::Option => (crypto::OPTION_KEY, if header.use_custom_iv() { None } else { Some(crypto::OPTION_IV) }),
        ContainerType::Os => {
            let resolved = keys::resolve(&header.os_id_ascii())?;
            let iv = if header.use_custom_iv() || !resolved.has_iv { None } else { Some(resolved.iv) };
            (resolved.key, iv)
        },
        ContainerType::App => {
            let resolved = keys::resolve(&header.game_id_ascii())?;
            let iv = if header.use_custom_iv() || !resolved.has_iv { None } else { Some(resolved.iv) };
            (resolved.key, iv)
        },
    };

    let data_offset = header.data_offset();
    let payload_length = header.payload_length()?;

    if file_iv.is_none() {
        input.seek(SeekFrom::Start(data_offset))?;
        let mut first_ct = [0u8;16];
        input.read_exact(&mut first_ct)?;
        let expected = header.expected_payload_header();
        file_iv = Some(crypto::recover_file_iv(&key,&expected,&first_ct)?);
    }
    let file_iv = file_iv.ok_or(crypto::Error::IvRecoveryFailed)?;

    let output_filename = header.output_filename();
    let output_path = input_path.with_file_name(&output_filename);
    let mut output = std::fs::File::create(&output_path).map_err(host::Error::Io)?;

    input.seek(SeekFrom::Start(data_offset))?;
    let mut written: u64 = 0;
    let chunk_bytes = PAGES_PER_CHUNK * PAGE_SIZE;
    let result: BootResult<()> = (|| {
        while written < payload_length {
            let remaining = (payload_length - written) as usize;
            let this_chunk = remaining.min(chunk_bytes);
            let mut buf = vec![0u8;this_chunk];
            input.read_exact(&mut buf)?;

            let mut page_off = 0usize;
            while page_off < this_chunk {
                let page = &mut buf[page_off .. page_off + PAGE_SIZE];
                // Offsets are measured from the start of the decrypted
                // payload, not the container file: the first payload page
                // is always page_iv(0, F), matching file-IV recovery above.
                let payload_offset = written + page_off as u64;
                crypto::decrypt_page(&key,&file_iv,payload_offset,page)?;
                page_off += PAGE_SIZE;
            }

            output.write_all(&buf).map_err(host::Error::Io)?;
            written += this_chunk as u64;
            if payload_length > 0 {
                log::info!("decrypt progress: {}%",(written * 100 / payload_length).min(100));
            }
        }
        Ok(())
    })();

    // A failure here aborts the pipeline but, unlike extraction failures,
    // leaves the partial output file on disk — documented behavior, not
    // a guarantee about its contents.
    result?;

    Ok(DecryptedContainer { output_path, container_type: header.container_type })
}
