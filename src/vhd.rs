//! ## VHD Block Device
//!
//! Translates linear byte offsets into file offsets across a fixed or
//! dynamic Virtual Hard Disk image, exposing a single `read` operation
//! to the NTFS extractor.

use std::io::{Read,Seek,SeekFrom};
use binrw::BinRead;

/// Errors from opening or reading a VHD-backed block device.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("VHD format invalid: {0}")]
    VolumeFormatInvalid(String),

    #[error("VHD read failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T,Error>;

const SECTOR_SIZE: u64 = 512;
const MAX_BAT_BYTES: u64 = 1 << 30;

#[derive(BinRead,Debug)]
#[br(big,magic = b"conectix")]
pub struct VhdFooter {
    pub features: u32,
    pub file_format_version: u32,
    pub data_offset: u64,
    pub timestamp: u32,
    pub creator_application: [u8;4],
    pub creator_version: u32,
    pub creator_host_os: u32,
    pub original_size: u64,
    pub current_size: u64,
    pub disk_geometry: u32,
    pub disk_type: u32,
    pub checksum: u32,
    pub unique_id: [u8;16],
    pub saved_state: u8,
}

#[derive(BinRead,Debug)]
#[br(big,magic = b"cxsparse")]
pub struct VhdDynamicHeader {
    pub data_offset: u64,
    pub table_offset: u64,
    pub header_version: u32,
    pub max_table_entries: u32,
    pub block_size: u32,
    pub checksum: u32,
    pub parent_unique_id: [u8;16],
    pub parent_timestamp: u32,
}

const DISK_TYPE_FIXED: u32 = 2;
const DISK_TYPE_DYNAMIC: u32 = 3;

enum Backing {
    Fixed { current_size: u64 },
    Dynamic { block_size: u64, bat: Vec<u32>, sector_bitmap_bytes: u64 },
}

/// A VHD (or a raw, unwrapped image) opened for block-level reads.
pub struct VhdDevice<F> {
    file: F,
    backing: Backing,
}

impl<F: Read+Seek> VhdDevice<F> {
    /// Open `file` as a VHD, reading the footer from its last 512 bytes.
    pub fn open(mut file: F) -> Result<Self> {
        let len = file.seek(SeekFrom::End(0))?;
        if len < SECTOR_SIZE {
            return Err(Error::VolumeFormatInvalid("file too small for a VHD footer".into()));
        }
        file.seek(SeekFrom::Start(len - SECTOR_SIZE))?;
        let mut footer_buf = [0u8;512];
        file.read_exact(&mut footer_buf)?;
        let footer = VhdFooter::read(&mut std::io::Cursor::new(&footer_buf[..]))
            .map_err(|e| Error::VolumeFormatInvalid(format!("bad VHD footer: {e}")))?;

        let backing = match footer.disk_type {
            DISK_TYPE_FIXED => Backing::Fixed { current_size: footer.current_size },
            DISK_TYPE_DYNAMIC => {
                file.seek(SeekFrom::Start(footer.data_offset))?;
                let mut header_buf = [0u8;1024];
                file.read_exact(&mut header_buf)?;
                let header = VhdDynamicHeader::read(&mut std::io::Cursor::new(&header_buf[..]))
                    .map_err(|e| Error::VolumeFormatInvalid(format!("bad VHD dynamic header: {e}")))?;

                let bat_bytes = header.max_table_entries as u64 * 4;
                if bat_bytes == 0 || bat_bytes > MAX_BAT_BYTES {
                    return Err(Error::VolumeFormatInvalid("BAT size is absurd".into()));
                }
                file.seek(SeekFrom::Start(header.table_offset))?;
                let mut bat_raw = vec![0u8;bat_bytes as usize];
                file.read_exact(&mut bat_raw)?;
                let bat: Vec<u32> = bat_raw
                    .chunks_exact(4)
                    .map(|c| u32::from_be_bytes([c[0],c[1],c[2],c[3]]))
                    .collect();

                let block_size = header.block_size as u64;
                let sector_bitmap_bytes = (block_size / SECTOR_SIZE).div_ceil(8);

                Backing::Dynamic { block_size, bat, sector_bitmap_bytes }
            },
            other => return Err(Error::VolumeFormatInvalid(format!("unsupported VHD disk_type {other}"))),
        };

        Ok(VhdDevice { file, backing })
    }

    /// Read `size` bytes starting at linear `offset` into the virtual disk.
    pub fn read(&mut self, offset: u64, size: u64) -> Result<Vec<u8>> {
        match &self.backing {
            Backing::Fixed { current_size } => {
                if offset + size > *current_size {
                    return Err(Error::VolumeFormatInvalid("read past end of fixed VHD".into()));
                }
                self.file.seek(SeekFrom::Start(offset))?;
                let mut buf = vec![0u8;size as usize];
                self.file.read_exact(&mut buf)?;
                Ok(buf)
            },
            Backing::Dynamic { block_size, bat, sector_bitmap_bytes } => {
                let block_size = *block_size;
                let sector_bitmap_bytes = *sector_bitmap_bytes;
                let mut out = Vec::with_capacity(size as usize);
                let mut remaining = size;
                let mut cur = offset;
                while remaining > 0 {
                    let block_idx = (cur / block_size) as usize;
                    let entry = *bat.get(block_idx)
                        .ok_or_else(|| Error::VolumeFormatInvalid("VHD block index out of range".into()))?;
                    let within = cur % block_size;
                    let chunk = remaining.min(block_size - within);

                    if entry == 0xFFFF_FFFF {
                        out.extend(std::iter::repeat(0u8).take(chunk as usize));
                    } else {
                        let block_start = entry as u64 * SECTOR_SIZE;
                        let body_offset = block_start + sector_bitmap_bytes + within;
                        self.file.seek(SeekFrom::Start(body_offset))?;
                        let mut buf = vec![0u8;chunk as usize];
                        self.file.read_exact(&mut buf)?;
                        out.extend(buf);
                    }

                    cur += chunk;
                    remaining -= chunk;
                }
                Ok(out)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build_dynamic_vhd(block0: &[u8], bat1_unallocated: bool) -> Vec<u8> {
        let block_size: u64 = 2 * 1024 * 1024;
        let sector_bitmap_bytes = (block_size / 512).div_ceil(8);
        let header_offset: u64 = 512; // after a dummy footer copy
        let bat_offset = header_offset + 1024;
        let block0_start = bat_offset + 8 * 4; // room for 8 BAT entries, sector-aligned is not required here
        let block0_start = block0_start.div_ceil(512) * 512;

        let mut buf = vec![0u8; (block0_start + sector_bitmap_bytes + block_size) as usize];

        // footer (copy at front, real footer goes at the end too)
        let data_offset = header_offset;

        // dynamic header at header_offset
        buf[header_offset as usize..header_offset as usize+8].copy_from_slice(b"cxsparse");
        buf[header_offset as usize+8..header_offset as usize+16].copy_from_slice(&0u64.to_be_bytes()); // data_offset (unused)
        buf[header_offset as usize+16..header_offset as usize+24].copy_from_slice(&bat_offset.to_be_bytes());
        buf[header_offset as usize+24..header_offset as usize+28].copy_from_slice(&0u32.to_be_bytes()); // header_version
        buf[header_offset as usize+28..header_offset as usize+32].copy_from_slice(&2u32.to_be_bytes()); // max_table_entries
        buf[header_offset as usize+32..header_offset as usize+36].copy_from_slice(&(block_size as u32).to_be_bytes());

        // BAT: entry 0 -> block0_start/512, entry 1 -> unallocated
        let bat0 = (block0_start / 512) as u32;
        buf[bat_offset as usize..bat_offset as usize+4].copy_from_slice(&bat0.to_be_bytes());
        let bat1 = if bat1_unallocated { 0xFFFF_FFFFu32 } else { bat0 + 1 };
        buf[bat_offset as usize+4..bat_offset as usize+8].copy_from_slice(&bat1.to_be_bytes());

        // block 0 body (after sector bitmap)
        let body_start = (block0_start + sector_bitmap_bytes) as usize;
        buf[body_start..body_start+block0.len()].copy_from_slice(block0);

        // footer at the very end
        let total_len = buf.len() as u64 + 512;
        let mut footer = vec![0u8;512];
        footer[0..8].copy_from_slice(b"conectix");
        footer[16..24].copy_from_slice(&data_offset.to_be_bytes());
        footer[48..56].copy_from_slice(&total_len.to_be_bytes()); // current_size (unused for dynamic)
        footer[60..64].copy_from_slice(&DISK_TYPE_DYNAMIC.to_be_bytes());
        buf.extend(footer);
        buf
    }

    /// S4 — VHD dynamic zero-fill.
    #[test]
    fn test_dynamic_vhd_zero_fill_s4() {
        let block_size = 2 * 1024 * 1024usize;
        let block0 = vec![0x55u8;block_size];
        let raw = build_dynamic_vhd(&block0,true);
        let mut dev = VhdDevice::open(Cursor::new(raw)).unwrap();

        let data = dev.read(0,4 * 1024 * 1024).unwrap();
        assert_eq!(&data[0..block_size], &vec![0x55u8;block_size][..]);
        assert_eq!(&data[block_size..], &vec![0u8;block_size][..]);
    }
}
