//! exFAT boot sector parsing.

use binrw::BinRead;
use super::{Error,Result};

pub const EXFAT_JUMP: [u8;3] = [0xEB,0x76,0x90];
pub const EXFAT_FS_NAME: [u8;8] = *b"EXFAT   ";

#[derive(BinRead,Debug)]
#[br(little)]
pub struct ExfatBootSector {
    pub jump: [u8;3],
    pub fs_name: [u8;8],
    #[br(pad_before = 53)]
    pub partition_offset: u64,
    pub volume_length: u64,
    pub fat_offset: u32,
    pub fat_length: u32,
    pub cluster_heap_offset: u32,
    pub cluster_count: u32,
    pub first_cluster_of_root_directory: u32,
    pub volume_serial_number: u32,
    pub fs_revision: u16,
    pub volume_flags: u16,
    pub bytes_per_sector_shift: u8,
    pub sectors_per_cluster_shift: u8,
    pub number_of_fats: u8,
}

impl ExfatBootSector {
    pub fn parse(buf: &[u8]) -> Result<ExfatBootSector> {
        let mut cursor = std::io::Cursor::new(buf);
        let bs = ExfatBootSector::read(&mut cursor)
            .map_err(|e| Error::VolumeFormatInvalid(format!("bad exFAT boot sector: {e}")))?;
        if bs.jump != EXFAT_JUMP || bs.fs_name != EXFAT_FS_NAME {
            return Err(Error::VolumeFormatInvalid("missing exFAT signature".into()));
        }
        Ok(bs)
    }

    pub fn has_signature(buf: &[u8]) -> bool {
        buf.len() >= 11 && buf[0..3] == EXFAT_JUMP && buf[3..11] == EXFAT_FS_NAME
    }

    pub fn bytes_per_sector(&self) -> u64 { 1u64 << self.bytes_per_sector_shift }
    pub fn bytes_per_cluster(&self) -> u64 { self.bytes_per_sector() << self.sectors_per_cluster_shift }
    pub fn fat_byte_offset(&self) -> u64 { self.fat_offset as u64 * self.bytes_per_sector() }
    pub fn fat_byte_length(&self) -> u64 { self.fat_length as u64 * self.bytes_per_sector() }
    pub fn cluster_heap_byte_offset(&self) -> u64 { self.cluster_heap_offset as u64 * self.bytes_per_sector() }

    /// Byte offset of `cluster` (cluster indices start at 2) within the volume.
    pub fn cluster_byte_offset(&self, cluster: u32) -> u64 {
        self.cluster_heap_byte_offset() + (cluster as u64 - 2) * self.bytes_per_cluster()
    }
}
