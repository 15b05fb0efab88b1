//! NTFS boot sector (BPB + NTFS extension) parsing.

use binrw::BinRead;
use super::{Error,Result};

pub const NTFS_JUMP: [u8;3] = [0xEB,0x52,0x90];
pub const NTFS_OEM_ID: [u8;8] = *b"NTFS    ";

#[derive(BinRead,Debug)]
#[br(little)]
pub struct NtfsBootSector {
    pub jump: [u8;3],
    pub oem_id: [u8;8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    #[br(pad_before = 2 + 3 + 2 + 1 + 2 + 2 + 2 + 4 + 4 + 4)]
    pub total_sectors: u64,
    pub mft_cluster: u64,
    pub mft_mirror_cluster: u64,
    pub clusters_per_mft_record: i8,
    #[br(pad_before = 3)]
    pub clusters_per_index_record: i8,
    #[br(pad_before = 3)]
    pub volume_serial: u64,
}

impl NtfsBootSector {
    pub fn parse(buf: &[u8]) -> Result<NtfsBootSector> {
        let mut cursor = std::io::Cursor::new(buf);
        let bs = NtfsBootSector::read(&mut cursor)
            .map_err(|e| Error::VolumeFormatInvalid(format!("bad NTFS boot sector: {e}")))?;
        if bs.jump != NTFS_JUMP || bs.oem_id != NTFS_OEM_ID {
            return Err(Error::VolumeFormatInvalid("missing NTFS signature".into()));
        }
        Ok(bs)
    }

    /// Returns true if `buf` begins with the NTFS jump+OEM-ID signature,
    /// without fully parsing it (used for VHD MBR / offset-ladder probing).
    pub fn has_signature(buf: &[u8]) -> bool {
        buf.len() >= 11 && buf[0..3] == NTFS_JUMP && buf[3..11] == NTFS_OEM_ID
    }

    pub fn bytes_per_cluster(&self) -> u64 {
        self.bytes_per_sector as u64 * self.sectors_per_cluster as u64
    }

    /// Size in bytes of one MFT record: a positive value is a cluster
    /// count, a negative value (NTFS's convention) means `1 << |value|`.
    pub fn mft_record_size(&self) -> u64 {
        if self.clusters_per_mft_record >= 0 {
            self.clusters_per_mft_record as u64 * self.bytes_per_cluster()
        } else {
            1u64 << (-(self.clusters_per_mft_record as i64)) as u32
        }
    }

    pub fn mft_offset(&self) -> u64 {
        self.mft_cluster * self.bytes_per_cluster()
    }
}
