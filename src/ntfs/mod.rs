//! ## NTFS Extractor
//!
//! Locates an NTFS volume (raw or inside a VHD), walks the MFT, and
//! reconstructs the directory tree on the host filesystem.

pub mod boot;
pub mod mft;

use std::collections::HashMap;
use std::io::{Read,Seek,SeekFrom};
use std::path::{Path,PathBuf};

use crate::host;
use crate::vhd::VhdDevice;
use boot::NtfsBootSector;
use mft::{MftRecordHeader,Attribute,FileNameAttribute,DATA_ATTR_TYPE,FILE_NAME_ATTR_TYPE,parse_data_runs};

/// Errors from locating, walking, or extracting an NTFS volume.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("NTFS volume format invalid: {0}")]
    VolumeFormatInvalid(String),

    #[error("NTFS read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Vhd(#[from] crate::vhd::Error),

    #[error(transparent)]
    Host(#[from] host::Error),
}

pub type Result<T> = std::result::Result<T,Error>;

const ROOT_RECORD: u64 = 5;
const MBR_OFFSET_LADDER: [u64;5] = [0,0x100000,0x200000,0x400000,0x800000];

/// Reads bytes out of either a raw file or a VHD-wrapped volume,
/// presenting both as one linear address space starting at `ntfs_offset`.
enum Source<F> {
    Raw(F),
    Vhd(VhdDevice<F>),
}

impl<F: Read+Seek> Source<F> {
    fn read_at(&mut self, offset: u64, size: u64) -> Result<Vec<u8>> {
        match self {
            Source::Raw(f) => {
                f.seek(SeekFrom::Start(offset))?;
                let mut buf = vec![0u8;size as usize];
                f.read_exact(&mut buf)?;
                Ok(buf)
            },
            Source::Vhd(dev) => dev.read(offset,size),
        }
    }
}

pub struct NtfsContext<F> {
    source: Source<F>,
    ntfs_offset: u64,
    boot: NtfsBootSector,
    mft_offset: u64,
    mft_record_size: u64,
    dir_cache: HashMap<u64,String>,
}

impl<F: Read+Seek> NtfsContext<F> {
    /// Locate and initialize an NTFS volume, trying a raw boot sector
    /// first, then MBR partitions, then a fixed offset ladder — the
    /// same order a VHD-wrapped image is probed in.
    pub fn open(mut file: F) -> Result<NtfsContext<F>> {
        file.seek(SeekFrom::Start(0))?;
        let mut probe = [0u8;512];
        file.read_exact(&mut probe)?;

        if NtfsBootSector::has_signature(&probe) {
            let boot = NtfsBootSector::parse(&probe)?;
            return Self::from_parts(Source::Raw(file),0,boot);
        }

        // Not raw NTFS at offset 0: try as a VHD.
        file.seek(SeekFrom::Start(0))?;
        let mut vhd = VhdDevice::open(file)?;

        if let Ok(mbr) = vhd.read(0,512) {
            if mbr.len() >= 512 && mbr[510] == 0x55 && mbr[511] == 0xAA {
                for entry in 0..4 {
                    let off = 446 + entry * 16;
                    let part_type = mbr[off + 4];
                    if part_type != 0x07 {
                        continue;
                    }
                    let start_lba = u32::from_le_bytes([mbr[off+8],mbr[off+9],mbr[off+10],mbr[off+11]]) as u64;
                    let start = start_lba * 512;
                    if let Ok(sector) = vhd.read(start,512) {
                        if NtfsBootSector::has_signature(&sector) {
                            let boot = NtfsBootSector::parse(&sector)?;
                            return Self::from_parts(Source::Vhd(vhd),start,boot);
                        }
                    }
                }
            }
        }

        for &off in &MBR_OFFSET_LADDER {
            if let Ok(sector) = vhd.read(off,512) {
                if NtfsBootSector::has_signature(&sector) {
                    let boot = NtfsBootSector::parse(&sector)?;
                    return Self::from_parts(Source::Vhd(vhd),off,boot);
                }
            }
        }

        Err(Error::VolumeFormatInvalid("no NTFS signature found in raw image, MBR, or offset ladder".into()))
    }

    fn from_parts(source: Source<F>, ntfs_offset: u64, boot: NtfsBootSector) -> Result<NtfsContext<F>> {
        let mft_offset = ntfs_offset + boot.mft_offset();
        let mft_record_size = boot.mft_record_size();
        let mut ctx = NtfsContext {
            source,
            ntfs_offset,
            boot,
            mft_offset,
            mft_record_size,
            dir_cache: HashMap::from([(ROOT_RECORD,String::new())]),
        };
        Ok(ctx)
    }

    fn read_record(&mut self, index: u64) -> Result<Vec<u8>> {
        let offset = self.mft_offset + index * self.mft_record_size;
        self.source.read_at(offset,self.mft_record_size)
    }

    /// Number of MFT records, derived from $MFT's own non-resident data size.
    fn total_records(&mut self) -> Result<u64> {
        let record0 = self.read_record(0)?;
        let header = MftRecordHeader::parse(&record0)
            .ok_or_else(|| Error::VolumeFormatInvalid("MFT record 0 is not a valid FILE record".into()))?;
        let mut data_size = None;
        mft::for_each_attribute(&record0,header.attrs_offset,header.bytes_in_use,|attr| {
            if let Attribute::NonResident { attr_type: DATA_ATTR_TYPE, data_size: ds, .. } = attr {
                data_size = Some(ds);
            }
        });
        let data_size = data_size.ok_or_else(|| Error::VolumeFormatInvalid("MFT record 0 has no non-resident $DATA".into()))?;
        Ok(data_size / self.mft_record_size)
    }

    fn chosen_file_name(record: &[u8], header: &MftRecordHeader) -> Option<FileNameAttribute> {
        let mut result = None;
        mft::for_each_attribute(record,header.attrs_offset,header.bytes_in_use,|attr| {
            if result.is_some() { return; }
            if let Attribute::Resident { attr_type: FILE_NAME_ATTR_TYPE, value } = attr {
                if let Some(fname) = FileNameAttribute::parse(value) {
                    if fname.namespace != 2 {
                        result = Some(fname);
                    }
                }
            }
        });
        result
    }

    /// Resolve the relative directory path for `record_index`, consulting
    /// (and populating) the directory cache, tolerating parents that have
    /// not yet been visited during the forward walk.
    fn resolve_path(&mut self, record_index: u64) -> Result<String> {
        if let Some(p) = self.dir_cache.get(&record_index) {
            return Ok(p.clone());
        }
        let record = self.read_record(record_index)?;
        let header = match MftRecordHeader::parse(&record) {
            Some(h) => h,
            None => return Ok(String::new()),
        };
        let fname = match Self::chosen_file_name(&record,&header) {
            Some(f) => f,
            None => return Ok(String::new()),
        };
        let parent_path = self.resolve_path(fname.parent_record)?;
        let path = if parent_path.is_empty() {
            fname.name.clone()
        } else {
            format!("{parent_path}/{}",fname.name)
        };
        self.dir_cache.insert(record_index,path.clone());
        Ok(path)
    }

    /// Walk every in-use MFT record in ascending order, creating
    /// directories and extracting files under `root`.
    pub fn extract_all(&mut self, root: &Path) -> Result<()> {
        host::ensure_dir(root)?;
        let total = self.total_records()?;
        for index in 0..total {
            // A read failure here means the volume image ends or is
            // truncated before the record the MFT size promised; stop the
            // walk rather than skip past it.
            let record = match self.read_record(index) {
                Ok(r) => r,
                Err(_) => break,
            };
            let header = match MftRecordHeader::parse(&record) {
                Some(h) => h,
                None => continue,
            };
            let fname = match Self::chosen_file_name(&record,&header) {
                Some(f) => f,
                None => continue,
            };
            if fname.name.starts_with('$') {
                continue;
            }
            let parent_path = self.resolve_path(fname.parent_record)?;
            let rel = if parent_path.is_empty() {
                fname.name.clone()
            } else {
                format!("{parent_path}/{}",fname.name)
            };

            if header.is_directory {
                let abs = host::safe_join(root,&rel)?;
                host::ensure_dir(&abs)?;
                self.dir_cache.insert(index,rel);
                continue;
            }

            let abs = host::safe_join(root,&rel)?;
            if let Some(parent) = abs.parent() {
                host::ensure_dir(parent)?;
            }
            if let Err(e) = self.extract_file(&record,&header,&abs) {
                let _ = std::fs::remove_file(&abs);
                return Err(e);
            }
        }
        Ok(())
    }

    fn extract_file(&mut self, record: &[u8], header: &MftRecordHeader, dest: &Path) -> Result<()> {
        let mut resident_value: Option<Vec<u8>> = None;
        let mut non_resident: Option<(u64,Vec<u8>)> = None;
        mft::for_each_attribute(record,header.attrs_offset,header.bytes_in_use,|attr| {
            if resident_value.is_some() || non_resident.is_some() { return; }
            match attr {
                Attribute::Resident { attr_type: DATA_ATTR_TYPE, value } => {
                    resident_value = Some(value.to_vec());
                },
                Attribute::NonResident { attr_type: DATA_ATTR_TYPE, data_size, mapping_pairs } => {
                    non_resident = Some((data_size,mapping_pairs.to_vec()));
                },
                _ => {},
            }
        });

        if let Some(value) = resident_value {
            std::fs::write(dest,value)?;
            return Ok(());
        }

        let (data_size,mapping_pairs) = non_resident
            .ok_or_else(|| Error::VolumeFormatInvalid("file record has no $DATA attribute".into()))?;
        let runs = parse_data_runs(&mapping_pairs)?;
        let bytes_per_cluster = self.boot.bytes_per_cluster();
        let data_start = self.ntfs_offset;

        let mut out = std::fs::File::create(dest)?;
        let mut written: u64 = 0;
        for run in runs {
            if written >= data_size {
                break;
            }
            let run_bytes = run.length * bytes_per_cluster;
            let take = run_bytes.min(data_size - written);
            let abs_offset = data_start + (run.offset as u64) * bytes_per_cluster;
            let chunk = self.source.read_at(abs_offset,take)?;
            std::io::Write::write_all(&mut out,&chunk)?;
            written += take;
        }
        Ok(())
    }
}

/// Scan `root` for an `internal_0.vhd`..`internal_9.vhd` chain. If only
/// `internal_0.vhd` is present, open and extract it as a nested NTFS
/// volume into `<root>/contents`. A higher-numbered sibling (1 through 9)
/// indicates a differencing chain this extractor does not support, and
/// halts the scan.
pub fn extract_nested_vhd(root: &Path) -> Result<()> {
    let vhd0 = root.join("internal_0.vhd");
    if !vhd0.is_file() {
        return Ok(());
    }
    for n in 1..10 {
        let sibling = root.join(format!("internal_{n}.vhd"));
        if sibling.is_file() {
            log::warn!("differencing VHD chain at {}, skipping nested extraction",sibling.display());
            return Ok(());
        }
    }

    let file = std::fs::File::open(&vhd0)?;
    let mut ctx = NtfsContext::open(file)?;
    let contents = root.join("contents");
    ctx.extract_all(&contents)?;
    Ok(())
}

/// Convenience path-buf for a root extraction directory derived from
/// an output filename (strips the extension).
pub fn extraction_root(decrypted_filename: &str) -> PathBuf {
    let mut p = PathBuf::from(decrypted_filename);
    p.set_extension("");
    p
}
