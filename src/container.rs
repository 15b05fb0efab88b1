//! ## Container Header
//!
//! The 96-byte descriptor at the start of every boot container: parsing,
//! classification, and the output filename convention built from it.

use binrw::BinRead;

/// Errors from parsing or classifying the 96-byte container descriptor.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("container header is corrupt: {0}")]
    HeaderCorrupt(String),
}

pub type Result<T> = std::result::Result<T,Error>;

impl From<binrw::Error> for Error {
    fn from(e: binrw::Error) -> Self {
        Error::HeaderCorrupt(e.to_string())
    }
}

/// A packed year/month/day/hour/minute/second stamp, formatted `YYYYMMDDhhmmss`.
#[derive(BinRead,Debug,Clone,Copy)]
#[br(little)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub unk1: u8,
}

impl Timestamp {
    pub fn format(&self) -> String {
        format!("{:04}{:02}{:02}{:02}{:02}{:02}",
            self.year,self.month,self.day,self.hour,self.minute,self.second)
    }
}

/// A release/minor/major triple, as used for OS and source versions.
#[derive(BinRead,Debug,Clone,Copy)]
#[br(little)]
pub struct Version {
    pub release: u8,
    pub minor: u8,
    pub major: u16,
}

/// Either a `Version` triple or 4 raw ASCII bytes, depending on
/// `container_type` — read as raw bytes and reinterpreted on demand,
/// mirroring the C union.
#[derive(BinRead,Debug,Clone,Copy)]
#[br(little)]
pub struct GameVersion(pub [u8;4]);

impl GameVersion {
    pub fn as_version(&self) -> Version {
        Version {
            release: self.0[0],
            minor: self.0[1],
            major: u16::from_le_bytes([self.0[2],self.0[3]]),
        }
    }

    pub fn as_option_ascii(&self) -> String {
        String::from_utf8_lossy(&self.0).trim_end_matches('\0').to_string()
    }
}

#[derive(BinRead,Debug,Clone,Copy,PartialEq,Eq)]
#[br(repr = u8)]
pub enum ContainerType {
    Os = 0x00,
    App = 0x01,
    Option = 0x02,
}

/// The 96-byte container descriptor, decrypted and parsed as a single
/// packed little-endian struct.
#[derive(BinRead,Debug)]
#[br(little)]
pub struct BootId {
    pub crc32: u32,
    pub length: u32,
    pub signature: [u8;4],
    pub unk1: u8,
    pub container_type: ContainerType,
    pub sequence_number: u8,
    pub use_custom_iv: u8,
    pub game_id: [u8;4],
    pub target_timestamp: Timestamp,
    pub target_version: GameVersion,
    pub block_count: u64,
    pub block_size: u64,
    pub header_block_count: u64,
    pub unk2: u64,
    pub os_id: [u8;3],
    pub os_generation: u8,
    pub source_timestamp: Timestamp,
    pub source_version: Version,
    pub os_version: Version,
    pub padding: [u8;8],
    pub extra_padding: [u8;4],
}

impl BootId {
    /// Parse the decrypted 96-byte header.
    pub fn parse(plaintext: &[u8;96]) -> Result<BootId> {
        let mut cursor = std::io::Cursor::new(&plaintext[..]);
        BootId::read(&mut cursor).map_err(|e| Error::HeaderCorrupt(e.to_string()))
    }

    pub fn use_custom_iv(&self) -> bool {
        self.use_custom_iv != 0
    }

    /// Byte offset of the payload within the container.
    pub fn data_offset(&self) -> u64 {
        self.header_block_count * self.block_size
    }

    /// Length in bytes of the payload.
    pub fn payload_length(&self) -> Result<u64> {
        if self.header_block_count > self.block_count {
            return Err(Error::HeaderCorrupt("header_block_count exceeds block_count".into()));
        }
        let len = (self.block_count - self.header_block_count) * self.block_size;
        if len % 16 != 0 {
            return Err(Error::HeaderCorrupt("payload length is not a multiple of the AES block size".into()));
        }
        Ok(len)
    }

    pub(crate) fn game_id_ascii(&self) -> String {
        String::from_utf8_lossy(&self.game_id).trim_end_matches('\0').to_string()
    }

    pub(crate) fn os_id_ascii(&self) -> String {
        String::from_utf8_lossy(&self.os_id).trim_end_matches('\0').to_string()
    }

    /// Compose the decrypted-volume-image filename per the container's type.
    pub fn output_filename(&self) -> String {
        let ts = self.target_timestamp.format();
        match self.container_type {
            ContainerType::Os => {
                let v = self.os_version;
                format!("{}_{:04}{:02}{}_{}_{}.ntfs",
                    self.os_id_ascii(),v.major,v.minor,v.release,ts,self.sequence_number)
            },
            ContainerType::App => {
                let v = self.target_version.as_version();
                if self.sequence_number > 0 {
                    let sv = self.source_version;
                    format!("{}_{}{:02}{:02}_{}_{}_{}{:02}{:02}.ntfs",
                        self.game_id_ascii(),v.major,v.minor,v.release,ts,self.sequence_number,
                        sv.major,sv.minor,sv.release)
                } else {
                    format!("{}_{}{:02}{:02}_{}_{}.ntfs",
                        self.game_id_ascii(),v.major,v.minor,v.release,ts,self.sequence_number)
                }
            },
            ContainerType::Option => {
                format!("{}_{}_{}_{}.exfat",
                    self.game_id_ascii(),self.target_version.as_option_ascii(),ts,self.sequence_number)
            },
        }
    }

    /// The expected 16-byte header of the decrypted payload's first page,
    /// used for file-IV recovery: NTFS for OS/APP, exFAT for OPTION.
    pub fn expected_payload_header(&self) -> [u8;16] {
        match self.container_type {
            ContainerType::Option => crate::crypto::EXFAT_HEADER,
            ContainerType::Os | ContainerType::App => crate::crypto::NTFS_HEADER,
        }
    }
}
