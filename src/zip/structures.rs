use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{Datelike, NaiveDateTime, Timelike};
use std::io::{Cursor, Write};

use anyhow::{Result, bail};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Build the record for a single-disk archive.
    pub fn new(total_entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: total_entries,
            total_entries,
            cd_size,
            cd_offset,
            comment_len: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Invalid End of Central Directory");
        }

        // Verify signature
        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.disk_number)?;
        out.write_u16::<LittleEndian>(self.disk_with_cd)?;
        out.write_u16::<LittleEndian>(self.disk_entries)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        out.write_u16::<LittleEndian>(self.comment_len)
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Invalid ZIP64 format");
        }

        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 format");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE {
            bail!("Invalid ZIP64 format");
        }

        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 format");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// "Version needed to extract" written for every entry (2.0: deflate, directories)
pub const VERSION_NEEDED: u16 = 20;

/// "Version made by": upper byte 3 (UNIX), lower byte spec version 2.0
pub const VERSION_MADE_BY: u16 = (3 << 8) | 20;

/// General purpose flag bit 11: file name is UTF-8
pub const FLAG_UTF8: u16 = 1 << 11;

/// MS-DOS directory attribute in the low byte of the external attributes
pub const DOS_DIRECTORY_ATTR: u32 = 0x10;

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub external_attrs: u32,
    pub is_directory: bool,
}

impl ZipFileEntry {
    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// General purpose flags to record for this entry's name.
    pub fn flags(&self) -> u16 {
        if self.file_name.is_ascii() {
            0
        } else {
            FLAG_UTF8
        }
    }

    /// Write the Local File Header that precedes this entry's data.
    ///
    /// Sizes and CRC are known up front, so no data descriptor is used.
    pub fn write_local_header<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_all(LFH_SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        out.write_u16::<LittleEndian>(self.flags())?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size as u32)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size as u32)?;
        out.write_u16::<LittleEndian>(self.file_name.len() as u16)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_all(self.file_name.as_bytes())
    }

    /// Write this entry's Central Directory File Header.
    pub fn write_central_header<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_all(CDFH_SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
        out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        out.write_u16::<LittleEndian>(self.flags())?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size as u32)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size as u32)?;
        out.write_u16::<LittleEndian>(self.file_name.len() as u16)?;
        out.write_u16::<LittleEndian>(0)?; // extra field length
        out.write_u16::<LittleEndian>(0)?; // comment length
        out.write_u16::<LittleEndian>(0)?; // disk number start
        out.write_u16::<LittleEndian>(0)?; // internal attributes
        out.write_u32::<LittleEndian>(self.external_attrs)?;
        out.write_u32::<LittleEndian>(self.lfh_offset as u32)?;
        out.write_all(self.file_name.as_bytes())
    }
}

/// Encode a timestamp as MS-DOS (time, date).
///
/// DOS dates start in 1980; earlier timestamps clamp to 1980-01-01 00:00:00.
pub fn dos_datetime(at: NaiveDateTime) -> (u16, u16) {
    if at.year() < 1980 {
        return (0, (1 << 5) | 1);
    }
    let time = ((at.hour() as u16) << 11) | ((at.minute() as u16) << 5) | (at.second() as u16 / 2);
    let date =
        (((at.year() - 1980) as u16 & 0x7F) << 9) | ((at.month() as u16) << 5) | at.day() as u16;
    (time, date)
}
