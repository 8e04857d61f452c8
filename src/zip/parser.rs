//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures
//! from an in-memory archive image.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the buffer's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory to get metadata for all files
//! 4. For extraction, read each file's Local File Header to locate its data

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use anyhow::{Result, bail};

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: usize = 65535;

/// Low-level ZIP parser over a borrowed archive image.
///
/// Typically used through [`Archive`](super::Archive) rather than directly.
///
/// ## Example
///
/// ```ignore
/// let parser = ZipParser::new(&bytes);
/// for entry in parser.list_files()? {
///     let offset = parser.get_data_offset(&entry)?;
///     // Compressed data lives at bytes[offset..offset + entry.compressed_size]
/// }
/// ```
pub struct ZipParser<'a> {
    /// The archive image
    data: &'a [u8],
}

impl<'a> ZipParser<'a> {
    /// Create a new parser for the given archive image.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Borrow `len` bytes at `offset`, failing if the range leaves the image.
    fn slice(&self, offset: u64, len: usize) -> Result<&'a [u8]> {
        let start = usize::try_from(offset)?;
        let end = start.checked_add(len);
        match end {
            Some(end) if end <= self.data.len() => Ok(&self.data[start..end]),
            _ => bail!("Truncated ZIP archive"),
        }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// The EOCD is located at the end of the image. This method
    /// handles both the simple case (no comment) and archives with
    /// comments by searching backwards for the signature.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of EOCD in the image).
    ///
    /// # Errors
    ///
    /// Returns an error if no valid EOCD can be found, indicating
    /// the data is not a valid ZIP archive.
    pub fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let size = self.data.len();

        // Common case first: no archive comment.
        if size >= EndOfCentralDirectory::SIZE {
            let offset = size - EndOfCentralDirectory::SIZE;
            let buf = &self.data[offset..];

            if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
                let eocd = EndOfCentralDirectory::from_bytes(buf)?;
                return Ok((eocd, offset as u64));
            }
        }

        // The EOCD could be earlier if there's a ZIP comment.
        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE).min(size);
        let search_start = size - search_size;
        let buf = &self.data[search_start..];

        // Search backwards for EOCD signature (PK\x05\x06)
        if buf.len() < EndOfCentralDirectory::SIZE {
            bail!("Not a valid ZIP file");
        }
        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // The comment length field must match the remaining bytes.
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, (search_start + i) as u64));
                }
            }
        }

        bail!("Not a valid ZIP file")
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD indicates ZIP64 extensions are needed
    /// (fields set to 0xFFFF or 0xFFFFFFFF).
    pub fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        // The ZIP64 EOCD Locator is located immediately before the regular EOCD
        let Some(locator_offset) = eocd_offset.checked_sub(Zip64EOCDLocator::SIZE as u64) else {
            bail!("Invalid ZIP64 format");
        };
        let locator =
            Zip64EOCDLocator::from_bytes(self.slice(locator_offset, Zip64EOCDLocator::SIZE)?)?;

        Zip64EOCD::from_bytes(self.slice(locator.eocd64_offset, Zip64EOCD::MIN_SIZE)?)
    }

    /// List all files in the ZIP archive.
    ///
    /// Reads the EOCD first, then parses the entire Central Directory.
    ///
    /// # Returns
    ///
    /// A vector of [`ZipFileEntry`] structures in central directory order.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is invalid or truncated.
    pub fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, eocd_offset) = self.find_eocd()?;

        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset)?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        let cd_data = self.slice(cd_offset, usize::try_from(cd_size)?)?;

        // Every header takes at least CDFH_MIN_SIZE bytes, which bounds the
        // entry count a hostile EOCD can claim.
        if total_entries > (cd_data.len() / CDFH_MIN_SIZE) as u64 {
            bail!("Central Directory entry count exceeds its size");
        }

        let mut entries = Vec::with_capacity(total_entries as usize);
        let mut cursor = Cursor::new(cd_data);

        for _ in 0..total_entries {
            let entry = self.parse_cdfh(&mut cursor)?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Parse a Central Directory File Header from a cursor.
    fn parse_cdfh(&self, cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
        // Read and verify the signature (PK\x01\x02)
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            bail!("Invalid Central Directory File Header");
        }

        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let _flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let external_attrs = cursor.read_u32::<LittleEndian>()?;
        let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut file_name_bytes)?;
        // Use lossy conversion to handle non-UTF8 filenames gracefully
        let file_name = String::from_utf8_lossy(&file_name_bytes).to_string();

        // Directory entries end with '/', or carry the DOS directory attribute
        let is_directory =
            file_name.ends_with('/') || external_attrs & DOS_DIRECTORY_ATTR != 0;

        // ZIP64 uses extra field ID 0x0001
        let extra_field_end = cursor.position() + extra_field_length as u64;

        while cursor.position() + 4 <= extra_field_end {
            let header_id = cursor.read_u16::<LittleEndian>()?;
            let field_size = cursor.read_u16::<LittleEndian>()?;

            if header_id == 0x0001 {
                // Fields are present only if corresponding header field is 0xFFFFFFFF
                if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= extra_field_end {
                    uncompressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= extra_field_end {
                    compressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= extra_field_end {
                    lfh_offset = cursor.read_u64::<LittleEndian>()?;
                }
                // Skip any remaining ZIP64 fields (disk number start)
                cursor.set_position(extra_field_end);
            } else {
                cursor.set_position(cursor.position() + field_size as u64);
            }
        }

        cursor.set_position(extra_field_end + file_comment_length as u64);
        if cursor.position() > cursor.get_ref().len() as u64 {
            bail!("Truncated Central Directory File Header");
        }

        Ok(ZipFileEntry {
            file_name,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
            last_mod_time,
            last_mod_date,
            external_attrs,
            is_directory,
        })
    }

    /// Get the actual data offset for a file entry.
    ///
    /// The Local File Header (LFH) has variable-length fields (filename,
    /// extra field) that may differ from the Central Directory entry.
    /// This method reads the LFH to calculate where the actual file
    /// data begins, and checks the data fits in the image.
    ///
    /// # Errors
    ///
    /// Returns an error if the LFH is invalid or the data is truncated.
    pub fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let lfh_buf = self.slice(entry.lfh_offset, LFH_SIZE)?;

        // Verify LFH signature (PK\x03\x04)
        if &lfh_buf[0..4] != LFH_SIGNATURE {
            bail!("Invalid Local File Header");
        }

        let mut cursor = Cursor::new(lfh_buf);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        // Data starts after: LFH (30 bytes) + filename + extra field
        let data_offset =
            entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length;

        self.slice(data_offset, usize::try_from(entry.compressed_size)?)?;

        Ok(data_offset)
    }
}
