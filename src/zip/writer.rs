//! Archive image assembly.
//!
//! Entries are laid out as Local File Header + data, in order, followed by
//! the Central Directory and the End of Central Directory record. ZIP64 is
//! not written: archives that would need it are rejected.

use std::io::Write;

use super::error::ZipError;
use super::structures::{EndOfCentralDirectory, ZipFileEntry};

const MAX_ENTRIES: usize = 0xFFFF;
const MAX_OFFSET: u64 = 0xFFFFFFFF;

/// Serialize `entries` (record + compressed data) into a complete archive.
///
/// The `lfh_offset` of each record is ignored and recomputed from the layout.
pub fn write_archive<'a, I>(entries: I) -> Result<Vec<u8>, ZipError>
where
    I: IntoIterator<Item = (&'a ZipFileEntry, &'a [u8])>,
{
    let mut out = Vec::new();
    let mut central = Vec::new();
    let mut count = 0usize;

    for (entry, data) in entries {
        count += 1;
        if count > MAX_ENTRIES
            || entry.compressed_size >= MAX_OFFSET
            || entry.uncompressed_size >= MAX_OFFSET
            || out.len() as u64 >= MAX_OFFSET
        {
            return Err(ZipError::NoZip64Support);
        }

        let mut record = entry.clone();
        record.lfh_offset = out.len() as u64;

        record
            .write_local_header(&mut out)
            .map_err(|_| ZipError::WriteHeader)?;
        out.write_all(data).map_err(|_| ZipError::WriteEntry)?;
        record
            .write_central_header(&mut central)
            .map_err(|_| ZipError::WriteCentralDir)?;
    }

    let cd_offset = out.len() as u64;
    let cd_size = central.len() as u64;
    if cd_offset >= MAX_OFFSET || cd_size >= MAX_OFFSET {
        return Err(ZipError::NoZip64Support);
    }

    out.extend_from_slice(&central);
    EndOfCentralDirectory::new(count as u16, cd_size as u32, cd_offset as u32)
        .write_to(&mut out)
        .map_err(|_| ZipError::WriteCentralDir)?;

    Ok(out)
}
