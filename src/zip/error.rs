//! Archive status codes.
//!
//! Every engine operation that can fail reports one of these codes. The
//! integer values are stable: they are what scripts receive as the second
//! return value of a failed entry operation, so they must never be renumbered.

use thiserror::Error;

/// Engine failure, one variant per status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ZipError {
    #[error("not initialized")]
    NotInitialized,
    #[error("invalid entry name")]
    InvalidEntryName,
    #[error("entry not found")]
    EntryNotFound,
    #[error("invalid zip mode")]
    InvalidMode,
    #[error("invalid compression level")]
    InvalidLevel,
    #[error("no zip 64 support")]
    NoZip64Support,
    #[error("memset error")]
    Memset,
    #[error("cannot write data to entry")]
    WriteEntry,
    #[error("cannot initialize tdefl compressor")]
    DeflateInit,
    #[error("invalid index")]
    InvalidIndex,
    #[error("header not found")]
    HeaderNotFound,
    #[error("cannot flush tdefl buffer")]
    DeflateFlush,
    #[error("cannot write entry header")]
    WriteHeader,
    #[error("cannot create entry header")]
    CreateHeader,
    #[error("cannot write to central dir")]
    WriteCentralDir,
    #[error("cannot open file")]
    OpenFile,
    #[error("invalid entry type")]
    InvalidEntryType,
    #[error("extracting data using no memory allocation")]
    NoMemoryAllocation,
    #[error("file not found")]
    FileNotFound,
    #[error("no permission")]
    NoPermission,
    #[error("out of memory")]
    OutOfMemory,
    #[error("invalid zip archive name")]
    InvalidArchiveName,
    #[error("make dir error")]
    MakeDir,
    #[error("symlink error")]
    Symlink,
    #[error("close archive error")]
    CloseArchive,
    #[error("capacity size too small")]
    CapacityTooSmall,
    #[error("fseek error")]
    Seek,
    #[error("fread error")]
    Read,
    #[error("fwrite error")]
    Write,
    #[error("cannot initialize reader")]
    ReaderInit,
    #[error("cannot initialize writer")]
    WriterInit,
    #[error("cannot initialize writer from reader")]
    WriterFromReaderInit,
}

/// Status code reported when an entry lookup misses.
pub const ZIP_ENOENT: i32 = -3;

/// All variants, ordered by code (`ALL[i]` has code `-(i + 1)`).
const ALL: [ZipError; 32] = [
    ZipError::NotInitialized,
    ZipError::InvalidEntryName,
    ZipError::EntryNotFound,
    ZipError::InvalidMode,
    ZipError::InvalidLevel,
    ZipError::NoZip64Support,
    ZipError::Memset,
    ZipError::WriteEntry,
    ZipError::DeflateInit,
    ZipError::InvalidIndex,
    ZipError::HeaderNotFound,
    ZipError::DeflateFlush,
    ZipError::WriteHeader,
    ZipError::CreateHeader,
    ZipError::WriteCentralDir,
    ZipError::OpenFile,
    ZipError::InvalidEntryType,
    ZipError::NoMemoryAllocation,
    ZipError::FileNotFound,
    ZipError::NoPermission,
    ZipError::OutOfMemory,
    ZipError::InvalidArchiveName,
    ZipError::MakeDir,
    ZipError::Symlink,
    ZipError::CloseArchive,
    ZipError::CapacityTooSmall,
    ZipError::Seek,
    ZipError::Read,
    ZipError::Write,
    ZipError::ReaderInit,
    ZipError::WriterInit,
    ZipError::WriterFromReaderInit,
];

impl ZipError {
    /// Negative integer status code for this error.
    pub fn code(self) -> i32 {
        // ALL is ordered by code, so the position is the code.
        let index = ALL.iter().position(|e| *e == self).unwrap_or(0);
        -(index as i32) - 1
    }

    /// Look an error up by its status code.
    pub fn from_code(code: i32) -> Option<Self> {
        if code >= 0 {
            return None;
        }
        let index = code.unsigned_abs() as usize - 1;
        ALL.get(index).copied()
    }
}

/// Human-readable message for a status code.
///
/// Codes outside the known range (including `0` and positive byte counts)
/// map to `"unknown error"`.
pub fn strerror(code: i32) -> String {
    match ZipError::from_code(code) {
        Some(err) => err.to_string(),
        None => "unknown error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ZipError::NotInitialized.code(), -1);
        assert_eq!(ZipError::EntryNotFound.code(), ZIP_ENOENT);
        assert_eq!(ZipError::InvalidMode.code(), -4);
        assert_eq!(ZipError::InvalidIndex.code(), -10);
        assert_eq!(ZipError::WriterFromReaderInit.code(), -32);
    }

    #[test]
    fn test_code_lookup_matches_display() {
        for err in ALL {
            assert_eq!(ZipError::from_code(err.code()), Some(err));
            assert_eq!(strerror(err.code()), err.to_string());
        }
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(strerror(0), "unknown error");
        assert_eq!(strerror(42), "unknown error");
        assert_eq!(strerror(-33), "unknown error");
        assert_eq!(ZipError::from_code(i32::MIN), None);
    }
}
