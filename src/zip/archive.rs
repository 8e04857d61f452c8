//! The archive engine.
//!
//! An [`Archive`] owns a whole ZIP image in memory. Readers parse the Central
//! Directory once at open and decompress entries on demand; writers collect
//! finished entries and assemble the image whenever it is serialized.
//! File-backed archives load their file at open and write it back on close.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use tracing::debug;

use super::error::ZipError;
use super::parser::ZipParser;
use super::structures::{CompressionMethod, DOS_DIRECTORY_ATTR, ZipFileEntry, dos_datetime};
use super::writer::write_archive;
use crate::mode::Mode;

/// Compression level used when a negative level is requested.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 6;

/// Highest accepted level; 10 compresses like 9.
const MAX_COMPRESSION_LEVEL: u32 = 10;

/// UNIX permission bits stored in the upper half of the external attributes.
const FILE_MODE: u32 = 0o100644 << 16;
const DIR_MODE: u32 = 0o040755 << 16;

#[derive(Debug)]
enum Backing {
    Memory,
    File(PathBuf),
}

#[derive(Debug)]
enum EntryData {
    /// Compressed bytes live in the archive's source image at this offset
    Source { offset: usize },
    Owned(Vec<u8>),
}

#[derive(Debug)]
struct StoredEntry {
    record: ZipFileEntry,
    data: EntryData,
}

impl StoredEntry {
    /// Stored name in normalized form; archives from other writers may carry
    /// `./` prefixes or backslashes.
    fn lookup_name(&self) -> String {
        normalize_entry_name(&self.record.file_name)
            .unwrap_or_else(|_| self.record.file_name.clone())
    }
}

/// Entry being written, not yet part of the archive.
#[derive(Debug)]
struct PendingEntry {
    name: String,
    is_directory: bool,
    data: Vec<u8>,
    crc: Crc,
}

#[derive(Debug)]
enum OpenEntry {
    Selected(usize),
    Pending(PendingEntry),
}

/// An in-memory ZIP archive.
#[derive(Debug)]
pub struct Archive {
    mode: Mode,
    level: u32,
    backing: Backing,
    source: Vec<u8>,
    entries: Vec<StoredEntry>,
    open: Option<OpenEntry>,
}

fn resolve_level(level: i32) -> Result<u32, ZipError> {
    let level = if level < 0 {
        DEFAULT_COMPRESSION_LEVEL
    } else {
        level
    };
    let level = (level & 0xF) as u32;
    if level > MAX_COMPRESSION_LEVEL {
        return Err(ZipError::InvalidLevel);
    }
    Ok(level)
}

/// Normalize an entry name: backslashes become `/`, and leading `/` and `./`
/// segments are dropped.
pub fn normalize_entry_name(name: &str) -> Result<String, ZipError> {
    let name = name.replace('\\', "/");
    let mut rest = name.as_str();
    loop {
        if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else {
            break;
        }
    }

    if rest.is_empty() || rest.len() > u16::MAX as usize {
        return Err(ZipError::InvalidEntryName);
    }
    Ok(rest.to_string())
}

/// Inflate at most `declared + 1` bytes of `data`.
///
/// One byte past the declared size is enough to tell an oversized stream
/// from a correct one.
fn inflate(data: &[u8], declared: u64) -> Result<Vec<u8>, ZipError> {
    let mut content = Vec::new();
    DeflateDecoder::new(data)
        .take(declared.saturating_add(1))
        .read_to_end(&mut content)
        .map_err(|_| ZipError::Read)?;
    Ok(content)
}

impl Archive {
    /// Open an archive over an in-memory stream.
    ///
    /// Read mode needs a non-empty `source`; write mode needs none. Append and
    /// delete are only available on file-backed archives.
    pub fn open_stream(source: Option<&[u8]>, level: i32, mode: Mode) -> Result<Self, ZipError> {
        let level = resolve_level(level)?;
        let source = source.filter(|s| !s.is_empty());

        let archive = match (source, mode) {
            (Some(source), Mode::Read) => {
                Self::from_image(source.to_vec(), level, mode, Backing::Memory)?
            }
            (None, Mode::Write) => Self::empty(level, mode, Backing::Memory),
            _ => return Err(ZipError::InvalidMode),
        };

        debug!(
            mode = %mode,
            level,
            entries = archive.entries.len(),
            "opened zip stream"
        );
        Ok(archive)
    }

    /// Open a file-backed archive.
    ///
    /// `r`, `a` and `d` load the existing file; `w` creates (or truncates) it.
    /// Changes are written back by [`Archive::close`].
    pub fn open_file(path: &Path, level: i32, mode: Mode) -> Result<Self, ZipError> {
        if path.as_os_str().is_empty() {
            return Err(ZipError::InvalidArchiveName);
        }
        let level = resolve_level(level)?;
        let backing = Backing::File(path.to_path_buf());

        let archive = match mode {
            Mode::Write => {
                fs::File::create(path).map_err(|_| ZipError::WriterInit)?;
                Self::empty(level, mode, backing)
            }
            Mode::Read | Mode::Append | Mode::Delete => {
                let image = fs::read(path).map_err(|_| ZipError::ReaderInit)?;
                Self::from_image(image, level, mode, backing)?
            }
        };

        debug!(
            path = %path.display(),
            mode = %mode,
            level,
            entries = archive.entries.len(),
            "opened zip file"
        );
        Ok(archive)
    }

    fn empty(level: u32, mode: Mode, backing: Backing) -> Self {
        Self {
            mode,
            level,
            backing,
            source: Vec::new(),
            entries: Vec::new(),
            open: None,
        }
    }

    fn from_image(
        image: Vec<u8>,
        level: u32,
        mode: Mode,
        backing: Backing,
    ) -> Result<Self, ZipError> {
        let parser = ZipParser::new(&image);
        let records = parser.list_files().map_err(|e| {
            debug!(error = %e, "cannot parse zip image");
            ZipError::ReaderInit
        })?;

        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let offset = parser.get_data_offset(&record).map_err(|e| {
                debug!(entry = %record.file_name, error = %e, "cannot locate entry data");
                ZipError::ReaderInit
            })?;
            entries.push(StoredEntry {
                record,
                data: EntryData::Source {
                    offset: offset as usize,
                },
            });
        }

        Ok(Self {
            entries,
            source: image,
            ..Self::empty(level, mode, backing)
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Effective compression level (0-10).
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Path of a file-backed archive.
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::Memory => None,
            Backing::File(path) => Some(path),
        }
    }

    /// Number of entries in the archive.
    pub fn entries_total(&self) -> usize {
        self.entries.len()
    }

    /// Find an entry by name without touching the open entry.
    ///
    /// An exact match wins; otherwise the first ASCII case-insensitive match.
    pub fn locate(&self, name: &str) -> Result<usize, ZipError> {
        let name = normalize_entry_name(name)?;
        let stored: Vec<String> = self.entries.iter().map(StoredEntry::lookup_name).collect();
        stored
            .iter()
            .position(|stored| *stored == name)
            .or_else(|| stored.iter().position(|stored| stored.eq_ignore_ascii_case(&name)))
            .ok_or(ZipError::EntryNotFound)
    }

    fn ensure_no_pending(&self) -> Result<(), ZipError> {
        match self.open {
            Some(OpenEntry::Pending(_)) => Err(ZipError::CreateHeader),
            _ => Ok(()),
        }
    }

    /// Open an entry by name.
    ///
    /// In read and delete mode this selects an existing entry; in write and
    /// append mode it starts a new entry (a trailing `/` makes a directory).
    pub fn entry_open(&mut self, name: &str) -> Result<(), ZipError> {
        self.ensure_no_pending()?;

        if self.mode.is_writing() {
            let name = normalize_entry_name(name)?;
            let is_directory = name.ends_with('/');
            debug!(entry = %name, "started zip entry");
            self.open = Some(OpenEntry::Pending(PendingEntry {
                name,
                is_directory,
                data: Vec::new(),
                crc: Crc::new(),
            }));
        } else {
            let index = self.locate(name)?;
            self.open = Some(OpenEntry::Selected(index));
        }
        Ok(())
    }

    /// Select an existing entry by its index, in any mode.
    pub fn entry_open_by_index(&mut self, index: usize) -> Result<(), ZipError> {
        self.ensure_no_pending()?;
        if index >= self.entries.len() {
            return Err(ZipError::InvalidIndex);
        }
        self.open = Some(OpenEntry::Selected(index));
        Ok(())
    }

    fn selected(&self) -> Option<&StoredEntry> {
        match self.open {
            Some(OpenEntry::Selected(index)) => self.entries.get(index),
            _ => None,
        }
    }

    /// Index of the selected entry.
    pub fn entry_index(&self) -> Option<usize> {
        match self.open {
            Some(OpenEntry::Selected(index)) => Some(index),
            _ => None,
        }
    }

    /// Name of the open entry, selected or pending.
    pub fn entry_name(&self) -> Option<&str> {
        match &self.open {
            Some(OpenEntry::Selected(index)) => {
                self.entries.get(*index).map(|e| e.record.file_name.as_str())
            }
            Some(OpenEntry::Pending(pending)) => Some(&pending.name),
            None => None,
        }
    }

    /// Whether the open entry is a directory.
    pub fn entry_is_dir(&self) -> Option<bool> {
        match &self.open {
            Some(OpenEntry::Selected(index)) => {
                self.entries.get(*index).map(|e| e.record.is_directory)
            }
            Some(OpenEntry::Pending(pending)) => Some(pending.is_directory),
            None => None,
        }
    }

    /// Uncompressed size of the open entry.
    pub fn entry_size(&self) -> Option<u64> {
        match &self.open {
            Some(OpenEntry::Selected(_)) => self.selected().map(|e| e.record.uncompressed_size),
            Some(OpenEntry::Pending(pending)) => Some(pending.data.len() as u64),
            None => None,
        }
    }

    /// CRC-32 of the open entry's content.
    pub fn entry_crc32(&self) -> Option<u32> {
        match &self.open {
            Some(OpenEntry::Selected(_)) => self.selected().map(|e| e.record.crc32),
            Some(OpenEntry::Pending(pending)) => Some(pending.crc.sum()),
            None => None,
        }
    }

    /// Full Central Directory record of the selected entry.
    pub fn entry_info(&self) -> Option<&ZipFileEntry> {
        self.selected().map(|e| &e.record)
    }

    /// Records of every entry, in index order.
    pub fn records(&self) -> impl Iterator<Item = &ZipFileEntry> {
        self.entries.iter().map(|e| &e.record)
    }

    /// Append bytes to the pending entry.
    pub fn entry_write(&mut self, buf: &[u8]) -> Result<(), ZipError> {
        if !self.mode.is_writing() {
            return Err(ZipError::InvalidMode);
        }
        let Some(OpenEntry::Pending(pending)) = &mut self.open else {
            return Err(ZipError::WriteEntry);
        };
        if pending.is_directory {
            return Err(ZipError::InvalidEntryType);
        }

        pending.data.extend_from_slice(buf);
        pending.crc.update(buf);
        Ok(())
    }

    /// Close the open entry.
    ///
    /// A pending entry is compressed and appended to the archive. Closing with
    /// no open entry succeeds.
    pub fn entry_close(&mut self) -> Result<(), ZipError> {
        match self.open.take() {
            Some(OpenEntry::Pending(pending)) => {
                let entry = self.finish_entry(pending)?;
                debug!(
                    entry = %entry.record.file_name,
                    size = entry.record.uncompressed_size,
                    compressed = entry.record.compressed_size,
                    "closed zip entry"
                );
                self.entries.push(entry);
                Ok(())
            }
            Some(OpenEntry::Selected(_)) | None => Ok(()),
        }
    }

    fn finish_entry(&self, pending: PendingEntry) -> Result<StoredEntry, ZipError> {
        let uncompressed_size = pending.data.len() as u64;
        let (method, data) = if self.level == 0 || pending.is_directory {
            (CompressionMethod::Stored, pending.data)
        } else {
            let level = Compression::new(self.level.min(9));
            let mut encoder = DeflateEncoder::new(Vec::new(), level);
            encoder
                .write_all(&pending.data)
                .map_err(|_| ZipError::DeflateFlush)?;
            (
                CompressionMethod::Deflate,
                encoder.finish().map_err(|_| ZipError::DeflateFlush)?,
            )
        };

        let (last_mod_time, last_mod_date) = dos_datetime(chrono::Local::now().naive_local());
        let external_attrs = if pending.is_directory {
            DIR_MODE | DOS_DIRECTORY_ATTR
        } else {
            FILE_MODE
        };

        Ok(StoredEntry {
            record: ZipFileEntry {
                file_name: pending.name,
                compression_method: method,
                compressed_size: data.len() as u64,
                uncompressed_size,
                crc32: pending.crc.sum(),
                lfh_offset: 0,
                last_mod_time,
                last_mod_date,
                external_attrs,
                is_directory: pending.is_directory,
            },
            data: EntryData::Owned(data),
        })
    }

    fn compressed_data<'a>(&'a self, entry: &'a StoredEntry) -> &'a [u8] {
        match &entry.data {
            EntryData::Owned(data) => data,
            EntryData::Source { offset } => {
                let end = offset + entry.record.compressed_size as usize;
                &self.source[*offset..end]
            }
        }
    }

    /// Decompress the selected entry.
    pub fn entry_read(&self) -> Result<Vec<u8>, ZipError> {
        if self.mode != Mode::Read {
            return Err(ZipError::EntryNotFound);
        }
        let entry = self.selected().ok_or(ZipError::EntryNotFound)?;
        if entry.record.is_directory {
            return Err(ZipError::InvalidEntryType);
        }

        let data = self.compressed_data(entry);
        let content = match entry.record.compression_method {
            CompressionMethod::Stored => data.to_vec(),
            CompressionMethod::Deflate => inflate(data, entry.record.uncompressed_size)?,
            CompressionMethod::Unknown(_) => return Err(ZipError::InvalidEntryType),
        };

        let mut crc = Crc::new();
        crc.update(&content);
        if content.len() as u64 != entry.record.uncompressed_size
            || crc.sum() != entry.record.crc32
        {
            debug!(entry = %entry.record.file_name, "zip entry failed integrity check");
            return Err(ZipError::Read);
        }
        Ok(content)
    }

    /// Remove the named entries; returns how many were removed.
    pub fn entries_delete(&mut self, names: &[&str]) -> Result<usize, ZipError> {
        if self.mode != Mode::Delete {
            return Err(ZipError::InvalidMode);
        }
        let names = names
            .iter()
            .map(|name| normalize_entry_name(name))
            .collect::<Result<Vec<_>, _>>()?;

        let before = self.entries.len();
        self.entries.retain(|e| !names.contains(&e.lookup_name()));
        self.open = None;
        Ok(before - self.entries.len())
    }

    /// Copy the whole archive out.
    ///
    /// Read-mode archives return their source image; other modes assemble an
    /// image from every closed entry.
    pub fn serialize(&self) -> Result<Vec<u8>, ZipError> {
        if self.mode == Mode::Read {
            return Ok(self.source.clone());
        }
        write_archive(
            self.entries
                .iter()
                .map(|entry| (&entry.record, self.compressed_data(entry))),
        )
    }

    /// Close the archive, writing file-backed changes back to disk.
    pub fn close(mut self) -> Result<(), ZipError> {
        let path = match &self.backing {
            Backing::File(path) => path.clone(),
            Backing::Memory => {
                debug!("closed zip stream");
                return Ok(());
            }
        };
        if self.mode == Mode::Read {
            debug!(path = %path.display(), "closed zip file");
            return Ok(());
        }

        self.entry_close()?;
        let image = self.serialize()?;
        fs::write(&path, image).map_err(|_| ZipError::Write)?;
        debug!(path = %path.display(), entries = self.entries.len(), "wrote zip file");
        Ok(())
    }
}
