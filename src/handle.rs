//! Archive handles.
//!
//! A [`ZipHandle`] owns one open [`Archive`] together with the mode it was
//! opened in. Closing takes the archive out of the handle, so a closed handle
//! stays safe to drop or close again while every other operation reports
//! [`Error::Closed`].

use std::fmt;
use std::path::Path;

use thiserror::Error;
use tracing::warn;

use crate::mode::{Mode, ModeError, check_mode};
use crate::zip::{Archive, ZipError, ZipFileEntry};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    InvalidMode(#[from] ModeError),

    #[error("failed to execute {op}(): {source}")]
    Open {
        op: &'static str,
        #[source]
        source: ZipError,
    },

    #[error("invalid zip handle, cannot operate on a closed zip file")]
    Closed,

    /// Status reported by the archive engine
    #[error(transparent)]
    Zip(#[from] ZipError),
}

impl Error {
    /// Engine status behind this error, if it is one.
    pub fn status(&self) -> Option<ZipError> {
        match self {
            Error::Zip(err) => Some(*err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Exclusive owner of one open archive.
#[derive(Debug)]
pub struct ZipHandle {
    archive: Option<Archive>,
    mode: Mode,
}

impl ZipHandle {
    /// Open an in-memory archive.
    ///
    /// `mode` defaults to `"r"` when a source buffer is given and `"w"`
    /// otherwise; `level` defaults to 0.
    pub fn open_stream(
        source: Option<&[u8]>,
        level: Option<i32>,
        mode: Option<&str>,
    ) -> Result<Self> {
        let default_mode = if source.is_some() { "r" } else { "w" };
        let mode = check_mode(mode.unwrap_or(default_mode))?;

        let archive = Archive::open_stream(source, level.unwrap_or(0), mode).map_err(|source| {
            Error::Open {
                op: "lua_zip_stream_open",
                source,
            }
        })?;

        Ok(Self {
            archive: Some(archive),
            mode,
        })
    }

    /// Open a file-backed archive. All arguments are required.
    pub fn open_file(path: impl AsRef<Path>, level: i32, mode: &str) -> Result<Self> {
        let mode = check_mode(mode)?;
        let archive = Archive::open_file(path.as_ref(), level, mode)
            .map_err(|source| Error::Open { op: "zip_open", source })?;

        Ok(Self {
            archive: Some(archive),
            mode,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.archive.is_none()
    }

    /// Address of the owned archive, null once closed.
    pub fn raw(&self) -> *const Archive {
        match &self.archive {
            Some(archive) => archive as *const Archive,
            None => std::ptr::null(),
        }
    }

    pub fn archive(&self) -> Result<&Archive> {
        self.archive.as_ref().ok_or(Error::Closed)
    }

    pub fn archive_mut(&mut self) -> Result<&mut Archive> {
        self.archive.as_mut().ok_or(Error::Closed)
    }

    /// Close the archive. Closing twice is a no-op.
    ///
    /// A file-backed archive that cannot be written back is logged and dropped.
    pub fn close(&mut self) {
        let path = self
            .archive
            .as_ref()
            .and_then(|a| a.path().map(Path::to_path_buf));
        if let Err(err) = self.try_close() {
            match path {
                Some(path) => {
                    warn!(path = %path.display(), error = %err, "failed to write zip file on close")
                }
                None => warn!(error = %err, "failed to close zip stream"),
            }
        }
    }

    /// Close the archive, reporting a failed write-back.
    ///
    /// The handle is closed afterwards either way.
    pub fn try_close(&mut self) -> Result<()> {
        match self.archive.take() {
            Some(archive) => Ok(archive.close()?),
            None => Ok(()),
        }
    }

    pub fn entry_open(&mut self, name: &str) -> Result<()> {
        Ok(self.archive_mut()?.entry_open(name)?)
    }

    pub fn entry_write(&mut self, buf: &[u8]) -> Result<()> {
        Ok(self.archive_mut()?.entry_write(buf)?)
    }

    pub fn entry_close(&mut self) -> Result<()> {
        Ok(self.archive_mut()?.entry_close()?)
    }

    /// Content of the open entry.
    pub fn entry_read(&mut self) -> Result<Vec<u8>> {
        Ok(self.archive_mut()?.entry_read()?)
    }

    /// Whether an entry named `name` exists.
    ///
    /// A missing entry is `Ok(false)`; any other engine status is an error.
    /// The lookup leaves the open entry untouched and never creates entries.
    pub fn entry_exists(&self, name: &str) -> Result<bool> {
        match self.archive()?.locate(name) {
            Ok(_) => Ok(true),
            Err(ZipError::EntryNotFound) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Copy the whole archive out.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(self.archive()?.serialize()?)
    }

    /// Names of every closed entry in index order; directories end with `/`.
    ///
    /// `_prefix` is accepted for call compatibility and not applied. The
    /// listing reads the Central Directory records, so it leaves the open or
    /// pending entry alone.
    pub fn list_entries(&self, _prefix: Option<&str>) -> Result<Vec<String>> {
        let names = self
            .archive()?
            .records()
            .map(|record| {
                let mut name = record.file_name.clone();
                if record.is_directory && !name.ends_with('/') {
                    name.push('/');
                }
                name
            })
            .collect();
        Ok(names)
    }

    /// Central Directory records of every entry.
    pub fn stat_entries(&self) -> Result<Vec<ZipFileEntry>> {
        Ok(self.archive()?.records().cloned().collect())
    }

    /// Remove entries from a delete-mode archive.
    pub fn entries_delete(&mut self, names: &[&str]) -> Result<usize> {
        Ok(self.archive_mut()?.entries_delete(names)?)
    }
}

impl Drop for ZipHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Display for ZipHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mode: '{}', raw: {:p}", self.mode, self.raw())
    }
}

/// Method-style wrapper over a stream handle.
///
/// Each method passes straight through to the matching [`ZipHandle`] call.
#[derive(Debug)]
pub struct MemoryZip {
    handle: ZipHandle,
}

impl MemoryZip {
    pub fn open(source: Option<&[u8]>, level: Option<i32>, mode: Option<&str>) -> Result<Self> {
        Ok(Self {
            handle: ZipHandle::open_stream(source, level, mode)?,
        })
    }

    pub fn handle(&self) -> &ZipHandle {
        &self.handle
    }

    pub fn open_entry(&mut self, name: &str) -> Result<()> {
        self.handle.entry_open(name)
    }

    pub fn read_entry(&mut self) -> Result<Vec<u8>> {
        self.handle.entry_read()
    }

    pub fn write_entry(&mut self, contents: &[u8]) -> Result<()> {
        self.handle.entry_write(contents)
    }

    pub fn close_entry(&mut self) -> Result<()> {
        self.handle.entry_close()
    }

    pub fn close(&mut self) {
        self.handle.close()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.handle.serialize()
    }
}

impl fmt::Display for MemoryZip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.handle, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_modes() {
        let handle = ZipHandle::open_stream(None, None, None).unwrap();
        assert_eq!(handle.mode(), Mode::Write);

        let image = handle.serialize().unwrap();
        let handle = ZipHandle::open_stream(Some(image.as_slice()), None, None).unwrap();
        assert_eq!(handle.mode(), Mode::Read);
    }

    #[test]
    fn test_open_failure_message() {
        let err = ZipHandle::open_stream(None, None, Some("r")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to execute lua_zip_stream_open(): invalid zip mode"
        );

        let err = ZipHandle::open_stream(None, None, Some("x")).unwrap_err();
        assert_eq!(err.to_string(), "invalid 'mode': x");
    }

    #[test]
    fn test_closed_handle() {
        let mut handle = ZipHandle::open_stream(None, None, None).unwrap();
        assert!(!handle.raw().is_null());
        handle.close();
        handle.close();
        assert!(handle.is_closed());
        assert!(handle.raw().is_null());

        assert!(matches!(handle.entry_open("a"), Err(Error::Closed)));
        assert!(matches!(handle.serialize(), Err(Error::Closed)));
        assert!(matches!(handle.list_entries(None), Err(Error::Closed)));
        assert!(matches!(handle.entry_exists("a"), Err(Error::Closed)));
    }

    #[test]
    fn test_exists_is_three_way() {
        let mut handle = ZipHandle::open_stream(None, None, None).unwrap();
        handle.entry_open("a.txt").unwrap();
        handle.entry_close().unwrap();

        assert!(handle.entry_exists("a.txt").unwrap());
        assert!(!handle.entry_exists("b.txt").unwrap());
        assert_eq!(
            handle.entry_exists("").unwrap_err().status(),
            Some(ZipError::InvalidEntryName)
        );
        assert_eq!(handle.archive().unwrap().entries_total(), 1);
    }

    #[test]
    fn test_listing_with_pending_entry() {
        let mut handle = ZipHandle::open_stream(None, None, None).unwrap();
        handle.entry_open("done.txt").unwrap();
        handle.entry_close().unwrap();
        handle.entry_open("pending.txt").unwrap();
        handle.entry_write(b"data").unwrap();

        assert_eq!(handle.list_entries(None).unwrap(), ["done.txt"]);
        handle.entry_write(b" more").unwrap();
        handle.entry_close().unwrap();
        assert_eq!(handle.list_entries(None).unwrap(), ["done.txt", "pending.txt"]);
    }

    #[test]
    fn test_display_shows_mode() {
        let handle = ZipHandle::open_stream(None, Some(6), Some("w")).unwrap();
        assert!(handle.to_string().starts_with("mode: 'w', raw: 0x"));
    }
}
