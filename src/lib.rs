//! # luamemzip
//!
//! In-memory ZIP archive handles, exposed to Lua.
//!
//! The crate has three layers:
//!
//! - [`zip`]: an archive engine that reads and writes whole ZIP images in
//!   memory, reporting failures as integer status codes
//! - [`handle`]: [`ZipHandle`], the exclusively-owned handle scripts hold, and
//!   the method-style [`MemoryZip`] wrapper
//! - [`lua`]: the `luamemzip` Lua module built on `mlua`
//!
//! ## Features
//!
//! - Build archives in memory and serialize them to bytes
//! - Read STORED and DEFLATE entries, including from ZIP64 archives
//! - Three-way entry existence checks (present / missing / error)
//! - File-backed archives in read, write, append and delete mode
//! - A `memzip` CLI that loads local or remote archives and runs Lua scripts
//!
//! ## Example
//!
//! ```
//! use luamemzip::ZipHandle;
//!
//! # fn main() -> Result<(), luamemzip::Error> {
//! let mut writer = ZipHandle::open_stream(None, Some(6), None)?;
//! writer.entry_open("hello.txt")?;
//! writer.entry_write(b"hello, world")?;
//! writer.entry_close()?;
//! let image = writer.serialize()?;
//!
//! let mut reader = ZipHandle::open_stream(Some(image.as_slice()), None, None)?;
//! reader.entry_open("hello.txt")?;
//! assert_eq!(reader.entry_read()?, b"hello, world");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod handle;
pub mod io;
pub mod lua;
pub mod mode;
pub mod zip;

pub use cli::Cli;
pub use handle::{Error, MemoryZip, ZipHandle};
pub use io::{HttpSource, LocalSource, Source};
pub use mode::{Mode, ModeError, check_mode};
pub use zip::{Archive, DEFAULT_COMPRESSION_LEVEL, ZipError, ZipFileEntry, strerror};
