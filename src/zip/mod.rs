//! In-memory ZIP archive engine.
//!
//! This module is the archive API the handle layer and the Lua binding sit
//! on. It reads and writes complete archive images held in memory, with
//! optional file backing.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`writer`]: Assembly of a complete archive image from finished entries
//! - [`archive`]: The [`Archive`] object with its entry operations
//! - [`error`]: Integer status codes and their messages
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions when reading
//! - STORED (no compression) and DEFLATE methods, read and write
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No ZIP64 output: archives over 4GB or 65535 entries are rejected

mod archive;
mod error;
mod parser;
mod structures;
mod writer;

pub use archive::{Archive, DEFAULT_COMPRESSION_LEVEL, normalize_entry_name};
pub use error::{ZIP_ENOENT, ZipError, strerror};
pub use parser::ZipParser;
pub use structures::*;
pub use writer::write_archive;
