use luamemzip::zip::{CompressionMethod, DOS_DIRECTORY_ATTR, ZipFileEntry, write_archive};
use luamemzip::{Error, Mode, ZipError, ZipHandle, strerror};
use tempfile::tempdir;

/// Stored record as another writer might have produced it.
fn foreign(name: &str, data: &[u8], external_attrs: u32) -> ZipFileEntry {
    let mut crc = flate2::Crc::new();
    crc.update(data);
    ZipFileEntry {
        file_name: name.to_string(),
        compression_method: CompressionMethod::Stored,
        compressed_size: data.len() as u64,
        uncompressed_size: data.len() as u64,
        crc32: crc.sum(),
        lfh_offset: 0,
        last_mod_time: 0,
        last_mod_date: (1 << 5) | 1,
        external_attrs,
        is_directory: false,
    }
}

fn build(level: i32, entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut handle = ZipHandle::open_stream(None, Some(level), Some("w")).unwrap();
    for (name, data) in entries {
        handle.entry_open(name).unwrap();
        handle.entry_write(data).unwrap();
        handle.entry_close().unwrap();
    }
    handle.serialize().unwrap()
}

fn read(image: &[u8], name: &str) -> Vec<u8> {
    let mut handle = ZipHandle::open_stream(Some(image), None, None).unwrap();
    handle.entry_open(name).unwrap();
    handle.entry_read().unwrap()
}

#[test]
fn test_round_trip_payloads() {
    let large: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

    for level in [0, 1, 6, 10] {
        let image = build(
            level,
            &[("empty.txt", b""), ("small.txt", b"hello"), ("large.bin", &large)],
        );
        assert_eq!(read(&image, "empty.txt"), b"");
        assert_eq!(read(&image, "small.txt"), b"hello");
        assert_eq!(read(&image, "large.bin"), large, "level {level}");
    }
}

#[test]
fn test_empty_archive_is_bare_eocd() {
    let handle = ZipHandle::open_stream(None, None, None).unwrap();
    let image = handle.serialize().unwrap();
    assert_eq!(image.len(), 22);
    assert_eq!(&image[..4], b"PK\x05\x06");
}

#[test]
fn test_list_marks_directories() {
    let mut handle = ZipHandle::open_stream(None, None, None).unwrap();
    for name in ["a.txt", "b/"] {
        handle.entry_open(name).unwrap();
        handle.entry_close().unwrap();
    }
    let image = handle.serialize().unwrap();

    let reader = ZipHandle::open_stream(Some(image.as_slice()), None, None).unwrap();
    assert_eq!(reader.list_entries(Some(".")).unwrap(), ["a.txt", "b/"]);
    // The prefix argument does not filter.
    assert_eq!(reader.list_entries(Some("zzz")).unwrap(), ["a.txt", "b/"]);

    let stats = reader.stat_entries().unwrap();
    assert!(!stats[0].is_directory);
    assert!(stats[1].is_directory);
}

#[test]
fn test_dos_directory_attribute_gets_slash() {
    let file = foreign("a.txt", b"a", 0);
    let dir = foreign("b", b"", DOS_DIRECTORY_ATTR);
    let image = write_archive([(&file, &b"a"[..]), (&dir, &b""[..])]).unwrap();

    let handle = ZipHandle::open_stream(Some(image.as_slice()), None, None).unwrap();
    assert_eq!(handle.list_entries(None).unwrap(), ["a.txt", "b/"]);
    assert!(handle.stat_entries().unwrap()[1].is_directory);
}

#[test]
fn test_foreign_names_are_normalized_on_lookup() {
    let dotted = foreign("./a.txt", b"alpha", 0);
    let backslashed = foreign("dir\\b.txt", b"beta", 0);
    let image =
        write_archive([(&dotted, &b"alpha"[..]), (&backslashed, &b"beta"[..])]).unwrap();

    let mut handle = ZipHandle::open_stream(Some(image.as_slice()), None, None).unwrap();
    assert_eq!(handle.list_entries(None).unwrap(), ["./a.txt", "dir\\b.txt"]);
    assert!(handle.entry_exists("a.txt").unwrap());

    handle.entry_open("a.txt").unwrap();
    assert_eq!(handle.entry_read().unwrap(), b"alpha");
    handle.entry_open("dir/b.txt").unwrap();
    assert_eq!(handle.entry_read().unwrap(), b"beta");
}

#[test]
fn test_reading_needs_read_mode() {
    let mut handle = ZipHandle::open_stream(None, None, None).unwrap();
    handle.entry_open("a.txt").unwrap();
    handle.entry_write(b"abc").unwrap();

    let err = handle.entry_read().unwrap_err();
    assert_eq!(err.status(), Some(ZipError::EntryNotFound));
    assert_eq!(err.status().map(ZipError::code), Some(luamemzip::zip::ZIP_ENOENT));
}

#[test]
fn test_serialized_copy_is_independent() {
    let image = build(6, &[("a.txt", b"one")]);
    let mut reader = ZipHandle::open_stream(Some(image.as_slice()), None, None).unwrap();
    let copy = reader.serialize().unwrap();
    assert_eq!(copy, image);

    reader.close();
    assert_eq!(read(&copy, "a.txt"), b"one");
}

#[test]
fn test_stream_rejects_file_only_modes() {
    for mode in ["a", "d"] {
        let err = ZipHandle::open_stream(None, None, Some(mode)).unwrap_err();
        assert!(matches!(err, Error::Open { source: ZipError::InvalidMode, .. }));
    }
}

#[test]
fn test_file_backed_lifecycle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.zip");

    let mut writer = ZipHandle::open_file(&path, 6, "w").unwrap();
    assert_eq!(writer.mode(), Mode::Write);
    writer.entry_open("a.txt").unwrap();
    writer.entry_write(b"alpha").unwrap();
    writer.entry_close().unwrap();
    writer.entry_open("b.txt").unwrap();
    writer.entry_write(b"beta").unwrap();
    writer.entry_close().unwrap();
    writer.try_close().unwrap();

    let mut appender = ZipHandle::open_file(&path, 0, "a").unwrap();
    appender.entry_open("c.txt").unwrap();
    appender.entry_write(b"gamma").unwrap();
    appender.entry_close().unwrap();
    appender.try_close().unwrap();

    let mut deleter = ZipHandle::open_file(&path, 0, "d").unwrap();
    assert_eq!(deleter.entries_delete(&["a.txt", "missing.txt"]).unwrap(), 1);
    deleter.try_close().unwrap();

    let mut reader = ZipHandle::open_file(&path, 0, "r").unwrap();
    assert_eq!(reader.list_entries(None).unwrap(), ["b.txt", "c.txt"]);
    reader.entry_open("c.txt").unwrap();
    assert_eq!(reader.entry_read().unwrap(), b"gamma");
    reader.entry_close().unwrap();
    reader.entry_open("b.txt").unwrap();
    assert_eq!(reader.entry_read().unwrap(), b"beta");
}

#[test]
fn test_missing_file_fails_to_open() {
    let dir = tempdir().unwrap();
    let err = ZipHandle::open_file(dir.path().join("nope.zip"), 0, "r").unwrap_err();
    assert_eq!(err.to_string(), "failed to execute zip_open(): cannot initialize reader");
}

#[test]
fn test_strerror_covers_status_codes() {
    assert_eq!(strerror(-3), "entry not found");
    assert_eq!(strerror(-32), "cannot initialize writer from reader");
    assert_eq!(strerror(0), "unknown error");
    assert_eq!(strerror(-33), "unknown error");
}
