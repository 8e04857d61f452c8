use luamemzip::lua;
use mlua::{Lua, Table};

fn state() -> Lua {
    let lua = Lua::new();
    lua::preload(&lua).unwrap();
    lua.load(r#"zip = require("luamemzip")"#).exec().unwrap();
    lua
}

#[test]
fn test_module_table() {
    let lua = state();
    let module: Table = lua.globals().get("zip").unwrap();
    let level: i64 = module.get("ZIP_DEFAULT_COMPRESSION_LEVEL").unwrap();
    assert_eq!(level, 6);

    for name in [
        "zip_stream_open",
        "zip_stream_close",
        "zip_stream_copy",
        "zip_entry_open",
        "zip_entry_write",
        "zip_entry_close",
        "zip_entry_read",
        "zip_entry_exists",
        "zip_list_entries",
        "MemoryZip",
    ] {
        assert!(module.contains_key(name).unwrap(), "{name} missing");
    }
}

#[test]
fn test_write_then_read() {
    let (content, len): (String, i64) = state()
        .load(
            r#"
            local w = zip.zip_stream_open()
            assert(zip.zip_entry_open(w, "dir/"))
            assert(zip.zip_entry_close(w))
            assert(zip.zip_entry_open(w, "dir/hello.txt"))
            assert(zip.zip_entry_write(w, "hello "))
            assert(zip.zip_entry_write(w, "world"))
            assert(zip.zip_entry_close(w))
            local image = zip.zip_stream_copy(w)
            zip.zip_stream_close(w)

            local r = zip.zip_stream_open(image)
            local names = zip.zip_list_entries(r)
            assert(#names == 2 and names[1] == "dir/" and names[2] == "dir/hello.txt")
            assert(zip.zip_entry_open(r, "dir/hello.txt"))
            return zip.zip_entry_read(r)
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(content, "hello world");
    assert_eq!(len, 11);
}

#[test]
fn test_engine_failures_are_returned() {
    let (ok, code, msg): (Option<bool>, i64, String) = state()
        .load(
            r#"
            local w = zip.zip_stream_open(nil, 0, "w")
            assert(zip.zip_entry_open(w, "a.txt"))
            return zip.zip_entry_read(w)
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(ok, None);
    assert_eq!(code, -3);
    assert_eq!(msg, "entry not found");

    let (ok, code): (bool, i64) = state()
        .load(
            r#"
            local w = zip.zip_stream_open()
            return zip.zip_entry_write(w, "no entry open")
            "#,
        )
        .eval()
        .unwrap();
    assert!(!ok);
    assert!(code < 0);
}

#[test]
fn test_exists_reports_three_ways() {
    let (present, missing, invalid, code): (bool, bool, Option<bool>, i64) = state()
        .load(
            r#"
            local w = zip.zip_stream_open()
            zip.zip_entry_open(w, "a.txt")
            zip.zip_entry_close(w)
            local r = zip.zip_stream_open((zip.zip_stream_copy(w)))
            local invalid, code = zip.zip_entry_exists(r, "")
            return zip.zip_entry_exists(r, "a.txt"), zip.zip_entry_exists(r, "b.txt"), invalid, code
            "#,
        )
        .eval()
        .unwrap();
    assert!(present);
    assert!(!missing);
    assert_eq!(invalid, None);
    assert_eq!(code, -2);
}

#[test]
fn test_closed_handle_raises() {
    let err = state()
        .load(
            r#"
            local w = zip.zip_stream_open()
            zip.zip_stream_close(w)
            zip.zip_stream_close(w)
            zip.zip_entry_open(w, "a.txt")
            "#,
        )
        .exec()
        .unwrap_err();
    assert!(
        err.to_string().contains(
            "bad argument #1 to 'zip_entry_open' (invalid zip handle, cannot operate on a closed zip file)"
        ),
        "{err}"
    );
}

#[test]
fn test_every_operation_on_a_closed_handle_raises() {
    let lua = state();
    lua.load(
        r#"
        closed = zip.zip_stream_open()
        zip.zip_stream_close(closed)
        memzip = zip.MemoryZip(zip)
        memzip:close()
        "#,
    )
    .exec()
    .unwrap();

    for (code, function) in [
        (r#"zip.zip_entry_open(closed, "a.txt")"#, "zip_entry_open"),
        (r#"zip.zip_entry_write(closed, "x")"#, "zip_entry_write"),
        ("zip.zip_entry_close(closed)", "zip_entry_close"),
        ("zip.zip_entry_read(closed)", "zip_entry_read"),
        (r#"zip.zip_entry_exists(closed, "a.txt")"#, "zip_entry_exists"),
        ("zip.zip_stream_copy(closed)", "zip_stream_copy"),
        ("zip.zip_list_entries(closed)", "zip_list_entries"),
        (r#"memzip:open_entry("a.txt")"#, "zip_entry_open"),
        (r#"memzip:write_entry("x")"#, "zip_entry_write"),
        ("memzip:close_entry()", "zip_entry_close"),
        ("memzip:read_entry()", "zip_entry_read"),
        ("memzip:serialize()", "zip_stream_copy"),
    ] {
        let err = lua.load(code).exec().unwrap_err().to_string();
        let expected = format!(
            "bad argument #1 to '{function}' (invalid zip handle, cannot operate on a closed zip file)"
        );
        assert!(err.contains(&expected), "{code}: {err}");
    }

    // Closing again stays a no-op.
    lua.load("zip.zip_stream_close(closed); memzip:close()").exec().unwrap();
}

#[test]
fn test_listing_while_an_entry_is_pending() {
    let count: i64 = state()
        .load(
            r#"
            local w = zip.zip_stream_open()
            zip.zip_entry_open(w, "done.txt")
            zip.zip_entry_close(w)
            zip.zip_entry_open(w, "pending.txt")
            zip.zip_entry_write(w, "data")
            local names = zip.zip_list_entries(w)
            assert(names[1] == "done.txt")
            return #names
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_open_errors_raise() {
    let lua = state();

    let err = lua.load(r#"zip.zip_stream_open(nil, 0, "q")"#).exec().unwrap_err();
    assert!(err.to_string().contains("invalid 'mode': q"), "{err}");

    let err = lua.load(r#"zip.zip_stream_open(nil, 0, "r")"#).exec().unwrap_err();
    assert!(
        err.to_string()
            .contains("failed to execute lua_zip_stream_open(): invalid zip mode"),
        "{err}"
    );

    let err = lua.load(r#"zip.zip_stream_open(nil, 11, "w")"#).exec().unwrap_err();
    assert!(err.to_string().contains("invalid compression level"), "{err}");
}

#[test]
fn test_memory_zip_methods() {
    let (content, text): (String, String) = state()
        .load(
            r#"
            local m = zip.MemoryZip(zip, nil, zip.ZIP_DEFAULT_COMPRESSION_LEVEL)
            assert(m:open_entry("notes.txt"))
            assert(m:write_entry(string.rep("x", 1000)))
            assert(m:close_entry())
            local image = m:serialize()
            m:close()

            local r = zip.MemoryZip(zip, image)
            assert(r:open_entry("notes.txt"))
            local content = r:read_entry()
            return content, tostring(r)
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(content, "x".repeat(1000));
    assert!(text.starts_with("luamemzipstream: 0x"), "{text}");
    assert!(text.contains("mode: 'r'"), "{text}");
}

#[test]
fn test_to_be_closed_variable() {
    let closed: String = state()
        .load(
            r#"
            local outer
            do
                local w <close> = zip.zip_stream_open()
                outer = w
            end
            return tostring(outer)
            "#,
        )
        .eval()
        .unwrap();
    assert!(closed.ends_with("raw: 0x0"), "{closed}");
}
