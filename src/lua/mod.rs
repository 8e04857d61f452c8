//! Lua binding for archive handles.
//!
//! [`register`] builds the `luamemzip` module table: the `zip_*` functions,
//! the `ZIP_DEFAULT_COMPRESSION_LEVEL` constant and the `MemoryZip`
//! constructor. Handles are userdata; the Lua collector drops them, which
//! closes the archive.
//!
//! Failures come back two ways. Opening with a bad mode, an engine failure at
//! open, or any use of a closed handle raises a Lua error. Every other engine
//! failure is returned as `false`/`nil` followed by the status code and its
//! message.

mod memory_zip;

use mlua::{
    AnyUserData, IntoLuaMulti, Lua, MetaMethod, MultiValue, Result as LuaResult, Table, UserData,
    UserDataMethods, UserDataRefMut, Value,
};

use crate::handle::{self, Error, ZipHandle};
use crate::zip::DEFAULT_COMPRESSION_LEVEL;

pub use memory_zip::LuaMemoryZip;

/// Name scripts `require`.
pub const MODULE_NAME: &str = "luamemzip";

const STREAM_TYPE_NAME: &str = "luamemzipstream";
const FILE_TYPE_NAME: &str = "luamemzip";

/// Userdata carrying one archive handle.
pub struct LuaZip {
    handle: ZipHandle,
    file_backed: bool,
}

impl LuaZip {
    pub fn handle(&self) -> &ZipHandle {
        &self.handle
    }

    fn type_name(&self) -> &'static str {
        if self.file_backed {
            FILE_TYPE_NAME
        } else {
            STREAM_TYPE_NAME
        }
    }
}

impl UserData for LuaZip {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method_mut(MetaMethod::Close, |_, this, _: MultiValue| {
            this.handle.close();
            Ok(())
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!(
                "{}: {:p}, {}",
                this.type_name(),
                this as *const Self,
                this.handle
            ))
        });
    }
}

/// Turn a handle error into a raised Lua error.
fn raise(function: &str, err: Error) -> mlua::Error {
    match err {
        Error::Closed => mlua::Error::runtime(format!("bad argument #1 to '{function}' ({err})")),
        other => mlua::Error::runtime(other.to_string()),
    }
}

/// `true`, or `false, code, message` for an engine status.
fn status_result(lua: &Lua, function: &str, result: handle::Result<()>) -> LuaResult<MultiValue> {
    match result {
        Ok(()) => true.into_lua_multi(lua),
        Err(Error::Zip(err)) => (false, err.code(), err.to_string()).into_lua_multi(lua),
        Err(other) => Err(raise(function, other)),
    }
}

/// `bytes, count`, or `nil, code, message` for an engine status.
fn bytes_result(
    lua: &Lua,
    function: &str,
    result: handle::Result<Vec<u8>>,
) -> LuaResult<MultiValue> {
    match result {
        Ok(bytes) => (lua.create_string(&bytes)?, bytes.len() as i64).into_lua_multi(lua),
        Err(Error::Zip(err)) => (Value::Nil, err.code(), err.to_string()).into_lua_multi(lua),
        Err(other) => Err(raise(function, other)),
    }
}

/// Narrow a Lua integer level; out-of-range values stay invalid.
fn clamp_level(level: i64) -> i32 {
    i32::try_from(level).unwrap_or(if level < 0 { -1 } else { i32::MAX })
}

fn level_arg(level: Option<i64>) -> Option<i32> {
    level.map(clamp_level)
}

fn check_zip(ud: &AnyUserData) -> LuaResult<UserDataRefMut<LuaZip>> {
    ud.borrow_mut::<LuaZip>()
}

fn zip_stream_open(
    lua: &Lua,
    (stream, level, mode): (Option<mlua::String>, Option<i64>, Option<String>),
) -> LuaResult<AnyUserData> {
    let source = stream.map(|s| s.as_bytes().to_vec());
    let handle = ZipHandle::open_stream(source.as_deref(), level_arg(level), mode.as_deref())
        .map_err(|err| raise("zip_stream_open", err))?;

    lua.create_userdata(LuaZip {
        handle,
        file_backed: false,
    })
}

fn zip_stream_close(_: &Lua, ud: AnyUserData) -> LuaResult<()> {
    check_zip(&ud)?.handle.close();
    Ok(())
}

fn zip_stream_copy(lua: &Lua, ud: AnyUserData) -> LuaResult<MultiValue> {
    let zip = check_zip(&ud)?;
    bytes_result(lua, "zip_stream_copy", zip.handle.serialize())
}

fn zip_entry_open(lua: &Lua, (ud, name): (AnyUserData, String)) -> LuaResult<MultiValue> {
    let mut zip = check_zip(&ud)?;
    status_result(lua, "zip_entry_open", zip.handle.entry_open(&name))
}

fn zip_entry_write(
    lua: &Lua,
    (ud, contents): (AnyUserData, mlua::String),
) -> LuaResult<MultiValue> {
    let mut zip = check_zip(&ud)?;
    let contents = contents.as_bytes();
    status_result(lua, "zip_entry_write", zip.handle.entry_write(&contents))
}

fn zip_entry_close(lua: &Lua, ud: AnyUserData) -> LuaResult<MultiValue> {
    let mut zip = check_zip(&ud)?;
    status_result(lua, "zip_entry_close", zip.handle.entry_close())
}

fn zip_entry_read(lua: &Lua, ud: AnyUserData) -> LuaResult<MultiValue> {
    let mut zip = check_zip(&ud)?;
    bytes_result(lua, "zip_entry_read", zip.handle.entry_read())
}

fn zip_entry_exists(lua: &Lua, (ud, name): (AnyUserData, String)) -> LuaResult<MultiValue> {
    let zip = check_zip(&ud)?;
    match zip.handle.entry_exists(&name) {
        Ok(exists) => exists.into_lua_multi(lua),
        Err(Error::Zip(err)) => (Value::Nil, err.code(), err.to_string()).into_lua_multi(lua),
        Err(other) => Err(raise("zip_entry_exists", other)),
    }
}

fn zip_list_entries(
    lua: &Lua,
    (ud, prefix): (AnyUserData, Option<String>),
) -> LuaResult<Table> {
    let zip = check_zip(&ud)?;
    let prefix = prefix.unwrap_or_else(|| ".".to_string());
    let names = zip
        .handle
        .list_entries(Some(&prefix))
        .map_err(|err| raise("zip_list_entries", err))?;
    lua.create_sequence_from(names)
}

#[cfg(feature = "file-api")]
fn zip_open(lua: &Lua, (path, level, mode): (String, i64, String)) -> LuaResult<AnyUserData> {
    let handle = ZipHandle::open_file(&path, clamp_level(level), &mode)
        .map_err(|err| raise("zip_open", err))?;

    lua.create_userdata(LuaZip {
        handle,
        file_backed: true,
    })
}

#[cfg(feature = "file-api")]
fn zip_close(_: &Lua, ud: AnyUserData) -> LuaResult<()> {
    check_zip(&ud)?.handle.close();
    Ok(())
}

/// Build the `luamemzip` module table.
pub fn register(lua: &Lua) -> LuaResult<Table> {
    let module = lua.create_table()?;

    module.set("zip_stream_open", lua.create_function(zip_stream_open)?)?;
    module.set("zip_entry_exists", lua.create_function(zip_entry_exists)?)?;
    module.set("zip_stream_close", lua.create_function(zip_stream_close)?)?;
    module.set("zip_stream_copy", lua.create_function(zip_stream_copy)?)?;
    module.set("zip_list_entries", lua.create_function(zip_list_entries)?)?;
    #[cfg(feature = "file-api")]
    {
        module.set("zip_open", lua.create_function(zip_open)?)?;
        module.set("zip_close", lua.create_function(zip_close)?)?;
    }
    module.set("zip_entry_open", lua.create_function(zip_entry_open)?)?;
    module.set("zip_entry_close", lua.create_function(zip_entry_close)?)?;
    module.set("zip_entry_read", lua.create_function(zip_entry_read)?)?;
    module.set("zip_entry_write", lua.create_function(zip_entry_write)?)?;

    module.set("ZIP_DEFAULT_COMPRESSION_LEVEL", DEFAULT_COMPRESSION_LEVEL)?;

    let memory_zip = lua
        .create_function(memory_zip::open)
        .map_err(|_| mlua::Error::runtime("failed to load lua interface"))?;
    module.set("MemoryZip", memory_zip)?;

    Ok(module)
}

/// Make `require("luamemzip")` resolve to [`register`] in this state.
pub fn preload(lua: &Lua) -> LuaResult<()> {
    let package: Table = lua.globals().get("package")?;
    let preload: Table = package.get("preload")?;
    preload.set(MODULE_NAME, lua.create_function(|lua, ()| register(lua))?)?;
    Ok(())
}

/// Entry point for `require("luamemzip")` from a host Lua.
#[cfg(feature = "module")]
#[mlua::lua_module]
fn luamemzip(lua: &Lua) -> LuaResult<Table> {
    register(lua)
}
