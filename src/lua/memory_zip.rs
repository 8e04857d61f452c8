//! `MemoryZip`: the method-style wrapper scripts normally use.
//!
//! ```lua
//! local zip = require("luamemzip")
//! local archive = zip.MemoryZip(zip, nil, zip.ZIP_DEFAULT_COMPRESSION_LEVEL)
//! archive:open_entry("hello.txt")
//! archive:write_entry("hello")
//! archive:close_entry()
//! local bytes = archive:serialize()
//! ```

use mlua::{
    AnyUserData, Lua, MetaMethod, MultiValue, Result as LuaResult, UserData, UserDataMethods, Value,
};

use super::{STREAM_TYPE_NAME, bytes_result, level_arg, raise, status_result};
use crate::handle::MemoryZip;

/// Userdata wrapping a [`MemoryZip`]; each method returns exactly what the
/// matching `zip_*` function returns.
pub struct LuaMemoryZip(MemoryZip);

impl LuaMemoryZip {
    pub fn inner(&self) -> &MemoryZip {
        &self.0
    }
}

impl UserData for LuaMemoryZip {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method_mut("open_entry", |lua, this, name: String| {
            status_result(lua, "zip_entry_open", this.0.open_entry(&name))
        });

        methods.add_method_mut("read_entry", |lua, this, ()| {
            bytes_result(lua, "zip_entry_read", this.0.read_entry())
        });

        methods.add_method_mut("write_entry", |lua, this, contents: mlua::String| {
            let contents = contents.as_bytes();
            status_result(lua, "zip_entry_write", this.0.write_entry(&contents))
        });

        methods.add_method_mut("close_entry", |lua, this, ()| {
            status_result(lua, "zip_entry_close", this.0.close_entry())
        });

        methods.add_method_mut("close", |_, this, ()| {
            this.0.close();
            Ok(())
        });

        methods.add_method("serialize", |lua, this, ()| {
            bytes_result(lua, "zip_stream_copy", this.0.serialize())
        });

        methods.add_meta_method_mut(MetaMethod::Close, |_, this, _: MultiValue| {
            this.0.close();
            Ok(())
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!(
                "{STREAM_TYPE_NAME}: {:p}, {}",
                this.0.handle() as *const _,
                this.0
            ))
        });
    }
}

/// `MemoryZip(lib, stream?, level?, mode?)`.
///
/// `lib` is the module table, accepted for call compatibility.
pub(super) fn open(
    lua: &Lua,
    (_lib, stream, level, mode): (Value, Option<mlua::String>, Option<i64>, Option<String>),
) -> LuaResult<AnyUserData> {
    let source = stream.map(|s| s.as_bytes().to_vec());
    let inner = MemoryZip::open(source.as_deref(), level_arg(level), mode.as_deref())
        .map_err(|err| raise("zip_stream_open", err))?;
    lua.create_userdata(LuaMemoryZip(inner))
}
