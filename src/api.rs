//! Host API for Lua scripts.
//!
//! Registers the per-run script surface: a `print` replacement that captures
//! output through the bridge instead of writing to the host's stdout, and
//! the `array` namespace.

use mlua::{Lua, Result as LuaResult, Value, Variadic};

use crate::array;
use crate::bridge::ScriptHandle;

/// Host API builder for registering functions with Lua.
pub struct HostApi {
    handle: ScriptHandle,
}

impl HostApi {
    /// Create a new HostApi forwarding output through the given handle.
    pub fn new(handle: ScriptHandle) -> Self {
        Self { handle }
    }

    /// Register the host API with the Lua environment.
    pub fn register(self, lua: &Lua) -> LuaResult<()> {
        self.register_print(lua)?;
        array::install(lua)?;
        Ok(())
    }

    /// Replace the global `print` with a host-capturing version.
    ///
    /// Arguments are tab-separated like standard Lua print; each call
    /// produces one output line.
    fn register_print(&self, lua: &Lua) -> LuaResult<()> {
        let handle = self.handle.clone();
        let print_fn = lua.create_function(move |_, values: Variadic<Value>| {
            let mut parts = Vec::with_capacity(values.len());
            for value in values.iter() {
                parts.push(display_value(value));
            }
            handle.send_output(parts.join("\t"));
            Ok(())
        })?;
        lua.globals().set("print", print_fn)?;
        Ok(())
    }
}

/// Convert a Lua value to its printed form. Userdata honors `__tostring`.
fn display_value(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_string_lossy().to_string(),
        other => other
            .to_string()
            .unwrap_or_else(|_| format!("[{}]", other.type_name())),
    }
}
