//! luarray - Sandboxed Lua script host with a native fixed-size numeric
//! array type.
//!
//! Embeds Lua 5.4 and exposes a bounded `f64` array to scripts through
//! metatable interception: `array.new(n)`, `array(v1, ..., vN)`, 1-based
//! indexing, and the length operator, all bounds-checked on the host side.

pub mod api;
pub mod array;
pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod logging;
pub mod runner;

pub use api::HostApi;
pub use array::{ArrayError, NumArray, MAX_LEN};
pub use bridge::{create_bridge, HostBridge, ScriptEvent, ScriptHandle};
pub use config::Config;
pub use engine::{ResourceLimits, ScriptEngine};
pub use error::{LuarrayError, Result};
pub use loader::{ScriptInfo, ScriptLoader, ScriptMetadata};
pub use runner::{RunOutcome, ScriptRunner};
