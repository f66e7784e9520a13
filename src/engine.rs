//! Lua script engine with sandboxing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mlua::{HookTriggers, Lua, Value, VmState};

use crate::{LuarrayError, Result};

/// Resource limits for script execution.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Maximum number of instructions (0 = unlimited).
    pub max_instructions: u64,
    /// Maximum memory in bytes (0 = unlimited).
    pub max_memory: usize,
    /// Maximum wall-clock execution time in seconds (0 = unlimited).
    pub max_execution_seconds: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_instructions: 1_000_000,
            max_memory: 10 * 1024 * 1024, // 10MB
            max_execution_seconds: 30,
        }
    }
}

/// Lua script execution engine with sandboxing.
pub struct ScriptEngine {
    lua: Lua,
    instruction_count: Arc<AtomicU64>,
    limits: ResourceLimits,
}

impl ScriptEngine {
    /// Create a new ScriptEngine with default resource limits.
    pub fn new() -> Result<Self> {
        Self::with_limits(ResourceLimits::default())
    }

    /// Create a new ScriptEngine with custom resource limits.
    pub fn with_limits(limits: ResourceLimits) -> Result<Self> {
        let lua = Lua::new();

        Self::apply_sandbox(&lua)?;

        if limits.max_memory > 0 {
            lua.set_memory_limit(limits.max_memory)
                .map_err(|e| LuarrayError::Script(format!("Failed to set memory limit: {e}")))?;
        }

        Ok(Self {
            lua,
            instruction_count: Arc::new(AtomicU64::new(0)),
            limits,
        })
    }

    /// Apply sandbox restrictions to the Lua environment.
    fn apply_sandbox(lua: &Lua) -> Result<()> {
        let globals = lua.globals();

        // Disable dangerous functions
        let nil = Value::Nil;
        for name in [
            "os",
            "io",
            "loadfile",
            "dofile",
            "load",
            "require",
            "package",
            "debug",
            "collectgarbage",
        ] {
            globals
                .set(name, nil.clone())
                .map_err(|e| LuarrayError::Script(format!("Failed to disable {name}: {e}")))?;
        }

        Ok(())
    }

    /// Install the instruction-count / wall-clock hook for one run.
    ///
    /// Both checks ride the same hook, firing every 10000 instructions.
    fn install_hook(&self) {
        if self.limits.max_instructions == 0 && self.limits.max_execution_seconds == 0 {
            return;
        }

        let count = Arc::clone(&self.instruction_count);
        let instruction_limit = self.limits.max_instructions;
        let deadline = (self.limits.max_execution_seconds > 0)
            .then(|| Instant::now() + Duration::from_secs(self.limits.max_execution_seconds as u64));

        self.lua.set_hook(
            HookTriggers::new().every_nth_instruction(10000),
            move |_lua, _debug| {
                let current = count.fetch_add(10000, Ordering::SeqCst) + 10000;
                if instruction_limit > 0 && current > instruction_limit {
                    return Err(mlua::Error::RuntimeError(
                        "Script exceeded instruction limit".to_string(),
                    ));
                }
                if let Some(deadline) = deadline {
                    if Instant::now() > deadline {
                        return Err(mlua::Error::RuntimeError(
                            "Script exceeded execution time limit".to_string(),
                        ));
                    }
                }
                Ok(VmState::Continue)
            },
        );
    }

    /// Execute Lua source code.
    pub fn execute(&self, source: &str) -> Result<()> {
        self.execute_named(source, "chunk")
    }

    /// Execute Lua source code under a chunk name (shown in error messages).
    pub fn execute_named(&self, source: &str, name: &str) -> Result<()> {
        // Reset instruction count
        self.instruction_count.store(0, Ordering::SeqCst);

        self.install_hook();

        self.lua.load(source).set_name(name).exec().map_err(|e| {
            let _ = self.lua.remove_hook();
            LuarrayError::Script(format!("Script error: {e}"))
        })?;

        let _ = self.lua.remove_hook();

        Ok(())
    }

    /// Check whether a global with the given name is a function.
    pub fn global_function_exists(&self, name: &str) -> Result<bool> {
        let value: Value = self
            .lua
            .globals()
            .get(name)
            .map_err(|e| LuarrayError::Script(format!("Failed to get global '{name}': {e}")))?;
        Ok(matches!(value, Value::Function(_)))
    }

    /// Call a global function with no arguments, under the same resource
    /// limits as `execute`. The instruction count carries over from the
    /// preceding chunk execution.
    pub fn call_global(&self, name: &str) -> Result<()> {
        let value: Value = self
            .lua
            .globals()
            .get(name)
            .map_err(|e| LuarrayError::Script(format!("Failed to get global '{name}': {e}")))?;

        let Value::Function(func) = value else {
            return Err(LuarrayError::Script(format!(
                "global '{name}' is not a function"
            )));
        };

        self.install_hook();

        let result = func.call::<()>(());
        let _ = self.lua.remove_hook();

        result.map_err(|e| LuarrayError::Script(format!("Script error: {e}")))
    }

    /// Set a global value in the Lua environment.
    pub fn set_global<V: mlua::IntoLua>(&self, name: &str, value: V) -> Result<()> {
        self.lua
            .globals()
            .set(name, value)
            .map_err(|e| LuarrayError::Script(format!("Failed to set global '{name}': {e}")))
    }

    /// Get a global value from the Lua environment.
    pub fn get_global<V: mlua::FromLua>(&self, name: &str) -> Result<V> {
        self.lua
            .globals()
            .get(name)
            .map_err(|e| LuarrayError::Script(format!("Failed to get global '{name}': {e}")))
    }

    /// Get the instruction count.
    pub fn instruction_count(&self) -> u64 {
        self.instruction_count.load(Ordering::SeqCst)
    }

    /// Get the resource limits.
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Get a reference to the underlying Lua instance.
    pub fn lua(&self) -> &Lua {
        &self.lua
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_execution() {
        let engine = ScriptEngine::new().unwrap();
        engine.execute("x = 1 + 2").unwrap();

        let result: i32 = engine.get_global("x").unwrap();
        assert_eq!(result, 3);
    }

    #[test]
    fn test_string_operations() {
        let engine = ScriptEngine::new().unwrap();
        engine
            .execute(r#"result = string.upper("hello")"#)
            .unwrap();

        let result: String = engine.get_global("result").unwrap();
        assert_eq!(result, "HELLO");
    }

    #[test]
    fn test_math_operations() {
        let engine = ScriptEngine::new().unwrap();
        engine.execute("result = math.floor(3.7)").unwrap();

        let result: i32 = engine.get_global("result").unwrap();
        assert_eq!(result, 3);
    }

    #[test]
    fn test_table_operations() {
        let engine = ScriptEngine::new().unwrap();
        engine
            .execute(
                r#"
                t = {1, 2, 3}
                table.insert(t, 4)
                result = #t
            "#,
            )
            .unwrap();

        let result: i32 = engine.get_global("result").unwrap();
        assert_eq!(result, 4);
    }

    #[test]
    fn test_sandbox_os_disabled() {
        let engine = ScriptEngine::new().unwrap();
        let result = engine.execute("os.execute('ls')");
        assert!(result.is_err());
    }

    #[test]
    fn test_sandbox_io_disabled() {
        let engine = ScriptEngine::new().unwrap();
        let result = engine.execute("io.open('/etc/passwd', 'r')");
        assert!(result.is_err());
    }

    #[test]
    fn test_sandbox_loadfile_disabled() {
        let engine = ScriptEngine::new().unwrap();
        let result = engine.execute("loadfile('/etc/passwd')");
        assert!(result.is_err());
    }

    #[test]
    fn test_sandbox_load_disabled() {
        let engine = ScriptEngine::new().unwrap();
        let result = engine.execute("load('return 1')()");
        assert!(result.is_err());
    }

    #[test]
    fn test_sandbox_require_disabled() {
        let engine = ScriptEngine::new().unwrap();
        let result = engine.execute("require('os')");
        assert!(result.is_err());
    }

    #[test]
    fn test_sandbox_debug_disabled() {
        let engine = ScriptEngine::new().unwrap();
        let result = engine.execute("debug.traceback()");
        assert!(result.is_err());
    }

    #[test]
    fn test_instruction_limit() {
        let limits = ResourceLimits {
            max_instructions: 1000,
            max_memory: 0,
            max_execution_seconds: 30,
        };
        let engine = ScriptEngine::with_limits(limits).unwrap();

        // This infinite loop should be stopped by the instruction limit
        let result = engine.execute("while true do end");
        assert!(result.is_err());

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("instruction limit"));
    }

    #[test]
    fn test_execution_time_limit() {
        let limits = ResourceLimits {
            max_instructions: 0,
            max_memory: 0,
            max_execution_seconds: 1,
        };
        let engine = ScriptEngine::with_limits(limits).unwrap();

        let result = engine.execute("while true do end");
        assert!(result.is_err());

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("execution time limit"));
    }

    #[test]
    fn test_memory_limit() {
        let limits = ResourceLimits {
            max_instructions: 0,
            max_memory: 1024 * 100, // 100KB
            max_execution_seconds: 30,
        };
        let engine = ScriptEngine::with_limits(limits).unwrap();

        // Try to allocate a large string
        let result = engine.execute(
            r#"
            t = {}
            for i = 1, 100000 do
                t[i] = string.rep("x", 1000)
            end
        "#,
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_set_and_get_global() {
        let engine = ScriptEngine::new().unwrap();

        engine.set_global("my_value", 42).unwrap();
        let result: i32 = engine.get_global("my_value").unwrap();
        assert_eq!(result, 42);

        engine.set_global("my_string", "hello").unwrap();
        let result: String = engine.get_global("my_string").unwrap();
        assert_eq!(result, "hello");
    }

    #[test]
    fn test_call_global() {
        let engine = ScriptEngine::new().unwrap();
        engine
            .execute("function main() called = true end")
            .unwrap();

        assert!(engine.global_function_exists("main").unwrap());
        engine.call_global("main").unwrap();
        assert!(engine.get_global::<bool>("called").unwrap());
    }

    #[test]
    fn test_call_global_missing() {
        let engine = ScriptEngine::new().unwrap();
        assert!(!engine.global_function_exists("main").unwrap());

        let result = engine.call_global("main");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not a function"));
    }

    #[test]
    fn test_call_global_error_propagates() {
        let engine = ScriptEngine::new().unwrap();
        engine
            .execute("function main() error('boom') end")
            .unwrap();

        let result = engine.call_global("main");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("boom"));
    }

    #[test]
    fn test_syntax_error() {
        let engine = ScriptEngine::new().unwrap();
        let result = engine.execute("this is not valid lua");
        assert!(result.is_err());
    }

    #[test]
    fn test_runtime_error() {
        let engine = ScriptEngine::new().unwrap();
        let result = engine.execute("error('test error')");
        assert!(result.is_err());
    }

    #[test]
    fn test_chunk_name_in_error() {
        let engine = ScriptEngine::new().unwrap();
        let result = engine.execute_named("error('oops')", "demo.lua");
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("demo.lua"), "got: {err_msg}");
    }

    #[test]
    fn test_nil_access() {
        let engine = ScriptEngine::new().unwrap();
        let result = engine.execute("x = nil; y = x.field");
        assert!(result.is_err());
    }
}
