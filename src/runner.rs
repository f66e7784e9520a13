//! Script execution orchestration.
//!
//! Runs each script on a dedicated worker thread: the Lua state is created,
//! used, and dropped entirely on that thread, while the host consumes output
//! and the completion report over the bridge channel.

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::api::HostApi;
use crate::bridge::{create_bridge, HostBridge, ScriptEvent, ScriptHandle};
use crate::config::Config;
use crate::engine::{ResourceLimits, ScriptEngine};
use crate::{LuarrayError, Result};

/// Grace period added to the wall-clock limit before the host-side
/// backstop gives up on the worker. The in-hook deadline normally fires
/// first; the backstop covers runs stuck inside a long C call the hook
/// cannot interrupt in time.
const BACKSTOP_GRACE: Duration = Duration::from_secs(2);

/// Result of a script run.
#[derive(Debug)]
pub struct RunOutcome {
    /// Output lines collected from the script, in order.
    pub output: Vec<String>,
    /// Whether execution completed successfully.
    pub success: bool,
    /// Error message if execution failed.
    pub error: Option<String>,
    /// Instruction count used.
    pub instructions: u64,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

/// Service for executing Lua scripts under configured resource limits.
pub struct ScriptRunner {
    limits: ResourceLimits,
    entry: String,
}

impl ScriptRunner {
    /// Create a runner from the application configuration.
    pub fn new(config: &Config) -> Self {
        let limits = ResourceLimits {
            max_instructions: config.engine.max_instructions,
            max_memory: config.engine.max_memory_mb * 1024 * 1024,
            max_execution_seconds: config.engine.max_execution_seconds,
        };
        Self {
            limits,
            entry: config.scripts.entry.clone(),
        }
    }

    /// Create a runner with explicit limits and entry function name
    /// (empty = never call an entry function).
    pub fn with_limits(limits: ResourceLimits, entry: impl Into<String>) -> Self {
        Self {
            limits,
            entry: entry.into(),
        }
    }

    /// Run a script file. The file name becomes the chunk name in error
    /// messages.
    pub fn run_file(&self, path: &Path) -> Result<RunOutcome> {
        let source = std::fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "script".to_string());
        self.run_source(&name, &source)
    }

    /// Run Lua source under the given chunk name.
    pub fn run_source(&self, name: &str, source: &str) -> Result<RunOutcome> {
        self.run_source_with(name, source, |_| {})
    }

    /// Run Lua source, invoking `on_output` for every output line as it
    /// arrives. Lines are also collected into the returned outcome.
    pub fn run_source_with<F>(&self, name: &str, source: &str, mut on_output: F) -> Result<RunOutcome>
    where
        F: FnMut(&str),
    {
        let (bridge, handle) = create_bridge();

        let limits = self.limits.clone();
        let entry = self.entry.clone();
        let chunk_name = name.to_string();
        let chunk_source = source.to_string();

        debug!(script = name, "starting script worker");
        let started = Instant::now();

        let worker = thread::Builder::new()
            .name("script-worker".to_string())
            .spawn(move || {
                worker_main(&limits, &entry, &chunk_name, &chunk_source, &handle);
            })?;

        let deadline = (self.limits.max_execution_seconds > 0).then(|| {
            started + Duration::from_secs(self.limits.max_execution_seconds as u64) + BACKSTOP_GRACE
        });

        let mut output = Vec::new();
        loop {
            let event = match self.next_event(&bridge, deadline) {
                Ok(event) => event,
                Err(outcome_error) => {
                    // Backstop fired or the worker died without reporting;
                    // the worker thread is detached, not joined.
                    warn!(script = name, error = %outcome_error, "script run aborted");
                    return Ok(RunOutcome {
                        output,
                        success: false,
                        error: Some(outcome_error),
                        instructions: 0,
                        duration: started.elapsed(),
                    });
                }
            };

            match event {
                ScriptEvent::Output(line) => {
                    on_output(&line);
                    output.push(line);
                }
                ScriptEvent::Finished {
                    success,
                    error,
                    instructions,
                } => {
                    let _ = worker.join();
                    let duration = started.elapsed();
                    if success {
                        info!(script = name, instructions, ?duration, "script finished");
                    } else {
                        error!(
                            script = name,
                            error = error.as_deref().unwrap_or("unknown"),
                            "script failed"
                        );
                    }
                    return Ok(RunOutcome {
                        output,
                        success,
                        error,
                        instructions,
                        duration,
                    });
                }
            }
        }
    }

    /// Wait for the next event, honoring the backstop deadline.
    fn next_event(
        &self,
        bridge: &HostBridge,
        deadline: Option<Instant>,
    ) -> std::result::Result<ScriptEvent, String> {
        match deadline {
            Some(deadline) => {
                let remaining = deadline
                    .checked_duration_since(Instant::now())
                    .unwrap_or(Duration::ZERO);
                bridge.recv_timeout(remaining).ok_or_else(|| {
                    "script did not finish within the execution time limit".to_string()
                })
            }
            None => bridge
                .recv()
                .ok_or_else(|| "script worker terminated unexpectedly".to_string()),
        }
    }
}

/// Worker thread body: build the engine, register the API, execute the
/// chunk, call the entry function if the script defined one, and report
/// the outcome.
fn worker_main(
    limits: &ResourceLimits,
    entry: &str,
    name: &str,
    source: &str,
    handle: &ScriptHandle,
) {
    let engine = match ScriptEngine::with_limits(limits.clone()) {
        Ok(engine) => engine,
        Err(e) => {
            handle.send_finished(false, Some(e.to_string()), 0);
            return;
        }
    };

    let result = HostApi::new(handle.clone())
        .register(engine.lua())
        .map_err(|e| LuarrayError::Script(format!("Failed to register host API: {e}")))
        .and_then(|()| engine.execute_named(source, name))
        .and_then(|()| {
            if !entry.is_empty() && engine.global_function_exists(entry)? {
                engine.call_global(entry)
            } else {
                Ok(())
            }
        });

    let instructions = engine.instruction_count();
    match result {
        Ok(()) => handle.send_finished(true, None, instructions),
        Err(e) => handle.send_finished(false, Some(e.to_string()), instructions),
    }
}
