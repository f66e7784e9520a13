//! Event channel between the script worker thread and the host.
//!
//! The Lua state lives entirely on a worker thread; the host consumes
//! script events (output lines and the completion report) over a
//! message-passing channel.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

/// Events sent from the script worker thread to the host.
#[derive(Debug, Clone)]
pub enum ScriptEvent {
    /// A line of script output (one `print` call).
    Output(String),

    /// Script execution completed.
    Finished {
        /// Whether execution was successful.
        success: bool,
        /// Error message if execution failed.
        error: Option<String>,
        /// Instruction count used.
        instructions: u64,
    },
}

/// Handle used by the script worker thread to send events to the host.
#[derive(Clone)]
pub struct ScriptHandle {
    tx: Sender<ScriptEvent>,
}

impl ScriptHandle {
    /// Send a line of output to the host.
    pub fn send_output(&self, line: String) {
        let _ = self.tx.send(ScriptEvent::Output(line));
    }

    /// Notify the host that script execution is complete.
    pub fn send_finished(&self, success: bool, error: Option<String>, instructions: u64) {
        let _ = self.tx.send(ScriptEvent::Finished {
            success,
            error,
            instructions,
        });
    }
}

/// Receiving side used by the host to consume script events.
pub struct HostBridge {
    rx: Receiver<ScriptEvent>,
}

impl HostBridge {
    /// Receive an event, blocking until one is available.
    ///
    /// Returns `None` if the worker dropped its handle without finishing.
    pub fn recv(&self) -> Option<ScriptEvent> {
        self.rx.recv().ok()
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<ScriptEvent> {
        self.rx.try_recv().ok()
    }

    /// Receive an event with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ScriptEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Create a new bridge pair.
///
/// Returns `(bridge, handle)` where the bridge stays on the host side and
/// the handle moves to the script worker thread.
pub fn create_bridge() -> (HostBridge, ScriptHandle) {
    let (tx, rx) = mpsc::channel();
    (HostBridge { rx }, ScriptHandle { tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_output_event() {
        let (bridge, handle) = create_bridge();

        thread::spawn(move || {
            handle.send_output("Hello, World!".to_string());
            handle.send_finished(true, None, 120);
        });

        let event = bridge.recv().unwrap();
        assert!(matches!(event, ScriptEvent::Output(line) if line == "Hello, World!"));

        let event = bridge.recv().unwrap();
        assert!(matches!(
            event,
            ScriptEvent::Finished {
                success: true,
                error: None,
                instructions: 120,
            }
        ));
    }

    #[test]
    fn test_multiple_outputs_ordered() {
        let (bridge, handle) = create_bridge();

        thread::spawn(move || {
            handle.send_output("Line 1".to_string());
            handle.send_output("Line 2".to_string());
            handle.send_output("Line 3".to_string());
            handle.send_finished(true, None, 0);
        });

        let mut outputs = Vec::new();
        loop {
            match bridge.recv() {
                Some(ScriptEvent::Output(line)) => outputs.push(line),
                Some(ScriptEvent::Finished { .. }) => break,
                None => break,
            }
        }

        assert_eq!(outputs, vec!["Line 1", "Line 2", "Line 3"]);
    }

    #[test]
    fn test_finished_with_error() {
        let (bridge, handle) = create_bridge();

        thread::spawn(move || {
            handle.send_finished(false, Some("Script error occurred".to_string()), 42);
        });

        let event = bridge.recv().unwrap();
        match event {
            ScriptEvent::Finished {
                success,
                error,
                instructions,
            } => {
                assert!(!success);
                assert_eq!(error, Some("Script error occurred".to_string()));
                assert_eq!(instructions, 42);
            }
            _ => panic!("Expected Finished event"),
        }
    }

    #[test]
    fn test_recv_timeout() {
        let (bridge, _handle) = create_bridge();

        // Should time out since no event is sent
        let result = bridge.recv_timeout(Duration::from_millis(50));
        assert!(result.is_none());
    }

    #[test]
    fn test_try_recv() {
        let (bridge, handle) = create_bridge();

        // Initially empty
        assert!(bridge.try_recv().is_none());

        handle.send_output("test".to_string());

        let event = bridge.try_recv();
        assert!(matches!(event, Some(ScriptEvent::Output(line)) if line == "test"));
    }

    #[test]
    fn test_recv_after_handle_dropped() {
        let (bridge, handle) = create_bridge();
        drop(handle);

        assert!(bridge.recv().is_none());
    }
}
