//! Engine hosted in a child process.
//!
//! The engine speaks newline-delimited JSON on its stdio. The first line
//! written to it carries the launch attributes; after that each line is one
//! outbound message. Each stdout line is one `{type, data}` message.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::engine::{EngineEvent, EngineHost};
use crate::error::EngineError;

pub struct ProcessEngine {
    command: String,
    args: Vec<String>,
    attributes: BTreeMap<String, String>,
    events: Sender<EngineEvent>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    /// Cleared on detach so the reader thread stops reporting.
    running: Arc<AtomicBool>,
}

impl ProcessEngine {
    pub fn new(command: impl Into<String>, args: Vec<String>, events: Sender<EngineEvent>) -> Self {
        Self {
            command: command.into(),
            args,
            attributes: BTreeMap::new(),
            events,
            child: None,
            stdin: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    fn write_line(&mut self, message: &Value) -> Result<(), EngineError> {
        let stdin = self.stdin.as_mut().ok_or(EngineError::NotInserted)?;
        let mut line = serde_json::to_string(message).map_err(EngineError::Encode)?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).map_err(EngineError::Write)?;
        stdin.flush().map_err(EngineError::Write)
    }
}

impl EngineHost for ProcessEngine {
    fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_string(), value.to_string());
    }

    fn remove_attribute(&mut self, name: &str) {
        self.attributes.remove(name);
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    fn insert(&mut self) -> Result<(), EngineError> {
        info!("Starting engine: {} {:?}", self.command, self.args);
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(EngineError::Spawn)?;

        let stdout = child.stdout.take();
        self.stdin = child.stdin.take();
        self.child = Some(child);
        self.running.store(true, Ordering::SeqCst);

        let init = json!({ "type": "init", "data": self.attributes });
        if let Err(e) = self.write_line(&init) {
            self.detach();
            return Err(e);
        }

        // Loaded goes first so no engine message can overtake it
        let _ = self.events.send(EngineEvent::Loaded);

        // Not joined: a forked grandchild can keep the pipe open after kill
        if let Some(stdout) = stdout {
            let running = self.running.clone();
            let events = self.events.clone();
            thread::spawn(move || {
                read_messages(BufReader::new(stdout), &events, &running);
            });
        }
        Ok(())
    }

    fn post(&mut self, message: &Value) -> Result<(), EngineError> {
        self.write_line(message)
    }

    fn detach(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        debug!("Engine detached");
    }
}

impl Drop for ProcessEngine {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Forward JSON lines from `reader` as engine events until EOF.
///
/// EOF while still running means the engine went away without being asked.
fn read_messages<R: BufRead>(reader: R, events: &Sender<EngineEvent>, running: &AtomicBool) {
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("Engine read failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&line) {
            Ok(value) => {
                if events.send(EngineEvent::Message(value)).is_err() {
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            }
            Err(e) => warn!("Dropping unparsable engine line: {}", e),
        }
    }
    if running.swap(false, Ordering::SeqCst) {
        let _ = events.send(EngineEvent::Crashed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    #[test]
    fn test_lines_become_messages_then_crash() {
        let (tx, rx) = mpsc::channel();
        let running = AtomicBool::new(true);
        let input = "{\"type\":\"display\",\"data\":\"hi\"}\n\nnot json\n{\"type\":\"exit\"}\n";
        read_messages(Cursor::new(input), &tx, &running);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                EngineEvent::Message(json!({"type": "display", "data": "hi"})),
                EngineEvent::Message(json!({"type": "exit"})),
                EngineEvent::Crashed,
            ]
        );
        assert!(!running.load(Ordering::SeqCst));
    }

    #[test]
    fn test_eof_after_detach_is_quiet() {
        let (tx, rx) = mpsc::channel();
        let running = AtomicBool::new(false);
        read_messages(Cursor::new(""), &tx, &running);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_post_before_insert() {
        let (tx, _rx) = mpsc::channel();
        let mut engine = ProcessEngine::new("mosh-engine", Vec::new(), tx);
        engine.set_attribute("addr", "host");
        assert_eq!(engine.attribute("addr").as_deref(), Some("host"));
        assert!(matches!(
            engine.post(&json!({"keyboard": [97]})),
            Err(EngineError::NotInserted)
        ));
    }

    #[test]
    fn test_missing_binary_fails_to_spawn() {
        let (tx, rx) = mpsc::channel();
        let mut engine = ProcessEngine::new("/nonexistent/moshterm-engine", Vec::new(), tx);
        assert!(matches!(engine.insert(), Err(EngineError::Spawn(_))));
        assert!(rx.try_recv().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_loaded_precedes_engine_messages() {
        for _ in 0..20 {
            let (tx, rx) = mpsc::channel();
            let script = "echo '{\"type\":\"exit\"}'; cat >/dev/null";
            let mut engine = ProcessEngine::new("sh", vec!["-c".to_string(), script.to_string()], tx);
            engine.insert().unwrap();

            assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), EngineEvent::Loaded);
            assert_eq!(
                rx.recv_timeout(Duration::from_secs(5)).unwrap(),
                EngineEvent::Message(json!({"type": "exit"}))
            );
            engine.detach();
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_detach_does_not_wait_for_forked_children() {
        let (tx, rx) = mpsc::channel();
        let script = "sleep 4 & cat >/dev/null";
        let mut engine = ProcessEngine::new("sh", vec!["-c".to_string(), script.to_string()], tx);
        engine.insert().unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), EngineEvent::Loaded);

        let started = Instant::now();
        engine.detach();
        assert!(started.elapsed() < Duration::from_secs(1));
        // Detached, so the eventual EOF is not reported as a crash
        assert!(rx.try_recv().is_err());
    }
}
