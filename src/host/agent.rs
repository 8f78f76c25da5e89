//! Agent bridge hosted in a child process.
//!
//! The bridge command is started with the endpoint id as its only argument
//! and exchanges JSON lines on its stdio. Its exit is the disconnect.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::Sender;
use std::thread;

use serde_json::Value;
use tracing::{info, warn};

use crate::agent::{AgentConnector, AgentEvent, AgentPort};
use crate::error::RelayError;

pub struct ProcessAgentConnector {
    command: String,
    events: Sender<AgentEvent>,
}

impl ProcessAgentConnector {
    pub fn new(command: impl Into<String>, events: Sender<AgentEvent>) -> Self {
        Self {
            command: command.into(),
            events,
        }
    }
}

impl AgentConnector for ProcessAgentConnector {
    fn connect(&mut self, endpoint: &str) -> Option<Box<dyn AgentPort>> {
        let mut child = match Command::new(&self.command)
            .arg(endpoint)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(c) => c,
            Err(e) => {
                info!("Could not start agent bridge {}: {}", self.command, e);
                return None;
            }
        };

        let stdin = child.stdin.take()?;
        if let Some(stdout) = child.stdout.take() {
            let events = self.events.clone();
            thread::spawn(move || {
                read_agent(BufReader::new(stdout), &events);
            });
        }
        Some(Box::new(ProcessAgentPort {
            child: Some(child),
            stdin: Some(stdin),
        }))
    }
}

struct ProcessAgentPort {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
}

impl AgentPort for ProcessAgentPort {
    fn post(&mut self, message: &Value) -> Result<(), RelayError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| RelayError::Channel("port disconnected".to_string()))?;
        let mut line = message.to_string();
        line.push('\n');
        stdin
            .write_all(line.as_bytes())
            .and_then(|_| stdin.flush())
            .map_err(|e| RelayError::Channel(e.to_string()))
    }

    fn disconnect(&mut self) {
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for ProcessAgentPort {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Forward JSON lines from the bridge, then report the disconnect.
fn read_agent<R: BufRead>(reader: R, events: &Sender<AgentEvent>) {
    for line in reader.lines().map_while(Result::ok) {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&line) {
            Ok(value) => {
                if events.send(AgentEvent::Message(value)).is_err() {
                    return;
                }
            }
            Err(e) => warn!("Dropping unparsable agent line: {}", e),
        }
    }
    let _ = events.send(AgentEvent::Disconnected);
}
