//! Typed view of the engine message channel.
//!
//! Inbound messages are decoded once at the channel boundary: literal tags map
//! to their own variants, and the prefixed setting tags (`get_*`, `set_*`,
//! `sync_get_*`, `sync_set_*`) carry the remainder of the tag as the setting
//! name.

use serde_json::{json, Map, Value};

use crate::error::MessageError;
use crate::settings::Scope;

/// Decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    Display(String),
    Log(String),
    Error(String),
    GetSetting { scope: Scope, name: String },
    SetSetting { scope: Scope, name: String, data: Value },
    SshAgent(Value),
    Exit,
    Unknown { kind: String, data: Value },
}

// Longer prefixes first so `sync_get_x` is never read as `get_` of nothing.
const SETTING_PREFIXES: &[(&str, Scope, bool)] = &[
    ("sync_get_", Scope::Synced, false),
    ("sync_set_", Scope::Synced, true),
    ("get_", Scope::Local, false),
    ("set_", Scope::Local, true),
];

impl EngineMessage {
    /// Decode a raw `{type, data}` message.
    ///
    /// Only structurally broken input is an error; unrecognized tags decode
    /// to [`EngineMessage::Unknown`].
    pub fn decode(raw: &Value) -> Result<Self, MessageError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| MessageError::Malformed(raw.to_string()))?;
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| MessageError::Malformed(raw.to_string()))?;
        let data = obj.get("data").cloned().unwrap_or(Value::Null);

        let msg = match kind {
            "display" => EngineMessage::Display(text_of(&data)),
            "log" => EngineMessage::Log(text_of(&data)),
            "error" => EngineMessage::Error(text_of(&data)),
            "ssh-agent" => EngineMessage::SshAgent(data),
            "exit" => EngineMessage::Exit,
            _ => match split_setting(kind) {
                Some((scope, name, false)) => EngineMessage::GetSetting {
                    scope,
                    name: name.to_string(),
                },
                Some((scope, name, true)) => EngineMessage::SetSetting {
                    scope,
                    name: name.to_string(),
                    data,
                },
                None => EngineMessage::Unknown {
                    kind: kind.to_string(),
                    data,
                },
            },
        };
        Ok(msg)
    }
}

fn split_setting(kind: &str) -> Option<(Scope, &str, bool)> {
    SETTING_PREFIXES.iter().find_map(|&(prefix, scope, is_set)| {
        kind.strip_prefix(prefix)
            .filter(|name| !name.is_empty())
            .map(|name| (scope, name, is_set))
    })
}

/// String form of a payload, as the terminal and log see it.
fn text_of(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Insert `\r` before every `\n` not already preceded by one.
pub fn normalize_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut prev = None;
    for ch in text.chars() {
        if ch == '\n' && prev != Some('\r') {
            out.push('\r');
        }
        out.push(ch);
        prev = Some(ch);
    }
    out
}

/// Encode a terminal size the way the engine expects: width in the high
/// 16 bits, height in the low 16 bits.
pub fn encode_window_change(width: u16, height: u16) -> u32 {
    ((width as u32) << 16) + height as u32
}

/// Messages sent to the engine at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Keyboard input as Unicode code points.
    Keyboard(Vec<u32>),
    WindowChange(u32),
    /// Reply to a settings read; `None` when the key is unset.
    Setting { name: String, value: Option<Value> },
    SshAgent(Value),
}

impl Outbound {
    pub fn keyboard(text: &str) -> Self {
        Outbound::Keyboard(text.chars().map(|c| c as u32).collect())
    }

    pub fn to_value(&self) -> Value {
        match self {
            Outbound::Keyboard(points) => json!({ "keyboard": points }),
            Outbound::WindowChange(n) => json!({ "window_change": n }),
            Outbound::Setting { name, value } => {
                let mut map = Map::new();
                map.insert(name.clone(), value.clone().unwrap_or(Value::Null));
                Value::Object(map)
            }
            Outbound::SshAgent(data) => json!({ "ssh_agent": data }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(v: Value) -> EngineMessage {
        EngineMessage::decode(&v).unwrap()
    }

    #[test]
    fn test_literal_tags() {
        assert_eq!(
            decode(json!({"type": "display", "data": "hi"})),
            EngineMessage::Display("hi".to_string())
        );
        assert_eq!(decode(json!({"type": "exit", "data": ""})), EngineMessage::Exit);
        assert_eq!(
            decode(json!({"type": "ssh-agent", "data": [1, 2]})),
            EngineMessage::SshAgent(json!([1, 2]))
        );
    }

    #[test]
    fn test_setting_prefixes() {
        assert_eq!(
            decode(json!({"type": "get_ssh_key", "data": null})),
            EngineMessage::GetSetting {
                scope: Scope::Local,
                name: "ssh_key".to_string()
            }
        );
        assert_eq!(
            decode(json!({"type": "sync_set_known_hosts", "data": {"h": "k"}})),
            EngineMessage::SetSetting {
                scope: Scope::Synced,
                name: "known_hosts".to_string(),
                data: json!({"h": "k"})
            }
        );
        assert_eq!(
            decode(json!({"type": "sync_get_x"})),
            EngineMessage::GetSetting {
                scope: Scope::Synced,
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn test_bare_prefix_is_unknown() {
        assert!(matches!(
            decode(json!({"type": "get_", "data": 1})),
            EngineMessage::Unknown { .. }
        ));
        assert!(matches!(
            decode(json!({"type": "bogus", "data": 1})),
            EngineMessage::Unknown { .. }
        ));
    }

    #[test]
    fn test_malformed() {
        assert!(EngineMessage::decode(&json!("display")).is_err());
        assert!(EngineMessage::decode(&json!({"data": 1})).is_err());
        assert!(EngineMessage::decode(&json!({"type": 7})).is_err());
    }

    #[test]
    fn test_normalize_newlines() {
        assert_eq!(normalize_newlines("a\nb"), "a\r\nb");
        assert_eq!(normalize_newlines("a\r\nb\n"), "a\r\nb\r\n");
        assert_eq!(normalize_newlines("\n\n"), "\r\n\r\n");
    }

    #[test]
    fn test_window_change_encoding() {
        assert_eq!(encode_window_change(800, 24), (800 << 16) + 24);
        assert_eq!(
            Outbound::WindowChange(encode_window_change(80, 24)).to_value(),
            json!({"window_change": 5242904})
        );
    }

    #[test]
    fn test_outbound_shapes() {
        assert_eq!(
            Outbound::keyboard("aé").to_value(),
            json!({"keyboard": [97, 233]})
        );
        assert_eq!(
            Outbound::Setting {
                name: "ssh_key".to_string(),
                value: None
            }
            .to_value(),
            json!({"ssh_key": null})
        );
    }
}
