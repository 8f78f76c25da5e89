//! Named setup-form fields and the deprecated-key migration table.

use std::fmt;

use super::Scope;

/// Prefix for every persisted setup-form field.
pub const FIELD_PREFIX: &str = "field_";

/// Deprecated local keys and the keys that replaced them.
pub const LOCAL_KEYS_TO_MIGRATE: &[(&str, &str)] = &[("field_command", "field_server-command")];

/// Fields remembered by the setup window between launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Addr,
    SshPort,
    MoshPort,
    Family,
    User,
    RemoteCommand,
    ServerCommand,
    EscapeKey,
    DnsResolver,
    TrustSshfp,
}

/// How a field is represented before it reaches the string-only store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Bool,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Addr,
        Field::SshPort,
        Field::MoshPort,
        Field::Family,
        Field::User,
        Field::RemoteCommand,
        Field::ServerCommand,
        Field::EscapeKey,
        Field::DnsResolver,
        Field::TrustSshfp,
    ];

    /// Form name of the field.
    pub fn name(self) -> &'static str {
        match self {
            Field::Addr => "addr",
            Field::SshPort => "ssh-port",
            Field::MoshPort => "mosh-port",
            Field::Family => "family",
            Field::User => "user",
            Field::RemoteCommand => "remote-command",
            Field::ServerCommand => "server-command",
            Field::EscapeKey => "mosh-escape-key",
            Field::DnsResolver => "dns-resolver",
            Field::TrustSshfp => "trust-sshfp",
        }
    }

    /// Storage key, e.g. `field_addr`.
    pub fn key(self) -> String {
        format!("{}{}", FIELD_PREFIX, self.name())
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::TrustSshfp => FieldKind::Bool,
            _ => FieldKind::Text,
        }
    }

    pub fn scope(self) -> Scope {
        Scope::Local
    }

    pub fn by_name(name: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.name() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A field value as the form sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
}

impl FieldValue {
    /// The string written to the store. Booleans become `"true"`/`"false"`.
    pub fn to_stored(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Bool(b) => b.to_string(),
        }
    }

    /// Parse a stored string back according to the field's kind.
    pub fn from_stored(kind: FieldKind, stored: &str) -> Self {
        match kind {
            FieldKind::Text => FieldValue::Text(stored.to_string()),
            FieldKind::Bool => FieldValue::Bool(stored == "true"),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Text(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}
