//! Connection arguments and the engine launch attributes built from them.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

/// Default SSH port used in ssh mode.
pub const SSH_DEFAULT_PORT: u16 = 22;
/// Default mosh-server UDP port used in manual mode.
pub const MOSH_DEFAULT_PORT: u16 = 60001;

/// Attribute carrying the credential; scrubbed once the engine has loaded.
pub const CREDENTIAL_ATTRIBUTES: &[&str] = &["key"];

/// How the session is bootstrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Log in over SSH and start the server there.
    #[default]
    Ssh,
    /// Connect to an already-running server with a known session key.
    Manual,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Ssh => "ssh",
            Mode::Manual => "manual",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Mode::Ssh => SSH_DEFAULT_PORT,
            Mode::Manual => MOSH_DEFAULT_PORT,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ssh" => Ok(Mode::Ssh),
            "manual" => Ok(Mode::Manual),
            other => Err(format!("Unknown mode: {}", other)),
        }
    }
}

bitflags! {
    /// Boolean launch capabilities.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct LaunchFlags: u8 {
        /// Engine may send `ssh-agent` traffic.
        const USE_AGENT   = 0b0001;
        /// Trust host keys published as SSHFP records on first use.
        const TRUST_SSHFP = 0b0010;
    }
}

/// Parameters a session window is launched with.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionArgs {
    pub mode: Mode,
    pub address: String,
    pub port: String,
    /// Address family preference (`IPv4`, `IPv6`, ...), passed through.
    pub family: Option<String>,
    pub user: String,
    /// Manual-mode session key.
    pub credential: Option<String>,
    pub remote_command: Option<String>,
    pub server_command: Option<String>,
    pub escape_key: Option<String>,
    pub dns_resolver: Option<String>,
    pub trust_sshfp: bool,
}

// Keeps the credential out of logs.
impl fmt::Debug for ConnectionArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionArgs")
            .field("mode", &self.mode)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("family", &self.family)
            .field("user", &self.user)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("remote_command", &self.remote_command)
            .field("server_command", &self.server_command)
            .field("escape_key", &self.escape_key)
            .field("dns_resolver", &self.dns_resolver)
            .field("trust_sshfp", &self.trust_sshfp)
            .finish()
    }
}

impl ConnectionArgs {
    pub fn new(mode: Mode, address: impl Into<String>) -> Self {
        Self {
            mode,
            address: address.into(),
            port: mode.default_port().to_string(),
            ..Self::default()
        }
    }

    /// Flags known before the agent probe; `USE_AGENT` is added later.
    pub fn base_flags(&self) -> LaunchFlags {
        let mut flags = LaunchFlags::empty();
        if self.trust_sshfp {
            flags |= LaunchFlags::TRUST_SSHFP;
        }
        flags
    }

    /// Attribute list the engine element is created with.
    ///
    /// Optional values that are absent or empty are left out.
    pub fn to_attributes(&self) -> Vec<(&'static str, String)> {
        let mut attrs = vec![
            ("addr", self.address.clone()),
            ("port", self.port.clone()),
            ("mode", self.mode.as_str().to_string()),
            ("user", self.user.clone()),
        ];
        let optional = [
            ("family", &self.family),
            ("key", &self.credential),
            ("remote-command", &self.remote_command),
            ("server-command", &self.server_command),
            ("mosh-escape-key", &self.escape_key),
            ("dns-resolver", &self.dns_resolver),
        ];
        for (name, value) in optional {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                attrs.push((name, v.to_string()));
            }
        }
        attrs
    }
}

/// Render a flag as the attribute string the engine expects.
pub fn flag_attribute(flags: LaunchFlags, flag: LaunchFlags) -> &'static str {
    if flags.contains(flag) {
        "true"
    } else {
        "false"
    }
}
