//! Connection setup form.
//!
//! Holds the connection parameters the user is editing. Opening the form
//! migrates deprecated keys first and only then loads the saved fields, so
//! the form never shows a value that is about to be renamed.

use tracing::{debug, info};

use crate::session::args::{ConnectionArgs, Mode};
use crate::settings::{self, Field, FieldValue, FieldValues, SettingsStore};

/// Placeholder for the key field while a private key is saved.
pub const KEY_SAVED_PLACEHOLDER: &str = "Key is saved, but hidden for security. \
Enter another key to replace the existing key, or leave this field blank and hit save to erase.";

const SSH_FIELDS: &[Field] = &[
    Field::Addr,
    Field::SshPort,
    Field::Family,
    Field::User,
    Field::RemoteCommand,
    Field::ServerCommand,
    Field::EscapeKey,
    Field::DnsResolver,
    Field::TrustSshfp,
];

const MANUAL_FIELDS: &[Field] = &[
    Field::Addr,
    Field::MoshPort,
    Field::Family,
    Field::EscapeKey,
    Field::DnsResolver,
    Field::TrustSshfp,
];

#[derive(Debug, Clone)]
pub struct SetupForm {
    mode: Mode,
    values: FieldValues,
    /// Manual-mode session key. Never persisted.
    credential: String,
}

impl SetupForm {
    /// Migrate deprecated keys, load every saved field and fill in the
    /// default port for the initial mode.
    pub fn open(store: &SettingsStore) -> settings::Result<Self> {
        let report = store.migrate()?;
        if !report.is_empty() {
            info!("Migrated {} setting(s)", report.migrated.len());
        }
        let values = store.load(&Field::ALL)?;
        debug!("Loaded {} saved field(s)", values.values().filter(|v| v.is_some()).count());

        let mut form = Self {
            mode: Mode::default(),
            values,
            credential: String::new(),
        };
        form.apply_mode_defaults();
        Ok(form)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.apply_mode_defaults();
    }

    /// Field holding the port for `mode`.
    pub fn port_field(mode: Mode) -> Field {
        match mode {
            Mode::Ssh => Field::SshPort,
            Mode::Manual => Field::MoshPort,
        }
    }

    /// Fields shown in the current mode.
    pub fn visible_fields(&self) -> &'static [Field] {
        match self.mode {
            Mode::Ssh => SSH_FIELDS,
            Mode::Manual => MANUAL_FIELDS,
        }
    }

    /// Only manual mode takes a session key.
    pub fn shows_credential(&self) -> bool {
        self.mode == Mode::Manual
    }

    fn apply_mode_defaults(&mut self) {
        let field = Self::port_field(self.mode);
        if self.text(field).is_empty() {
            self.set(field, self.mode.default_port().to_string().as_str());
        }
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values.get(&field).and_then(Option::as_ref)
    }

    /// Text of `field`, empty when unset.
    pub fn text(&self, field: Field) -> &str {
        self.get(field).and_then(FieldValue::as_text).unwrap_or("")
    }

    pub fn flag(&self, field: Field) -> bool {
        self.get(field).and_then(FieldValue::as_bool).unwrap_or(false)
    }

    pub fn set(&mut self, field: Field, value: impl Into<FieldValue>) {
        self.values.insert(field, Some(value.into()));
    }

    pub fn set_credential(&mut self, key: impl Into<String>) {
        self.credential = key.into();
    }

    /// Persist every field; empty ones are removed from the store.
    pub fn save(&self, store: &SettingsStore) -> settings::Result<()> {
        store.save(self.values.iter())
    }

    /// Connection arguments for the current mode.
    pub fn to_args(&self) -> ConnectionArgs {
        let mut args = ConnectionArgs::new(self.mode, self.text(Field::Addr));
        let port = self.text(Self::port_field(self.mode));
        if !port.is_empty() {
            args.port = port.to_string();
        }
        args.user = self.text(Field::User).to_string();
        args.family = self.optional(Field::Family);
        args.remote_command = self.optional(Field::RemoteCommand);
        args.server_command = self.optional(Field::ServerCommand);
        args.escape_key = self.optional(Field::EscapeKey);
        args.dns_resolver = self.optional(Field::DnsResolver);
        args.trust_sshfp = self.flag(Field::TrustSshfp);
        if self.shows_credential() && !self.credential.is_empty() {
            args.credential = Some(self.credential.clone());
        }
        args
    }

    fn optional(&self, field: Field) -> Option<String> {
        Some(self.text(field))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// Placeholder for the private key editor, if a key is already saved.
pub fn key_placeholder(store: &SettingsStore) -> settings::Result<Option<&'static str>> {
    Ok(store.has_ssh_key()?.then_some(KEY_SAVED_PLACEHOLDER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Scope;
    use serde_json::json;

    #[test]
    fn test_open_migrates_before_loading() {
        let store = SettingsStore::in_memory();
        store.set(Scope::Local, "field_command", json!("mosh-server new")).unwrap();

        let form = SetupForm::open(&store).unwrap();
        assert_eq!(form.text(Field::ServerCommand), "mosh-server new");
        assert_eq!(store.get(Scope::Local, "field_command").unwrap(), None);
    }

    #[test]
    fn test_mode_defaults_fill_empty_ports() {
        let store = SettingsStore::in_memory();
        let mut form = SetupForm::open(&store).unwrap();
        assert_eq!(form.text(Field::SshPort), "22");
        assert_eq!(form.text(Field::MoshPort), "");

        form.set_mode(Mode::Manual);
        assert_eq!(form.text(Field::MoshPort), "60001");
        assert!(form.shows_credential());
    }

    #[test]
    fn test_saved_port_is_kept() {
        let store = SettingsStore::in_memory();
        store.set(Scope::Local, "field_ssh-port", json!("2222")).unwrap();
        let form = SetupForm::open(&store).unwrap();
        assert_eq!(form.text(Field::SshPort), "2222");
    }

    #[test]
    fn test_save_removes_cleared_fields() {
        let store = SettingsStore::in_memory();
        store.set(Scope::Local, "field_user", json!("alice")).unwrap();
        let mut form = SetupForm::open(&store).unwrap();
        form.set(Field::User, "");
        form.set(Field::Addr, "example.com");
        form.set(Field::TrustSshfp, true);
        form.save(&store).unwrap();

        assert_eq!(store.get(Scope::Local, "field_user").unwrap(), None);
        assert_eq!(store.get(Scope::Local, "field_addr").unwrap(), Some(json!("example.com")));
        assert_eq!(store.get(Scope::Local, "field_trust-sshfp").unwrap(), Some(json!("true")));
    }

    #[test]
    fn test_to_args_by_mode() {
        let store = SettingsStore::in_memory();
        let mut form = SetupForm::open(&store).unwrap();
        form.set(Field::Addr, "host");
        form.set(Field::User, "bob");
        form.set(Field::ServerCommand, "mosh-server");
        form.set_credential("SECRET");

        let ssh = form.to_args();
        assert_eq!(ssh.mode, Mode::Ssh);
        assert_eq!(ssh.port, "22");
        assert_eq!(ssh.user, "bob");
        assert_eq!(ssh.server_command.as_deref(), Some("mosh-server"));
        assert_eq!(ssh.credential, None);
        assert_eq!(ssh.family, None);

        form.set_mode(Mode::Manual);
        let manual = form.to_args();
        assert_eq!(manual.port, "60001");
        assert_eq!(manual.credential.as_deref(), Some("SECRET"));
    }

    #[test]
    fn test_key_placeholder() {
        let store = SettingsStore::in_memory();
        assert_eq!(key_placeholder(&store).unwrap(), None);
        store.save_ssh_key("-----BEGIN KEY-----").unwrap();
        assert_eq!(key_placeholder(&store).unwrap(), Some(KEY_SAVED_PLACEHOLDER));
        store.save_ssh_key("").unwrap();
        assert_eq!(key_placeholder(&store).unwrap(), None);
    }
}
