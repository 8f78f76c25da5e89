//! Key mapping for engine input
//!
//! Converts crossterm key events to the text the engine's keyboard message
//! carries. The remote side does the terminal emulation, so cursor keys are
//! always sent in normal (not application) mode.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Map a key event to input text, `None` for keys with no encoding.
pub fn key_to_text(event: &KeyEvent) -> Option<String> {
    let mods = Modifiers::from(event.modifiers);

    match event.code {
        KeyCode::Char(ch) => Some(map_char(ch, mods)),
        KeyCode::Enter => Some("\r".to_string()),
        KeyCode::Backspace => {
            if mods.contains(Modifiers::ALT) {
                Some("\x1b\x7f".to_string())
            } else {
                Some("\x7f".to_string())
            }
        }
        KeyCode::Tab => Some("\t".to_string()),
        KeyCode::BackTab => Some("\x1b[Z".to_string()),
        KeyCode::Esc => Some("\x1b".to_string()),

        KeyCode::Up => Some(csi_key('A', mods)),
        KeyCode::Down => Some(csi_key('B', mods)),
        KeyCode::Right => Some(csi_key('C', mods)),
        KeyCode::Left => Some(csi_key('D', mods)),
        KeyCode::Home => Some(csi_key('H', mods)),
        KeyCode::End => Some(csi_key('F', mods)),

        KeyCode::PageUp => Some(tilde_key(5, mods)),
        KeyCode::PageDown => Some(tilde_key(6, mods)),
        KeyCode::Insert => Some(tilde_key(2, mods)),
        KeyCode::Delete => Some(tilde_key(3, mods)),

        KeyCode::F(n) => function_key(n, mods),
        _ => None,
    }
}

fn map_char(ch: char, mods: Modifiers) -> String {
    if mods.contains(Modifiers::CTRL) {
        if let Some(code) = control_code(ch) {
            let c = char::from(code);
            return if mods.contains(Modifiers::ALT) {
                format!("\x1b{}", c)
            } else {
                c.to_string()
            };
        }
    }
    if mods.contains(Modifiers::ALT) {
        return format!("\x1b{}", ch);
    }
    ch.to_string()
}

fn control_code(ch: char) -> Option<u8> {
    match ch {
        'a'..='z' => Some(ch as u8 - b'a' + 1),
        'A'..='Z' => Some(ch as u8 - b'A' + 1),
        '@' | '`' | ' ' => Some(0x00),
        '[' => Some(0x1b),
        '\\' => Some(0x1c),
        ']' => Some(0x1d),
        '^' | '~' => Some(0x1e),
        '_' | '?' => Some(0x1f),
        _ => None,
    }
}

/// `ESC [ key`, or `ESC [ 1 ; mod key` with modifiers
fn csi_key(key: char, mods: Modifiers) -> String {
    if mods.is_empty() {
        format!("\x1b[{}", key)
    } else {
        format!("\x1b[1;{}{}", modifier_code(mods), key)
    }
}

fn tilde_key(code: u8, mods: Modifiers) -> String {
    if mods.is_empty() {
        format!("\x1b[{}~", code)
    } else {
        format!("\x1b[{};{}~", code, modifier_code(mods))
    }
}

fn function_key(n: u8, mods: Modifiers) -> Option<String> {
    let text = match n {
        1..=4 => {
            let key = (b'P' + n - 1) as char;
            if mods.is_empty() {
                format!("\x1bO{}", key)
            } else {
                format!("\x1b[1;{}{}", modifier_code(mods), key)
            }
        }
        5 => tilde_key(15, mods),
        6..=10 => tilde_key(n + 11, mods),
        11 | 12 => tilde_key(n + 12, mods),
        _ => return None,
    };
    Some(text)
}

/// xterm modifier parameter
fn modifier_code(mods: Modifiers) -> u8 {
    1 + if mods.contains(Modifiers::SHIFT) { 1 } else { 0 }
        + if mods.contains(Modifiers::ALT) { 2 } else { 0 }
        + if mods.contains(Modifiers::CTRL) { 4 } else { 0 }
}
