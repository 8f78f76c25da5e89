//! Session identifiers.
//!
//! An id should usually identify one connection to one server, so the
//! window runtime can restore the window's position across sessions, while
//! still allowing several simultaneous connections to the same server.

use std::collections::HashSet;

/// Prefix shared by every session window id.
pub const SESSION_ID_PREFIX: &str = "mosh_window_";

/// Character appended to resolve collisions.
pub const COLLISION_SEPARATOR: char = '_';

/// Base id for a connection, before collision handling.
pub fn base_id(mode: &str, user: &str, address: &str, port: &str) -> String {
    format!("{}{}_{}@{}:{}", SESSION_ID_PREFIX, mode, user, address, port)
}

/// Build a session id not present in `existing`.
///
/// Collisions are resolved by appending [`COLLISION_SEPARATOR`] until the id
/// is free, so the result is deterministic and always extends the base id.
/// This is de-duplication, not an unguessable token.
pub fn make_id<F>(mode: &str, user: &str, address: &str, port: &str, is_taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let mut id = base_id(mode, user, address, port);
    while is_taken(&id) {
        id.push(COLLISION_SEPARATOR);
    }
    id
}

/// [`make_id`] against an explicit set of ids.
pub fn make_id_in(mode: &str, user: &str, address: &str, port: &str, existing: &HashSet<String>) -> String {
    make_id(mode, user, address, port, |id| existing.contains(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_id_template() {
        assert_eq!(
            base_id("ssh", "alice", "example.com", "22"),
            "mosh_window_ssh_alice@example.com:22"
        );
    }

    #[test]
    fn test_deterministic_without_collisions() {
        let empty = HashSet::new();
        let a = make_id_in("manual", "", "10.0.0.1", "60001", &empty);
        let b = make_id_in("manual", "", "10.0.0.1", "60001", &empty);
        assert_eq!(a, b);
        assert_eq!(a, "mosh_window_manual_@10.0.0.1:60001");
    }

    #[test]
    fn test_repeated_ids_are_unique_prefix_extensions() {
        let mut existing = HashSet::new();
        let base = base_id("ssh", "bob", "host", "22");
        let mut previous_len = 0;

        for _ in 0..5 {
            let id = make_id_in("ssh", "bob", "host", "22", &existing);
            assert!(!existing.contains(&id));
            assert!(id.starts_with(&base));
            assert!(id[base.len()..].chars().all(|c| c == COLLISION_SEPARATOR));
            assert!(id.len() > previous_len);
            previous_len = id.len();
            existing.insert(id);
        }
        assert_eq!(existing.len(), 5);
    }

    #[test]
    fn test_freed_short_form_is_reused() {
        let mut existing = HashSet::new();
        let first = make_id_in("ssh", "u", "h", "22", &existing);
        existing.insert(first.clone());
        let second = make_id_in("ssh", "u", "h", "22", &existing);
        assert_eq!(second, format!("{}_", first));

        existing.remove(&first);
        assert_eq!(make_id_in("ssh", "u", "h", "22", &existing), first);
    }
}
