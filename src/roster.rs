//! Channel operator tracking for the `op` command tier.
//!
//! Operator status is learned from names replies and kept current as users
//! part, quit, get kicked, or change nick. Channel names and nicks compare
//! case-insensitively; [`ChannelRoster::ops_in`] reports folded nicks.

use std::collections::{HashMap, HashSet};

/// Prefixes that grant operator status (founder, admin, op).
const OP_PREFIXES: &[char] = &['~', '&', '@'];
/// Every status prefix that may precede a nick in a names reply.
const STATUS_PREFIXES: &[char] = &['~', '&', '@', '%', '+'];

#[derive(Debug, Default)]
pub struct ChannelRoster {
    ops: HashMap<String, HashSet<String>>,
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl ChannelRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a names reply for `channel`.
    pub fn apply_user_list(&mut self, channel: &str, users: &[String]) {
        let ops = self.ops.entry(key(channel)).or_default();
        for entry in users {
            let is_op = entry.starts_with(OP_PREFIXES);
            let nick = entry.trim_start_matches(STATUS_PREFIXES);
            if nick.is_empty() {
                continue;
            }
            if is_op {
                ops.insert(key(nick));
            } else {
                ops.remove(&key(nick));
            }
        }
    }

    pub fn set_op(&mut self, channel: &str, nick: &str, op: bool) {
        let ops = self.ops.entry(key(channel)).or_default();
        if op {
            ops.insert(key(nick));
        } else {
            ops.remove(&key(nick));
        }
    }

    pub fn is_op(&self, nick: &str, channel: &str) -> bool {
        self.ops
            .get(&key(channel))
            .is_some_and(|ops| ops.contains(&key(nick)))
    }

    /// Operators of `channel`, sorted.
    pub fn ops_in(&self, channel: &str) -> Vec<String> {
        let mut ops: Vec<String> = self
            .ops
            .get(&key(channel))
            .map(|ops| ops.iter().cloned().collect())
            .unwrap_or_default();
        ops.sort();
        ops
    }

    pub fn user_left(&mut self, nick: &str, channel: &str) {
        if let Some(ops) = self.ops.get_mut(&key(channel)) {
            ops.remove(&key(nick));
        }
    }

    pub fn user_quit(&mut self, nick: &str) {
        let nick = key(nick);
        for ops in self.ops.values_mut() {
            ops.remove(&nick);
        }
    }

    pub fn user_renamed(&mut self, old_nick: &str, new_nick: &str) {
        let (old_nick, new_nick) = (key(old_nick), key(new_nick));
        for ops in self.ops.values_mut() {
            if ops.remove(&old_nick) {
                ops.insert(new_nick.clone());
            }
        }
    }

    /// Drop everything known about a channel the bot left.
    pub fn forget_channel(&mut self, channel: &str) {
        self.ops.remove(&key(channel));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_user_list_prefixes() {
        let mut roster = ChannelRoster::new();
        roster.apply_user_list("#Bots", &names(&["@alice", "+bob", "~carol", "%dave", "erin"]));

        assert!(roster.is_op("alice", "#bots"));
        assert!(roster.is_op("carol", "#BOTS"));
        assert!(!roster.is_op("bob", "#bots"));
        assert!(!roster.is_op("dave", "#bots"));
        assert!(!roster.is_op("alice", "#other"));
        assert_eq!(roster.ops_in("#bots"), ["alice", "carol"]);
    }

    #[test]
    fn test_nicks_compare_case_insensitively() {
        let mut roster = ChannelRoster::new();
        roster.apply_user_list("#bots", &names(&["@Alice", "@BOB"]));

        assert!(roster.is_op("alice", "#bots"));
        assert!(roster.is_op("ALICE", "#bots"));

        roster.user_renamed("bob", "Robert");
        assert!(roster.is_op("robert", "#bots"));
        roster.user_left("ROBERT", "#bots");
        roster.user_quit("aLiCe");
        assert!(roster.ops_in("#bots").is_empty());
    }

    #[test]
    fn test_later_names_reply_demotes() {
        let mut roster = ChannelRoster::new();
        roster.apply_user_list("#bots", &names(&["@alice"]));
        roster.apply_user_list("#bots", &names(&["alice"]));
        assert!(!roster.is_op("alice", "#bots"));
    }

    #[test]
    fn test_membership_changes() {
        let mut roster = ChannelRoster::new();
        roster.apply_user_list("#a", &names(&["@alice", "@bob"]));
        roster.apply_user_list("#b", &names(&["@alice"]));

        roster.user_renamed("alice", "alyx");
        assert!(roster.is_op("alyx", "#a") && roster.is_op("alyx", "#b"));
        assert!(!roster.is_op("alice", "#a"));

        roster.user_left("alyx", "#a");
        assert!(!roster.is_op("alyx", "#a"));
        assert!(roster.is_op("alyx", "#b"));

        roster.user_quit("alyx");
        assert!(!roster.is_op("alyx", "#b"));

        roster.forget_channel("#a");
        assert!(!roster.is_op("bob", "#a"));
    }
}
