//! The persisted enabled-set: extension names joined with commas.
//!
//! Names containing commas cannot be represented.

use std::collections::BTreeSet;
use std::io;

use super::SettingsStore;

/// Settings key holding the enabled-set.
pub const ENABLED_KEY: &str = "plugins/enabled";

pub fn parse_enabled(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Join in sorted order so equal sets always serialize identically.
pub fn join_enabled(names: &BTreeSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

pub fn read_enabled(store: &dyn SettingsStore) -> BTreeSet<String> {
    store
        .get(ENABLED_KEY)
        .map(|raw| parse_enabled(&raw))
        .unwrap_or_default()
}

pub fn write_enabled(store: &dyn SettingsStore, names: &BTreeSet<String>) -> io::Result<()> {
    store.set(ENABLED_KEY, &join_enabled(names))
}
