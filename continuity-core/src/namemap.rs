//! Name-keyed map with normalized keys.
//!
//! Characters, themes, and locations are referenced by name throughout
//! extracted content, with inconsistent casing and stray whitespace.
//! `NameMap` normalizes keys (trim + lowercase) on every access so
//! "Mara", "mara" and " MARA " address the same entry. Serializes as a
//! plain object, so caller-persisted state round-trips through JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Normalize a name into its map key.
pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A map keyed by normalized entity name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct NameMap<T>(BTreeMap<String, T>);

impl<T> NameMap<T> {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&normalize(name))
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.0.get(&normalize(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.0.get_mut(&normalize(name))
    }

    pub fn insert(&mut self, name: &str, value: T) -> Option<T> {
        self.0.insert(normalize(name), value)
    }

    /// Get the entry for `name`, creating it with `default` if absent.
    pub fn get_or_insert_with(&mut self, name: &str, default: impl FnOnce() -> T) -> &mut T {
        self.0.entry(normalize(name)).or_insert_with(default)
    }

    /// Iterate entries in normalized-key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.0.values_mut()
    }
}

impl<T> Default for NameMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalization() {
        let mut map = NameMap::new();
        map.insert("Mara", 1);

        assert!(map.contains("mara"));
        assert!(map.contains(" MARA "));
        assert_eq!(map.get("MaRa"), Some(&1));
    }

    #[test]
    fn test_get_or_insert_with() {
        let mut map: NameMap<Vec<u32>> = NameMap::new();
        map.get_or_insert_with("Brother Edan", Vec::new).push(3);
        map.get_or_insert_with("brother edan", Vec::new).push(5);

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("Brother Edan"), Some(&vec![3, 5]));
    }

    #[test]
    fn test_serde_round_trip() {
        let mut map = NameMap::new();
        map.insert("Mara", 7u32);
        map.insert("Edan", 2u32);

        let json = serde_json::to_string(&map).unwrap();
        let restored: NameMap<u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(map, restored);
    }
}
