//! Instance state record.

use std::collections::HashMap;

use crate::types::Value;

/// Flat key/value state of one component instance.
///
/// Writes report whether they were *effective*: the key was new, or the
/// stored value was not shallowly equal to the written one. Mutating a list
/// in place is impossible through [`Value`], so replacing the top-level value
/// is the only way to change it.
#[derive(Debug, Default)]
pub struct State {
    values: HashMap<String, Value>,
    reactive: bool,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a key. Absent keys read as `Null`.
    pub fn get(&self, key: &str) -> Value {
        self.values.get(key).cloned().unwrap_or_default()
    }

    /// Borrow the stored value, if any.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether effective writes request a render.
    pub fn is_reactive(&self) -> bool {
        self.reactive
    }

    pub(crate) fn make_reactive(&mut self) {
        self.reactive = true;
    }

    /// Store `value` under `key` if that changes anything.
    pub fn write(&mut self, key: &str, value: Value) -> bool {
        match self.values.get(key) {
            Some(existing) if *existing == value => false,
            _ => {
                self.values.insert(key.to_string(), value);
                true
            }
        }
    }
}
