//! Callback Registry - generated keys back to live values.
//!
//! One registry serves the whole runtime. Every entry records the instance
//! that registered it and the render pass it was registered in, which is all
//! eviction needs:
//! - `evict_before(owner, pass)` drops an owner's entries from earlier passes
//! - `evict_owner(owner)` drops everything an owner registered
//!
//! Keys come from a monotonic counter and are never reused, so a stale key
//! resolves to nothing rather than to someone else's entry.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

use crate::types::{InstanceId, Value};

// =============================================================================
// Keys
// =============================================================================

/// Generated registry key, as written into rendered attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackKey(String);

impl CallbackKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallbackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallbackKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CallbackKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for CallbackKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Debug)]
struct Entry {
    value: Value,
    owner: InstanceId,
    pass: u64,
}

/// Application-scoped table of values referenced from markup.
#[derive(Debug)]
pub struct CallbackRegistry {
    entries: HashMap<CallbackKey, Entry>,
    prefix: String,
    next_key: u64,
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new("k")
    }
}

impl CallbackRegistry {
    /// Create an empty registry whose keys start with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            entries: HashMap::new(),
            prefix: prefix.into(),
            next_key: 0,
        }
    }

    /// Store `value` under a fresh key.
    pub fn register(&mut self, owner: InstanceId, pass: u64, value: Value) -> CallbackKey {
        let key = CallbackKey(format!("{}{}", self.prefix, base36(self.next_key)));
        self.next_key += 1;
        self.entries.insert(key.clone(), Entry { value, owner, pass });
        key
    }

    /// Look up a key.
    pub fn resolve(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Instance that registered `key`.
    pub fn owner(&self, key: &str) -> Option<InstanceId> {
        self.entries.get(key).map(|e| e.owner)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop `owner`'s entries registered before `pass`. Returns how many.
    pub fn evict_before(&mut self, owner: InstanceId, pass: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.owner != owner || e.pass >= pass);
        before - self.entries.len()
    }

    /// Drop every entry `owner` registered. Returns how many.
    pub fn evict_owner(&mut self, owner: InstanceId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.owner != owner);
        before - self.entries.len()
    }
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_unique() {
        let mut registry = CallbackRegistry::new("k");
        let a = registry.register(InstanceId(0), 1, Value::from(1));
        let b = registry.register(InstanceId(0), 1, Value::from(1));
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "k0");
        assert_eq!(registry.resolve(b.as_str()), Some(&Value::from(1)));
        assert_eq!(registry.resolve("nope"), None);
    }

    #[test]
    fn test_base36() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
    }

    #[test]
    fn test_eviction() {
        let mut registry = CallbackRegistry::new("k");
        let a = InstanceId(1);
        let b = InstanceId(2);
        let old = registry.register(a, 1, Value::from("old"));
        let new = registry.register(a, 2, Value::from("new"));
        let other = registry.register(b, 1, Value::from("other"));

        assert_eq!(registry.evict_before(a, 2), 1);
        assert!(registry.resolve(old.as_str()).is_none());
        assert!(registry.resolve(new.as_str()).is_some());
        assert!(registry.resolve(other.as_str()).is_some());

        assert_eq!(registry.evict_owner(a), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.owner(other.as_str()), Some(b));
    }
}
