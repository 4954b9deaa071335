//! Read-only access to environment variables.
//!
//! Detection and configuration never call `std::env` directly; they go
//! through [`EnvReader`] so that tests can hand in an [`EnvSnapshot`]
//! instead of mutating process state.

use std::collections::HashMap;

/// Key/value view over a set of environment variables.
pub trait EnvReader {
    /// Raw lookup. Returns `None` when the variable is unset.
    fn var(&self, key: &str) -> Option<String>;

    /// Lookup that treats an empty value exactly like an unset one.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|value| !value.is_empty())
    }

    /// First non-empty value among `keys`, in order.
    fn first_non_empty(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.non_empty(key))
    }

    /// Whether `key` is set to exactly `expected` (case-sensitive).
    fn equals(&self, key: &str, expected: &str) -> bool {
        self.var(key).as_deref() == Some(expected)
    }
}

impl<T: EnvReader + ?Sized> EnvReader for &T {
    fn var(&self, key: &str) -> Option<String> {
        (**self).var(key)
    }
}

/// The live process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvReader for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed, in-memory set of variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the current process environment.
    pub fn capture() -> Self {
        std::env::vars().collect()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace a variable.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Remove a variable.
    pub fn unset(&mut self, key: &str) {
        self.vars.remove(key);
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl EnvReader for EnvSnapshot {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
