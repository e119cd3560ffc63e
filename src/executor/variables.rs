use std::collections::HashMap;
use tracing::debug;

use crate::utils::interpolation::{interpolate_vars, referenced_names};

/// Execution-scoped variables for `${name}` substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableStore {
    vars: HashMap<String, String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert every pair, overwriting existing names.
    pub fn seed<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in pairs {
            self.vars.insert(k.into(), v.into());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }

    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// Single-pass expansion of `${name}` tokens. Unknown names are kept verbatim.
    pub fn substitute(&self, text: &str) -> String {
        if !text.contains("${") {
            return text.to_string();
        }
        for name in referenced_names(text) {
            if !self.vars.contains_key(name) {
                debug!(target: "atlas::runtime", %name, "Unresolved variable left as-is");
            }
        }
        interpolate_vars(text, &self.vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_overrides_and_substitutes() {
        let mut store = VariableStore::new();
        store.seed([("user", "alice"), ("host", "local")]);
        store.seed([("user", "bob")]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.substitute("${user}@${host}"), "bob@local");
        assert_eq!(store.substitute("${missing}!"), "${missing}!");
    }

    #[test]
    fn substitution_is_not_recursive() {
        let mut store = VariableStore::new();
        store.set("x", "${y}");
        store.set("y", "boom");
        assert_eq!(store.substitute("value=${x}"), "value=${y}");
    }
}
