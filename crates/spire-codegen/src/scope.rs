//! Lexically scoped name lookup for code generation.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// A stack of hash maps.
///
/// Lookups search from the innermost scope outwards. Adding a key twice to
/// one scope replaces the earlier entry.
#[derive(Debug)]
pub struct ScopeDictionary<K, V> {
    scopes: Vec<HashMap<K, V>>,
}

impl<K, V> Default for ScopeDictionary<K, V> {
    fn default() -> Self {
        Self { scopes: Vec::new() }
    }
}

impl<K: Eq + Hash, V> ScopeDictionary<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.pop().is_none() {
            panic!("internal error: scope stack underflow");
        }
    }

    /// Adds `key` to the innermost scope.
    pub fn add(&mut self, key: K, value: V) {
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.insert(key, value);
            }
            None => panic!("internal error: no open scope"),
        }
    }

    pub fn try_get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.scopes.iter().rev().find_map(|scope| scope.get(key))
    }
}
