//! Register-once, lookup-or-fail name tables.

use crate::error::Error;
use indexmap::IndexMap;

/// A permanent name → value table for one kind of definition.
///
/// Names are kept in registration order. There is no way to replace or
/// remove an entry once registered.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    kind: &'static str,
    entries: IndexMap<String, T>,
}

impl<T> Registry<T> {
    /// An empty registry. `kind` names the entries in error messages.
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: IndexMap::new(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }

    /// # Errors
    ///
    /// Returns a definition error for an empty name and a `DuplicateName`
    /// error when `name` is already registered.
    pub fn register(&mut self, name: impl Into<String>, value: T) -> Result<&mut Self, Error> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::invalid_definition(format!("Invalid {} name.", self.kind)));
        }
        if self.entries.contains_key(&name) {
            return Err(Error::duplicate_name(self.kind, &name));
        }
        self.entries.insert(name, value);
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns an `UnknownName` error when `name` was never registered.
    pub fn lookup(&self, name: &str) -> Result<&T, Error> {
        self.entries
            .get(name)
            .ok_or_else(|| Error::unknown_name(self.kind, name))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_register_then_lookup() {
        let mut registry = Registry::new("model");
        registry.register("user", 1).unwrap().register("post", 2).unwrap();
        assert_eq!(*registry.lookup("user").unwrap(), 1);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["user", "post"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_registration_fails_and_keeps_first() {
        let mut registry = Registry::new("service");
        registry.register("users", "first").unwrap();
        let err = registry.register("users", "second").unwrap_err();
        assert!(err.is_kind(ErrorKind::DuplicateName));
        assert_eq!(err.to_string(), "DuplicateName: Service \"users\" is already registered.");
        assert_eq!(*registry.lookup("users").unwrap(), "first");
    }

    #[test]
    fn test_unknown_lookup_fails() {
        let registry: Registry<()> = Registry::new("middleware");
        let err = registry.lookup("auth").unwrap_err();
        assert!(err.is_kind(ErrorKind::UnknownName));
        assert!(err.to_string().contains("Unknown middleware \"auth\"."));
    }

    #[test]
    fn test_blank_names_are_rejected() {
        let mut registry = Registry::new("model");
        let err = registry.register("  ", ()).unwrap_err();
        assert!(err.is_kind(ErrorKind::Definition));
        assert!(registry.is_empty());
    }
}
