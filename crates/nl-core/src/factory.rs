//! Process-wide object factories.
//!
//! Each polymorphic family (solvers, line-searches, tuners, splitters,
//! losses, weak learners) registers its implementations in a [`Factory`]
//! keyed by a stable string id. The process-wide instances are initialized
//! exactly once behind a `OnceLock` by the owning crate and are read-only
//! afterwards.

use crate::errors::{Error, Result};

type Maker<T> = Box<dyn Fn() -> Box<T> + Send + Sync>;

struct Entry<T: ?Sized> {
    id: String,
    description: String,
    maker: Maker<T>,
}

/// An ordered registry mapping string ids to object makers.
pub struct Factory<T: ?Sized> {
    entries: Vec<Entry<T>>,
}

impl<T: ?Sized> Default for Factory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Factory<T> {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Register a maker under the given id.
    ///
    /// Duplicate ids are a programming error and panic.
    pub fn add<F>(&mut self, id: &str, description: &str, maker: F)
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        assert!(
            !self.entries.iter().any(|e| e.id == id),
            "duplicate factory id '{id}'"
        );
        self.entries.push(Entry {
            id: id.to_string(),
            description: description.to_string(),
            maker: Box::new(maker),
        });
    }

    /// Construct a fresh object for the given id.
    pub fn get(&self, id: &str) -> Result<Box<T>> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| (e.maker)())
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "unknown id '{id}' (available: {:?})",
                    self.ids()
                ))
            })
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.id.as_str()).collect()
    }

    /// Description attached to the given id.
    pub fn description(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.description.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter {
        fn greet(&self) -> &'static str;
    }

    struct Hello;
    impl Greeter for Hello {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    #[test]
    fn register_and_make() {
        let mut factory: Factory<dyn Greeter> = Factory::new();
        factory.add("hello", "the only greeter", || Box::new(Hello));

        assert_eq!(factory.ids(), vec!["hello"]);
        assert_eq!(factory.description("hello"), Some("the only greeter"));
        assert_eq!(factory.get("hello").unwrap().greet(), "hello");
        assert!(factory.get("nope").is_err());
    }

    #[test]
    #[should_panic(expected = "duplicate factory id")]
    fn duplicate_id_panics() {
        let mut factory: Factory<dyn Greeter> = Factory::new();
        factory.add("hello", "", || Box::new(Hello));
        factory.add("hello", "", || Box::new(Hello));
    }
}
