//! Plugin registry (`SPEC_FULL.md` §4.15): one registry per plugin kind
//! (operators, sources, sinks, aggregations, placement strategies). A
//! registry maps `name -> factory(config) -> instance`; lookups are
//! case-insensitive. An optional unreflector map alongside it enables
//! reconstructing a plugin instance from a serialized form by name alone.

use dashmap::DashMap;
use std::sync::Arc;

fn canonical(name: &str) -> String {
    name.to_ascii_lowercase()
}

type Factory<C, T> = Arc<dyn Fn(C) -> crate::error::Result<T> + Send + Sync>;
type Unreflector<T> = Arc<dyn Fn(&[u8]) -> crate::error::Result<T> + Send + Sync>;

/// A name-keyed factory registry for one plugin kind.
pub struct Registry<C, T> {
    factories: DashMap<String, Factory<C, T>>,
    unreflectors: DashMap<String, Unreflector<T>>,
}

impl<C, T> Default for Registry<C, T> {
    fn default() -> Self {
        Self { factories: DashMap::new(), unreflectors: DashMap::new() }
    }
}

impl<C, T> Registry<C, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`; a later registration under the
    /// same (case-insensitive) name replaces the earlier one, matching
    /// generated-registrar semantics where registration order is
    /// startup-deterministic.
    pub fn register(&self, name: impl AsRef<str>, factory: impl Fn(C) -> crate::error::Result<T> + Send + Sync + 'static) {
        self.factories.insert(canonical(name.as_ref()), Arc::new(factory));
    }

    pub fn register_unreflector(&self, name: impl AsRef<str>, unreflector: impl Fn(&[u8]) -> crate::error::Result<T> + Send + Sync + 'static) {
        self.unreflectors.insert(canonical(name.as_ref()), Arc::new(unreflector));
    }

    pub fn create(&self, name: impl AsRef<str>, config: C) -> crate::error::Result<T> {
        let key = canonical(name.as_ref());
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| crate::error::NebulaError::NotFound(format!("no plugin registered under name '{}'", name.as_ref())))?;
        factory(config)
    }

    pub fn reconstruct(&self, name: impl AsRef<str>, bytes: &[u8]) -> crate::error::Result<T> {
        let key = canonical(name.as_ref());
        let unreflector = self
            .unreflectors
            .get(&key)
            .ok_or_else(|| crate::error::NebulaError::NotFound(format!("no unreflector registered under name '{}'", name.as_ref())))?;
        unreflector(bytes)
    }

    pub fn is_registered(&self, name: impl AsRef<str>) -> bool {
        self.factories.contains_key(&canonical(name.as_ref()))
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let registry: Registry<(), i32> = Registry::new();
        registry.register("HashJoin", |_cfg| Ok(42));
        assert!(registry.is_registered("hashjoin"));
        assert_eq!(registry.create("HASHJOIN", ()).unwrap(), 42);
    }

    #[test]
    fn unknown_name_fails_not_found() {
        let registry: Registry<(), i32> = Registry::new();
        assert!(registry.create("missing", ()).is_err());
    }

    #[test]
    fn unreflector_reconstructs_without_compile_time_type_knowledge() {
        let registry: Registry<(), String> = Registry::new();
        registry.register_unreflector("echo", |bytes| Ok(String::from_utf8_lossy(bytes).into_owned()));
        let value = registry.reconstruct("echo", b"hello").unwrap();
        assert_eq!(value, "hello");
    }
}
