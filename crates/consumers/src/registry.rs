//! Consumer type registry
//!
//! Maps declaration `type` names to factory functions. External adapter
//! crates register their types at startup; the built-ins are always present.

use std::collections::HashMap;
use std::sync::Arc;

use tstream_config::ConsumerSpec;

use crate::builtin::{NullConsumer, StdoutConsumer};
use crate::context::{Consumer, ConsumerError};

/// Factory signature: build a consumer from its expanded spec
pub type ConsumerFactory =
    Arc<dyn Fn(&ConsumerSpec) -> Result<Box<dyn Consumer>, ConsumerError> + Send + Sync>;

/// Registry of consumer types
#[derive(Clone)]
pub struct ConsumerRegistry {
    factories: HashMap<String, ConsumerFactory>,
}

impl ConsumerRegistry {
    /// Create a registry with the built-in types registered
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("default", |_spec| Ok(Box::new(StdoutConsumer::new())));
        registry.register("null", |_spec| Ok(Box::new(NullConsumer::new())));
        registry
    }

    /// Register a consumer type
    ///
    /// A later registration for the same name replaces the earlier one.
    pub fn register<F>(&mut self, type_name: &str, factory: F)
    where
        F: Fn(&ConsumerSpec) -> Result<Box<dyn Consumer>, ConsumerError> + Send + Sync + 'static,
    {
        self.factories
            .insert(type_name.to_string(), Arc::new(factory));
    }

    /// Build a consumer for a spec
    ///
    /// # Errors
    ///
    /// Fails when the type is unknown or the factory rejects the config.
    pub fn create(&self, spec: &ConsumerSpec) -> Result<Box<dyn Consumer>, ConsumerError> {
        let factory = self.factories.get(&spec.consumer_type).ok_or_else(|| {
            ConsumerError::init(format!(
                "unknown consumer type '{}', available: [{}]",
                spec.consumer_type,
                self.available_types().join(", ")
            ))
        })?;
        factory(spec)
    }

    /// Whether a type is registered
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered type names, sorted
    pub fn available_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl std::fmt::Debug for ConsumerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerRegistry")
            .field("types", &self.available_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn spec(consumer_type: &str) -> ConsumerSpec {
        ConsumerSpec {
            consumer_type: consumer_type.to_string(),
            config: Map::new(),
            actions: Vec::new(),
        }
    }

    #[test]
    fn test_builtins_present() {
        let registry = ConsumerRegistry::with_builtins();
        assert!(registry.contains("default"));
        assert!(registry.contains("null"));
        registry.create(&spec("default")).unwrap();
    }

    #[test]
    fn test_unknown_type_rejected() {
        let registry = ConsumerRegistry::with_builtins();
        let err = registry.create(&spec("Kafka")).unwrap_err();
        assert!(err.to_string().contains("Kafka"));
        assert!(err.to_string().contains("default"));
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = ConsumerRegistry::with_builtins();
        registry.register("custom", |_spec| Ok(Box::new(NullConsumer::new())));
        assert!(registry.contains("custom"));
        registry.create(&spec("custom")).unwrap();
    }
}
