//! Mapping table
//!
//! Compiled once per applied declaration from the resolver's mappings and
//! swapped atomically into the pipeline. The hot path gets a cheap `Arc`
//! snapshot; no data-plane task ever holds a write reference.

use std::collections::HashMap;

use tstream_config::Mappings;
use tstream_protocol::SourceId;

/// Pre-compiled producer → consumers table
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    routes: HashMap<SourceId, Vec<String>>,
}

impl MappingTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile from resolver output
    pub fn from_mappings(mappings: &Mappings) -> Self {
        let mut routes = HashMap::with_capacity(mappings.len());
        for (producer, consumers) in mappings {
            routes.insert(SourceId::new(producer.clone()), consumers.clone());
        }
        Self { routes }
    }

    /// Consumers for a producer; empty when unmapped
    pub fn route(&self, source: &SourceId) -> &[String] {
        self.routes.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether a producer has any consumers
    pub fn has_route(&self, source: &SourceId) -> bool {
        self.routes.contains_key(source)
    }

    /// Number of producers with routes
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MappingTable {
        let mut mappings = Mappings::new();
        mappings.insert(
            "ns::listener".into(),
            vec!["ns::consumer_a".into(), "ns::consumer_b".into()],
        );
        MappingTable::from_mappings(&mappings)
    }

    #[test]
    fn test_route_lookup() {
        let table = table();
        let targets = table.route(&SourceId::new("ns::listener"));
        assert_eq!(targets, &["ns::consumer_a", "ns::consumer_b"]);
    }

    #[test]
    fn test_unmapped_source_is_empty() {
        let table = table();
        assert!(table.route(&SourceId::new("ns::other")).is_empty());
        assert!(!table.has_route(&SourceId::new("ns::other")));
    }

    #[test]
    fn test_counts() {
        assert_eq!(table().route_count(), 1);
        assert!(MappingTable::new().is_empty());
    }
}
