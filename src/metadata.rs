//! In-memory node-id -> descriptor store.

use std::collections::HashMap;

use crate::codec::MetadataRecord;
use crate::NodeId;

/// Mapping from node id to its last-seen [`MetadataRecord`], upsert semantics.
#[derive(Debug, Default)]
pub struct MetadataStore {
    records: HashMap<NodeId, MetadataRecord>,
}

impl MetadataStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        MetadataStore {
            records: HashMap::new(),
        }
    }

    /// Replace any prior record for `record.node_id` with `record`.
    pub fn put(&mut self, record: MetadataRecord) {
        self.records.insert(record.node_id, record);
    }

    /// The last record stored for `node_id`, if any.
    pub fn get(&self, node_id: NodeId) -> Option<&MetadataRecord> {
        self.records.get(&node_id)
    }

    /// Enumerate all known records.
    pub fn iter(&self) -> impl Iterator<Item = &MetadataRecord> {
        self.records.values()
    }

    /// Number of distinct nodes with a stored record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(node_id: NodeId, name: &str) -> MetadataRecord {
        MetadataRecord {
            node_id,
            name: name.into(),
            contact: "ops@example.org".into(),
            lat_udeg: None,
            lon_udeg: None,
        }
    }

    #[test]
    fn get_on_empty_store_is_none() {
        let store = MetadataStore::new();
        assert!(store.get(1).is_none());
    }

    #[test]
    fn put_then_get_round_trips() {
        let mut store = MetadataStore::new();
        store.put(record(1, "Gateway"));
        assert_eq!(store.get(1).unwrap().name, "Gateway");
    }

    #[test]
    fn second_put_for_same_node_replaces_the_record() {
        let mut store = MetadataStore::new();
        store.put(record(1, "First"));
        store.put(record(1, "Second"));
        assert_eq!(store.get(1).unwrap().name, "Second");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn iter_enumerates_every_stored_node() {
        let mut store = MetadataStore::new();
        store.put(record(1, "A"));
        store.put(record(2, "B"));
        let mut names: Vec<_> = store.iter().map(|r| r.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
    }
}
