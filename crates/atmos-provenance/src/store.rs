use std::collections::BTreeMap;

use crate::entry::ProvenanceEntry;
use crate::key::ProvenanceKey;

/// Per-path provenance chains for one compiled run. Written during merge,
/// read during render; never embeds or is embedded in the data tree it
/// describes.
#[derive(Debug, Clone, Default)]
pub struct ProvenanceStore {
    chains: BTreeMap<ProvenanceKey, Vec<ProvenanceEntry>>,
}

impl ProvenanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one write to the chain for `key`. Chains grow in write order:
    /// deepest import first, most recent override last, matching how the
    /// merge engine applies writes in topological order.
    pub fn record(&mut self, key: ProvenanceKey, entry: ProvenanceEntry) {
        self.chains.entry(key).or_default().push(entry);
    }

    pub fn chain(&self, key: &ProvenanceKey) -> Option<&[ProvenanceEntry]> {
        self.chains.get(key).map(Vec::as_slice)
    }

    /// The entry that ultimately determined the compiled value: the last
    /// link in the chain.
    pub fn latest(&self, key: &ProvenanceKey) -> Option<&ProvenanceEntry> {
        self.chains.get(key).and_then(|chain| chain.last())
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ProvenanceKey> {
        self.chains.keys()
    }

    /// Absorb another store's chains. Used to combine per-stack-worker
    /// provenance builders into the global store under a single lock
    /// ("no shared mutable state between workers").
    pub fn merge(&mut self, other: ProvenanceStore) {
        for (key, chain) in other.chains {
            self.chains.entry(key).or_default().extend(chain);
        }
    }
}
