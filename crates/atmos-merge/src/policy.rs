use std::collections::BTreeMap;

/// How to combine two lists at the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListPolicy {
    /// The incoming list replaces the existing one entirely. Default.
    Replace,
    /// The incoming list's items are appended after the existing ones.
    Append,
    /// Lists of maps are merged element-wise, matching entries whose
    /// `key_field` value is equal; non-matching incoming entries are
    /// appended.
    MergeByKey { key_field: String },
}

/// Per-JSONPath list-merge policy overrides, falling back to
/// [`ListPolicy::Replace`].
#[derive(Debug, Clone, Default)]
pub struct ListPolicies {
    per_path: BTreeMap<String, ListPolicy>,
}

impl ListPolicies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: impl Into<String>, policy: ListPolicy) -> &mut Self {
        self.per_path.insert(path.into(), policy);
        self
    }

    pub fn for_path(&self, path: &str) -> ListPolicy {
        self.per_path.get(path).cloned().unwrap_or(ListPolicy::Replace)
    }
}
