use std::fmt;

/// Identifies one leaf in a compiled stack: the `(stack, type, name)`
/// component triple plus the JSONPath into its merged configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProvenanceKey {
    pub stack: String,
    pub component_type: String,
    pub name: String,
    pub json_path: String,
}

impl ProvenanceKey {
    pub fn new(
        stack: impl Into<String>,
        component_type: impl Into<String>,
        name: impl Into<String>,
        json_path: impl Into<String>,
    ) -> Self {
        Self {
            stack: stack.into(),
            component_type: component_type.into(),
            name: name.into(),
            json_path: json_path.into(),
        }
    }

    /// The `(stack, type, name)` prefix, without the path component.
    pub fn component_prefix(&self) -> (&str, &str, &str) {
        (&self.stack, &self.component_type, &self.name)
    }
}

impl fmt::Display for ProvenanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}#{}",
            self.stack, self.component_type, self.name, self.json_path
        )
    }
}
