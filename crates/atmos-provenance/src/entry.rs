use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a value ended up at this path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvenanceKind {
    /// Set directly in the file that declares this component.
    Inline,
    /// Contributed by an imported document.
    Import,
    /// Overwrote a value already present at this path.
    Override,
    /// Produced by template or custom-function evaluation.
    Computed,
    /// Filled in by the compiler where no input specified a value.
    Default,
}

impl fmt::Display for ProvenanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProvenanceKind::Inline => "inline",
            ProvenanceKind::Import => "import",
            ProvenanceKind::Override => "override",
            ProvenanceKind::Computed => "computed",
            ProvenanceKind::Default => "default",
        };
        f.write_str(s)
    }
}

/// A source position within one stack manifest file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// One link in a path's provenance chain: where a value came from, what
/// kind of write it was, and how deep in the import chain it originated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub position: Position,
    pub kind: ProvenanceKind,
    pub depth: u32,
}

impl ProvenanceEntry {
    pub fn new(position: Position, kind: ProvenanceKind, depth: u32) -> Self {
        Self {
            position,
            kind,
            depth,
        }
    }

    /// The symbol the inline-comment renderer prefixes a leaf with:
    /// `∴` for a computed value regardless of depth, `●` for a value
    /// written at the parent stack (depth <= 1), `○` for one inherited
    /// from deeper in the import chain.
    fn symbol(&self) -> char {
        if self.kind == ProvenanceKind::Computed {
            '∴'
        } else if self.depth <= 1 {
            '●'
        } else {
            '○'
        }
    }

    /// Renders the `○|●|∴ [N] file:line` trailer the provenance comment
    /// format uses.
    pub fn render_marker(&self) -> String {
        format!("{} [{}] {}:{}", self.symbol(), self.depth, self.position.file, self.position.line)
    }
}

impl fmt::Display for ProvenanceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, depth={})",
            self.position, self.kind, self.depth
        )
    }
}
