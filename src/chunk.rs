use std::fmt;

/// Position of a chunk in its template source. The default, line 0, marks
/// an error raised before its position was known.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SourceLoc {
    /// 1-indexed line number
    pub line: usize,
    /// 1-indexed column, counted in bytes
    pub column: usize,
}

impl SourceLoc {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.line)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    /// Literal template text.
    Text,
    /// An output expression, `{{ ... }}`.
    Object,
    /// A tag, `{% name args %}`.
    Tag,
}

/// A lexical unit produced by the scanner. Chunks are immutable once
/// produced; the AST nodes own clones of them.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chunk {
    pub kind: ChunkKind,
    /// Tag name; empty for text and object chunks.
    pub name: String,
    /// Expression text for objects, argument text for tags.
    pub args: String,
    /// The exact source slice this chunk was scanned from.
    pub source: String,
    pub loc: SourceLoc,
}

impl Chunk {
    pub fn text<S: Into<String>>(source: S, loc: SourceLoc) -> Self {
        Self {
            kind: ChunkKind::Text,
            name: String::new(),
            args: String::new(),
            source: source.into(),
            loc,
        }
    }

    pub fn object<A: Into<String>, S: Into<String>>(args: A, source: S, loc: SourceLoc) -> Self {
        Self {
            kind: ChunkKind::Object,
            name: String::new(),
            args: args.into(),
            source: source.into(),
            loc,
        }
    }

    pub fn tag<N, A, S>(name: N, args: A, source: S, loc: SourceLoc) -> Self
    where
        N: Into<String>,
        A: Into<String>,
        S: Into<String>,
    {
        Self {
            kind: ChunkKind::Tag,
            name: name.into(),
            args: args.into(),
            source: source.into(),
            loc,
        }
    }

    pub fn is_tag_named(&self, name: &str) -> bool {
        self.kind == ChunkKind::Tag && self.name == name
    }
}
