use std::{any::Any, fmt, sync::Arc};

use crate::{chunk::Chunk, expression::Expression, grammar::BlockDef};

/// Opaque handler compiled by a custom tag definition.
pub type TagHandler = Arc<dyn Any + Send + Sync>;

/// Deepest block nesting, and deepest expression, the parsers accept. Trees
/// are walked, cloned, and dropped recursively, so depth must stay bounded.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An ordered list of children; the document root.
    Sequence(Vec<Node>),
    /// Literal text, rendered verbatim.
    Text(Chunk),
    /// An output expression together with its parsed form.
    Object { chunk: Chunk, expr: Expression },
    Block(BlockNode),
    Raw(RawNode),
    /// A custom tag and the handler its definition compiled.
    Functional(FunctionalNode),
}

/// A block tag (`if`, `for`, ...) and everything up to its end tag.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    pub chunk: Chunk,
    pub syntax: Arc<BlockDef>,
    pub body: Vec<Node>,
    pub branches: Vec<BranchNode>,
}

impl BlockNode {
    pub fn new(chunk: Chunk, syntax: Arc<BlockDef>) -> Self {
        Self {
            chunk,
            syntax,
            body: Vec::new(),
            branches: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.chunk.name
    }

    /// The sequence new siblings are appended to while this block is open:
    /// the body of the latest branch, or the block's own body.
    pub(crate) fn append_target(&mut self) -> &mut Vec<Node> {
        match self.branches.last_mut() {
            Some(branch) => &mut branch.body,
            None => &mut self.body,
        }
    }
}

/// A clause such as `else` inside a block. Only ever owned by a [`BlockNode`].
#[derive(Debug, Clone, PartialEq)]
pub struct BranchNode {
    pub chunk: Chunk,
    pub syntax: Arc<BlockDef>,
    pub body: Vec<Node>,
}

impl BranchNode {
    pub fn name(&self) -> &str {
        &self.chunk.name
    }
}

/// Source slices between `raw` and `endraw`, never parsed further.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawNode {
    pub slices: Vec<String>,
}

impl RawNode {
    pub fn source(&self) -> String {
        self.slices.concat()
    }
}

#[derive(Clone)]
pub struct FunctionalNode {
    pub chunk: Chunk,
    pub handler: TagHandler,
}

impl fmt::Debug for FunctionalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionalNode")
            .field("chunk", &self.chunk)
            .finish_non_exhaustive()
    }
}

impl PartialEq for FunctionalNode {
    fn eq(&self, other: &Self) -> bool {
        self.chunk == other.chunk && Arc::ptr_eq(&self.handler, &other.handler)
    }
}

impl Node {
    /// Maximum number of nested blocks anywhere below this node.
    pub fn block_depth(&self) -> usize {
        fn seq_depth(nodes: &[Node]) -> usize {
            nodes.iter().map(Node::block_depth).max().unwrap_or(0)
        }

        match self {
            Node::Sequence(children) => seq_depth(children),
            Node::Block(block) => {
                let inner = block
                    .branches
                    .iter()
                    .map(|b| seq_depth(&b.body))
                    .fold(seq_depth(&block.body), usize::max);
                inner.saturating_add(1)
            }
            Node::Text(_) | Node::Object { .. } | Node::Raw(_) | Node::Functional(_) => 0,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Sequence(children) => children,
            Node::Block(block) => &block.body,
            Node::Text(_) | Node::Object { .. } | Node::Raw(_) | Node::Functional(_) => &[],
        }
    }
}
