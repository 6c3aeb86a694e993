use std::{collections::HashMap, fmt, sync::Arc};

use crate::{ast::TagHandler, error::ParseError};

/// Compiles a custom tag's argument text into an opaque handler.
pub type TagDefinition = Arc<dyn Fn(&str) -> Result<TagHandler, ParseError> + Send + Sync>;

/// Tag name that switches the builder into comment mode.
pub const COMMENT_TAG: &str = "comment";
pub const END_COMMENT_TAG: &str = "endcomment";
/// Tag name that switches the builder into raw mode.
pub const RAW_TAG: &str = "raw";
pub const END_RAW_TAG: &str = "endraw";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Start,
    Branch,
    End,
}

/// Describes how one block-related tag name nests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDef {
    name: String,
    kind: BlockKind,
    /// Block-start tags this tag may appear directly inside.
    parents: Vec<String>,
}

impl BlockDef {
    pub fn new<N: Into<String>>(name: N, kind: BlockKind, parents: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            parents,
        }
    }

    pub fn start<N: Into<String>>(name: N) -> Self {
        Self::new(name, BlockKind::Start, Vec::new())
    }

    pub fn branch<N: Into<String>, P: Into<String>>(name: N, parent: P) -> Self {
        Self::new(name, BlockKind::Branch, vec![parent.into()])
    }

    pub fn end<N: Into<String>, P: Into<String>>(name: N, parent: P) -> Self {
        Self::new(name, BlockKind::End, vec![parent.into()])
    }

    pub fn tag_name(&self) -> &str {
        &self.name
    }

    pub const fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn is_block_start(&self) -> bool {
        self.kind == BlockKind::Start
    }

    pub fn is_branch(&self) -> bool {
        self.kind == BlockKind::Branch
    }

    pub fn is_block_end(&self) -> bool {
        self.kind == BlockKind::End
    }

    pub fn requires_parent(&self) -> bool {
        !self.parents.is_empty()
    }

    pub fn can_have_parent(&self, parent: &BlockDef) -> bool {
        parent.is_block_start() && self.parents.iter().any(|p| *p == parent.name)
    }

    pub fn parent_tag_names(&self) -> &[String] {
        &self.parents
    }
}

/// The tag tables the AST builder resolves tag chunks against.
pub trait Grammar {
    fn block_syntax(&self, name: &str) -> Option<Arc<BlockDef>>;

    fn tag_definition(&self, name: &str) -> Option<&TagDefinition>;
}

/// A mutable table of block definitions and custom tags.
#[derive(Default, Clone)]
pub struct TagGrammar {
    blocks: HashMap<String, Arc<BlockDef>>,
    tags: HashMap<String, TagDefinition>,
}

impl fmt::Debug for TagGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.tags.keys().collect();
        tags.sort();
        f.debug_struct("TagGrammar")
            .field("blocks", &self.blocks)
            .field("tags", &tags)
            .finish()
    }
}

impl TagGrammar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a block-start tag `name` together with its `end<name>` tag.
    /// Branches are added through the returned builder.
    pub fn add_block<N: AsRef<str>>(&mut self, name: N) -> BlockBuilder<'_> {
        let name = name.as_ref();
        self.insert(BlockDef::start(name));
        self.insert(BlockDef::end(format!("end{name}"), name));
        BlockBuilder {
            grammar: self,
            parent: name.to_string(),
        }
    }

    pub fn add_tag<N, F>(&mut self, name: N, definition: F) -> &mut Self
    where
        N: Into<String>,
        F: Fn(&str) -> Result<TagHandler, ParseError> + Send + Sync + 'static,
    {
        self.tags.insert(name.into(), Arc::new(definition));
        self
    }

    fn insert(&mut self, def: BlockDef) {
        self.blocks.insert(def.name.clone(), Arc::new(def));
    }

    /// Adds `parent` to the parents of an existing branch, or registers the
    /// branch if this is its first parent.
    fn insert_branch(&mut self, name: &str, parent: &str) {
        if let Some(existing) = self.blocks.get_mut(name).filter(|def| def.is_branch()) {
            let def = Arc::make_mut(existing);
            if !def.parents.iter().any(|p| p == parent) {
                def.parents.push(parent.to_string());
            }
            return;
        }
        self.insert(BlockDef::branch(name, parent));
    }
}

impl Grammar for TagGrammar {
    fn block_syntax(&self, name: &str) -> Option<Arc<BlockDef>> {
        self.blocks.get(name).cloned()
    }

    fn tag_definition(&self, name: &str) -> Option<&TagDefinition> {
        self.tags.get(name)
    }
}

/// Returned by [`TagGrammar::add_block`] to attach branch tags.
pub struct BlockBuilder<'g> {
    grammar: &'g mut TagGrammar,
    parent: String,
}

impl BlockBuilder<'_> {
    /// Allows `name` to appear directly inside this block, e.g. `else`.
    pub fn branch<N: AsRef<str>>(self, name: N) -> Self {
        self.grammar.insert_branch(name.as_ref(), &self.parent);
        self
    }
}
