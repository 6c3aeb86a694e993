use crate::{
    ast::{BlockNode, BranchNode, FunctionalNode, MAX_DEPTH, Node, RawNode},
    chunk::{Chunk, ChunkKind},
    error::{ParseError, ParseErrorKind},
    expression,
    grammar::{BlockDef, COMMENT_TAG, END_COMMENT_TAG, END_RAW_TAG, Grammar, RAW_TAG},
};

type ParseResult<T> = Result<T, ParseError>;

enum Mode {
    Normal,
    /// Skipping everything up to the next `endcomment`.
    InComment,
    /// Collecting source slices up to the next `endraw`.
    InRaw(RawNode),
}

/// Builder state for one call to [`parse_chunks`].
///
/// `open` holds the blocks that have started but not ended, innermost last.
/// The append target is always the innermost open block's current body, or
/// `root` when no block is open, so there is exactly one at any time.
struct Builder<'g, G: ?Sized> {
    grammar: &'g G,
    root: Vec<Node>,
    open: Vec<BlockNode>,
    mode: Mode,
}

impl<'g, G: Grammar + ?Sized> Builder<'g, G> {
    fn new(grammar: &'g G) -> Self {
        Builder {
            grammar,
            root: Vec::new(),
            open: Vec::new(),
            mode: Mode::Normal,
        }
    }

    fn target(&mut self) -> &mut Vec<Node> {
        match self.open.last_mut() {
            Some(block) => block.append_target(),
            None => &mut self.root,
        }
    }

    fn innermost_syntax(&self) -> Option<&BlockDef> {
        self.open.last().map(|block| block.syntax.as_ref())
    }

    fn observe(&mut self, chunk: &Chunk) -> ParseResult<()> {
        match &mut self.mode {
            Mode::InComment => {
                if chunk.is_tag_named(END_COMMENT_TAG) {
                    tracing::trace!(loc = %chunk.loc, "leaving comment");
                    self.mode = Mode::Normal;
                }
                Ok(())
            }
            Mode::InRaw(raw) => {
                if chunk.is_tag_named(END_RAW_TAG) {
                    tracing::trace!(loc = %chunk.loc, slices = raw.slices.len(), "leaving raw");
                    let raw = std::mem::take(raw);
                    self.mode = Mode::Normal;
                    self.target().push(Node::Raw(raw));
                } else {
                    raw.slices.push(chunk.source.clone());
                }
                Ok(())
            }
            Mode::Normal => match chunk.kind {
                ChunkKind::Text => {
                    self.target().push(Node::Text(chunk.clone()));
                    Ok(())
                }
                ChunkKind::Object => {
                    let expr = expression::parse_at(&chunk.args, chunk.loc)?;
                    self.target().push(Node::Object {
                        chunk: chunk.clone(),
                        expr,
                    });
                    Ok(())
                }
                ChunkKind::Tag => self.observe_tag(chunk),
            },
        }
    }

    fn observe_tag(&mut self, chunk: &Chunk) -> ParseResult<()> {
        let Some(syntax) = self.grammar.block_syntax(&chunk.name) else {
            return self.observe_custom_tag(chunk);
        };

        if chunk.name == COMMENT_TAG {
            tracing::trace!(loc = %chunk.loc, "entering comment");
            self.mode = Mode::InComment;
            return Ok(());
        }
        if chunk.name == RAW_TAG {
            tracing::trace!(loc = %chunk.loc, "entering raw");
            self.mode = Mode::InRaw(RawNode::default());
            return Ok(());
        }

        let parent = self.innermost_syntax();
        if syntax.requires_parent() && !parent.is_some_and(|p| syntax.can_have_parent(p)) {
            return Err(missing_parent(chunk, &syntax, parent));
        }

        if syntax.is_block_start() {
            if self.open.len() >= MAX_DEPTH {
                return Err(ParseError::new(
                    chunk.loc,
                    ParseErrorKind::TooDeep { limit: MAX_DEPTH },
                ));
            }
            self.open.push(BlockNode::new(chunk.clone(), syntax));
            tracing::trace!(tag = %chunk.name, depth = self.open.len(), "push block");
        } else if syntax.is_branch() {
            let Some(block) = self.open.last_mut() else {
                return Err(missing_parent(chunk, &syntax, None));
            };
            block.branches.push(BranchNode {
                chunk: chunk.clone(),
                syntax,
                body: Vec::new(),
            });
        } else {
            let Some(block) = self.open.pop() else {
                return Err(missing_parent(chunk, &syntax, None));
            };
            tracing::trace!(tag = %block.name(), depth = self.open.len(), "pop block");
            self.target().push(Node::Block(block));
        }
        Ok(())
    }

    fn observe_custom_tag(&mut self, chunk: &Chunk) -> ParseResult<()> {
        let Some(definition) = self.grammar.tag_definition(&chunk.name) else {
            return Err(ParseError::new(
                chunk.loc,
                ParseErrorKind::UnknownTag {
                    name: chunk.name.clone(),
                },
            ));
        };
        // Definitions only see the argument text, so errors are placed here.
        let handler =
            definition(&chunk.args).map_err(|err| ParseError::new(chunk.loc, err.kind))?;
        self.target().push(Node::Functional(FunctionalNode {
            chunk: chunk.clone(),
            handler,
        }));
        Ok(())
    }

    fn finish(mut self) -> ParseResult<Node> {
        if let Some(block) = self.open.last() {
            return Err(ParseError::new(
                block.chunk.loc,
                ParseErrorKind::UnterminatedTag {
                    name: block.name().to_string(),
                },
            ));
        }
        // An unclosed raw region keeps whatever it collected.
        if let Mode::InRaw(raw) = std::mem::replace(&mut self.mode, Mode::Normal) {
            self.root.push(Node::Raw(raw));
        }
        Ok(Node::Sequence(self.root))
    }
}

fn missing_parent(chunk: &Chunk, syntax: &BlockDef, parent: Option<&BlockDef>) -> ParseError {
    ParseError::new(
        chunk.loc,
        ParseErrorKind::MissingParent {
            name: chunk.name.clone(),
            expected: syntax.parent_tag_names().to_vec(),
            found: parent.map(|p| p.tag_name().to_string()),
        },
    )
}

/// Builds the document tree for a chunk stream.
///
/// # Errors
/// Returns the first [`ParseError`] encountered: an unknown or unterminated
/// tag, a branch or end tag outside its block, a malformed object
/// expression, or a failure from a custom tag definition. No partial tree is
/// returned.
#[tracing::instrument(level = "debug", skip_all, fields(chunks = chunks.len()))]
pub fn parse_chunks<G: Grammar + ?Sized>(chunks: &[Chunk], grammar: &G) -> Result<Node, ParseError> {
    let mut builder = Builder::new(grammar);
    for chunk in chunks {
        builder.observe(chunk)?;
    }
    builder.finish()
}
