use std::sync::Arc;

use crate::{
    ast::{Node, TagHandler},
    builtins,
    context::Context,
    error::{ParseError, ParseErrorKind, RegistrationError},
    expression::{self, Expression},
    filters::{FilterRegistry, IntoFilter},
    grammar::{BlockBuilder, COMMENT_TAG, RAW_TAG, TagGrammar},
    parser::parse_chunks,
    scanner::scan,
};

/// Tag grammar and filters for one template dialect.
///
/// A `Config` is built once, then shared: parsing borrows the grammar and
/// every [`Context`] it hands out shares the same filter registry.
///
/// # Examples
///
/// ```
/// use liqueur::{Config, Node};
///
/// let config = Config::standard().unwrap();
/// let root = config.parse("{% if user %}Hi {{ user | upcase }}{% endif %}").unwrap();
///
/// let Node::Sequence(children) = &root else { unreachable!() };
/// let Node::Block(block) = &children[0] else { unreachable!() };
/// assert_eq!(block.name(), "if");
///
/// let mut context = config.context();
/// context.insert("user", "ada");
/// let Node::Object { expr, .. } = &block.body[1] else { unreachable!() };
/// assert_eq!(expr.evaluate(&context).unwrap().to_string(), "ADA");
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    grammar: TagGrammar,
    filters: Arc<FilterRegistry>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// A configuration that knows only the reserved `comment` and `raw`
    /// blocks and has no filters.
    pub fn new() -> Self {
        let mut grammar = TagGrammar::new();
        grammar.add_block(COMMENT_TAG);
        grammar.add_block(RAW_TAG);
        Self {
            grammar,
            filters: Arc::default(),
        }
    }

    /// The usual control-flow blocks, the `assign` tag, and a small set of
    /// standard filters.
    pub fn standard() -> Result<Self, RegistrationError> {
        let mut config = Self::new();
        config.add_block("if").branch("elsif").branch("else");
        config.add_block("unless").branch("else");
        config.add_block("for").branch("else");
        config.add_block("case").branch("when").branch("else");
        config.add_block("capture");
        config.add_tag("assign", Assign::compile);
        builtins::register(Arc::make_mut(&mut config.filters))?;
        Ok(config)
    }

    pub fn add_block<N: AsRef<str>>(&mut self, name: N) -> BlockBuilder<'_> {
        self.grammar.add_block(name)
    }

    pub fn add_tag<N, F>(&mut self, name: N, definition: F) -> &mut Self
    where
        N: Into<String>,
        F: Fn(&str) -> Result<TagHandler, ParseError> + Send + Sync + 'static,
    {
        self.grammar.add_tag(name, definition);
        self
    }

    /// Registers a filter. See [`FilterRegistry::add_filter`].
    pub fn add_filter<N, F, Args>(&mut self, name: N, filter: F) -> Result<&mut Self, RegistrationError>
    where
        N: Into<String>,
        F: IntoFilter<Args>,
    {
        Arc::make_mut(&mut self.filters).add_filter(name, filter)?;
        Ok(self)
    }

    pub fn grammar(&self) -> &TagGrammar {
        &self.grammar
    }

    pub fn filters(&self) -> &Arc<FilterRegistry> {
        &self.filters
    }

    /// Scans `source` and builds its tree.
    pub fn parse(&self, source: &str) -> Result<Node, ParseError> {
        let chunks = scan(source)?;
        parse_chunks(&chunks, &self.grammar)
    }

    /// An empty context sharing this configuration's filters.
    pub fn context(&self) -> Context {
        Context::new(Arc::clone(&self.filters))
    }
}

/// Compiled form of `{% assign name = expression %}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub variable: String,
    pub value: Expression,
}

impl Assign {
    fn compile(args: &str) -> Result<TagHandler, ParseError> {
        let malformed = || {
            ParseError::new(
                Default::default(),
                ParseErrorKind::Message(format!("syntax error in assign tag: {args}")),
            )
        };
        let (variable, value) = args.split_once('=').ok_or_else(malformed)?;
        let variable = variable.trim();
        if variable.is_empty() || variable.contains(char::is_whitespace) {
            return Err(malformed());
        }
        Ok(Arc::new(Assign {
            variable: variable.to_string(),
            value: expression::parse(value)?,
        }))
    }
}
