mod ast;
mod builtins;
mod chunk;
mod config;
mod context;
mod error;
mod expression;
mod filters;
mod grammar;
mod parser;
mod scanner;
mod value;

// Public exports.
pub use ast::{BlockNode, BranchNode, FunctionalNode, Node, RawNode, TagHandler};
pub use chunk::{Chunk, ChunkKind, SourceLoc};
pub use config::{Assign, Config};
pub use context::{Closure, Context, Thunk};
pub use error::{
    FilterFailure, InterpreterError, LiqueurError, LiqueurResult, ParseError, ParseErrorKind,
    RegistrationError,
};
pub use expression::{Expression, parse as parse_expression};
pub use filters::{
    CallError, DynFilter, Filter, FilterArg, FilterOutput, FilterRegistry, FromFilterArg,
    IntoFilter, ParamKind, Prebuilt, Signature,
};
pub use grammar::{BlockBuilder, BlockDef, BlockKind, Grammar, TagDefinition, TagGrammar};
pub use parser::parse_chunks;
pub use scanner::scan;
pub use value::{IntoValue, MapValue, OrderedMap, SIZE_KEY, Value};
