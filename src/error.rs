use crate::chunk::SourceLoc;

pub type LiqueurResult<T> = std::result::Result<T, LiqueurError>;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("unknown tag: {name}")]
    UnknownTag { name: String },
    #[error("unterminated {name} tag")]
    UnterminatedTag { name: String },
    /// A branch or end tag appeared outside the block it belongs to.
    #[error("{name} not inside {}{}", .expected.join(" or "), parent_suffix(.found))]
    MissingParent {
        name: String,
        expected: Vec<String>,
        found: Option<String>,
    },
    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },
    #[error("unexpected end of input{expected_what}")]
    UnexpectedEof {
        /// Describes what was expected, e.g., " (expected '}}')"
        expected_what: String,
    },
    /// Blocks or expressions nested past [`MAX_DEPTH`](crate::ast::MAX_DEPTH).
    #[error("nesting exceeds {limit} levels")]
    TooDeep { limit: usize },
    #[error("{0}")]
    Message(String),
}

fn parent_suffix(found: &Option<String>) -> String {
    found
        .as_ref()
        .map_or_else(String::new, |parent| format!("; immediate parent is {parent}"))
}

impl ParseErrorKind {
    pub fn unexpected_eof(expected: Option<&str>) -> Self {
        Self::UnexpectedEof {
            expected_what: expected.map_or_else(String::new, |e| format!(" (expected '{e}')")),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[error("Liquid error ({loc}): {kind}")]
pub struct ParseError {
    pub loc: SourceLoc,
    #[source]
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(loc: SourceLoc, kind: ParseErrorKind) -> Self {
        Self { loc, kind }
    }
}

/// Boxed error reported by a filter function itself.
pub type FilterFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An error in the template being interpreted, as opposed to a defect in the
/// interpreter.
#[derive(Debug, thiserror::Error)]
pub enum InterpreterError {
    #[error("undefined filter: {0}")]
    UndefinedFilter(String),
    #[error("filter {filter} expects expression text for argument {position}, found {found}")]
    ExpressionText {
        filter: String,
        position: usize,
        found: &'static str,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("wrong number of arguments to {filter}: expected at most {expected}, given {given}")]
    ArgumentCount {
        filter: String,
        expected: usize,
        given: usize,
    },
    #[error("argument {position} to {filter}: expected {expected}, found {found}")]
    ArgumentType {
        filter: String,
        position: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{filter}: {source}")]
    FilterFailed {
        filter: String,
        #[source]
        source: FilterFailure,
    },
}

impl InterpreterError {
    /// Places a parse error that has no location of its own at `loc`.
    pub(crate) fn located(self, loc: SourceLoc) -> Self {
        match self {
            InterpreterError::Parse(mut err) if err.loc == SourceLoc::default() => {
                err.loc = loc;
                InterpreterError::Parse(err)
            }
            other => other,
        }
    }
}

/// A filter whose shape cannot be dispatched. These are configuration
/// mistakes and surface from `add_filter`, never from rendering.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("filter {name} must have at least one input")]
    NoInputs { name: String },
    #[error("filter {name} must have one or two outputs, declares {outputs}")]
    TooManyOutputs { name: String, outputs: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum LiqueurError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Interpreter(#[from] InterpreterError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ntest::timeout(100)]
    fn test_missing_parent_message_names_parent() {
        let err = ParseError::new(
            SourceLoc::new(3, 1),
            ParseErrorKind::MissingParent {
                name: "else".to_string(),
                expected: vec!["if".to_string(), "unless".to_string()],
                found: Some("for".to_string()),
            },
        );
        assert_eq!(
            err.to_string(),
            "Liquid error (line 3): else not inside if or unless; immediate parent is for"
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_missing_parent_message_without_open_block() {
        let kind = ParseErrorKind::MissingParent {
            name: "endif".to_string(),
            expected: vec!["if".to_string()],
            found: None,
        };
        assert_eq!(kind.to_string(), "endif not inside if");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_located_only_fills_missing_locations() {
        let unlocated = InterpreterError::from(ParseError::new(
            SourceLoc::default(),
            ParseErrorKind::unexpected_eof(None),
        ));
        assert!(matches!(
            unlocated.located(SourceLoc::new(2, 4)),
            InterpreterError::Parse(ParseError { loc, .. }) if loc == SourceLoc::new(2, 4)
        ));

        let located = InterpreterError::from(ParseError::new(
            SourceLoc::new(9, 1),
            ParseErrorKind::unexpected_eof(None),
        ));
        assert!(matches!(
            located.located(SourceLoc::new(2, 4)),
            InterpreterError::Parse(ParseError { loc, .. }) if loc == SourceLoc::new(9, 1)
        ));

        assert!(matches!(
            InterpreterError::UndefinedFilter("f".to_string()).located(SourceLoc::new(2, 4)),
            InterpreterError::UndefinedFilter(_)
        ));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unexpected_eof_message() {
        assert_eq!(
            ParseErrorKind::unexpected_eof(Some("%}")).to_string(),
            "unexpected end of input (expected '%}')"
        );
        assert_eq!(
            ParseErrorKind::unexpected_eof(None).to_string(),
            "unexpected end of input"
        );
    }
}
