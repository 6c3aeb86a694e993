use crate::{
    chunk::{Chunk, SourceLoc},
    error::{ParseError, ParseErrorKind},
};

type ScanResult<T> = Result<T, ParseError>;

const OBJECT_OPEN: &str = "{{";
const OBJECT_CLOSE: &str = "}}";
const TAG_OPEN: &str = "{%";
const TAG_CLOSE: &str = "%}";

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// The starting location of the current line
    line_start_pos: usize,
}

#[allow(
    clippy::string_slice,
    clippy::arithmetic_side_effects,
    reason = "offsets come from searches over the same input"
)]
impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Scanner {
            input,
            pos: 0,
            line: 1,
            line_start_pos: 0,
        }
    }

    #[inline]
    fn loc(&self) -> SourceLoc {
        SourceLoc::new(self.line, self.pos - self.line_start_pos + 1)
    }

    #[inline]
    fn make_error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.loc(), kind)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Advances to byte offset `end`, keeping line tracking in step with any
    /// newlines passed over.
    fn advance_to(&mut self, end: usize) {
        for (offset, c) in self.input[self.pos..end].char_indices() {
            if c == '\n' {
                self.line += 1;
                self.line_start_pos = self.pos + offset + 1;
            }
        }
        self.pos = end;
    }

    /// Byte offset of the next `{{` or `{%`, if any.
    fn next_delimiter(&self) -> Option<usize> {
        let rest = &self.input[self.pos..];
        let object = rest.find(OBJECT_OPEN);
        let tag = rest.find(TAG_OPEN);
        match (object, tag) {
            (Some(o), Some(t)) => Some(self.pos + o.min(t)),
            (Some(o), None) => Some(self.pos + o),
            (None, Some(t)) => Some(self.pos + t),
            (None, None) => None,
        }
    }

    fn scan_text(&mut self, end: usize, chunks: &mut Vec<Chunk>) {
        if end > self.pos {
            let loc = self.loc();
            chunks.push(Chunk::text(&self.input[self.pos..end], loc));
            self.advance_to(end);
        }
    }

    /// Scans a delimited chunk starting at the current position, returning
    /// the trimmed inner text and the full source slice.
    fn scan_delimited(&mut self, open: &str, close: &str) -> ScanResult<(&'a str, &'a str)> {
        let start = self.pos;
        let inner_start = start + open.len();
        let Some(offset) = self.input[inner_start..].find(close) else {
            return Err(self.make_error(ParseErrorKind::unexpected_eof(Some(close))));
        };
        let inner_end = inner_start + offset;
        let end = inner_end + close.len();
        self.advance_to(end);

        let inner = &self.input[inner_start..inner_end];
        // Whitespace-control markers are accepted but carry no meaning here.
        let inner = inner.strip_prefix('-').unwrap_or(inner);
        let inner = inner.strip_suffix('-').unwrap_or(inner);
        Ok((inner.trim(), &self.input[start..end]))
    }

    fn scan_object(&mut self) -> ScanResult<Chunk> {
        let loc = self.loc();
        let (args, source) = self.scan_delimited(OBJECT_OPEN, OBJECT_CLOSE)?;
        Ok(Chunk::object(args, source, loc))
    }

    fn scan_tag(&mut self) -> ScanResult<Chunk> {
        let loc = self.loc();
        let (inner, source) = self.scan_delimited(TAG_OPEN, TAG_CLOSE)?;
        let name_len = inner
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(inner.len());
        if name_len == 0 {
            return Err(ParseError::new(
                loc,
                ParseErrorKind::UnexpectedToken {
                    expected: "tag name".to_string(),
                    found: format!("'{inner}'"),
                },
            ));
        }
        let (name, args) = inner.split_at(name_len);
        Ok(Chunk::tag(name, args.trim(), source, loc))
    }
}

/// Splits template source into text, object, and tag chunks.
///
/// # Errors
/// Returns a [`ParseError`] if an object or tag is never closed, or a tag has
/// no name.
#[allow(
    clippy::string_slice,
    reason = "offsets come from searches over the same input"
)]
pub fn scan(source: &str) -> Result<Vec<Chunk>, ParseError> {
    let mut scanner = Scanner::new(source);
    let mut chunks = Vec::new();

    while !scanner.eof() {
        let Some(next) = scanner.next_delimiter() else {
            scanner.scan_text(source.len(), &mut chunks);
            break;
        };
        scanner.scan_text(next, &mut chunks);
        let chunk = if source[next..].starts_with(OBJECT_OPEN) {
            scanner.scan_object()?
        } else {
            scanner.scan_tag()?
        };
        chunks.push(chunk);
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkKind;

    #[test]
    #[ntest::timeout(100)]
    fn test_empty_input() {
        assert!(scan("").unwrap().is_empty());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_text_only() {
        let chunks = scan("hello world").unwrap();
        assert_eq!(chunks, vec![Chunk::text("hello world", SourceLoc::new(1, 1))]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_object_and_text() {
        let chunks = scan("Hello {{ name | upcase }}!").unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].kind, ChunkKind::Object);
        assert_eq!(chunks[1].args, "name | upcase");
        assert_eq!(chunks[1].source, "{{ name | upcase }}");
        assert_eq!(chunks[1].loc, SourceLoc::new(1, 7));
        assert_eq!(chunks[2].source, "!");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_tag_name_and_args() {
        let chunks = scan("{%if x > 1 %}").unwrap();
        assert_eq!(chunks, vec![Chunk::tag("if", "x > 1", "{%if x > 1 %}", SourceLoc::new(1, 1))]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_whitespace_control_is_stripped() {
        let chunks = scan("{%- endif -%}").unwrap();
        assert_eq!(chunks[0].name, "endif");
        assert_eq!(chunks[0].args, "");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_locations_track_newlines() {
        let chunks = scan("a\nbc{{ x }}\n  {% y %}").unwrap();
        let locs: Vec<_> = chunks.iter().map(|c| c.loc).collect();
        assert_eq!(
            locs,
            vec![
                SourceLoc::new(1, 1),
                SourceLoc::new(2, 3),
                SourceLoc::new(2, 10),
                SourceLoc::new(3, 3),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unclosed_object() {
        let err = scan("{{ name").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::unexpected_eof(Some("}}")));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unclosed_tag() {
        let err = scan("text {% if").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::unexpected_eof(Some("%}")));
        assert_eq!(err.loc, SourceLoc::new(1, 6));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_tag_without_name() {
        let err = scan("{% %}").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedToken { ref expected, .. } if expected == "tag name"));
    }
}
