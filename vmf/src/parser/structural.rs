use std::ops::Range;

use crate::block::{Block, BlockKind};
use crate::parser::error::ParseError;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse source text into a list of top-level blocks.
pub fn parse_blocks(source: &str, file_id: usize) -> Result<Vec<Block>, Vec<ParseError>> {
    let mut state = ParseState::new(source, file_id);
    let blocks = state.parse_top_level();
    if state.errors.is_empty() {
        Ok(blocks)
    } else {
        Err(state.errors)
    }
}

// ---------------------------------------------------------------------------
// Line cursor
// ---------------------------------------------------------------------------

/// One trimmed, non-empty line plus its byte offset in the source.
#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    text: &'a str,
    start: usize,
}

impl<'a> Line<'a> {
    fn span(&self) -> Range<usize> {
        self.start..self.start + self.text.len()
    }
}

struct ParseState<'a> {
    source: &'a str,
    file_id: usize,
    /// Byte offset of the next unread line.
    offset: usize,
    errors: Vec<ParseError>,
}

impl<'a> ParseState<'a> {
    fn new(source: &'a str, file_id: usize) -> Self {
        ParseState {
            source,
            file_id,
            offset: 0,
            errors: Vec::new(),
        }
    }

    /// Next non-empty line, trimmed, with its source offset.
    fn next_line(&mut self) -> Option<Line<'a>> {
        while self.offset < self.source.len() {
            let rest = &self.source[self.offset..];
            let (raw, advance) = match rest.find('\n') {
                Some(i) => (&rest[..i], i + 1),
                None => (rest, rest.len()),
            };
            let line_start = self.offset;
            self.offset += advance;

            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            let start = line_start + (trimmed.as_ptr() as usize - raw.as_ptr() as usize);
            return Some(Line {
                text: trimmed,
                start,
            });
        }
        None
    }

    fn error(&mut self, message: impl Into<String>, span: Range<usize>) {
        self.errors.push(ParseError::new(message, span, self.file_id));
    }

    // -----------------------------------------------------------------------
    // Grammar
    // -----------------------------------------------------------------------

    fn parse_top_level(&mut self) -> Vec<Block> {
        let mut blocks = Vec::new();
        while let Some(line) = self.next_line() {
            match line.text.as_bytes()[0] {
                b'"' => self.error("property outside of a block", line.span()),
                b'{' => self.error("block body without a keyword", line.span()),
                b'}' => self.error("unmatched '}'", line.span()),
                _ => {
                    if let Some(block) = self.parse_block(line) {
                        blocks.push(block);
                    }
                }
            }
        }
        blocks
    }

    /// Parse one block: `keyword` on its own line, then `{`, body, `}`.
    fn parse_block(&mut self, keyword_line: Line<'a>) -> Option<Block> {
        match self.next_line() {
            Some(line) if line.text == "{" => {}
            Some(line) => {
                self.error(
                    format!("expected '{{' after keyword '{}'", keyword_line.text),
                    line.span(),
                );
                return None;
            }
            None => {
                self.error(
                    format!("expected '{{' after keyword '{}'", keyword_line.text),
                    keyword_line.span(),
                );
                return None;
            }
        }

        let mut block = Block::new(BlockKind::from_keyword(keyword_line.text));

        loop {
            let Some(line) = self.next_line() else {
                self.error(
                    format!("unclosed block '{}'", keyword_line.text),
                    keyword_line.span(),
                );
                return None;
            };

            match line.text.as_bytes()[0] {
                b'}' => return Some(block),
                b'{' => self.error("block body without a keyword", line.span()),
                b'"' => {
                    if let Some((key, value)) = self.parse_property(line, &block.kind) {
                        block.push_property(key, value);
                    }
                }
                _ => {
                    if let Some(child) = self.parse_block(line) {
                        block.children.push(child);
                    }
                }
            }
        }
    }

    /// Parse a `"key" "value"` line. Quoted strings may contain `\"` and
    /// `\\` escapes.
    fn parse_property(&mut self, line: Line<'a>, kind: &BlockKind) -> Option<(String, Value)> {
        let (key, after_key) = match scan_quoted(line.text, 0) {
            Ok(pair) => pair,
            Err(at) => {
                self.error("unterminated property key", subspan(&line, at));
                return None;
            }
        };

        let rest = &line.text[after_key..];
        let value_start = after_key + (rest.len() - rest.trim_start().len());
        if !line.text[value_start..].starts_with('"') {
            self.error("expected quoted value after key", subspan(&line, value_start));
            return None;
        }

        let (raw_value, _) = match scan_quoted(line.text, value_start) {
            Ok(pair) => pair,
            Err(at) => {
                self.error("unterminated property value", subspan(&line, at));
                return None;
            }
        };

        let value = if kind.has_vector_rows() {
            Value::parse_row(&raw_value)
        } else {
            Value::parse(&raw_value)
        };
        Some((key, value))
    }
}

/// Scan a quoted string starting at `start` (which must index a `"`).
/// Returns the unescaped content and the byte index just past the closing
/// quote, or Err with the opening-quote index when unterminated.
fn scan_quoted(text: &str, start: usize) -> Result<(String, usize), usize> {
    debug_assert_eq!(&text[start..start + 1], "\"");

    let mut content = String::new();
    let mut escaped = false;
    for (i, c) in text[start + 1..].char_indices() {
        if escaped {
            match c {
                '"' | '\\' => content.push(c),
                other => {
                    // Unknown escape: keep the backslash verbatim.
                    content.push('\\');
                    content.push(other);
                }
            }
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Ok((content, start + 1 + i + 1));
        } else {
            content.push(c);
        }
    }
    Err(start)
}

fn subspan(line: &Line<'_>, at: usize) -> Range<usize> {
    line.start + at..line.start + line.text.len()
}
