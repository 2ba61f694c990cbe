/// Rules the Python compiler enforces on top of the grammar: escape sequences
/// inside docstrings must decode, and indentation must not mix tabs and
/// spaces ambiguously.
use std::fmt;
use std::iter::Peekable;
use std::ops::Range;
use std::str::CharIndices;

use tree_sitter::{Node, Tree};

use super::signature::{docstring_parts, first_body_statement};

const TAB_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// 1-based.
    pub line: usize,
    /// 1-based byte column.
    pub column: usize,
    pub message: String,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at line {}, column {}",
            self.message, self.line, self.column
        )
    }
}

/// The earliest compile error in a tree that already parsed without errors.
pub fn first_compile_error(tree: &Tree, source: &str) -> Option<CompileError> {
    let root = tree.root_node();
    let indentation = Indentation::new(source).check(root);
    let escape = escape_error(root, source);
    [indentation, escape]
        .into_iter()
        .flatten()
        .min_by_key(|e| (e.line, e.column))
}

fn escape_error(node: Node, source: &str) -> Option<CompileError> {
    if let Some(parts) = first_body_statement(node).and_then(|s| docstring_parts(s, source)) {
        for part in parts.iter().filter(|p| !p.prefix.contains('r')) {
            if let Some(err) = check_escapes(source, part.body.clone()) {
                return Some(err);
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(err) = escape_error(child, source) {
            return Some(err);
        }
    }
    None
}

/// Decode the escapes of a non-raw string body the way the compiler does.
/// Unknown escapes such as `\q` only warn and are accepted.
fn check_escapes(source: &str, body: Range<usize>) -> Option<CompileError> {
    let text = source.get(body.clone())?;
    let mut chars = text.char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        if c != '\\' {
            continue;
        }
        let Some((_, escape)) = chars.next() else {
            break;
        };
        let problem = match escape {
            'x' => hex_value(&mut chars, 2)
                .is_none()
                .then_some("truncated \\xXX escape"),
            'u' => hex_value(&mut chars, 4)
                .is_none()
                .then_some("truncated \\uXXXX escape"),
            'U' => match hex_value(&mut chars, 8) {
                None => Some("truncated \\UXXXXXXXX escape"),
                Some(value) if value > 0x10FFFF => Some("illegal Unicode character"),
                Some(_) => None,
            },
            'N' => (!character_name(&mut chars)).then_some("malformed \\N character escape"),
            _ => None,
        };
        if let Some(message) = problem {
            let (line, column) = position(source, body.start + offset);
            return Some(CompileError {
                line,
                column,
                message: message.to_string(),
            });
        }
    }
    None
}

fn hex_value(chars: &mut Peekable<CharIndices<'_>>, digits: usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..digits {
        let digit = chars.peek().and_then(|(_, c)| c.to_digit(16))?;
        chars.next();
        value = value * 16 + digit;
    }
    Some(value)
}

/// `{NAME}` after `\N`. Whether the name exists is not checked.
fn character_name(chars: &mut Peekable<CharIndices<'_>>) -> bool {
    if chars.peek().map(|&(_, c)| c) != Some('{') {
        return false;
    }
    chars.next();
    let mut length = 0;
    for (_, c) in chars.by_ref() {
        match c {
            '}' => return length > 0,
            '\n' => return false,
            _ => length += 1,
        }
    }
    false
}

fn position(source: &str, byte: usize) -> (usize, usize) {
    let before = source.get(..byte).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    (line, before.len() - line_start + 1)
}

/// Tokenizer-style indentation tracking. Every logical line's indentation is
/// measured twice, with tabs to the next multiple of 8 and with tabs as one
/// column; both measures must order the line against the enclosing block the
/// same way.
struct Indentation<'s> {
    lines: Vec<&'s str>,
    /// (column, column with tabs counted as 1)
    stack: Vec<(usize, usize)>,
    depth: usize,
    last_row: Option<usize>,
    continued: bool,
}

impl<'s> Indentation<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            lines: source.split('\n').collect(),
            stack: vec![(0, 0)],
            depth: 0,
            last_row: None,
            continued: false,
        }
    }

    fn check(mut self, root: Node) -> Option<CompileError> {
        self.visit(root)
    }

    fn visit(&mut self, node: Node) -> Option<CompileError> {
        // A string is one token, however many lines it spans.
        if node.child_count() == 0 || node.kind() == "string" {
            return self.token(node);
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if let Some(err) = self.visit(child) {
                return Some(err);
            }
        }
        None
    }

    fn token(&mut self, node: Node) -> Option<CompileError> {
        if node.start_byte() == node.end_byte() {
            return None;
        }
        let row = node.start_position().row;
        let logical_start = self.last_row.is_none_or(|last| row > last)
            && self.depth == 0
            && !self.continued
            && node.kind() != "comment";

        self.continued = node.kind() == "line_continuation";
        self.last_row = Some(node.end_position().row);
        match node.kind() {
            "(" | "[" | "{" => self.depth += 1,
            ")" | "]" | "}" => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }

        if logical_start {
            self.check_line(row)
        } else {
            None
        }
    }

    fn check_line(&mut self, row: usize) -> Option<CompileError> {
        let line = self.lines.get(row).copied().unwrap_or("");
        let (mut col, mut alt) = (0, 0);
        for c in line.chars() {
            match c {
                ' ' => {
                    col += 1;
                    alt += 1;
                }
                '\t' => {
                    col = (col / TAB_SIZE + 1) * TAB_SIZE;
                    alt += 1;
                }
                '\x0c' => {
                    col = 0;
                    alt = 0;
                }
                _ => break,
            }
        }

        let &(top, top_alt) = self.stack.last()?;
        let message = if col == top {
            (alt != top_alt).then_some("inconsistent use of tabs and spaces in indentation")
        } else if col > top {
            self.stack.push((col, alt));
            (alt <= top_alt).then_some("inconsistent use of tabs and spaces in indentation")
        } else {
            while self.stack.len() > 1 && self.stack.last().is_some_and(|&(c, _)| col < c) {
                self.stack.pop();
            }
            match self.stack.last() {
                Some(&(c, _)) if c != col => {
                    Some("unindent does not match any outer indentation level")
                }
                Some(&(_, a)) if a != alt => {
                    Some("inconsistent use of tabs and spaces in indentation")
                }
                _ => None,
            }
        };

        message.map(|message| CompileError {
            line: row + 1,
            column: 1,
            message: message.to_string(),
        })
    }
}
