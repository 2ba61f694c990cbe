use super::kinds::{LiteralKind, NodeKind, StatementKind};
use std::ops::Range;
use thiserror::Error;
use tree_sitter::{Node, Tree};

/// Documentation-stripped shape of one parsed node.
///
/// Equality covers `kind`, `name`, `content` and `children` (recursively, in
/// order). `docstring` and `line` are carried for reporting only.
#[derive(Debug, Clone)]
pub struct StructuralSignature {
    pub kind: NodeKind,
    /// Qualified name (`Outer.inner`) for functions and classes.
    pub name: Option<String>,
    /// Normalized leaf text for literals and tokens.
    pub content: Option<String>,
    pub children: Vec<StructuralSignature>,
    /// Docstring stripped from this scope's body, if any.
    pub docstring: Option<String>,
    /// 1-based source line.
    pub line: usize,
}

impl PartialEq for StructuralSignature {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.content == other.content
            && self.children == other.children
    }
}

impl Eq for StructuralSignature {}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("unsupported construct `{kind}` at line {line}")]
    Unsupported { kind: String, line: usize },
}

/// Build the signature of a whole module.
pub fn build(tree: &Tree, source: &str) -> Result<StructuralSignature, BuildError> {
    let builder = Builder { source };
    builder.node(tree.root_node(), "", None)
}

/// Location of the first `ERROR` or `MISSING` node as 1-based (line, column).
pub fn first_syntax_error(tree: &Tree) -> Option<(usize, usize)> {
    let root = tree.root_node();
    if !root.has_error() {
        return None;
    }
    let found = find_error(root).unwrap_or(root);
    let pos = found.start_position();
    Some((pos.row + 1, pos.column + 1))
}

fn find_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(found) = find_error(child) {
                return Some(found);
            }
        }
    }
    None
}

/// Children that carry structure: comments and line continuations are dropped.
pub(crate) fn significant_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    let children: Vec<Node> = node
        .children(&mut cursor)
        .filter(|c| !c.is_extra())
        .collect();
    children
}

struct Builder<'s> {
    source: &'s str,
}

impl<'s> Builder<'s> {
    fn text(&self, node: Node) -> &'s str {
        self.source.get(node.byte_range()).unwrap_or("")
    }

    fn node(
        &self,
        node: Node,
        scope: &str,
        stripped: Option<usize>,
    ) -> Result<StructuralSignature, BuildError> {
        let line = node.start_position().row + 1;
        let children = significant_children(node);

        if !node.is_named() {
            let mut sig_children = Vec::with_capacity(children.len());
            for child in children {
                sig_children.push(self.node(child, scope, stripped)?);
            }
            return Ok(StructuralSignature {
                kind: NodeKind::Token,
                name: None,
                content: Some(node.kind().to_string()),
                children: sig_children,
                docstring: None,
                line,
            });
        }

        let first_child = children.first().map(|c| c.kind());
        let mut kind = NodeKind::from_grammar(node.kind(), first_child).ok_or_else(|| {
            BuildError::Unsupported {
                kind: node.kind().to_string(),
                line,
            }
        })?;

        match kind {
            NodeKind::Literal(literal) => {
                return Ok(StructuralSignature {
                    kind,
                    name: None,
                    content: Some(self.literal_content(literal, node)),
                    children: Vec::new(),
                    docstring: None,
                    line,
                });
            }
            NodeKind::Function { .. } => {
                let is_async = children
                    .iter()
                    .any(|c| !c.is_named() && c.kind() == "async");
                kind = NodeKind::Function { is_async };
            }
            NodeKind::Statement(StatementKind::Assign) => {
                let annotated = children
                    .first()
                    .is_some_and(|c| c.child_by_field_name("type").is_some());
                if annotated {
                    kind = NodeKind::Statement(StatementKind::AnnAssign);
                }
            }
            _ => {}
        }

        let name = match kind {
            NodeKind::Function { .. } | NodeKind::Class => {
                let short = node
                    .child_by_field_name("name")
                    .map(|n| self.text(n))
                    .unwrap_or("<anonymous>");
                Some(if scope.is_empty() {
                    short.to_string()
                } else {
                    format!("{scope}.{short}")
                })
            }
            _ => None,
        };

        // The docstring is the first statement of the scope body: the module
        // node itself, or the `body` block of a function or class.
        let mut docstring = None;
        let mut stripped = stripped;
        if kind.is_scope() {
            if let Some(first) = first_body_statement(node) {
                if let Some(text) = self.docstring_text(first) {
                    docstring = Some(text);
                    stripped = Some(first.id());
                }
            }
        }

        let inner_scope = name.as_deref().unwrap_or(scope);
        let mut sig_children = Vec::with_capacity(children.len());
        for child in children {
            if Some(child.id()) == stripped {
                continue;
            }
            sig_children.push(self.node(child, inner_scope, stripped)?);
        }

        Ok(StructuralSignature {
            kind,
            name,
            content: None,
            children: sig_children,
            docstring,
            line,
        })
    }

    fn literal_content(&self, literal: LiteralKind, node: Node) -> String {
        match literal {
            // Quote style does not change the value; the prefix letters do.
            LiteralKind::StringStart => string_prefix(self.text(node)),
            LiteralKind::StringEnd => String::new(),
            _ => self.text(node).to_string(),
        }
    }

    /// Text of a docstring statement, or `None` if `stmt` is not one.
    fn docstring_text(&self, stmt: Node) -> Option<String> {
        let mut value = String::new();
        for part in docstring_parts(stmt, self.source)? {
            value.push_str(self.source.get(part.body)?);
        }
        Some(value)
    }
}

/// Prefix letters and the byte range between the quotes of a plain string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StringBody {
    pub prefix: String,
    pub body: Range<usize>,
}

/// First named statement of a module, function or class body.
pub(crate) fn first_body_statement(node: Node) -> Option<Node> {
    let body = match node.kind() {
        "module" => Some(node),
        "function_definition" | "class_definition" => node.child_by_field_name("body"),
        _ => None,
    }?;
    significant_children(body).into_iter().find(|c| c.is_named())
}

/// The string literals of a docstring statement, or `None` if `stmt` is not
/// one. f-strings and bytes never form a docstring.
pub(crate) fn docstring_parts(stmt: Node, source: &str) -> Option<Vec<StringBody>> {
    if stmt.kind() != "expression_statement" {
        return None;
    }
    let named = named_children(stmt);
    let [expr] = named.as_slice() else {
        return None;
    };
    let mut expr = *expr;
    while expr.kind() == "parenthesized_expression" {
        let inner = named_children(expr);
        let [only] = inner.as_slice() else {
            return None;
        };
        expr = *only;
    }

    match expr.kind() {
        "string" => Some(vec![string_body(expr, source)?]),
        "concatenated_string" => named_children(expr)
            .into_iter()
            .map(|part| string_body(part, source))
            .collect(),
        _ => None,
    }
}

fn named_children(node: Node) -> Vec<Node> {
    significant_children(node)
        .into_iter()
        .filter(|c| c.is_named())
        .collect()
}

fn string_body(string: Node, source: &str) -> Option<StringBody> {
    if string.kind() != "string" {
        return None;
    }
    let children = significant_children(string);
    let start = children.iter().find(|c| c.kind() == "string_start")?;
    let end = children.iter().rev().find(|c| c.kind() == "string_end")?;
    let prefix = string_prefix(source.get(start.byte_range())?);
    if prefix.contains(['f', 'b', 't']) {
        return None;
    }
    Some(StringBody {
        prefix,
        body: start.end_byte()..end.start_byte(),
    })
}

/// Lower-cased prefix letters of a `string_start` token (`rb'''` → `rb`).
fn string_prefix(start: &str) -> String {
    start
        .trim_end_matches(['"', '\''])
        .to_ascii_lowercase()
}
