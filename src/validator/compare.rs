/// Top-down comparison of two structural signatures, and the docstring diff
/// that runs once the structures are known to match.
use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::kinds::{ClauseKind, NodeKind};
use super::signature::StructuralSignature;

/// First structural mismatch between original and candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    /// Enclosing scope, e.g. `function foo.bar`.
    pub scope: String,
    /// Node path inside the scope and what changed there.
    pub detail: String,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.scope, self.detail)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Module,
    Function,
    Class,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocChangeKind {
    Added,
    Modified,
    Removed,
}

/// One named node whose documentation changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocChange {
    pub scope: ScopeKind,
    pub name: String,
    pub change: DocChangeKind,
    pub original: Option<String>,
    pub current: Option<String>,
}

pub const MODULE_NAME: &str = "<module>";

/// Compare two signatures, returning the first divergence.
pub fn compare(
    original: &StructuralSignature,
    candidate: &StructuralSignature,
) -> Result<(), Divergence> {
    let mut walker = Walker {
        scope: "module".to_string(),
        trail: Vec::new(),
    };
    walker.node(original, candidate, "module")
}

struct Walker {
    scope: String,
    trail: Vec<String>,
}

impl Walker {
    fn diverge(&self, last: String) -> Divergence {
        let mut parts = self.trail.clone();
        parts.push(last);
        Divergence {
            scope: self.scope.clone(),
            detail: parts.join(" -> "),
        }
    }

    /// `label` names `o` relative to its parent, e.g. `body statement 3`.
    fn node(
        &mut self,
        o: &StructuralSignature,
        c: &StructuralSignature,
        label: &str,
    ) -> Result<(), Divergence> {
        if o.kind != c.kind {
            return Err(self.diverge(format!(
                "{label} kind changed from {} to {}",
                o.kind, c.kind
            )));
        }
        let here = segment(o, label);
        if o.name != c.name {
            return Err(self.diverge(format!(
                "{}: renamed from `{}` to `{}`",
                here.as_deref().unwrap_or(label),
                o.name.as_deref().unwrap_or_default(),
                c.name.as_deref().unwrap_or_default()
            )));
        }
        if o.content != c.content {
            return Err(self.diverge(format!(
                "{}: `{}` changed to `{}`",
                here.as_deref().unwrap_or(label),
                o.content.as_deref().unwrap_or_default(),
                c.content.as_deref().unwrap_or_default()
            )));
        }
        if o.children.is_empty() && c.children.is_empty() {
            return Ok(());
        }

        // Entering a function or class starts a fresh path under its own scope.
        let entering_scope = matches!(o.kind, NodeKind::Function { .. } | NodeKind::Class);
        let saved = if entering_scope {
            let scope = scope_label(o);
            Some((
                std::mem::replace(&mut self.scope, scope),
                std::mem::take(&mut self.trail),
            ))
        } else {
            if let Some(segment) = &here {
                if o.kind != NodeKind::Module {
                    self.trail.push(segment.clone());
                }
            }
            None
        };

        let result = self.children(o, c, label);

        match saved {
            Some((scope, trail)) => {
                self.scope = scope;
                self.trail = trail;
            }
            None => {
                if here.is_some() && o.kind != NodeKind::Module {
                    self.trail.pop();
                }
            }
        }
        result
    }

    fn children(
        &mut self,
        o: &StructuralSignature,
        c: &StructuralSignature,
        label: &str,
    ) -> Result<(), Divergence> {
        let scope_body = o.kind == NodeKind::Module
            || (o.kind == NodeKind::Clause(ClauseKind::Block) && label == "body");
        let body_prefix = if scope_body { "body " } else { "" };
        let scope_owner = matches!(o.kind, NodeKind::Function { .. } | NodeKind::Class);

        let o_labels = child_labels(o, body_prefix, scope_owner);
        for (index, (oc, cc)) in o.children.iter().zip(&c.children).enumerate() {
            self.node(oc, cc, &o_labels[index])?;
        }

        if o.children.len() != c.children.len() {
            let (extra, verb, labels) = if o.children.len() > c.children.len() {
                (&o.children[c.children.len()], "removed", o_labels)
            } else {
                (
                    &c.children[o.children.len()],
                    "added",
                    child_labels(c, body_prefix, scope_owner),
                )
            };
            let position = o.children.len().min(c.children.len());
            let what = segment(extra, &labels[position])
                .unwrap_or_else(|| format!("{} {}", labels[position], extra.kind));
            return Err(self.diverge(format!("{what} {verb}")));
        }
        Ok(())
    }
}

/// How a node appears inside a divergence path. Blocks are transparent.
fn segment(sig: &StructuralSignature, label: &str) -> Option<String> {
    match sig.kind {
        NodeKind::Clause(ClauseKind::Block) => None,
        NodeKind::Statement(_) | NodeKind::Function { .. } | NodeKind::Class => {
            Some(format!("{label} ({})", sig.kind))
        }
        _ => Some(sig.kind.to_string()),
    }
}

fn is_statement(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Statement(_) | NodeKind::Function { .. } | NodeKind::Class
    )
}

/// Labels for the children of `parent`: statements are numbered among
/// statements, anything else by position.
fn child_labels(parent: &StructuralSignature, body_prefix: &str, scope_owner: bool) -> Vec<String> {
    let statement_container = matches!(
        parent.kind,
        NodeKind::Module | NodeKind::Clause(ClauseKind::Block)
    );
    let mut statement_no = 0;
    parent
        .children
        .iter()
        .enumerate()
        .map(|(i, child)| {
            if scope_owner && child.kind == NodeKind::Clause(ClauseKind::Block) {
                // body block of a function or class
                "body".to_string()
            } else if statement_container && is_statement(child.kind) {
                statement_no += 1;
                format!("{body_prefix}statement {statement_no}")
            } else {
                format!("child {}", i + 1)
            }
        })
        .collect()
}

fn scope_label(sig: &StructuralSignature) -> String {
    let name = sig.name.as_deref().unwrap_or_default();
    match sig.kind {
        NodeKind::Function { is_async: true } => format!("async function {name}"),
        NodeKind::Function { is_async: false } => format!("function {name}"),
        NodeKind::Class => format!("class {name}"),
        _ => "module".to_string(),
    }
}

/// Docstrings per scope in pre-order, keyed by qualified name. Repeated
/// names get an occurrence suffix (`f#2`).
fn collect_docs(root: &StructuralSignature) -> Vec<(String, ScopeKind, Option<String>)> {
    fn walk(
        sig: &StructuralSignature,
        seen: &mut HashMap<String, usize>,
        out: &mut Vec<(String, ScopeKind, Option<String>)>,
    ) {
        let scope = match sig.kind {
            NodeKind::Module => Some(ScopeKind::Module),
            NodeKind::Function { .. } => Some(ScopeKind::Function),
            NodeKind::Class => Some(ScopeKind::Class),
            _ => None,
        };
        if let Some(scope) = scope {
            let base = sig.name.clone().unwrap_or_else(|| MODULE_NAME.to_string());
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            let key = if *count == 1 {
                base
            } else {
                format!("{base}#{count}")
            };
            out.push((key, scope, sig.docstring.clone()));
        }
        for child in &sig.children {
            walk(child, seen, out);
        }
    }

    let mut out = Vec::new();
    walk(root, &mut HashMap::new(), &mut out);
    out
}

/// Classify each named scope's docstring as added, modified or removed.
/// Unchanged docstrings are not reported.
pub fn doc_changes(
    original: &StructuralSignature,
    candidate: &StructuralSignature,
) -> Vec<DocChange> {
    let original_docs = collect_docs(original);
    let mut candidate_docs: HashMap<String, (ScopeKind, Option<String>)> = collect_docs(candidate)
        .into_iter()
        .map(|(key, scope, doc)| (key, (scope, doc)))
        .collect();

    let mut changes = Vec::new();
    for (name, scope, before) in original_docs {
        let after = candidate_docs.remove(&name).and_then(|(_, doc)| doc);
        if let Some(change) = classify(&before, &after) {
            changes.push(DocChange {
                scope,
                name,
                change,
                original: before,
                current: after,
            });
        }
    }

    // Only reachable when structures differ; kept so the diff is total.
    let mut leftovers: Vec<_> = candidate_docs.into_iter().collect();
    leftovers.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, (scope, after)) in leftovers {
        if after.is_some() {
            changes.push(DocChange {
                scope,
                name,
                change: DocChangeKind::Added,
                original: None,
                current: after,
            });
        }
    }
    changes
}

fn classify(before: &Option<String>, after: &Option<String>) -> Option<DocChangeKind> {
    match (before, after) {
        (None, Some(_)) => Some(DocChangeKind::Added),
        (Some(_), None) => Some(DocChangeKind::Removed),
        (Some(a), Some(b)) if a != b => Some(DocChangeKind::Modified),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::parse_python;
    use crate::validator::signature::build;

    fn sig(source: &str) -> StructuralSignature {
        let tree = parse_python(source).unwrap();
        build(&tree, source).unwrap()
    }

    fn divergence(original: &str, candidate: &str) -> String {
        compare(&sig(original), &sig(candidate))
            .expect_err("structures should differ")
            .to_string()
    }

    #[test]
    fn test_statement_kind_change_names_path() {
        let original = "class foo:\n    def bar(self):\n        a = 1\n        b = 2\n        return a\n";
        let candidate = "class foo:\n    def bar(self):\n        a = 1\n        b = 2\n        c = a\n";
        assert_eq!(
            divergence(original, candidate),
            "function foo.bar: body statement 3 kind changed from Return to Assign"
        );
    }

    #[test]
    fn test_expression_change_names_return() {
        let msg = divergence(
            "def f(x):\n    return x + 1\n",
            "def f(x):\n    return x + 2\n",
        );
        assert_eq!(
            msg,
            "function f: body statement 1 (Return) -> BinOp -> Integer: `1` changed to `2`"
        );
    }

    #[test]
    fn test_rename_reported_in_outer_scope() {
        let msg = divergence("def f():\n    pass\n", "def g():\n    pass\n");
        assert_eq!(
            msg,
            "module: body statement 1 (FunctionDef): renamed from `f` to `g`"
        );
    }

    #[test]
    fn test_added_statement_reported() {
        let msg = divergence(
            "def f():\n    x = 1\n",
            "def f():\n    x = 1\n    return x\n",
        );
        assert_eq!(msg, "function f: body statement 2 (Return) added");
    }

    #[test]
    fn test_module_statement_removed() {
        let msg = divergence("import os\nimport sys\n", "import os\n");
        assert_eq!(msg, "module: body statement 2 (Import) removed");
    }

    #[test]
    fn test_doc_changes_classified() {
        let original = "def a():\n    \"\"\"Old.\"\"\"\n    pass\n\ndef b():\n    \"\"\"Gone.\"\"\"\n    pass\n\ndef c():\n    \"\"\"Same.\"\"\"\n    pass\n";
        let candidate = "\"\"\"Module.\"\"\"\ndef a():\n    \"\"\"New.\"\"\"\n    pass\n\ndef b():\n    pass\n\ndef c():\n    \"\"\"Same.\"\"\"\n    pass\n";
        let changes = doc_changes(&sig(original), &sig(candidate));
        let summary: Vec<_> = changes
            .iter()
            .map(|c| (c.name.as_str(), c.scope, c.change))
            .collect();
        assert_eq!(
            summary,
            vec![
                (MODULE_NAME, ScopeKind::Module, DocChangeKind::Added),
                ("a", ScopeKind::Function, DocChangeKind::Modified),
                ("b", ScopeKind::Function, DocChangeKind::Removed),
            ]
        );
    }

    #[test]
    fn test_duplicate_names_get_suffix() {
        let original = "def f():\n    pass\n\ndef f():\n    pass\n";
        let candidate = "def f():\n    pass\n\ndef f():\n    \"\"\"Second.\"\"\"\n    pass\n";
        let changes = doc_changes(&sig(original), &sig(candidate));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].name, "f#2");
        assert_eq!(changes[0].current.as_deref(), Some("Second."));
    }
}
