/// Closed set of Python syntax kinds understood by the validator.
///
/// Every tree-sitter node kind the validator accepts is listed here and mapped
/// to exactly one variant. A grammar kind missing from these tables is reported
/// as an unsupported construct instead of being skipped, so a new language
/// feature always shows up as a rejected file and a compile-time gap to fill.
use std::fmt;

/// Kind of one node in a [`super::signature::StructuralSignature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Module,
    Function { is_async: bool },
    Class,
    Statement(StatementKind),
    Clause(ClauseKind),
    Expression(ExpressionKind),
    Fragment(FragmentKind),
    Literal(LiteralKind),
    /// Anonymous grammar token (keyword, operator, punctuation).
    Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Expr,
    Assign,
    AnnAssign,
    AugAssign,
    Return,
    Delete,
    Pass,
    Break,
    Continue,
    Raise,
    Global,
    Nonlocal,
    Assert,
    Import,
    ImportFrom,
    FutureImport,
    Print,
    Exec,
    TypeAlias,
    If,
    For,
    While,
    Try,
    With,
    Match,
    Decorated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    Block,
    Elif,
    Else,
    Except,
    ExceptGroup,
    Finally,
    With,
    WithItem,
    Case,
    ForIn,
    IfFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionKind {
    BinOp,
    BoolOp,
    UnaryOp,
    Not,
    Compare,
    Lambda,
    IfExp,
    NamedExpr,
    Await,
    Yield,
    Call,
    Attribute,
    Subscript,
    Slice,
    Starred,
    DoubleStarred,
    ParenthesizedStarred,
    List,
    Tuple,
    Set,
    Dict,
    ListComp,
    SetComp,
    DictComp,
    GeneratorExp,
    Parenthesized,
    ExpressionList,
    Str,
    ConcatenatedStr,
    Interpolation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    Assignment,
    AugmentedAssignment,
    Parameters,
    LambdaParameters,
    DefaultParameter,
    TypedParameter,
    TypedDefaultParameter,
    ListSplatPattern,
    DictionarySplatPattern,
    PositionalSeparator,
    KeywordSeparator,
    TypeParameter,
    Type,
    GenericType,
    UnionType,
    ConstrainedType,
    MemberType,
    SplatType,
    ArgumentList,
    KeywordArgument,
    Pair,
    Decorator,
    DottedName,
    AliasedImport,
    WildcardImport,
    RelativeImport,
    ImportPrefix,
    Chevron,
    PatternList,
    TuplePattern,
    ListPattern,
    CasePattern,
    AsPattern,
    AsPatternTarget,
    UnionPattern,
    DictPattern,
    KeywordPattern,
    SplatPattern,
    ClassPattern,
    ComplexPattern,
}

/// Leaves whose source text is the whole of their content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Identifier,
    Integer,
    Float,
    True,
    False,
    None,
    Ellipsis,
    StringStart,
    StringContent,
    StringEnd,
    EscapeSequence,
    EscapeInterpolation,
    FormatSpecifier,
    TypeConversion,
}

impl NodeKind {
    /// Map a named grammar kind onto the closed set.
    ///
    /// `expression_statement` is refined by its first child, which is why the
    /// caller passes that child's kind along.
    pub fn from_grammar(kind: &str, first_child: Option<&str>) -> Option<NodeKind> {
        let mapped = match kind {
            "module" => NodeKind::Module,
            "class_definition" => NodeKind::Class,
            // async-ness is decided by the signature builder from the tokens
            "function_definition" => NodeKind::Function { is_async: false },
            "expression_statement" => NodeKind::Statement(match first_child {
                Some("assignment") => StatementKind::Assign,
                Some("augmented_assignment") => StatementKind::AugAssign,
                _ => StatementKind::Expr,
            }),
            _ => {
                return StatementKind::from_grammar(kind)
                    .map(NodeKind::Statement)
                    .or_else(|| ClauseKind::from_grammar(kind).map(NodeKind::Clause))
                    .or_else(|| ExpressionKind::from_grammar(kind).map(NodeKind::Expression))
                    .or_else(|| FragmentKind::from_grammar(kind).map(NodeKind::Fragment))
                    .or_else(|| LiteralKind::from_grammar(kind).map(NodeKind::Literal));
            }
        };
        Some(mapped)
    }

    /// Whether this node opens a documentation scope (module, function, class).
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            NodeKind::Module | NodeKind::Function { .. } | NodeKind::Class
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Module => "Module",
            NodeKind::Function { is_async: false } => "FunctionDef",
            NodeKind::Function { is_async: true } => "AsyncFunctionDef",
            NodeKind::Class => "ClassDef",
            NodeKind::Statement(k) => k.name(),
            NodeKind::Clause(k) => k.name(),
            NodeKind::Expression(k) => k.name(),
            NodeKind::Fragment(k) => k.name(),
            NodeKind::Literal(k) => k.name(),
            NodeKind::Token => "Token",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl StatementKind {
    fn from_grammar(kind: &str) -> Option<Self> {
        Some(match kind {
            "return_statement" => Self::Return,
            "delete_statement" => Self::Delete,
            "pass_statement" => Self::Pass,
            "break_statement" => Self::Break,
            "continue_statement" => Self::Continue,
            "raise_statement" => Self::Raise,
            "global_statement" => Self::Global,
            "nonlocal_statement" => Self::Nonlocal,
            "assert_statement" => Self::Assert,
            "import_statement" => Self::Import,
            "import_from_statement" => Self::ImportFrom,
            "future_import_statement" => Self::FutureImport,
            "print_statement" => Self::Print,
            "exec_statement" => Self::Exec,
            "type_alias_statement" => Self::TypeAlias,
            "if_statement" => Self::If,
            "for_statement" => Self::For,
            "while_statement" => Self::While,
            "try_statement" => Self::Try,
            "with_statement" => Self::With,
            "match_statement" => Self::Match,
            "decorated_definition" => Self::Decorated,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Expr => "Expr",
            Self::Assign => "Assign",
            Self::AnnAssign => "AnnAssign",
            Self::AugAssign => "AugAssign",
            Self::Return => "Return",
            Self::Delete => "Delete",
            Self::Pass => "Pass",
            Self::Break => "Break",
            Self::Continue => "Continue",
            Self::Raise => "Raise",
            Self::Global => "Global",
            Self::Nonlocal => "Nonlocal",
            Self::Assert => "Assert",
            Self::Import => "Import",
            Self::ImportFrom => "ImportFrom",
            Self::FutureImport => "FutureImport",
            Self::Print => "Print",
            Self::Exec => "Exec",
            Self::TypeAlias => "TypeAlias",
            Self::If => "If",
            Self::For => "For",
            Self::While => "While",
            Self::Try => "Try",
            Self::With => "With",
            Self::Match => "Match",
            Self::Decorated => "Decorated",
        }
    }
}

impl ClauseKind {
    fn from_grammar(kind: &str) -> Option<Self> {
        Some(match kind {
            "block" => Self::Block,
            "elif_clause" => Self::Elif,
            "else_clause" => Self::Else,
            "except_clause" => Self::Except,
            "except_group_clause" => Self::ExceptGroup,
            "finally_clause" => Self::Finally,
            "with_clause" => Self::With,
            "with_item" => Self::WithItem,
            "case_clause" => Self::Case,
            "for_in_clause" => Self::ForIn,
            "if_clause" => Self::IfFilter,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Block => "Block",
            Self::Elif => "Elif",
            Self::Else => "Else",
            Self::Except => "ExceptHandler",
            Self::ExceptGroup => "ExceptGroupHandler",
            Self::Finally => "Finally",
            Self::With => "WithClause",
            Self::WithItem => "WithItem",
            Self::Case => "MatchCase",
            Self::ForIn => "Comprehension",
            Self::IfFilter => "ComprehensionIf",
        }
    }
}

impl ExpressionKind {
    fn from_grammar(kind: &str) -> Option<Self> {
        Some(match kind {
            "binary_operator" => Self::BinOp,
            "boolean_operator" => Self::BoolOp,
            "unary_operator" => Self::UnaryOp,
            "not_operator" => Self::Not,
            "comparison_operator" => Self::Compare,
            "lambda" => Self::Lambda,
            "conditional_expression" => Self::IfExp,
            "named_expression" => Self::NamedExpr,
            "await" => Self::Await,
            "yield" => Self::Yield,
            "call" => Self::Call,
            "attribute" => Self::Attribute,
            "subscript" => Self::Subscript,
            "slice" => Self::Slice,
            "list_splat" => Self::Starred,
            "dictionary_splat" => Self::DoubleStarred,
            "parenthesized_list_splat" => Self::ParenthesizedStarred,
            "list" => Self::List,
            "tuple" => Self::Tuple,
            "set" => Self::Set,
            "dictionary" => Self::Dict,
            "list_comprehension" => Self::ListComp,
            "set_comprehension" => Self::SetComp,
            "dictionary_comprehension" => Self::DictComp,
            "generator_expression" => Self::GeneratorExp,
            "parenthesized_expression" => Self::Parenthesized,
            "expression_list" => Self::ExpressionList,
            "string" => Self::Str,
            "concatenated_string" => Self::ConcatenatedStr,
            "interpolation" | "format_expression" => Self::Interpolation,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BinOp => "BinOp",
            Self::BoolOp => "BoolOp",
            Self::UnaryOp => "UnaryOp",
            Self::Not => "Not",
            Self::Compare => "Compare",
            Self::Lambda => "Lambda",
            Self::IfExp => "IfExp",
            Self::NamedExpr => "NamedExpr",
            Self::Await => "Await",
            Self::Yield => "Yield",
            Self::Call => "Call",
            Self::Attribute => "Attribute",
            Self::Subscript => "Subscript",
            Self::Slice => "Slice",
            Self::Starred => "Starred",
            Self::DoubleStarred => "DoubleStarred",
            Self::ParenthesizedStarred => "ParenthesizedStarred",
            Self::List => "List",
            Self::Tuple => "Tuple",
            Self::Set => "Set",
            Self::Dict => "Dict",
            Self::ListComp => "ListComp",
            Self::SetComp => "SetComp",
            Self::DictComp => "DictComp",
            Self::GeneratorExp => "GeneratorExp",
            Self::Parenthesized => "Parenthesized",
            Self::ExpressionList => "ExpressionList",
            Self::Str => "Str",
            Self::ConcatenatedStr => "ConcatenatedStr",
            Self::Interpolation => "FormattedValue",
        }
    }
}

impl FragmentKind {
    fn from_grammar(kind: &str) -> Option<Self> {
        Some(match kind {
            "assignment" => Self::Assignment,
            "augmented_assignment" => Self::AugmentedAssignment,
            "parameters" => Self::Parameters,
            "lambda_parameters" => Self::LambdaParameters,
            "default_parameter" => Self::DefaultParameter,
            "typed_parameter" => Self::TypedParameter,
            "typed_default_parameter" => Self::TypedDefaultParameter,
            "list_splat_pattern" => Self::ListSplatPattern,
            "dictionary_splat_pattern" => Self::DictionarySplatPattern,
            "positional_separator" => Self::PositionalSeparator,
            "keyword_separator" => Self::KeywordSeparator,
            "type_parameter" => Self::TypeParameter,
            "type" => Self::Type,
            "generic_type" => Self::GenericType,
            "union_type" => Self::UnionType,
            "constrained_type" => Self::ConstrainedType,
            "member_type" => Self::MemberType,
            "splat_type" => Self::SplatType,
            "argument_list" => Self::ArgumentList,
            "keyword_argument" => Self::KeywordArgument,
            "pair" => Self::Pair,
            "decorator" => Self::Decorator,
            "dotted_name" => Self::DottedName,
            "aliased_import" => Self::AliasedImport,
            "wildcard_import" => Self::WildcardImport,
            "relative_import" => Self::RelativeImport,
            "import_prefix" => Self::ImportPrefix,
            "chevron" => Self::Chevron,
            "pattern_list" => Self::PatternList,
            "tuple_pattern" => Self::TuplePattern,
            "list_pattern" => Self::ListPattern,
            "case_pattern" => Self::CasePattern,
            "as_pattern" => Self::AsPattern,
            "as_pattern_target" => Self::AsPatternTarget,
            "union_pattern" => Self::UnionPattern,
            "dict_pattern" => Self::DictPattern,
            "keyword_pattern" => Self::KeywordPattern,
            "splat_pattern" => Self::SplatPattern,
            "class_pattern" => Self::ClassPattern,
            "complex_pattern" => Self::ComplexPattern,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Assignment => "Assignment",
            Self::AugmentedAssignment => "AugmentedAssignment",
            Self::Parameters => "Parameters",
            Self::LambdaParameters => "LambdaParameters",
            Self::DefaultParameter => "DefaultParameter",
            Self::TypedParameter => "TypedParameter",
            Self::TypedDefaultParameter => "TypedDefaultParameter",
            Self::ListSplatPattern => "VarArgs",
            Self::DictionarySplatPattern => "KwArgs",
            Self::PositionalSeparator => "PositionalSeparator",
            Self::KeywordSeparator => "KeywordSeparator",
            Self::TypeParameter => "TypeParameter",
            Self::Type => "Annotation",
            Self::GenericType => "GenericType",
            Self::UnionType => "UnionType",
            Self::ConstrainedType => "ConstrainedType",
            Self::MemberType => "MemberType",
            Self::SplatType => "SplatType",
            Self::ArgumentList => "Arguments",
            Self::KeywordArgument => "Keyword",
            Self::Pair => "DictEntry",
            Self::Decorator => "Decorator",
            Self::DottedName => "DottedName",
            Self::AliasedImport => "Alias",
            Self::WildcardImport => "WildcardImport",
            Self::RelativeImport => "RelativeImport",
            Self::ImportPrefix => "ImportPrefix",
            Self::Chevron => "Chevron",
            Self::PatternList => "PatternList",
            Self::TuplePattern => "TuplePattern",
            Self::ListPattern => "ListPattern",
            Self::CasePattern => "CasePattern",
            Self::AsPattern => "AsPattern",
            Self::AsPatternTarget => "AsPatternTarget",
            Self::UnionPattern => "UnionPattern",
            Self::DictPattern => "DictPattern",
            Self::KeywordPattern => "KeywordPattern",
            Self::SplatPattern => "SplatPattern",
            Self::ClassPattern => "ClassPattern",
            Self::ComplexPattern => "ComplexPattern",
        }
    }
}

impl LiteralKind {
    fn from_grammar(kind: &str) -> Option<Self> {
        Some(match kind {
            "identifier" | "keyword_identifier" => Self::Identifier,
            "integer" => Self::Integer,
            "float" => Self::Float,
            "true" => Self::True,
            "false" => Self::False,
            "none" => Self::None,
            "ellipsis" => Self::Ellipsis,
            "string_start" => Self::StringStart,
            "string_content" => Self::StringContent,
            "string_end" => Self::StringEnd,
            "escape_sequence" => Self::EscapeSequence,
            "escape_interpolation" => Self::EscapeInterpolation,
            "format_specifier" => Self::FormatSpecifier,
            "type_conversion" => Self::TypeConversion,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Identifier => "Name",
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::True => "True",
            Self::False => "False",
            Self::None => "None",
            Self::Ellipsis => "Ellipsis",
            Self::StringStart => "StringPrefix",
            Self::StringContent => "StringContent",
            Self::StringEnd => "StringEnd",
            Self::EscapeSequence => "EscapeSequence",
            Self::EscapeInterpolation => "EscapeInterpolation",
            Self::FormatSpecifier => "FormatSpec",
            Self::TypeConversion => "Conversion",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_statement_refined_by_child() {
        assert_eq!(
            NodeKind::from_grammar("expression_statement", Some("assignment")),
            Some(NodeKind::Statement(StatementKind::Assign))
        );
        assert_eq!(
            NodeKind::from_grammar("expression_statement", Some("augmented_assignment")),
            Some(NodeKind::Statement(StatementKind::AugAssign))
        );
        assert_eq!(
            NodeKind::from_grammar("expression_statement", Some("call")),
            Some(NodeKind::Statement(StatementKind::Expr))
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert_eq!(NodeKind::from_grammar("totally_new_statement", None), None);
        assert_eq!(NodeKind::from_grammar("ERROR", None), None);
    }

    #[test]
    fn test_names_follow_python_ast() {
        assert_eq!(
            NodeKind::from_grammar("return_statement", None).map(|k| k.name()),
            Some("Return")
        );
        assert_eq!(
            NodeKind::from_grammar("binary_operator", None).map(|k| k.name()),
            Some("BinOp")
        );
        assert_eq!(NodeKind::Function { is_async: true }.name(), "AsyncFunctionDef");
    }

    #[test]
    fn test_scope_kinds() {
        assert!(NodeKind::Module.is_scope());
        assert!(NodeKind::Class.is_scope());
        assert!(NodeKind::Function { is_async: false }.is_scope());
        assert!(!NodeKind::Statement(StatementKind::Decorated).is_scope());
    }
}
