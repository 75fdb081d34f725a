//! Token data model shared by the lexer and the stripper.
//!
//! Tokens never own text. They carry byte spans into the source plus precomputed 1-based
//! line/column positions (columns in UTF-16 code units, the JavaScript convention). Whitespace
//! is leading trivia: `trivia_start..span.start` is the run of whitespace consumed before the
//! token, so the `trivia_start..span.end` ranges of consecutive tokens tile the whole input.

/// A half-open byte range `[start, end)` into the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A 1-based line and 1-based UTF-16 column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    /// `// ...` (and a leading `#!` line).
    Line,
    /// `/* ... */`
    Block,
    /// `/*: Type */`, kept verbatim in the output.
    TypeAnnotation,
    /// `/*:: decl */` or `/*flow-include decl */`, removed with its contents.
    TypeInclude,
}

/// Pieces of a template literal.
///
/// `Middle` and `Tail` tokens start at the `}` that closes the preceding `${` hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplatePart {
    /// `` `text` ``
    NoSubstitution,
    /// `` `text${ ``
    Head,
    /// `}text${`
    Middle,
    /// `` }text` ``
    Tail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Keyword,
    /// Operators and delimiters. Compare by source text.
    Punct,
    String,
    Template(TemplatePart),
    Regex,
    Number,
    Comment(CommentKind),
    /// `#name`
    PrivateName,
    /// Raw text between JSX tags.
    JsxText,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Offset where the whitespace preceding this token begins.
    pub trivia_start: usize,
    pub start: Position,
    pub end: Position,
    /// A line terminator occurs between the previous significant token and this one.
    pub newline_before: bool,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::Comment(_))
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Identifiers and keywords, which both may appear as property or type names.
    pub fn is_word(&self) -> bool {
        matches!(self.kind, TokenKind::Ident | TokenKind::Keyword)
    }
}

/// Reserved words. Contextual words (`type`, `declare`, `as`, `async`, ...) lex as identifiers.
pub(crate) const KEYWORDS: &[&str] = &[
    "await",
    "break",
    "case",
    "catch",
    "class",
    "const",
    "continue",
    "debugger",
    "default",
    "delete",
    "do",
    "else",
    "enum",
    "export",
    "extends",
    "false",
    "finally",
    "for",
    "function",
    "if",
    "import",
    "in",
    "instanceof",
    "new",
    "null",
    "return",
    "super",
    "switch",
    "this",
    "throw",
    "true",
    "try",
    "typeof",
    "var",
    "void",
    "while",
    "with",
    "yield",
];

/// Keywords that end an expression, so a following `/` divides.
pub(crate) const VALUE_KEYWORDS: &[&str] = &["this", "super", "null", "true", "false"];

pub(crate) fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}
