//! Context-sensitive tokenizer.
//!
//! The lexer is pull-based: [`Lexer::next_token`] produces one token at a time and the whole
//! scanning state is a small `Copy` value ([`LexState`]), so callers can save it, lex ahead
//! speculatively and rewind. That is how the stripper looks ahead to tell generics from
//! comparisons and how it switches into the JSX modes.
//!
//! Regex versus divide is decided from the previous significant token alone. Template literal
//! holes are not tracked here: a `}` always lexes as a punctuator, and the stripper, which knows
//! when that `}` closes a `${`, asks for [`Lexer::template_continuation`] instead.

use unicode_xid::UnicodeXID;

use crate::{
    StripError,
    token::{CommentKind, Position, Span, TemplatePart, Token, TokenKind, VALUE_KEYWORDS, is_keyword},
    utf16::LineIndex,
};

/// Constructs that can run off the end of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unterminated {
    String,
    Template,
    BlockComment,
    Regex,
    JsxString,
}

impl std::fmt::Display for Unterminated {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unterminated::String => write!(f, "unterminated string literal"),
            Unterminated::Template => write!(f, "unterminated template literal"),
            Unterminated::BlockComment => write!(f, "unterminated block comment"),
            Unterminated::Regex => write!(f, "unterminated regular expression"),
            Unterminated::JsxString => write!(f, "unterminated JSX attribute string"),
        }
    }
}

/// Everything needed to resume lexing from a given point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexState {
    pos: usize,
    regex_allowed: bool,
    after_dot: bool,
}

impl LexState {
    pub fn pos(&self) -> usize {
        self.pos
    }
}

/// Punctuators, longest first so the first prefix match wins.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "%=", "&=", "|=",
    "^=", "<<", ">>", "**", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-", "*",
    "%", "&", "|", "^", "!", "~", "?", ":", "=", ".", "@", "#",
];

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    index: &'a LineIndex<'a>,
    state: LexState,
}

impl<'a> Lexer<'a> {
    pub fn new(index: &'a LineIndex<'a>) -> Self {
        let src = index.source();
        Self {
            src,
            bytes: src.as_bytes(),
            index,
            state: LexState {
                pos: 0,
                regex_allowed: true,
                after_dot: false,
            },
        }
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    pub fn position(&self, byte: usize) -> Position {
        self.index.position(byte)
    }

    pub fn state(&self) -> LexState {
        self.state
    }

    pub fn restore(&mut self, state: LexState) {
        self.state = state;
    }

    /// Resume right after a single `>` of a compound token such as `>>` or `>=`.
    pub fn resume_after_gt(&mut self, gt: usize) {
        self.state = LexState {
            pos: gt + 1,
            regex_allowed: false,
            after_dot: false,
        };
    }

    /// Lex the next token in regular JavaScript mode.
    pub fn next_token(&mut self) -> Result<Token, StripError> {
        let trivia_start = self.state.pos;
        let newline_before = self.skip_whitespace();
        let start = self.state.pos;

        let Some(&b) = self.bytes.get(start) else {
            return Ok(self.token(TokenKind::Eof, trivia_start, start, start, newline_before));
        };

        let kind = match b {
            b'/' => match self.bytes.get(start + 1) {
                Some(b'/') => self.line_comment(),
                Some(b'*') => self.block_comment()?,
                _ if self.state.regex_allowed => self.regex()?,
                _ => self.punct(),
            },
            b'#' if start == 0 && self.bytes.get(1) == Some(&b'!') => self.line_comment(),
            b'#' if self.ident_starts_at(start + 1) => {
                self.state.pos += 1;
                self.ident_tail();
                TokenKind::PrivateName
            }
            b'\'' | b'"' => self.string()?,
            b'`' => {
                self.state.pos += 1;
                self.template_body(start, TemplatePart::NoSubstitution, TemplatePart::Head)?
            }
            b'0'..=b'9' => self.number(),
            b'.' if matches!(self.bytes.get(start + 1), Some(b'0'..=b'9')) => self.number(),
            _ if self.ident_starts_at(start) => {
                self.ident_tail();
                let word = &self.src[start..self.state.pos];
                if !self.state.after_dot && is_keyword(word) {
                    TokenKind::Keyword
                } else {
                    TokenKind::Ident
                }
            }
            _ => self.punct(),
        };

        let end = self.state.pos;
        if !matches!(kind, TokenKind::Comment(_)) {
            self.after_significant(kind, start, end);
        }
        Ok(self.token(kind, trivia_start, start, end, newline_before))
    }

    /// Re-lex from a `}` that closes a template hole, producing a `Middle` or `Tail` token.
    pub fn template_continuation(&mut self, close_brace: usize) -> Result<Token, StripError> {
        self.state.pos = close_brace + 1;
        let kind = self.template_body(close_brace, TemplatePart::Tail, TemplatePart::Middle)?;
        let end = self.state.pos;
        self.after_significant(kind, close_brace, end);
        Ok(self.token(kind, close_brace, close_brace, end, false))
    }

    /// Lex inside a JSX tag: names may contain `-`, strings have no escapes and every
    /// punctuator is a single character.
    pub fn jsx_tag_token(&mut self) -> Result<Token, StripError> {
        let trivia_start = self.state.pos;
        let newline_before = self.skip_whitespace();
        let start = self.state.pos;

        let Some(&b) = self.bytes.get(start) else {
            return Ok(self.token(TokenKind::Eof, trivia_start, start, start, newline_before));
        };

        let kind = match b {
            b'/' if self.bytes.get(start + 1) == Some(&b'/') => self.line_comment(),
            b'/' if self.bytes.get(start + 1) == Some(&b'*') => self.block_comment()?,
            b'\'' | b'"' => {
                let close = memchr::memchr(b, &self.bytes[start + 1..]).ok_or_else(|| {
                    self.malformed(Unterminated::JsxString, start)
                })?;
                self.state.pos = start + 1 + close + 1;
                TokenKind::String
            }
            _ if self.ident_starts_at(start) => {
                loop {
                    self.ident_tail();
                    if self.bytes.get(self.state.pos) == Some(&b'-') {
                        self.state.pos += 1;
                    } else {
                        break;
                    }
                }
                TokenKind::Ident
            }
            _ => {
                self.state.pos += self.char_len_at(start);
                TokenKind::Punct
            }
        };

        if !matches!(kind, TokenKind::Comment(_)) {
            self.state.regex_allowed = &self.src[start..self.state.pos] == "{";
            self.state.after_dot = false;
        }
        Ok(self.token(kind, trivia_start, start, self.state.pos, newline_before))
    }

    /// Lex between JSX tags: either a single `{` / `<`, or a run of raw text.
    pub fn jsx_child_token(&mut self) -> Result<Token, StripError> {
        let start = self.state.pos;
        let kind = match self.bytes.get(start) {
            None => TokenKind::Eof,
            Some(b'{') | Some(b'<') => {
                self.state.pos += 1;
                TokenKind::Punct
            }
            Some(_) => {
                let rest = &self.bytes[start..];
                let len = memchr::memchr2(b'{', b'<', rest).unwrap_or(rest.len());
                self.state.pos += len;
                TokenKind::JsxText
            }
        };
        self.state.regex_allowed = kind == TokenKind::Punct && self.bytes[start] == b'{';
        self.state.after_dot = false;
        Ok(self.token(kind, start, start, self.state.pos, false))
    }

    fn token(
        &self,
        kind: TokenKind,
        trivia_start: usize,
        start: usize,
        end: usize,
        newline_before: bool,
    ) -> Token {
        Token {
            kind,
            span: Span::new(start, end),
            trivia_start,
            start: self.index.position(start),
            end: self.index.position(end),
            newline_before,
        }
    }

    fn malformed(&self, unterminated: Unterminated, at: usize) -> StripError {
        StripError::MalformedSource {
            unterminated,
            position: self.index.position(at),
        }
    }

    /// Update the regex/divide and property-name state after a significant token.
    fn after_significant(&mut self, kind: TokenKind, start: usize, end: usize) {
        let text = &self.src[start..end];
        self.state.regex_allowed = match kind {
            TokenKind::Ident
            | TokenKind::Number
            | TokenKind::String
            | TokenKind::Regex
            | TokenKind::PrivateName
            | TokenKind::JsxText
            | TokenKind::Template(TemplatePart::NoSubstitution)
            | TokenKind::Template(TemplatePart::Tail) => false,
            TokenKind::Keyword => !VALUE_KEYWORDS.contains(&text),
            TokenKind::Punct => !matches!(text, ")" | "]" | "++" | "--"),
            _ => true,
        };
        self.state.after_dot = kind == TokenKind::Punct && matches!(text, "." | "?.");
    }

    /// Skip whitespace; report whether a line terminator was crossed.
    fn skip_whitespace(&mut self) -> bool {
        let mut newline = false;
        while let Some(&b) = self.bytes.get(self.state.pos) {
            match b {
                b' ' | b'\t' | b'\x0b' | b'\x0c' => self.state.pos += 1,
                b'\n' | b'\r' => {
                    newline = true;
                    self.state.pos += 1;
                }
                _ if b >= 0x80 => {
                    let ch = self.char_at(self.state.pos);
                    if ch == '\u{2028}' || ch == '\u{2029}' {
                        newline = true;
                    } else if !(ch.is_whitespace() || ch == '\u{feff}') {
                        break;
                    }
                    self.state.pos += ch.len_utf8();
                }
                _ => break,
            }
        }
        newline
    }

    fn line_comment(&mut self) -> TokenKind {
        let rest = &self.bytes[self.state.pos..];
        let len = memchr::memchr2(b'\n', b'\r', rest).unwrap_or(rest.len());
        self.state.pos += len;
        TokenKind::Comment(CommentKind::Line)
    }

    fn block_comment(&mut self) -> Result<TokenKind, StripError> {
        let start = self.state.pos;
        let body = &self.bytes[start + 2..];
        let close = memchr::memmem::find(body, b"*/")
            .ok_or_else(|| self.malformed(Unterminated::BlockComment, start))?;
        self.state.pos = start + 2 + close + 2;

        let kind = if body.starts_with(b"::") || body.starts_with(b"flow-include") {
            CommentKind::TypeInclude
        } else if body.starts_with(b":") {
            CommentKind::TypeAnnotation
        } else {
            CommentKind::Block
        };
        Ok(TokenKind::Comment(kind))
    }

    fn string(&mut self) -> Result<TokenKind, StripError> {
        let start = self.state.pos;
        let quote = self.bytes[start];
        let mut i = start + 1;
        loop {
            match self.bytes.get(i) {
                None | Some(b'\n') | Some(b'\r') => {
                    return Err(self.malformed(Unterminated::String, start));
                }
                Some(&b) if b == quote => {
                    self.state.pos = i + 1;
                    return Ok(TokenKind::String);
                }
                Some(b'\\') => i = self.skip_escape(i),
                Some(_) => i += 1,
            }
        }
    }

    /// Skip a backslash escape starting at `i`, treating `\r\n` as one line continuation.
    fn skip_escape(&self, i: usize) -> usize {
        match self.bytes.get(i + 1) {
            None => i + 1,
            Some(b'\r') if self.bytes.get(i + 2) == Some(&b'\n') => i + 3,
            Some(_) => i + 1 + self.char_len_at(i + 1),
        }
    }

    /// Scan template characters up to the closing backtick or the next `${`.
    fn template_body(
        &mut self,
        start: usize,
        closed: TemplatePart,
        open_hole: TemplatePart,
    ) -> Result<TokenKind, StripError> {
        let mut i = self.state.pos;
        loop {
            let rest = &self.bytes[i..];
            let Some(hit) = memchr::memchr3(b'`', b'$', b'\\', rest) else {
                return Err(self.malformed(Unterminated::Template, start));
            };
            i += hit;
            match self.bytes[i] {
                b'`' => {
                    self.state.pos = i + 1;
                    return Ok(TokenKind::Template(closed));
                }
                b'$' if self.bytes.get(i + 1) == Some(&b'{') => {
                    self.state.pos = i + 2;
                    return Ok(TokenKind::Template(open_hole));
                }
                b'\\' => i = self.skip_escape(i),
                _ => i += 1,
            }
        }
    }

    fn regex(&mut self) -> Result<TokenKind, StripError> {
        let start = self.state.pos;
        let mut i = start + 1;
        let mut in_class = false;
        loop {
            match self.bytes.get(i) {
                None | Some(b'\n') | Some(b'\r') => {
                    return Err(self.malformed(Unterminated::Regex, start));
                }
                Some(b'\\') => {
                    if matches!(self.bytes.get(i + 1), None | Some(b'\n') | Some(b'\r')) {
                        return Err(self.malformed(Unterminated::Regex, start));
                    }
                    i += 1 + self.char_len_at(i + 1);
                }
                Some(b'[') => {
                    in_class = true;
                    i += 1;
                }
                Some(b']') => {
                    in_class = false;
                    i += 1;
                }
                Some(b'/') if !in_class => {
                    self.state.pos = i + 1;
                    self.ident_tail();
                    return Ok(TokenKind::Regex);
                }
                Some(_) => i += 1,
            }
        }
    }

    fn number(&mut self) -> TokenKind {
        let bytes = self.bytes;
        let mut i = self.state.pos;
        let hex = bytes.get(i) == Some(&b'0') && matches!(bytes.get(i + 1), Some(b'x' | b'X'));
        while let Some(&b) = bytes.get(i) {
            match b {
                b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'.' => i += 1,
                b'+' | b'-' if !hex && matches!(bytes.get(i - 1), Some(b'e' | b'E')) => i += 1,
                _ => break,
            }
        }
        self.state.pos = i;
        TokenKind::Number
    }

    fn punct(&mut self) -> TokenKind {
        let start = self.state.pos;
        let rest = &self.src[start..];
        let len = PUNCTUATORS
            .iter()
            .find(|p| rest.starts_with(**p))
            .map(|p| p.len())
            // `a?.5:b` is a conditional, not optional chaining.
            .map(|len| {
                if rest.starts_with("?.") && matches!(self.bytes.get(start + 2), Some(b'0'..=b'9'))
                {
                    1
                } else {
                    len
                }
            })
            .unwrap_or_else(|| self.char_len_at(start));
        self.state.pos += len;
        TokenKind::Punct
    }

    fn ident_starts_at(&self, i: usize) -> bool {
        match self.bytes.get(i) {
            Some(b'a'..=b'z' | b'A'..=b'Z' | b'$' | b'_' | b'\\') => true,
            Some(&b) if b >= 0x80 => self.char_at(i).is_xid_start(),
            _ => false,
        }
    }

    fn ident_tail(&mut self) {
        while let Some(&b) = self.bytes.get(self.state.pos) {
            match b {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'$' | b'_' => self.state.pos += 1,
                b'\\' => {
                    // `\uXXXX` or `\u{...}`
                    self.state.pos += 1;
                    if self.bytes.get(self.state.pos) == Some(&b'u') {
                        self.state.pos += 1;
                        if self.bytes.get(self.state.pos) == Some(&b'{') {
                            let rest = &self.bytes[self.state.pos..];
                            self.state.pos += memchr::memchr(b'}', rest).map_or(rest.len(), |i| i + 1);
                        }
                    }
                }
                _ if b >= 0x80 => {
                    let ch = self.char_at(self.state.pos);
                    if ch.is_xid_continue() || ch == '\u{200c}' || ch == '\u{200d}' {
                        self.state.pos += ch.len_utf8();
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    fn char_at(&self, i: usize) -> char {
        self.src[i..].chars().next().unwrap_or('\0')
    }

    fn char_len_at(&self, i: usize) -> usize {
        self.src[i..].chars().next().map_or(1, char::len_utf8)
    }
}

/// Tokenize `source` in regular mode, comments included, ending with an `Eof` token.
///
/// Template continuations and JSX regions need the stripper's context, so a standalone token
/// dump lexes a `}` inside a template hole as a punctuator.
pub fn tokenize(source: &str) -> Result<Vec<Token>, StripError> {
    let index = LineIndex::new(source);
    let mut lexer = Lexer::new(&index);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        tokens.push(token);
        if token.is_eof() {
            return Ok(tokens);
        }
    }
}
