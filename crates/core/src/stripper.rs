//! The stripping state machine.
//!
//! [`strip_ranges`] walks the token stream once and records the byte ranges of type-only syntax.
//! It is not a parser. It keeps an explicit stack of bracket contexts (block, object literal,
//! parameter list, class body, template hole, JSX container, ...) and decides from that context
//! and a few tokens of lookahead what a `:`, `?`, `<` or `{` means. Type expressions themselves
//! are skipped with a small recursive-descent recognizer ([`Stripper::skip_type`]) that only
//! needs to know where a type ends.
//!
//! Speculative questions ("is this `<` a type argument list followed by `(`?") are answered by
//! running the recognizer from a cursor checkpoint and rewinding afterwards.

use tracing::trace;

use crate::{
    StripError,
    cursor::Cursor,
    edit::StripRange,
    lexer::{Lexer, Unterminated},
    token::{Position, Span, TemplatePart, Token, TokenKind, VALUE_KEYWORDS},
    utf16::LineIndex,
};

/// Maximum depth of the bracket context stack.
const MAX_NESTING: usize = 1024;
/// Maximum depth of nested type expressions and generic lists.
const MAX_TYPE_NESTING: usize = 256;
/// Maximum depth of JSX elements plus nested walks (class keys, heritage, JSX containers).
/// Each level recurses, so this is far below [`MAX_NESTING`].
const MAX_RECURSION: usize = 128;

/// Contextual words that may prefix a class member.
const CLASS_MODIFIERS: &[&str] = &["static", "async", "get", "set", "declare"];

/// Words that may follow `declare` at statement level.
const DECLARABLE: &[&str] = &[
    "class",
    "function",
    "var",
    "let",
    "const",
    "module",
    "type",
    "opaque",
    "interface",
    "export",
    "enum",
];

/// Keywords whose parenthesized head is followed by a statement body.
const CONTROL_KEYWORDS: &[&str] = &["if", "for", "while", "switch", "catch", "with"];

/// Collect the ranges of type-only syntax in the source, unsorted.
///
/// `/*:: */` include comments are part of the result. The `@flow` pragma is not.
pub fn strip_ranges(index: &LineIndex<'_>) -> Result<Vec<StripRange>, StripError> {
    let mut stripper = Stripper::new(index);
    stripper.walk(1)?;
    Ok(stripper.finish())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParenKind {
    /// Formal parameters of a function, method or object method.
    Params,
    /// Parenthesized expression, call arguments or arrow parameters.
    Expr,
    /// Head of `if` / `for` / `while` / `switch` / `catch` / `with`.
    Control,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ctx {
    Program,
    Block,
    ClassBody,
    Object,
    Paren(ParenKind),
    Bracket,
    TemplateHole,
    JsxElement,
    JsxExpr,
    /// Initializer of a class field, ended by `;`, `}` or a new member on the next line.
    FieldInit,
}

/// What to look for right after a frame's closing bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnClose {
    Nothing,
    /// `: Type` (and `%checks`) after formal parameters.
    ReturnType,
    /// `: Type =>` after a parenthesized expression that turns out to be arrow parameters.
    ArrowReturnType,
    /// A `{` that follows is a block.
    Body,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    ctx: Ctx,
    open: Token,
    on_close: OnClose,
    /// Program / Block: the next token starts a statement.
    stmt_start: bool,
    /// Object: the next token starts a property. ClassBody: the next token starts a member.
    key_position: bool,
    /// Program / Block: inside a `var` / `let` / `const` declaration.
    decl_binding: bool,
    /// Program / Block: past the `=` of the current declarator.
    decl_init: bool,
    /// Program / Block: a `case` label waits for its colon.
    case_pending: bool,
    /// Ternary `?`s at this level still waiting for their `:`.
    ternaries: u32,
}

impl Frame {
    fn new(ctx: Ctx, open: Token, on_close: OnClose) -> Self {
        Self {
            ctx,
            open,
            on_close,
            stmt_start: matches!(ctx, Ctx::Program | Ctx::Block),
            key_position: matches!(ctx, Ctx::Object | Ctx::ClassBody),
            decl_binding: false,
            decl_init: false,
            case_pending: false,
            ternaries: 0,
        }
    }
}

struct Stripper<'a> {
    cursor: Cursor<'a>,
    stack: Vec<Frame>,
    ranges: Vec<StripRange>,
    prev: Option<Token>,
    /// The last consumed token can end an expression.
    prev_ends_expr: bool,
    /// The next `{` opens a block rather than an object literal.
    block_next: bool,
    /// The next `(` opens the head of a control statement.
    control_paren: bool,
    /// Current type / generic nesting depth.
    depth: usize,
    /// Current JSX / nested walk depth.
    recursion: usize,
    /// Inside the callee of `new`, where `<` always starts type arguments.
    new_callee: bool,
}

fn unbalanced(reason: &'static str, position: Position) -> StripError {
    StripError::UnbalancedSyntax { reason, position }
}

fn ends_expression(token: &Token, text: &str) -> bool {
    match token.kind {
        TokenKind::Ident
        | TokenKind::Number
        | TokenKind::String
        | TokenKind::Regex
        | TokenKind::PrivateName
        | TokenKind::Template(TemplatePart::NoSubstitution | TemplatePart::Tail) => true,
        TokenKind::Keyword => VALUE_KEYWORDS.contains(&text),
        TokenKind::Punct => matches!(text, ")" | "]" | "}" | "++" | "--"),
        _ => false,
    }
}

fn closer_for(open: &str) -> &'static str {
    match open {
        "(" => ")",
        "[" => "]",
        _ => "}",
    }
}

fn unclosed(open: &str) -> &'static str {
    match open {
        "(" => "unclosed `(`",
        "[" => "unclosed `[`",
        _ => "unclosed `{`",
    }
}

fn unexpected(close: &str) -> &'static str {
    match close {
        ")" => "unexpected `)`",
        "]" => "unexpected `]`",
        _ => "unexpected `}`",
    }
}

impl<'a> Stripper<'a> {
    fn new(index: &'a LineIndex<'a>) -> Self {
        let origin = Token {
            kind: TokenKind::Eof,
            span: Span::new(0, 0),
            trivia_start: 0,
            start: Position { line: 1, column: 1 },
            end: Position { line: 1, column: 1 },
            newline_before: false,
        };
        Self {
            cursor: Cursor::new(Lexer::new(index)),
            stack: vec![Frame::new(Ctx::Program, origin, OnClose::Nothing)],
            ranges: Vec::new(),
            prev: None,
            prev_ends_expr: false,
            block_next: false,
            control_paren: false,
            depth: 0,
            recursion: 0,
            new_callee: false,
        }
    }

    fn finish(self) -> Vec<StripRange> {
        let mut ranges = self.ranges;
        for include in self.cursor.into_includes() {
            trace!(start = include.start, end = include.end, "strip include comment");
            ranges.push(StripRange::new(include.start, include.end));
        }
        ranges
    }

    fn text(&self, token: &Token) -> &'a str {
        self.cursor.text(token)
    }

    // The program frame is never popped, so the stack is never empty.
    fn top(&self) -> &Frame {
        &self.stack[self.stack.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn push(&mut self, ctx: Ctx, open: Token, on_close: OnClose) -> Result<(), StripError> {
        if self.stack.len() >= MAX_NESTING {
            return Err(unbalanced("brackets nested too deeply", open.start));
        }
        self.stack.push(Frame::new(ctx, open, on_close));
        Ok(())
    }

    /// Consume a runtime token.
    fn advance(&mut self) -> Result<Token, StripError> {
        let token = self.cursor.bump()?;
        self.top_mut().stmt_start = false;
        self.block_next = false;
        self.control_paren = false;
        let text = self.text(&token);
        self.new_callee = match text {
            "new" => token.kind == TokenKind::Keyword,
            "." => self.new_callee,
            _ => self.new_callee && token.is_word(),
        };
        self.prev_ends_expr = ends_expression(&token, text);
        self.prev = Some(token);
        Ok(token)
    }

    fn strip(&mut self, start: usize, end: usize) {
        self.push_range(StripRange::new(start, end));
    }

    fn push_range(&mut self, range: StripRange) {
        if range.start >= range.end {
            return;
        }
        trace!(
            start = range.start,
            end = range.end,
            text = &self.cursor.source()[range.start..range.end],
            "strip"
        );
        self.ranges.push(range);
    }

    /// Run `f` speculatively and rewind the cursor, whatever the outcome.
    fn lookahead<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, StripError>,
    ) -> Option<T> {
        let checkpoint = self.cursor.checkpoint();
        let (depth, recursion) = (self.depth, self.recursion);
        let result = f(self);
        self.cursor.rewind(checkpoint);
        self.depth = depth;
        self.recursion = recursion;
        result.ok()
    }

    fn descend(&mut self, at: Position) -> Result<(), StripError> {
        self.recursion += 1;
        if self.recursion > MAX_RECURSION {
            return Err(unbalanced("nested too deeply", at));
        }
        Ok(())
    }

    /// Walk until the frame just pushed is closed.
    fn walk_nested(&mut self, at: Position) -> Result<(), StripError> {
        self.descend(at)?;
        let floor = self.stack.len();
        self.walk(floor)?;
        self.recursion -= 1;
        Ok(())
    }

    fn walk(&mut self, floor: usize) -> Result<(), StripError> {
        while self.stack.len() >= floor {
            let token = self.cursor.peek()?;
            if token.is_eof() {
                return self.end_of_input();
            }
            let frame = *self.top();
            match frame.ctx {
                Ctx::ClassBody if frame.key_position => self.class_member(token)?,
                Ctx::FieldInit if self.ends_field(&frame, &token) => self.end_field(token)?,
                Ctx::Program | Ctx::Block if self.at_statement_start(&frame, &token) => {
                    self.statement(token)?
                }
                _ => self.expression(token)?,
            }
        }
        Ok(())
    }

    fn end_of_input(&self) -> Result<(), StripError> {
        let frame = self.top();
        let reason = match frame.ctx {
            Ctx::Program => return Ok(()),
            Ctx::TemplateHole => {
                return Err(StripError::MalformedSource {
                    unterminated: Unterminated::Template,
                    position: frame.open.start,
                });
            }
            Ctx::Block | Ctx::ClassBody | Ctx::Object | Ctx::FieldInit => "unclosed `{`",
            Ctx::Paren(_) => "unclosed `(`",
            Ctx::Bracket => "unclosed `[`",
            Ctx::JsxExpr => "unclosed `{` in JSX",
            Ctx::JsxElement => "unclosed JSX element",
        };
        Err(unbalanced(reason, frame.open.start))
    }

    fn at_statement_start(&self, frame: &Frame, token: &Token) -> bool {
        frame.stmt_start || (token.newline_before && self.prev_ends_expr)
    }

    /// The current statement was consumed without leaving runtime tokens behind.
    fn statement_done(&mut self) {
        let frame = self.top_mut();
        frame.stmt_start = true;
        frame.decl_binding = false;
        frame.decl_init = false;
        frame.case_pending = false;
        frame.ternaries = 0;
        self.prev = None;
        self.prev_ends_expr = false;
        self.block_next = false;
        self.new_callee = false;
    }

    fn statement(&mut self, token: Token) -> Result<(), StripError> {
        let text = self.text(&token);
        let next = self.cursor.peek_nth(1);
        let next_text = next.map(|t| self.text(&t)).unwrap_or("");
        let next_is_name = next.is_some_and(|t| t.kind == TokenKind::Ident && !t.newline_before);
        self.new_callee = false;
        {
            let frame = self.top_mut();
            frame.decl_binding = false;
            frame.decl_init = false;
            frame.case_pending = false;
        }

        match (token.kind, text) {
            (TokenKind::Ident, "type") if next_is_name => {
                self.strip_statement(token, Self::skip_type_alias)
            }
            (TokenKind::Ident, "opaque") if next_is_name && next_text == "type" => {
                self.strip_statement(token, Self::skip_opaque_type)
            }
            (TokenKind::Ident, "interface") if next_is_name => {
                self.strip_statement(token, Self::skip_interface)
            }
            (TokenKind::Ident, "declare")
                if next.is_some_and(|t| t.is_word() && !t.newline_before)
                    && DECLARABLE.contains(&next_text) =>
            {
                self.strip_statement(token, Self::skip_declare)
            }
            (TokenKind::Keyword, "import") if !matches!(next_text, "(" | ".") => {
                self.import_declaration(token)
            }
            (TokenKind::Keyword, "export") => self.export_declaration(token, next_text),
            (TokenKind::Keyword, "var" | "const") | (TokenKind::Ident, "let")
                if next.is_some_and(|t| t.is_word()) || matches!(next_text, "{" | "[") =>
            {
                self.advance()?;
                self.top_mut().decl_binding = true;
                Ok(())
            }
            (TokenKind::Keyword, "case") => {
                self.advance()?;
                self.top_mut().case_pending = true;
                Ok(())
            }
            (TokenKind::Keyword, "default") if next_text == ":" => {
                self.advance()?;
                self.advance()?;
                self.top_mut().stmt_start = true;
                Ok(())
            }
            _ => self.expression(token),
        }
    }

    /// Skip a whole declaration with `skip`, take an optional `;`, and strip all of it.
    fn strip_statement(
        &mut self,
        first: Token,
        skip: impl FnOnce(&mut Self) -> Result<(), StripError>,
    ) -> Result<(), StripError> {
        skip(self)?;
        self.cursor.eat(";")?;
        self.strip(first.span.start, self.cursor.last_end());
        self.statement_done();
        Ok(())
    }

    fn import_declaration(&mut self, import: Token) -> Result<(), StripError> {
        self.cursor.bump()?;
        let first = self.cursor.peek()?;
        if matches!(self.text(&first), "type" | "typeof") && self.is_type_import() {
            return self.strip_statement(import, |s| {
                s.cursor.bump()?;
                s.skip_import_clause()?;
                s.skip_module_source()
            });
        }

        let mut runtime = 0usize;
        let mut typed: Vec<(usize, usize)> = Vec::new();
        if first.kind == TokenKind::String {
            self.cursor.bump()?;
            runtime += 1;
        } else {
            if first.is_word() && self.text(&first) != "from" || self.is_default_named_from()? {
                self.cursor.bump()?;
                runtime += 1;
                self.cursor.eat(",")?;
            }
            if self.cursor.eat("*")? {
                self.expect("as", "expected `as` after `*`")?;
                self.bump_word("expected a namespace name")?;
                runtime += 1;
            }
            if self.cursor.at("{")? {
                self.import_specifiers(&mut runtime, &mut typed)?;
            }
            self.skip_module_source()?;
        }
        self.cursor.eat(";")?;

        if runtime == 0 && !typed.is_empty() {
            self.strip(import.span.start, self.cursor.last_end());
        } else {
            for (start, end) in typed {
                self.strip(start, end);
            }
        }
        self.statement_done();
        Ok(())
    }

    /// `import from from 'm'` binds a default export named `from`.
    fn is_default_named_from(&mut self) -> Result<bool, StripError> {
        if !self.cursor.at("from")? {
            return Ok(false);
        }
        Ok(self
            .cursor
            .peek_nth(1)
            .is_some_and(|t| self.text(&t) == "from"))
    }

    /// After `import`, with `type` / `typeof` peeked: is this a type-only import?
    fn is_type_import(&mut self) -> bool {
        let Some(next) = self.cursor.peek_nth(1) else {
            return false;
        };
        match self.text(&next) {
            "{" | "*" => true,
            // `import type from 'm'` imports a default export named `type`.
            "from" => self
                .cursor
                .peek_nth(2)
                .is_some_and(|t| t.kind != TokenKind::String),
            _ => next.is_word(),
        }
    }

    /// `Default`, `{ ... }`, `* as ns` or `Default, { ... }` of a type import.
    fn skip_import_clause(&mut self) -> Result<(), StripError> {
        if self.cursor.at("{")? {
            return self.skip_balanced();
        }
        if self.cursor.eat("*")? {
            self.expect("as", "expected `as` after `*`")?;
            return self.bump_word("expected a namespace name");
        }
        self.bump_word("expected an import binding")?;
        if self.cursor.eat(",")? {
            return self.skip_import_clause();
        }
        Ok(())
    }

    /// `from 'module'` plus optional import attributes.
    fn skip_module_source(&mut self) -> Result<(), StripError> {
        self.expect("from", "expected `from`")?;
        let source = self.cursor.peek()?;
        if source.kind != TokenKind::String {
            return Err(unbalanced("expected a module specifier", source.start));
        }
        self.cursor.bump()?;
        let t = self.cursor.peek()?;
        if matches!(self.text(&t), "with" | "assert") && !t.newline_before {
            self.cursor.bump()?;
            self.expect_balanced("{")?;
        }
        Ok(())
    }

    /// `{ a, type B, typeof C as D }`: counts runtime specifiers and records typed ones,
    /// each with its trailing comma and whitespace.
    fn import_specifiers(
        &mut self,
        runtime: &mut usize,
        typed: &mut Vec<(usize, usize)>,
    ) -> Result<(), StripError> {
        let open = self.cursor.bump()?;
        loop {
            let t = self.cursor.peek()?;
            if t.is_eof() {
                return Err(unbalanced("unclosed `{`", open.start));
            }
            if self.cursor.eat("}")? {
                return Ok(());
            }
            let is_type = matches!(self.text(&t), "type" | "typeof")
                && self.cursor.peek_nth(1).is_some_and(|n| {
                    (n.is_word() || n.kind == TokenKind::String) && self.text(&n) != "as"
                });
            if is_type {
                self.cursor.bump()?;
            }
            let name = self.cursor.bump()?;
            if !(name.is_word() || name.kind == TokenKind::String) {
                return Err(unbalanced("expected an import specifier", name.start));
            }
            if self.cursor.eat("as")? {
                self.bump_word("expected a local binding name")?;
            }
            let comma = self.cursor.eat(",")?;
            if is_type {
                let end = if comma {
                    self.skip_whitespace(self.cursor.last_end())
                } else {
                    self.cursor.last_end()
                };
                typed.push((t.span.start, end));
            } else {
                *runtime += 1;
            }
            if !comma && !self.cursor.at("}")? {
                let t = self.cursor.peek()?;
                return Err(unbalanced("expected `,` or `}`", t.start));
            }
        }
    }

    fn export_declaration(&mut self, export: Token, next_text: &str) -> Result<(), StripError> {
        match next_text {
            "type" => {
                let third = self.cursor.peek_nth(2);
                match third.map(|t| (t.kind, self.text(&t))) {
                    Some((_, "{" | "*")) => {
                        return self.strip_statement(export, |s| {
                            s.cursor.bump()?;
                            s.cursor.bump()?;
                            if s.cursor.at("{")? {
                                s.skip_balanced()?;
                            } else {
                                s.cursor.bump()?;
                                if s.cursor.eat("as")? {
                                    s.bump_word("expected a namespace name")?;
                                }
                            }
                            if s.cursor.at("from")? {
                                s.skip_module_source()?;
                            }
                            Ok(())
                        });
                    }
                    Some((TokenKind::Ident, _)) => {
                        return self.strip_statement(export, |s| {
                            s.cursor.bump()?;
                            s.skip_type_alias()
                        });
                    }
                    _ => {}
                }
            }
            "interface" => {
                return self.strip_statement(export, |s| {
                    s.cursor.bump()?;
                    s.skip_interface()
                });
            }
            "opaque" => {
                return self.strip_statement(export, |s| {
                    s.cursor.bump()?;
                    s.skip_opaque_type()
                });
            }
            "{" | "*" => {
                self.advance()?;
                if self.cursor.at("{")? {
                    self.skip_balanced()?;
                } else {
                    self.cursor.bump()?;
                    if self.cursor.eat("as")? {
                        self.bump_word("expected a namespace name")?;
                    }
                }
                if self.cursor.at("from")? {
                    self.skip_module_source()?;
                }
                self.cursor.eat(";")?;
                self.statement_done();
                return Ok(());
            }
            "default" => {
                self.advance()?;
                self.advance()?;
                return Ok(());
            }
            _ => {}
        }
        self.advance()?;
        self.top_mut().stmt_start = true;
        Ok(())
    }

    fn expression(&mut self, token: Token) -> Result<(), StripError> {
        let text = self.text(&token);
        match token.kind {
            TokenKind::Punct => self.punctuator(token, text),
            TokenKind::Keyword => self.keyword(text),
            TokenKind::Ident => self.identifier(token, text),
            TokenKind::Template(TemplatePart::Head) => {
                self.advance()?;
                self.push(Ctx::TemplateHole, token, OnClose::Nothing)
            }
            _ => self.advance().map(drop),
        }
    }

    fn punctuator(&mut self, token: Token, text: &str) -> Result<(), StripError> {
        match text {
            "{" => {
                let frame = *self.top();
                let block = self.block_next
                    || (matches!(frame.ctx, Ctx::Program | Ctx::Block)
                        && self.at_statement_start(&frame, &token));
                self.advance()?;
                self.push(
                    if block { Ctx::Block } else { Ctx::Object },
                    token,
                    OnClose::Nothing,
                )
            }
            "(" => {
                let frame = *self.top();
                let kind = if frame.ctx == Ctx::Object && frame.key_position {
                    ParenKind::Params
                } else if self.control_paren {
                    ParenKind::Control
                } else {
                    ParenKind::Expr
                };
                self.advance()?;
                self.open_paren(token, kind)
            }
            ")" | "]" | "}" => self.close(token, text),
            "[" => {
                self.advance()?;
                self.push(Ctx::Bracket, token, OnClose::Nothing)
            }
            "?" => self.question(token),
            ":" => self.colon(token),
            ";" => {
                self.advance()?;
                let frame = self.top_mut();
                frame.ternaries = 0;
                if matches!(frame.ctx, Ctx::Program | Ctx::Block) {
                    frame.stmt_start = true;
                    frame.decl_binding = false;
                    frame.decl_init = false;
                    frame.case_pending = false;
                }
                Ok(())
            }
            "," => {
                self.advance()?;
                let frame = self.top_mut();
                match frame.ctx {
                    Ctx::Object => frame.key_position = true,
                    Ctx::Program | Ctx::Block if frame.ternaries == 0 => frame.decl_init = false,
                    _ => {}
                }
                Ok(())
            }
            "=" => {
                self.advance()?;
                let frame = self.top_mut();
                match frame.ctx {
                    Ctx::Object => frame.key_position = false,
                    Ctx::Program | Ctx::Block if frame.decl_binding => frame.decl_init = true,
                    _ => {}
                }
                Ok(())
            }
            "<" => self.less_than(),
            "=>" => {
                self.advance()?;
                self.block_next = true;
                Ok(())
            }
            _ => self.advance().map(drop),
        }
    }

    fn open_paren(&mut self, open: Token, kind: ParenKind) -> Result<(), StripError> {
        let on_close = match kind {
            ParenKind::Params => OnClose::ReturnType,
            ParenKind::Expr => OnClose::ArrowReturnType,
            ParenKind::Control => OnClose::Body,
        };
        self.push(Ctx::Paren(kind), open, on_close)?;
        if kind == ParenKind::Params {
            self.this_param()?;
        }
        Ok(())
    }

    fn close(&mut self, token: Token, text: &str) -> Result<(), StripError> {
        let frame = *self.top();
        let expected = match frame.ctx {
            Ctx::Paren(_) => ")",
            Ctx::Bracket => "]",
            Ctx::Block | Ctx::ClassBody | Ctx::Object | Ctx::TemplateHole | Ctx::JsxExpr => "}",
            Ctx::Program | Ctx::JsxElement | Ctx::FieldInit => "",
        };
        if text != expected {
            return Err(unbalanced(unexpected(text), token.start));
        }

        if frame.ctx == Ctx::TemplateHole {
            let part = self.cursor.template_continuation(&token, &frame.open)?;
            self.prev = Some(part);
            if part.kind == TokenKind::Template(TemplatePart::Tail) {
                self.stack.pop();
                self.prev_ends_expr = true;
            } else {
                self.top_mut().ternaries = 0;
                self.prev_ends_expr = false;
            }
            return Ok(());
        }

        self.advance()?;
        self.stack.pop();
        if matches!(frame.ctx, Ctx::Block | Ctx::ClassBody) {
            match self.top().ctx {
                Ctx::Program | Ctx::Block => {
                    self.prev_ends_expr = false;
                    self.top_mut().stmt_start = true;
                }
                Ctx::ClassBody => {
                    self.prev_ends_expr = false;
                    self.top_mut().key_position = true;
                }
                _ => {}
            }
        }
        match frame.on_close {
            OnClose::Nothing => Ok(()),
            OnClose::ReturnType => self.return_type(),
            OnClose::ArrowReturnType => self.arrow_return_type(),
            OnClose::Body => {
                self.block_next = true;
                Ok(())
            }
        }
    }

    fn question(&mut self, token: Token) -> Result<(), StripError> {
        if matches!(self.top().ctx, Ctx::Paren(_))
            && self
                .cursor
                .peek_nth(1)
                .is_some_and(|n| matches!(self.text(&n), ":" | "," | ")" | "="))
        {
            // Optional parameter marker.
            self.cursor.bump()?;
            self.strip(token.span.start, token.span.end);
            return Ok(());
        }
        self.advance()?;
        self.top_mut().ternaries += 1;
        Ok(())
    }

    fn colon(&mut self, token: Token) -> Result<(), StripError> {
        let frame = *self.top();
        if frame.ternaries > 0 {
            self.advance()?;
            self.top_mut().ternaries -= 1;
            return Ok(());
        }
        match frame.ctx {
            Ctx::Paren(_) => self.strip_annotation(token),
            Ctx::Program | Ctx::Block if frame.case_pending => {
                self.advance()?;
                let frame = self.top_mut();
                frame.case_pending = false;
                frame.stmt_start = true;
                Ok(())
            }
            Ctx::Program | Ctx::Block if frame.decl_binding && !frame.decl_init => {
                self.strip_annotation(token)
            }
            Ctx::Program | Ctx::Block if frame.decl_binding => {
                Err(unbalanced("unexpected `:` in an initializer", token.start))
            }
            Ctx::Program | Ctx::Block => {
                // Label.
                self.advance()?;
                self.top_mut().stmt_start = true;
                Ok(())
            }
            Ctx::Object => {
                self.advance()?;
                self.top_mut().key_position = false;
                Ok(())
            }
            _ => self.advance().map(drop),
        }
    }

    fn strip_annotation(&mut self, colon: Token) -> Result<(), StripError> {
        self.cursor.bump()?;
        self.skip_type(true)?;
        self.strip(colon.span.start, self.cursor.last_end());
        Ok(())
    }

    fn return_type(&mut self) -> Result<(), StripError> {
        let colon = self.cursor.peek()?;
        if self.text(&colon) == ":" {
            self.cursor.bump()?;
            self.skip_return_annotation(true)?;
            self.strip(colon.span.start, self.cursor.last_end());
        }
        self.block_next = true;
        Ok(())
    }

    /// `T`, `T %checks` or a bare `%checks`, after the colon.
    fn skip_return_annotation(&mut self, arrow: bool) -> Result<(), StripError> {
        if !self.at_predicate()? {
            self.skip_type(arrow)?;
        }
        self.skip_predicate()
    }

    fn at_predicate(&mut self) -> Result<bool, StripError> {
        Ok(self.cursor.at("%")?
            && self
                .cursor
                .peek_nth(1)
                .is_some_and(|t| self.text(&t) == "checks"))
    }

    /// `%checks` or `%checks(expr)`.
    fn skip_predicate(&mut self) -> Result<(), StripError> {
        if !self.at_predicate()? {
            return Ok(());
        }
        self.cursor.bump()?;
        self.cursor.bump()?;
        let t = self.cursor.peek()?;
        if self.text(&t) == "(" && !t.newline_before {
            self.skip_balanced()?;
        }
        Ok(())
    }

    /// `(a, b): T => ...`: the colon after the closing paren is a return type only if a type
    /// followed by `=>` comes next.
    ///
    /// Inside a conditional's consequent, `a ? (b): c => d : e` has its colon claimed by the
    /// arrow only when the conditional still finds its own `:` after the arrow body.
    fn arrow_return_type(&mut self) -> Result<(), StripError> {
        let frame = *self.top();
        if frame.case_pending {
            return Ok(());
        }
        let colon = self.cursor.peek()?;
        if self.text(&colon) != ":" {
            return Ok(());
        }
        let in_conditional = frame.ternaries > 0;
        let arrow = self
            .lookahead(|s| {
                s.cursor.bump()?;
                s.skip_return_annotation(false)?;
                let t = s.cursor.peek()?;
                if s.text(&t) != "=>" {
                    return Ok(None);
                }
                if in_conditional {
                    s.cursor.bump()?;
                    if !s.alternate_ahead()? {
                        return Ok(None);
                    }
                }
                Ok(Some(t))
            })
            .flatten();
        let Some(arrow) = arrow else {
            return Ok(());
        };

        self.cursor.bump()?;
        self.skip_return_annotation(false)?;
        let between = &self.cursor.source()[colon.span.start..arrow.span.start];
        if between.contains(['\n', '\r']) {
            // A line break between `)` and `=>` is a syntax error; pull the arrow up.
            self.push_range(StripRange::moved(
                colon.span.start,
                arrow.span.end,
                arrow.span.start,
            ));
            self.advance()?;
            self.block_next = true;
        } else {
            self.strip(colon.span.start, self.cursor.last_end());
        }
        Ok(())
    }

    /// Scan an arrow body for the `:` of an enclosing conditional, stopping at the end of the
    /// expression.
    fn alternate_ahead(&mut self) -> Result<bool, StripError> {
        let mut pending = 0u32;
        loop {
            let t = self.cursor.peek()?;
            if t.is_eof() {
                return Ok(false);
            }
            if matches!(t.kind, TokenKind::Template(TemplatePart::Head)) {
                self.skip_balanced()?;
                continue;
            }
            match self.text(&t) {
                "(" | "[" | "{" => {
                    self.skip_balanced()?;
                    continue;
                }
                "?" => pending += 1,
                ":" if pending == 0 => return Ok(true),
                ":" => pending -= 1,
                ";" | "," | ")" | "]" | "}" => return Ok(false),
                _ => {}
            }
            self.cursor.bump()?;
        }
    }

    /// `this: T` as the first formal parameter, with its comma.
    fn this_param(&mut self) -> Result<(), StripError> {
        let this = self.cursor.peek()?;
        if self.text(&this) != "this"
            || !self
                .cursor
                .peek_nth(1)
                .is_some_and(|t| self.text(&t) == ":")
        {
            return Ok(());
        }
        self.cursor.bump()?;
        self.cursor.bump()?;
        self.skip_type(true)?;
        let mut end = self.cursor.last_end();
        if self.cursor.eat(",")? {
            end = self.skip_whitespace(self.cursor.last_end());
        }
        self.strip(this.span.start, end);
        Ok(())
    }

    fn skip_whitespace(&self, mut pos: usize) -> usize {
        let bytes = self.cursor.source().as_bytes();
        while matches!(bytes.get(pos), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            pos += 1;
        }
        pos
    }

    fn less_than(&mut self) -> Result<(), StripError> {
        let frame = *self.top();
        if frame.ctx == Ctx::Object && frame.key_position && self.type_params_before_paren() {
            // `{ method<T>() {} }`
            return self.strip_type_params();
        }
        if self.prev.is_some_and(|p| self.text(&p) == "?.") {
            // `f?.<T>(x)`
            return self.strip_type_params();
        }
        if !self.prev_ends_expr {
            if self.lookahead(Self::generic_arrow_ahead).unwrap_or(false) {
                return self.strip_type_params();
            }
            return self.jsx_element();
        }
        let after_name = self
            .prev
            .is_some_and(|p| matches!(p.kind, TokenKind::Ident | TokenKind::PrivateName));
        let new_callee = self.new_callee;
        if after_name
            && self
                .lookahead(|s| {
                    s.skip_angle()?;
                    let t = s.cursor.peek()?;
                    // `new Foo<T>;` takes type arguments without an argument list.
                    Ok(new_callee
                        || s.text(&t) == "("
                        || matches!(
                            t.kind,
                            TokenKind::Template(TemplatePart::NoSubstitution | TemplatePart::Head)
                        ))
                })
                .unwrap_or(false)
        {
            return self.strip_type_params();
        }
        self.advance().map(drop)
    }

    fn type_params_before_paren(&mut self) -> bool {
        self.lookahead(|s| {
            s.skip_angle()?;
            s.cursor.at("(")
        })
        .unwrap_or(false)
    }

    /// `<T>(params): R =>`
    fn generic_arrow_ahead(&mut self) -> Result<bool, StripError> {
        self.skip_angle()?;
        if !self.cursor.at("(")? {
            return Ok(false);
        }
        self.skip_balanced()?;
        if self.cursor.eat(":")? {
            self.skip_type(false)?;
        }
        self.cursor.at("=>")
    }

    fn strip_type_params(&mut self) -> Result<(), StripError> {
        let lt = self.cursor.peek()?;
        self.skip_angle()?;
        self.strip(lt.span.start, self.cursor.last_end());
        Ok(())
    }

    fn keyword(&mut self, text: &str) -> Result<(), StripError> {
        match text {
            "function" => self.function_header(),
            "class" => self.class_header(),
            _ if CONTROL_KEYWORDS.contains(&text) => {
                self.advance()?;
                if text == "for" && self.cursor.at("await")? {
                    self.advance()?;
                }
                self.control_paren = true;
                self.block_next = text == "catch";
                Ok(())
            }
            "else" | "try" | "finally" | "do" => {
                self.advance()?;
                self.block_next = true;
                Ok(())
            }
            _ => self.advance().map(drop),
        }
    }

    fn identifier(&mut self, token: Token, text: &str) -> Result<(), StripError> {
        if text == "as" && self.prev_ends_expr && !token.newline_before && self.type_follows() {
            self.cursor.bump()?;
            self.skip_type(true)?;
            self.strip(token.span.start, self.cursor.last_end());
            return Ok(());
        }
        self.advance().map(drop)
    }

    /// Does the token after the peeked one start a type?
    fn type_follows(&mut self) -> bool {
        self.cursor.peek_nth(1).is_some_and(|t| match t.kind {
            TokenKind::Ident
            | TokenKind::Keyword
            | TokenKind::String
            | TokenKind::Number
            | TokenKind::Template(TemplatePart::NoSubstitution) => true,
            TokenKind::Punct => {
                matches!(self.text(&t), "{" | "[" | "(" | "<" | "?" | "*" | "-" | "|" | "&")
            }
            _ => false,
        })
    }

    fn function_header(&mut self) -> Result<(), StripError> {
        self.advance()?;
        if self.cursor.at("*")? {
            self.advance()?;
        }
        if self.cursor.peek()?.is_word() {
            self.advance()?;
        }
        if self.cursor.at("<")? {
            self.strip_type_params()?;
        }
        let open = self.cursor.peek()?;
        if self.text(&open) == "(" {
            self.advance()?;
            self.open_paren(open, ParenKind::Params)?;
        }
        Ok(())
    }

    fn class_header(&mut self) -> Result<(), StripError> {
        self.advance()?;
        let name = self.cursor.peek()?;
        if name.kind == TokenKind::Ident && self.text(&name) != "implements" {
            self.advance()?;
        }
        if self.cursor.at("<")? {
            self.strip_type_params()?;
        }
        if self.cursor.eat("extends")? {
            loop {
                let t = self.cursor.peek()?;
                let text = self.text(&t);
                if t.is_eof() || text == "{" || (t.kind == TokenKind::Ident && text == "implements")
                {
                    break;
                }
                match text {
                    "(" | "[" => {
                        self.expression(t)?;
                        self.walk_nested(t.start)?;
                    }
                    _ if t.kind == TokenKind::Template(TemplatePart::Head) => {
                        self.expression(t)?;
                        self.walk_nested(t.start)?;
                    }
                    "<" => self.strip_type_params()?,
                    _ => {
                        self.advance()?;
                    }
                }
            }
        }
        let implements = self.cursor.peek()?;
        if self.text(&implements) == "implements" {
            self.cursor.bump()?;
            loop {
                self.skip_type(false)?;
                if !self.cursor.eat(",")? {
                    break;
                }
            }
            self.strip(implements.span.start, self.cursor.last_end());
        }
        let open = self.cursor.peek()?;
        if self.text(&open) != "{" {
            return Err(unbalanced("expected a class body", open.start));
        }
        self.advance()?;
        self.push(Ctx::ClassBody, open, OnClose::Nothing)
    }

    fn class_member(&mut self, token: Token) -> Result<(), StripError> {
        match self.text(&token) {
            "}" => return self.close(token, "}"),
            ";" => return self.advance().map(drop),
            "@" => return self.decorator(),
            _ => {}
        }
        self.top_mut().key_position = false;
        let start = token.span.start;

        let mut declare = false;
        loop {
            let t = self.cursor.peek()?;
            let word = self.text(&t);
            if t.kind != TokenKind::Ident
                || !CLASS_MODIFIERS.contains(&word)
                || !self.modifier_applies()
            {
                break;
            }
            if word == "static" && self.cursor.peek_nth(1).is_some_and(|n| self.text(&n) == "{")
            {
                self.advance()?;
                let open = self.advance()?;
                return self.push(Ctx::Block, open, OnClose::Nothing);
            }
            declare |= word == "declare";
            self.advance()?;
        }

        if declare {
            self.skip_member_signature()?;
            self.cursor.eat(";")?;
            self.strip(start, self.cursor.last_end());
            return self.member_done();
        }

        if self.cursor.at("*")? {
            self.advance()?;
        }
        let variance = self.cursor.peek()?;
        if matches!(self.text(&variance), "+" | "-") {
            self.cursor.bump()?;
            self.strip(variance.span.start, variance.span.end);
        }

        let key = self.cursor.peek()?;
        if self.text(&key) == "[" {
            if self.is_indexer() {
                self.skip_balanced()?;
                if self.cursor.eat(":")? {
                    self.skip_type(true)?;
                }
                if !self.cursor.eat(";")? {
                    self.cursor.eat(",")?;
                }
                self.strip(start, self.cursor.last_end());
                return self.member_done();
            }
            self.advance()?;
            self.push(Ctx::Bracket, key, OnClose::Nothing)?;
            self.walk_nested(key.start)?;
        } else {
            self.advance()?;
        }

        let optional = self.cursor.peek()?;
        if self.text(&optional) == "?" {
            self.cursor.bump()?;
            self.strip(optional.span.start, optional.span.end);
        }
        if self.cursor.at("<")? {
            self.strip_type_params()?;
        }

        let t = self.cursor.peek()?;
        match self.text(&t) {
            "(" => {
                self.advance()?;
                self.open_paren(t, ParenKind::Params)
            }
            ":" => {
                self.cursor.bump()?;
                self.skip_type(true)?;
                if self.cursor.at("=")? {
                    self.strip(t.span.start, self.cursor.last_end());
                    self.field_initializer()
                } else {
                    // A field without initializer has no runtime effect.
                    self.cursor.eat(";")?;
                    self.strip(start, self.cursor.last_end());
                    self.member_done()
                }
            }
            "=" => self.field_initializer(),
            _ => {
                self.cursor.eat(";")?;
                self.member_done()
            }
        }
    }

    fn member_done(&mut self) -> Result<(), StripError> {
        self.top_mut().key_position = true;
        self.prev = None;
        self.prev_ends_expr = false;
        Ok(())
    }

    /// Is the peeked contextual word a modifier rather than the member name?
    fn modifier_applies(&mut self) -> bool {
        self.cursor.peek_nth(1).is_some_and(|n| match n.kind {
            TokenKind::Ident
            | TokenKind::Keyword
            | TokenKind::String
            | TokenKind::Number
            | TokenKind::PrivateName => true,
            TokenKind::Punct => matches!(self.text(&n), "[" | "*" | "{" | "+" | "-"),
            _ => false,
        })
    }

    /// `[key: K]: V` rather than a computed member name.
    fn is_indexer(&mut self) -> bool {
        self.cursor.peek_nth(1).is_some_and(|t| t.is_word())
            && self
                .cursor
                .peek_nth(2)
                .is_some_and(|t| self.text(&t) == ":")
    }

    /// Variance, key, optional marker and annotation of a `declare` field.
    fn skip_member_signature(&mut self) -> Result<(), StripError> {
        if matches!(self.cursor.peek_text()?, "+" | "-") {
            self.cursor.bump()?;
        }
        if self.cursor.at("[")? {
            self.skip_balanced()?;
        } else {
            self.cursor.bump()?;
        }
        self.cursor.eat("?")?;
        if self.cursor.eat(":")? {
            self.skip_type(true)?;
        }
        Ok(())
    }

    fn decorator(&mut self) -> Result<(), StripError> {
        self.advance()?;
        self.advance()?;
        while self.cursor.at(".")? {
            self.advance()?;
            self.advance()?;
        }
        if self.cursor.at("(")? {
            self.skip_balanced()?;
        }
        Ok(())
    }

    fn field_initializer(&mut self) -> Result<(), StripError> {
        self.advance()?;
        let open = self.top().open;
        self.push(Ctx::FieldInit, open, OnClose::Nothing)
    }

    fn ends_field(&self, frame: &Frame, token: &Token) -> bool {
        let text = self.text(token);
        if (text == ";" && frame.ternaries == 0) || text == "}" {
            return true;
        }
        token.newline_before
            && self.prev_ends_expr
            && match token.kind {
                TokenKind::Ident
                | TokenKind::String
                | TokenKind::Number
                | TokenKind::PrivateName => true,
                TokenKind::Keyword => !matches!(text, "in" | "instanceof"),
                TokenKind::Punct => text == "@",
                _ => false,
            }
    }

    fn end_field(&mut self, token: Token) -> Result<(), StripError> {
        self.stack.pop();
        if self.text(&token) == ";" {
            self.cursor.bump()?;
        }
        self.member_done()
    }

    fn jsx_element(&mut self) -> Result<(), StripError> {
        let lt = self.cursor.bump()?;
        let first = self.cursor.jsx_tag()?;
        self.jsx_element_from(lt, first)?;
        self.prev = None;
        self.prev_ends_expr = true;
        self.block_next = false;
        Ok(())
    }

    /// Continue an element whose `<` and first tag token have been consumed.
    fn jsx_element_from(&mut self, lt: Token, first: Token) -> Result<(), StripError> {
        self.descend(lt.start)?;
        self.push(Ctx::JsxElement, lt, OnClose::Nothing)?;
        let mut token = first;
        if self.text(&token) != ">" {
            if token.kind != TokenKind::Ident {
                return Err(unbalanced("expected a JSX tag name", token.start));
            }
            token = self.jsx_name()?;
        }
        let self_closing = loop {
            if token.is_eof() {
                return Err(unbalanced("unclosed JSX element", lt.start));
            }
            match self.text(&token) {
                ">" => break false,
                "/" => {
                    let gt = self.cursor.jsx_tag()?;
                    if self.text(&gt) != ">" {
                        return Err(unbalanced("expected `>` in JSX tag", gt.start));
                    }
                    break true;
                }
                "{" => {
                    self.jsx_container(token)?;
                    token = self.cursor.jsx_tag()?;
                }
                _ if token.kind == TokenKind::Ident => {
                    token = self.jsx_name()?;
                    if self.text(&token) == "=" {
                        let value = self.cursor.jsx_tag()?;
                        match self.text(&value) {
                            "{" => self.jsx_container(value)?,
                            "<" => {
                                let first = self.cursor.jsx_tag()?;
                                self.jsx_element_from(value, first)?;
                            }
                            _ if value.kind == TokenKind::String => {}
                            _ => {
                                return Err(unbalanced(
                                    "expected a JSX attribute value",
                                    value.start,
                                ));
                            }
                        }
                        token = self.cursor.jsx_tag()?;
                    }
                }
                _ => return Err(unbalanced("unexpected token in JSX tag", token.start)),
            }
        };
        if !self_closing {
            self.jsx_children(lt)?;
        }
        self.stack.pop();
        self.recursion -= 1;
        Ok(())
    }

    /// Consume the rest of a (possibly dotted or namespaced) name; returns the token after it.
    fn jsx_name(&mut self) -> Result<Token, StripError> {
        let mut next = self.cursor.jsx_tag()?;
        while matches!(self.text(&next), "." | ":") {
            self.cursor.jsx_tag()?;
            next = self.cursor.jsx_tag()?;
        }
        Ok(next)
    }

    fn jsx_children(&mut self, lt: Token) -> Result<(), StripError> {
        loop {
            let token = self.cursor.jsx_child()?;
            match token.kind {
                TokenKind::Eof => return Err(unbalanced("unclosed JSX element", lt.start)),
                TokenKind::JsxText => {}
                _ if self.text(&token) == "{" => self.jsx_container(token)?,
                _ => {
                    let next = self.cursor.jsx_tag()?;
                    if self.text(&next) != "/" {
                        self.jsx_element_from(token, next)?;
                        continue;
                    }
                    let mut end = self.cursor.jsx_tag()?;
                    while self.text(&end) != ">" {
                        if end.is_eof() {
                            return Err(unbalanced("unclosed JSX closing tag", token.start));
                        }
                        end = self.cursor.jsx_tag()?;
                    }
                    return Ok(());
                }
            }
        }
    }

    /// `{ expression }` inside JSX, walked as ordinary code.
    fn jsx_container(&mut self, open: Token) -> Result<(), StripError> {
        self.push(Ctx::JsxExpr, open, OnClose::Nothing)?;
        self.prev = None;
        self.prev_ends_expr = false;
        self.walk_nested(open.start)
    }

    // Declarations. These consume through the cursor directly and never record ranges, the
    // caller strips the whole statement.

    fn skip_type_alias(&mut self) -> Result<(), StripError> {
        self.cursor.bump()?;
        self.bump_word("expected a type name")?;
        if self.cursor.at("<")? {
            self.skip_angle()?;
        }
        if self.cursor.eat(":")? {
            self.skip_type(true)?;
        }
        if self.cursor.eat("=")? {
            self.skip_type(true)?;
        }
        // `type T = (this: string): void` carries a trailing annotation on the same line.
        let t = self.cursor.peek()?;
        if self.text(&t) == ":" && !t.newline_before {
            self.cursor.bump()?;
            self.skip_type(true)?;
        }
        Ok(())
    }

    fn skip_opaque_type(&mut self) -> Result<(), StripError> {
        self.cursor.bump()?;
        self.skip_type_alias()
    }

    fn skip_interface(&mut self) -> Result<(), StripError> {
        self.cursor.bump()?;
        self.bump_word("expected an interface name")?;
        if self.cursor.at("<")? {
            self.skip_angle()?;
        }
        self.skip_heritage()?;
        self.expect_balanced("{")
    }

    /// `extends A, B<T> mixins C implements D`
    fn skip_heritage(&mut self) -> Result<(), StripError> {
        loop {
            let t = self.cursor.peek()?;
            if !(t.is_word() && matches!(self.text(&t), "extends" | "mixins" | "implements")) {
                return Ok(());
            }
            self.cursor.bump()?;
            loop {
                self.skip_type(false)?;
                if !self.cursor.eat(",")? {
                    break;
                }
            }
        }
    }

    fn skip_declare(&mut self) -> Result<(), StripError> {
        self.cursor.bump()?;
        self.skip_declared()
    }

    /// The declaration after `declare` or `declare export`.
    fn skip_declared(&mut self) -> Result<(), StripError> {
        let t = self.cursor.peek()?;
        match self.text(&t) {
            "class" => {
                self.cursor.bump()?;
                self.bump_word("expected a class name")?;
                if self.cursor.at("<")? {
                    self.skip_angle()?;
                }
                self.skip_heritage()?;
                self.expect_balanced("{")
            }
            "function" => {
                self.cursor.bump()?;
                self.bump_word("expected a function name")?;
                if self.cursor.at("<")? {
                    self.skip_angle()?;
                }
                self.expect_balanced("(")?;
                if self.cursor.eat(":")? {
                    self.skip_type(true)?;
                    self.skip_predicate()?;
                }
                Ok(())
            }
            "var" | "let" | "const" => {
                self.cursor.bump()?;
                self.bump_word("expected a variable name")?;
                if self.cursor.eat(":")? {
                    self.skip_type(true)?;
                }
                Ok(())
            }
            "module" => {
                self.cursor.bump()?;
                if self.cursor.eat(".")? {
                    self.bump_word("expected `exports`")?;
                    self.expect(":", "expected `:` after `module.exports`")?;
                    return self.skip_type(true);
                }
                let name = self.cursor.bump()?;
                if !(name.is_word() || name.kind == TokenKind::String) {
                    return Err(unbalanced("expected a module name", name.start));
                }
                self.expect_balanced("{")
            }
            "type" => self.skip_type_alias(),
            "opaque" => self.skip_opaque_type(),
            "interface" => self.skip_interface(),
            "enum" => {
                self.cursor.bump()?;
                self.bump_word("expected an enum name")?;
                if self.cursor.eat("of")? {
                    self.bump_word("expected an enum representation type")?;
                }
                self.expect_balanced("{")
            }
            "export" => {
                self.cursor.bump()?;
                self.skip_declared_export()
            }
            _ => Err(unbalanced("expected a declaration", t.start)),
        }
    }

    fn skip_declared_export(&mut self) -> Result<(), StripError> {
        let t = self.cursor.peek()?;
        match self.text(&t) {
            "default" => {
                self.cursor.bump()?;
                if matches!(self.cursor.peek_text()?, "class" | "function") {
                    self.skip_declared()
                } else {
                    self.skip_type(true)
                }
            }
            "{" => {
                self.skip_balanced()?;
                if self.cursor.at("from")? {
                    self.skip_module_source()?;
                }
                Ok(())
            }
            "*" => {
                self.cursor.bump()?;
                if self.cursor.eat("as")? {
                    self.bump_word("expected a namespace name")?;
                }
                self.skip_module_source()
            }
            _ => self.skip_declared(),
        }
    }

    fn bump_word(&mut self, reason: &'static str) -> Result<(), StripError> {
        let t = self.cursor.peek()?;
        if !t.is_word() {
            return Err(unbalanced(reason, t.start));
        }
        self.cursor.bump()?;
        Ok(())
    }

    fn expect(&mut self, text: &str, reason: &'static str) -> Result<(), StripError> {
        if self.cursor.eat(text)? {
            return Ok(());
        }
        let t = self.cursor.peek()?;
        Err(unbalanced(reason, t.start))
    }

    fn expect_balanced(&mut self, open: &'static str) -> Result<(), StripError> {
        let t = self.cursor.peek()?;
        if self.text(&t) != open {
            let reason = match open {
                "(" => "expected `(`",
                _ => "expected `{`",
            };
            return Err(unbalanced(reason, t.start));
        }
        self.skip_balanced()
    }

    /// Skip from the peeked `(`, `[` or `{` through its matching closer.
    fn skip_balanced(&mut self) -> Result<(), StripError> {
        let open = self.cursor.bump()?;
        // Expected closers; `None` marks a template literal hole.
        let mut closers: Vec<(Option<&'static str>, Token)> =
            vec![(Some(closer_for(self.text(&open))), open)];
        while let Some(&(want, opener)) = closers.last() {
            let t = self.cursor.bump()?;
            let text = self.text(&t);
            match t.kind {
                TokenKind::Eof => {
                    return Err(match want {
                        None => StripError::MalformedSource {
                            unterminated: Unterminated::Template,
                            position: opener.start,
                        },
                        Some(_) => unbalanced(unclosed(self.text(&opener)), opener.start),
                    });
                }
                TokenKind::Template(TemplatePart::Head) => closers.push((None, t)),
                TokenKind::Punct => match text {
                    "(" | "[" | "{" => closers.push((Some(closer_for(text)), t)),
                    "}" if want.is_none() => {
                        let part = self.cursor.template_continuation(&t, &opener)?;
                        if part.kind == TokenKind::Template(TemplatePart::Tail) {
                            closers.pop();
                        }
                    }
                    ")" | "]" | "}" if want == Some(text) => {
                        closers.pop();
                    }
                    ")" | "]" | "}" => return Err(unbalanced(unexpected(text), t.start)),
                    _ => {}
                },
                _ => {}
            }
            if closers.len() > MAX_NESTING {
                return Err(unbalanced("brackets nested too deeply", t.start));
            }
        }
        Ok(())
    }

    fn enter_type(&mut self, at: &Token) -> Result<(), StripError> {
        self.depth += 1;
        if self.depth > MAX_TYPE_NESTING {
            return Err(unbalanced("type nested too deeply", at.start));
        }
        Ok(())
    }

    /// Skip a generic parameter or argument list from the peeked `<`.
    fn skip_angle(&mut self) -> Result<(), StripError> {
        let lt = self.cursor.bump()?;
        self.enter_type(&lt)?;
        loop {
            let t = self.cursor.peek()?;
            if t.is_eof() {
                return Err(unbalanced("unclosed `<`", lt.start));
            }
            if self.text(&t).starts_with('>') {
                self.cursor.bump_gt()?;
                break;
            }
            if matches!(self.text(&t), "+" | "-") {
                self.cursor.bump()?;
            }
            self.skip_type(true)?;
            if self.cursor.eat(":")? {
                self.skip_type(true)?;
            }
            if self.cursor.eat("=")? {
                self.skip_type(true)?;
            }
            if !self.cursor.eat(",")? && !self.cursor.peek_text()?.starts_with('>') {
                let t = self.cursor.peek()?;
                return Err(unbalanced("expected `,` or `>`", t.start));
            }
        }
        self.depth -= 1;
        Ok(())
    }

    /// Skip one type expression. With `arrow` unset, an unparenthesized `A => B` function type
    /// is not taken, so the `=>` of an arrow function after its return type stays in place.
    fn skip_type(&mut self, arrow: bool) -> Result<(), StripError> {
        let first = self.cursor.peek()?;
        self.enter_type(&first)?;
        if matches!(self.text(&first), "|" | "&") {
            self.cursor.bump()?;
        }
        self.skip_intersection(arrow)?;
        while self.cursor.eat("|")? {
            self.skip_intersection(arrow)?;
        }
        let t = self.cursor.peek()?;
        if self.text(&t) == "extends" && !t.newline_before {
            self.cursor.bump()?;
            self.skip_intersection(arrow)?;
            self.expect("?", "expected `?` in conditional type")?;
            self.skip_type(arrow)?;
            self.expect(":", "expected `:` in conditional type")?;
            self.skip_type(arrow)?;
        }
        self.depth -= 1;
        Ok(())
    }

    fn skip_intersection(&mut self, arrow: bool) -> Result<(), StripError> {
        self.skip_postfix(arrow)?;
        while self.cursor.eat("&")? {
            self.skip_postfix(arrow)?;
        }
        Ok(())
    }

    /// `?T`, `keyof T`, then a primary type with `[]` / `[K]` / `?.[K]` suffixes.
    fn skip_postfix(&mut self, arrow: bool) -> Result<(), StripError> {
        loop {
            let t = self.cursor.peek()?;
            let text = self.text(&t);
            if text == "?"
                || (text == "keyof" && self.cursor.peek_nth(1).is_some_and(|n| n.is_word()))
            {
                self.cursor.bump()?;
            } else {
                break;
            }
        }
        self.skip_primary(arrow)?;
        loop {
            let t = self.cursor.peek()?;
            if t.newline_before {
                return Ok(());
            }
            match self.text(&t) {
                "[" => {}
                "?." if self
                    .cursor
                    .peek_nth(1)
                    .is_some_and(|n| self.text(&n) == "[") =>
                {
                    self.cursor.bump()?;
                }
                _ => return Ok(()),
            }
            self.cursor.bump()?;
            if !self.cursor.eat("]")? {
                self.skip_type(true)?;
                self.expect("]", "expected `]`")?;
            }
        }
    }

    fn skip_primary(&mut self, arrow: bool) -> Result<(), StripError> {
        let t = self.cursor.peek()?;
        let text = self.text(&t);
        match t.kind {
            TokenKind::String
            | TokenKind::Number
            | TokenKind::Template(TemplatePart::NoSubstitution) => {
                self.cursor.bump()?;
            }
            TokenKind::Ident | TokenKind::Keyword => {
                if text == "interface"
                    && self
                        .cursor
                        .peek_nth(1)
                        .is_some_and(|n| self.text(&n) == "{")
                {
                    self.cursor.bump()?;
                    return self.skip_balanced();
                }
                if text == "typeof" {
                    self.cursor.bump()?;
                }
                self.skip_qualified_name()?;
                let next = self.cursor.peek()?;
                if self.text(&next) == "<" && !next.newline_before {
                    self.skip_angle()?;
                }
                if arrow && self.cursor.at("=>")? {
                    self.cursor.bump()?;
                    self.skip_type(arrow)?;
                }
            }
            TokenKind::Punct => match text {
                "{" | "[" => self.skip_balanced()?,
                "(" => {
                    self.skip_balanced()?;
                    if arrow && self.cursor.at("=>")? {
                        self.cursor.bump()?;
                        self.skip_type(arrow)?;
                    }
                }
                "<" => {
                    self.skip_angle()?;
                    self.expect_balanced("(")?;
                    self.expect("=>", "expected `=>` in a generic function type")?;
                    self.skip_type(arrow)?;
                }
                "*" => {
                    self.cursor.bump()?;
                }
                "-" => {
                    self.cursor.bump()?;
                    let n = self.cursor.peek()?;
                    if n.kind != TokenKind::Number {
                        return Err(unbalanced("expected a number literal type", n.start));
                    }
                    self.cursor.bump()?;
                }
                _ => return Err(unbalanced("expected a type", t.start)),
            },
            _ => return Err(unbalanced("expected a type", t.start)),
        }
        Ok(())
    }

    fn skip_qualified_name(&mut self) -> Result<(), StripError> {
        self.bump_word("expected a type name")?;
        while self.cursor.eat(".")? {
            self.bump_word("expected a name after `.`")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::normalize_ranges;

    /// The stripped source fragments, in order.
    fn removed(src: &str) -> Vec<&str> {
        let index = LineIndex::new(src);
        let ranges = normalize_ranges(strip_ranges(&index).unwrap());
        ranges.iter().map(|r| &src[r.start..r.end]).collect()
    }

    fn error(src: &str) -> StripError {
        let index = LineIndex::new(src);
        strip_ranges(&index).unwrap_err()
    }

    #[test]
    fn parameter_and_return_annotations() {
        assert_eq!(
            removed("function f(x: number, y: ?Array<string>): string { return x; }"),
            vec![": number", ": ?Array<string>", ": string"]
        );
    }

    #[test]
    fn variable_annotations_stop_at_the_initializer() {
        assert_eq!(
            removed("const a: number = 1, b: string | void = f(x);\nlet c: T;"),
            vec![": number", ": string | void", ": T"]
        );
    }

    #[test]
    fn object_keys_and_ternaries_are_kept() {
        assert!(removed("const o = { a: 1, b: c ? d : e };\nx ? (y) : z;").is_empty());
        assert!(removed("switch (x) { case (a): break; default: f(); }").is_empty());
        assert!(removed("label: for (;;) { break label; }").is_empty());
    }

    #[test]
    fn type_casts_in_parentheses() {
        assert_eq!(removed("return await (x: any);"), vec![": any"]);
        assert_eq!(removed("f((a: T), (b: U));"), vec![": T", ": U"]);
    }

    #[test]
    fn as_casts() {
        assert_eq!(removed("const a = x as any;"), vec!["as any"]);
        assert_eq!(removed("f(y as const)"), vec!["as const"]);
        assert!(removed("import { a as b } from 'm';\nexport { b as c };").is_empty());
    }

    #[test]
    fn optional_parameters() {
        assert_eq!(
            removed("function f(a?: string, b? = 1, c?) {}"),
            vec!["?: string", "?", "?"]
        );
        assert_eq!(
            removed("async function t(y /*.*/ ? /*.*/ , z /*.*/ ? /*.*/ : /*.*/ number = 123) {}"),
            vec!["?", "?", ": /*.*/ number"]
        );
    }

    #[test]
    fn arrow_return_types() {
        assert_eq!(removed("const f = (x: T): U => x;"), vec![": T", ": U"]);
        assert_eq!(removed("const g = async (): Promise<void> => {};"), vec![": Promise<void>"]);
        assert!(removed("const h = a ? (b) : c => d;").is_empty());
        assert_eq!(removed("const t = a ? (b): c => d : e;"), vec![": c"]);
        assert_eq!(removed("function p(x): %checks { return !!x; }"), vec![": %checks"]);
        assert!(removed("f((a), b);").is_empty());
    }

    #[test]
    fn arrow_return_type_on_another_line_moves_the_arrow() {
        let src = "var a = ():\nnumber => 42;";
        let index = LineIndex::new(src);
        let ranges = normalize_ranges(strip_ranges(&index).unwrap());
        assert_eq!(ranges.len(), 1);
        let range = ranges[0];
        assert_eq!(&src[range.start..range.end], ":\nnumber =>");
        assert_eq!(range.moved.map(|m| &src[m..range.end]), Some("=>"));
    }

    #[test]
    fn type_aliases_interfaces_and_opaque_types() {
        assert_eq!(
            removed("type T = string;\nlet a = 1;"),
            vec!["type T = string;"]
        );
        assert_eq!(
            removed("opaque type B: string = string;\nexport opaque type A = number;"),
            vec!["opaque type B: string = string;", "export opaque type A = number;"]
        );
        assert_eq!(
            removed("interface Foo extends Bar<T> {\n  prop: any;\n}\nfoo();"),
            vec!["interface Foo extends Bar<T> {\n  prop: any;\n}"]
        );
        assert_eq!(
            removed("export type ONE = { one: number };\nexport interface I { x: true }"),
            vec!["export type ONE = { one: number };", "export interface I { x: true }"]
        );
    }

    #[test]
    fn contextual_words_stay_runtime_code() {
        assert!(removed("type = 1; type(x); interface.x; declare(); opaque = type;").is_empty());
        assert!(removed("let type = 1;\nconst declare = 2;").is_empty());
    }

    #[test]
    fn declare_statements() {
        let src = "declare class Baz { method(): mixed; }\n\
                   declare function someFunc(): void;\n\
                   declare module 'fs' { declare function r(p: string): string; }\n\
                   declare var SOME: string;\n\
                   declare module.exports: { foo: number };\n\
                   declare export default T;\n\
                   declare export function x(): void;\n\
                   declare opaque type B: string;\n\
                   run();";
        let got = removed(src);
        assert_eq!(got.len(), 8);
        assert!(got.iter().all(|s| s.starts_with("declare")));
        assert!(got[0].ends_with('}'));
        assert_eq!(got[7], "declare opaque type B: string;");
    }

    #[test]
    fn type_imports() {
        assert_eq!(
            removed("import type { A } from 'm';\nimport typeof B from 'm';\nimport C from 'm';"),
            vec!["import type { A } from 'm';", "import typeof B from 'm';"]
        );
        assert_eq!(
            removed("import {\n  Something,\n  type SomeType,\n  typeof Other\n} from 'm';"),
            vec!["type SomeType,\n  typeof Other"]
        );
        assert_eq!(
            removed("import { type A, typeof B } from 'm';"),
            vec!["import { type A, typeof B } from 'm';"]
        );
        assert!(removed("import type from 'm';\nimport typeof, { a } from 'm';").is_empty());
        assert!(removed("import('m'); import.meta.url;").is_empty());
    }

    #[test]
    fn type_exports() {
        assert_eq!(
            removed("export type { T };\nexport type { U } from 'm';\nexport type * from 'n';\nexport { W };"),
            vec![
                "export type { T };",
                "export type { U } from 'm';",
                "export type * from 'n';"
            ]
        );
    }

    #[test]
    fn class_headers() {
        assert_eq!(
            removed("class C<T> extends B<T> implements I, J<T> { }"),
            vec!["<T>", "<T>", "implements I, J<T>"]
        );
        assert_eq!(
            removed("var K = class Baz implements Foo { };"),
            vec!["implements Foo"]
        );
        assert_eq!(
            removed("export class D<+T: R = R> extends mixin(A, B) {}"),
            vec!["<+T: R = R>"]
        );
    }

    #[test]
    fn class_members() {
        let src = "class Bar {\n\
                   answer: number = 42;\n\
                   +covariant: number = 42;\n\
                   prop: any;\n\
                   +propCo: number;\n\
                   static s: T;\n\
                   declare d: string;\n\
                   [key: string]: number;\n\
                   opt?: number = 1;\n\
                   method<M>(): Wrapper<M> { return this.x; }\n\
                   get value(): T { return this.v; }\n\
                   }";
        assert_eq!(
            removed(src),
            vec![
                ": number",
                "+",
                ": number",
                "prop: any;",
                "+propCo: number;",
                "static s: T;",
                "declare d: string;",
                "[key: string]: number;",
                "?: number",
                "<M>",
                ": Wrapper<M>",
                ": T",
            ]
        );
    }

    #[test]
    fn field_initializers_end_at_a_new_line_member() {
        let src = "class A {\n  handler = () => {\n  }\n  value: T\n  constructor(v: T) {}\n}";
        assert_eq!(removed(src), vec!["value: T", ": T"]);
    }

    #[test]
    fn static_blocks_and_computed_keys() {
        let src = "class A { static { let x: T = 1; } [k]: V = 2; ['m'](a: T) {} }";
        assert_eq!(removed(src), vec![": T", ": V", ": T"]);
    }

    #[test]
    fn object_methods() {
        assert_eq!(
            removed("var o = { m(): void {}, async n<T>(a: T): T { return a; }, p: (q: T) };"),
            vec![": void", "<T>", ": T", ": T", ": T"]
        );
    }

    #[test]
    fn generic_calls_and_arrows() {
        assert_eq!(removed("doSomething<number>(3);"), vec!["<number>"]);
        assert_eq!(removed("doSomething <T, U>(3);"), vec!["<T, U>"]);
        assert_eq!(removed("new Event<number>();"), vec!["<number>"]);
        assert_eq!(removed("const f = async <T>(): T => {};"), vec!["<T>", ": T"]);
        assert_eq!(removed("const g = <T>(x: T): T => x;"), vec!["<T>", ": T", ": T"]);
        assert!(removed("if (a < b && c > d) {}").is_empty());
        assert!(removed("for (let i = 0; i < n; i++) {}").is_empty());
        assert!(removed("x = a < b;\ny = c >> 2;").is_empty());
    }

    #[test]
    fn nested_generics_split_shift_tokens() {
        assert_eq!(
            removed("const m: Map<string, Array<number>>= new Map();"),
            vec![": Map<string, Array<number>>"]
        );
        assert_eq!(removed("f<A<B<C>>>(x);"), vec!["<A<B<C>>>"]);
    }

    #[test]
    fn leading_union_and_intersection_operators() {
        assert_eq!(
            removed("var union: | T | U;\nvar intersection: & T & U;"),
            vec![": | T | U", ": & T & U"]
        );
    }

    #[test]
    fn function_types_in_annotations() {
        assert_eq!(
            removed("function f(cb: (err: ?Error) => void, g: string => number) {}"),
            vec![": (err: ?Error) => void", ": string => number"]
        );
        assert_eq!(
            removed("let h: <T>(x: T) => T = id;"),
            vec![": <T>(x: T) => T"]
        );
    }

    #[test]
    fn predicates() {
        assert_eq!(
            removed("function testit(arg: mixed): boolean %checks { return !!arg; }"),
            vec![": mixed", ": boolean %checks"]
        );
    }

    #[test]
    fn this_parameters() {
        assert_eq!(removed("function z (this : string) {}"), vec!["this : string"]);
        assert_eq!(
            removed("function u (this : string, ...a) {}"),
            vec!["this : string, "]
        );
        assert_eq!(
            removed("const h = function(this\n: string,\n...a) {}"),
            vec!["this\n: string,\n"]
        );
    }

    #[test]
    fn comment_types() {
        assert!(removed("var X /*: number */ = 1;\nfunction f(p /*: string */) {}").is_empty());
        assert_eq!(
            removed("class C {\n  /*:: prop: string; */\n}"),
            vec!["/*:: prop: string; */"]
        );
        assert_eq!(removed("/*flow-include type T = number; */"), vec![
            "/*flow-include type T = number; */"
        ]);
    }

    #[test]
    fn enums_are_runtime_code() {
        assert!(removed("enum Status { Active, Off }\nconst s = Status.Active;").is_empty());
    }

    #[test]
    fn template_literal_holes_are_walked() {
        assert_eq!(
            removed("const s = `a ${(x: any)} b ${`c ${(y: T)}`} d`;"),
            vec![": any", ": T"]
        );
        assert_eq!(
            removed("const t = `${ {a: 1}.a }`;\nlet u: T;"),
            vec![": T"]
        );
    }

    #[test]
    fn regexes_and_division() {
        assert_eq!(
            removed("const r = /[/]: x/g.test(s); const d = (a: number) / 2;"),
            vec![": number"]
        );
    }

    #[test]
    fn jsx_children_and_attributes() {
        let src = "const a = <div className=\"x's\" onClick={(e: Event) => f(e)}>\n  don't {(y: any)}\n  <br/><>{z}</>\n</div>;\nlet b: T;";
        assert_eq!(removed(src), vec![": Event", ": any", ": T"]);
    }

    #[test]
    fn jsx_after_return() {
        assert_eq!(
            removed("function C(p: P) { return <a.b x={1}>{p.c}</a.b>; }"),
            vec![": P"]
        );
    }

    #[test]
    fn unclosed_brackets_are_reported_at_the_opener() {
        let StripError::UnbalancedSyntax { position, .. } = error("function f() {\n  g(\n") else {
            panic!("expected UnbalancedSyntax");
        };
        assert_eq!(position, Position { line: 2, column: 4 });
    }

    #[test]
    fn mismatched_closer_is_reported() {
        let StripError::UnbalancedSyntax { reason, position } = error("f(]") else {
            panic!("expected UnbalancedSyntax");
        };
        assert_eq!(reason, "unexpected `]`");
        assert_eq!(position, Position { line: 1, column: 3 });
    }

    #[test]
    fn unclosed_generic_is_reported() {
        assert!(matches!(
            error("type T = Array<string;\n"),
            StripError::UnbalancedSyntax { .. }
        ));
    }

    #[test]
    fn unterminated_template_points_at_the_backtick() {
        let err = error("let a = 1;\nconst s = `abc ${x");
        assert!(matches!(
            err,
            StripError::MalformedSource {
                unterminated: Unterminated::Template,
                position: Position { line: 2, column: 11 },
            }
        ));
    }

    #[test]
    fn deep_nesting_is_an_error_not_a_crash() {
        let src = "(".repeat(5000);
        assert!(matches!(error(&src), StripError::UnbalancedSyntax { .. }));
        let src = format!("let a: {}", "Array<".repeat(5000));
        assert!(matches!(error(&src), StripError::UnbalancedSyntax { .. }));
        let src = format!("var x = {}{}", "<a>".repeat(400), "</a>".repeat(400));
        assert!(matches!(error(&src), StripError::UnbalancedSyntax { .. }));
        let src = format!("var x = {}0{}", "<a>{".repeat(200), "}</a>".repeat(200));
        assert!(matches!(error(&src), StripError::UnbalancedSyntax { .. }));
    }

    #[test]
    fn moderate_jsx_nesting_is_walked() {
        let src = format!("var x = {}{}", "<a>".repeat(100), "</a>".repeat(100));
        assert!(removed(&src).is_empty());
    }
}
