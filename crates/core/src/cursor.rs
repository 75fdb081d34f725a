//! One-token-lookahead cursor over the lexer.
//!
//! The cursor hides comments from the stripper: ordinary comments are skipped (their line
//! breaks still count toward [`Token::newline_before`]), `/*: */` comments are left in place and
//! `/*:: */` include comments are recorded as spans to delete. Speculative parsing goes through
//! [`Cursor::checkpoint`] / [`Cursor::rewind`], which also roll back recorded include comments.

use crate::{
    StripError,
    lexer::{LexState, Lexer, Unterminated},
    token::{CommentKind, Span, Token, TokenKind},
};

#[derive(Debug, Clone, Copy)]
struct Peeked {
    before: LexState,
    includes_len: usize,
    token: Token,
}

/// Saved cursor position for backtracking.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    lex: LexState,
    peeked: Option<Peeked>,
    last_end: usize,
    includes_len: usize,
}

pub(crate) struct Cursor<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Peeked>,
    last_end: usize,
    includes: Vec<Span>,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(lexer: Lexer<'a>) -> Self {
        Self {
            lexer,
            peeked: None,
            last_end: 0,
            includes: Vec::new(),
        }
    }

    pub(crate) fn source(&self) -> &'a str {
        self.lexer.source()
    }

    pub(crate) fn text(&self, token: &Token) -> &'a str {
        token.text(self.lexer.source())
    }

    /// End offset of the last consumed token.
    pub(crate) fn last_end(&self) -> usize {
        self.last_end
    }

    /// `/*:: */` comments seen so far, in source order.
    pub(crate) fn into_includes(self) -> Vec<Span> {
        self.includes
    }

    pub(crate) fn peek(&mut self) -> Result<Token, StripError> {
        if let Some(p) = self.peeked {
            return Ok(p.token);
        }
        let before = self.lexer.state();
        let includes_len = self.includes.len();
        let mut newline = false;
        let token = loop {
            let token = self.lexer.next_token()?;
            match token.kind {
                TokenKind::Comment(kind) => {
                    newline |= token.newline_before
                        || memchr::memchr2(b'\n', b'\r', self.text(&token).as_bytes()).is_some();
                    if kind == CommentKind::TypeInclude {
                        self.includes.push(token.span);
                    }
                }
                _ => {
                    break Token {
                        newline_before: token.newline_before || newline,
                        ..token
                    };
                }
            }
        };
        self.peeked = Some(Peeked {
            before,
            includes_len,
            token,
        });
        Ok(token)
    }

    pub(crate) fn bump(&mut self) -> Result<Token, StripError> {
        let token = self.peek()?;
        self.peeked = None;
        self.last_end = token.span.end;
        Ok(token)
    }

    /// Text of the peeked token.
    pub(crate) fn peek_text(&mut self) -> Result<&'a str, StripError> {
        let token = self.peek()?;
        Ok(self.text(&token))
    }

    pub(crate) fn at(&mut self, text: &str) -> Result<bool, StripError> {
        Ok(self.peek_text()? == text)
    }

    /// Consume the peeked token if its text is `text`.
    pub(crate) fn eat(&mut self, text: &str) -> Result<bool, StripError> {
        if self.at(text)? {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// The token `n` positions after the peeked one. Lexing errors read as `None`.
    pub(crate) fn peek_nth(&mut self, n: usize) -> Option<Token> {
        let checkpoint = self.checkpoint();
        let mut result = Ok(());
        for _ in 0..n {
            if let Err(e) = self.bump() {
                result = Err(e);
                break;
            }
        }
        let token = result.and_then(|()| self.peek());
        self.rewind(checkpoint);
        token.ok()
    }

    /// Consume one `>`, splitting compound tokens such as `>>` or `>=`.
    pub(crate) fn bump_gt(&mut self) -> Result<Token, StripError> {
        let token = self.peek()?;
        if self.text(&token) == ">" {
            return self.bump();
        }
        let gt = token.span.start;
        self.peeked = None;
        self.lexer.resume_after_gt(gt);
        self.last_end = gt + 1;
        Ok(Token {
            span: Span::new(gt, gt + 1),
            end: self.lexer.position(gt + 1),
            ..token
        })
    }

    /// Consume the continuation of a template literal whose `${` hole closes at `brace`.
    ///
    /// An unterminated continuation is reported at `opening`, the template's backtick.
    pub(crate) fn template_continuation(
        &mut self,
        brace: &Token,
        opening: &Token,
    ) -> Result<Token, StripError> {
        self.unpeek();
        let token = self
            .lexer
            .template_continuation(brace.span.start)
            .map_err(|e| match e {
                StripError::MalformedSource {
                    unterminated: Unterminated::Template,
                    ..
                } => StripError::MalformedSource {
                    unterminated: Unterminated::Template,
                    position: opening.start,
                },
                other => other,
            })?;
        self.last_end = token.span.end;
        Ok(token)
    }

    /// Consume the next token in JSX tag mode.
    pub(crate) fn jsx_tag(&mut self) -> Result<Token, StripError> {
        self.unpeek();
        loop {
            let token = self.lexer.jsx_tag_token()?;
            match token.kind {
                TokenKind::Comment(CommentKind::TypeInclude) => self.includes.push(token.span),
                TokenKind::Comment(_) => {}
                _ => {
                    self.last_end = token.span.end;
                    return Ok(token);
                }
            }
        }
    }

    /// Consume the next token in JSX children mode.
    pub(crate) fn jsx_child(&mut self) -> Result<Token, StripError> {
        self.unpeek();
        let token = self.lexer.jsx_child_token()?;
        self.last_end = token.span.end;
        Ok(token)
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            lex: self.lexer.state(),
            peeked: self.peeked,
            last_end: self.last_end,
            includes_len: self.includes.len(),
        }
    }

    pub(crate) fn rewind(&mut self, checkpoint: Checkpoint) {
        self.lexer.restore(checkpoint.lex);
        self.peeked = checkpoint.peeked;
        self.last_end = checkpoint.last_end;
        self.includes.truncate(checkpoint.includes_len);
    }

    /// Drop a regular-mode peeked token so the lexer can rescan it in another mode.
    fn unpeek(&mut self) {
        if let Some(p) = self.peeked.take() {
            self.lexer.restore(p.before);
            self.includes.truncate(p.includes_len);
        }
    }
}
