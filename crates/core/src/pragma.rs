//! `@flow` / `@noflow` detection.
//!
//! Only comments before the first significant token are inspected.

use unicode_xid::UnicodeXID;

use crate::{
    lexer::Lexer,
    token::{Span, TokenKind},
    utf16::LineIndex,
};

/// Words that may follow `@flow` as part of the pragma.
const FLOW_MODES: &[&str] = &["strict-local", "strict", "weak"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pragma {
    /// `@flow`, with the span of the pragma text inside its comment (`@flow strict` included).
    Flow(Span),
    NoFlow,
    Absent,
}

/// Look for a pragma in the leading comments of the source.
///
/// Lexing errors end the search; the stripping pass reports them properly.
pub fn detect_pragma(index: &LineIndex<'_>) -> Pragma {
    let src = index.source();
    let mut lexer = Lexer::new(index);
    while let Ok(token) = lexer.next_token() {
        if !matches!(token.kind, TokenKind::Comment(_)) {
            break;
        }
        if let Some(pragma) = scan_comment(src, token.span) {
            return pragma;
        }
    }
    Pragma::Absent
}

fn scan_comment(src: &str, comment: Span) -> Option<Pragma> {
    let text = &src[comment.start..comment.end];
    let bytes = text.as_bytes();
    for at in memchr::memchr_iter(b'@', bytes) {
        let rest = &text[at + 1..];
        if let Some(after) = rest.strip_prefix("noflow") {
            if !continues_word(after) {
                return Some(Pragma::NoFlow);
            }
        } else if let Some(after) = rest.strip_prefix("flow") {
            if continues_word(after) {
                continue;
            }
            let mut end = at + 1 + "flow".len();
            if let Some(mode) = after.strip_prefix(' ') {
                if let Some(word) = FLOW_MODES
                    .iter()
                    .find(|w| mode.starts_with(**w) && !continues_word(&mode[w.len()..]))
                {
                    end += 1 + word.len();
                }
            }
            return Some(Pragma::Flow(Span::new(
                comment.start + at,
                comment.start + end,
            )));
        }
    }
    None
}

fn continues_word(rest: &str) -> bool {
    rest.chars()
        .next()
        .is_some_and(|c| c == '-' || c == '$' || c.is_xid_continue())
}
