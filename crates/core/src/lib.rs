//! Flow type stripping library (with WASM bindings).
//!
//! This crate removes Flow type annotations and declarations from JavaScript source. It does not
//! build a syntax tree: a tokenizer and a single-pass stripper find the byte ranges of type-only
//! syntax, and those ranges are blanked out (or deleted in pretty mode) while keeping line breaks,
//! so positions in the output stay predictable and can be mapped back to the input.
//!
//! Entry points:
//!
//! - [`strip()`] strips a source string according to [`StripOptions`].
//! - [`lexer::tokenize`] exposes the token stream.
//!
//! Internals:
//!
//! - [`token`] defines tokens, spans and positions.
//! - [`lexer`] is the context-sensitive JavaScript/Flow/JSX tokenizer.
//! - [`pragma`] detects `@flow` / `@noflow` in leading comments.
//! - [`stripper`] walks the tokens and collects ranges to strip.
//! - [`edit`] holds the edit model and sourcemap creation helpers.
//! - [`utf16`] provides line and UTF-16 column indexing.

mod cursor;
pub mod edit;
pub mod lexer;
pub mod pragma;
pub mod strip;
pub mod stripper;
pub mod token;
pub mod utf16;

pub use edit::LineMapping;
pub use strip::{SourceMapMode, StripOptions, StripOutput, strip};

use lexer::Unterminated;
use token::Position;

/// Errors that can occur during stripping.
#[derive(thiserror::Error, Debug)]
pub enum StripError {
    #[error("{unterminated} at line {}, column {}", position.line, position.column)]
    MalformedSource {
        unterminated: Unterminated,
        position: Position,
    },

    #[error("{reason} at line {}, column {}", position.line, position.column)]
    UnbalancedSyntax {
        reason: &'static str,
        position: Position,
    },

    #[error("invalid edit: {0}")]
    InvalidEdit(String),

    #[error("overlapping edits: [{a_start},{a_end}) overlaps [{b_start},{b_end})")]
    OverlappingEdits {
        a_start: usize,
        a_end: usize,
        b_start: usize,
        b_end: usize,
    },

    #[error("invalid sourcemap: {0}")]
    SourceMap(#[from] sourcemap::Error),
}
