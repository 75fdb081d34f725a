//! Flow type stripping with optional sourcemap support.
//!
//! [`strip`] removes Flow type syntax from JavaScript source so that the result runs as plain
//! JavaScript. The pipeline is range-based text surgery:
//!
//! 1. Look for an `@flow` pragma in the leading comments ([`crate::pragma`]). Without one (or
//!    with `@noflow`) the source passes through unchanged unless
//!    [`StripOptions::ignore_pragma`] is set.
//! 2. Walk the token stream once and collect the byte ranges of type-only syntax
//!    ([`crate::stripper`]).
//! 3. Turn the ranges into non-overlapping edits and copy the input into the output, replacing
//!    each edited span ([`crate::edit`]). Every output byte remembers its input byte.
//! 4. In pretty mode, collapse the blank lines left behind.
//! 5. Build line mappings and a sourcemap from the per-byte origins.
//!
//! Modes:
//!
//! - Default: stripped characters become spaces and line breaks stay, so every remaining token
//!   keeps its line and column.
//! - Pretty: stripped characters (and the spaces before them) are deleted. Line breaks inside
//!   stripped spans are kept at first, then runs of blank lines that stripping created are
//!   reduced to one and trailing blank lines are dropped.
//!
//! Failures are all-or-nothing: on error no output is produced.

use tracing::debug;

use crate::{
    StripError,
    edit::{
        Edit, EditMode, LineMapping, StripRange, build_output_to_input_map, create_sourcemap,
        edits_from_ranges, line_mappings, normalize_ranges, sourcemap_to_json, validate_edits,
    },
    pragma::{Pragma, detect_pragma},
    stripper::strip_ranges,
    utf16::{LineIndex, line_starts},
};

/// Name recorded in the sourcemap `sources` when none is given.
pub const DEFAULT_SOURCE_FILENAME: &str = "<stdin>";

/// Whether and how a sourcemap is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceMapMode {
    #[default]
    None,
    /// Return the sourcemap JSON in [`StripOutput::source_map`].
    External,
    /// Append the sourcemap to the code as a `//# sourceMappingURL=data:...` comment.
    Inline,
}

/// Configuration options for type stripping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripOptions {
    /// Delete stripped text instead of blanking it, and collapse the blank lines left behind.
    pub pretty: bool,
    /// Strip even when the source has no `@flow` pragma (or has `@noflow`).
    pub ignore_pragma: bool,
    pub source_maps: SourceMapMode,
    /// Source name recorded in the sourcemap. Defaults to [`DEFAULT_SOURCE_FILENAME`].
    pub source_filename: Option<String>,
}

/// Output code and its mapping data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripOutput {
    /// The stripped JavaScript source.
    pub code: String,
    /// One entry per output line, present whenever a sourcemap was requested.
    pub mappings: Option<Vec<LineMapping>>,
    /// Sourcemap JSON, present for [`SourceMapMode::External`].
    pub source_map: Option<String>,
}

/// Strip Flow type syntax from `source`.
pub fn strip(source: &str, options: &StripOptions) -> Result<StripOutput, StripError> {
    let index = LineIndex::new(source);
    let pragma = detect_pragma(&index);
    let ranges = match pragma {
        Pragma::Flow(span) => {
            let mut ranges = strip_ranges(&index)?;
            ranges.push(StripRange::pinned(span.start, span.end));
            Some(ranges)
        }
        Pragma::NoFlow | Pragma::Absent if options.ignore_pragma => Some(strip_ranges(&index)?),
        Pragma::NoFlow | Pragma::Absent => None,
    };
    debug!(
        ?pragma,
        ignore_pragma = options.ignore_pragma,
        stripping = ranges.is_some(),
        "pragma check"
    );

    let wants_map = options.source_maps != SourceMapMode::None;
    let (mut code, out_to_in) = match ranges {
        Some(ranges) => {
            let ranges = normalize_ranges(ranges);
            let mode = if options.pretty {
                EditMode::Delete
            } else {
                EditMode::Blank
            };
            let edits = edits_from_ranges(source, &ranges, mode);
            let code = rewrite(source, &edits)?;
            let out_to_in = build_output_to_input_map(source.len(), &edits);
            debug!(ranges = ranges.len(), ?mode, "applied strip ranges");
            if options.pretty {
                collapse_blank_lines(&index, code, out_to_in)
            } else {
                (code, out_to_in)
            }
        }
        None if wants_map => (source.to_owned(), (0..source.len()).map(Some).collect()),
        None => (source.to_owned(), Vec::new()),
    };

    let mut output = StripOutput {
        code: String::new(),
        mappings: None,
        source_map: None,
    };
    if wants_map {
        let filename = options
            .source_filename
            .as_deref()
            .unwrap_or(DEFAULT_SOURCE_FILENAME);
        output.mappings = Some(line_mappings(&index, &code, &out_to_in));
        let map = create_sourcemap(&index, &code, filename, &out_to_in);
        match options.source_maps {
            SourceMapMode::Inline => {
                let url = map.to_data_url()?;
                if !code.is_empty() && !code.ends_with('\n') {
                    code.push('\n');
                }
                code.push_str("//# sourceMappingURL=");
                code.push_str(&url);
                code.push('\n');
            }
            _ => output.source_map = Some(sourcemap_to_json(&map)?),
        }
    }

    debug!(
        input_len = source.len(),
        output_len = code.len(),
        "strip finished"
    );
    output.code = code;
    Ok(output)
}

/// Apply validated, sorted edits to `source`.
fn rewrite(source: &str, edits: &[Edit]) -> Result<String, StripError> {
    let src = source.as_bytes();

    // Validate edits for overlaps.
    validate_edits(src.len(), edits)?;

    let mut out = Vec::<u8>::with_capacity(src.len());
    let mut cursor = 0usize;
    for edit in edits {
        // Copy unchanged bytes before the edit.
        if cursor < edit.start {
            out.extend_from_slice(&src[cursor..edit.start]);
        }

        // Apply the edit replacement.
        out.extend_from_slice(edit.replacement.as_bytes());
        cursor = edit.end;
    }

    // Copy any remaining unchanged bytes after the last edit.
    if cursor < src.len() {
        out.extend_from_slice(&src[cursor..]);
    }

    String::from_utf8(out).map_err(|e| StripError::InvalidEdit(format!("output is not UTF-8: {e}")))
}

fn is_blank(line: &str) -> bool {
    line.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
}

fn line_at<'s>(text: &'s str, starts: &[usize], line: usize) -> &'s str {
    let end = starts.get(line + 1).copied().unwrap_or(text.len());
    &text[starts[line]..end]
}

/// Pretty-mode cleanup of a deletion result, whose lines still correspond 1:1 to input lines.
///
/// Each run of blank lines that contains a line stripping emptied becomes a single blank line.
/// Blank lines at the end go away; a final line break is kept if the input had one.
fn collapse_blank_lines(
    input: &LineIndex<'_>,
    code: String,
    out_to_in: Vec<Option<usize>>,
) -> (String, Vec<Option<usize>>) {
    let src = input.source();
    let in_starts = input.line_starts();
    let out_starts = line_starts(&code);
    let line_count = out_starts.len();

    let blank: Vec<bool> = (0..line_count)
        .map(|line| is_blank(line_at(&code, &out_starts, line)))
        .collect();
    let emptied = |line: usize| {
        blank[line] && line < in_starts.len() && !is_blank(line_at(src, in_starts, line))
    };

    let mut keep = vec![true; line_count];
    let mut line = 0;
    while line < line_count {
        if !blank[line] {
            line += 1;
            continue;
        }
        let run_start = line;
        while line < line_count && blank[line] {
            line += 1;
        }
        if (run_start..line).any(emptied) {
            keep[run_start + 1..line].fill(false);
        }
    }

    let mut out = String::with_capacity(code.len());
    let mut origins: Vec<Option<usize>> = Vec::with_capacity(out_to_in.len());
    for (line, _) in keep.iter().enumerate().filter(|(_, keep)| **keep) {
        let start = out_starts[line];
        let end = out_starts.get(line + 1).copied().unwrap_or(code.len());
        out.push_str(&code[start..end]);
        origins.extend_from_slice(&out_to_in[start..end]);
    }

    match out
        .bytes()
        .rposition(|b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
    {
        None => {
            out.clear();
            origins.clear();
        }
        Some(last) => {
            out.truncate(last + 1);
            origins.truncate(last + 1);
            let newline = if src.ends_with("\r\n") {
                "\r\n"
            } else if src.ends_with('\n') {
                "\n"
            } else {
                ""
            };
            out.push_str(newline);
            origins.extend((src.len() - newline.len()..src.len()).map(Some));
        }
    }
    (out, origins)
}

#[cfg(test)]
mod tests {
    use crate::lexer::Unterminated;
    use crate::token::Position;

    use super::*;

    fn strip_all(src: &str, pretty: bool) -> String {
        let options = StripOptions {
            pretty,
            ignore_pragma: true,
            ..Default::default()
        };
        strip(src, &options).unwrap().code
    }

    /// Annotations are blanked and every kept token stays in its column.
    #[test]
    fn function_annotations_keep_columns() {
        let src = "function f(x: number): string { return x; }";
        let out = strip_all(src, false);
        assert_eq!(out, format!("function f(x{})         {{ return x; }}", " ".repeat(8)));
        for token in ["function", "f(", "{", "}"] {
            assert_eq!(out.find(token), src.find(token), "{token} moved");
        }
        assert_eq!(strip_all(src, true), "function f(x) { return x; }");
    }

    /// Type parameters, type arguments and typed-only fields are removed.
    #[test]
    fn class_generics_and_typed_fields() {
        let src = "class C<T> extends B<T> { x: T; }";
        assert_eq!(strip_all(src, true), "class C extends B { }");
        assert_eq!(strip_all(src, false), "class C    extends B    {       }");
    }

    /// A type import line is emptied, the value import is untouched.
    #[test]
    fn type_import_line_is_emptied() {
        let src = "import type {A} from 'm';\nimport {B} from 'm';";
        assert_eq!(strip_all(src, true), "\nimport {B} from 'm';");
        assert_eq!(
            strip_all(src, false),
            format!("{}\nimport {{B}} from 'm';", " ".repeat(25))
        );
    }

    /// Without a pragma the source is returned unchanged.
    #[test]
    fn no_pragma_passes_through() {
        let src = "let a: number = 1;\n";
        let out = strip(src, &StripOptions::default()).unwrap();
        assert_eq!(out.code, src);
        assert_eq!(out.mappings, None);
        assert_eq!(out.source_map, None);

        let src = "/* @noflow */\nlet a: number = 1;\n";
        assert_eq!(strip(src, &StripOptions::default()).unwrap().code, src);
        assert_eq!(strip_all(src, false), "/* @noflow */\nlet a         = 1;\n");
    }

    /// Pass-through with maps requested yields an identity line mapping.
    #[test]
    fn pass_through_maps_lines_to_themselves() {
        let src = "a();\nb();\n";
        let options = StripOptions {
            source_maps: SourceMapMode::External,
            ..Default::default()
        };
        let out = strip(src, &options).unwrap();
        assert_eq!(out.code, src);
        let lines: Vec<(usize, usize)> = out
            .mappings
            .unwrap()
            .iter()
            .map(|m| (m.generated_line, m.original_line))
            .collect();
        assert_eq!(lines, vec![(1, 1), (2, 2), (3, 3)]);
    }

    /// The pragma text itself is removed from its comment.
    #[test]
    fn pragma_is_removed() {
        let src = "/* @flow */\nlet a: T = 1;";
        let options = StripOptions::default();
        assert_eq!(strip(src, &options).unwrap().code, "/*       */\nlet a    = 1;");
        let options = StripOptions {
            pretty: true,
            ..Default::default()
        };
        assert_eq!(strip(src, &options).unwrap().code, "/*  */\nlet a = 1;");
    }

    /// An unterminated template literal is reported at its backtick.
    #[test]
    fn unterminated_template_fails_at_the_backtick() {
        let src = "// @flow\nconst s = `abc ${x}";
        let err = strip(src, &StripOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            StripError::MalformedSource {
                unterminated: Unterminated::Template,
                position: Position { line: 2, column: 11 },
            }
        ));
        assert_eq!(
            err.to_string(),
            "unterminated template literal at line 2, column 11"
        );
    }

    /// Unbalanced brackets fail the whole operation.
    #[test]
    fn unbalanced_syntax_fails() {
        let err = strip("// @flow\nfunction f(x: T {\n", &StripOptions::default()).unwrap_err();
        assert!(matches!(err, StripError::UnbalancedSyntax { .. }));
    }

    /// Default mode preserves the number of line breaks.
    #[test]
    fn default_mode_preserves_line_count() {
        let src = "// @flow\r\ntype A = {\r\n  a: number,\r\n};\r\nconst f = (x: A)\r\n  : number => x.a;\r\n";
        let out = strip_all(src, false);
        assert_eq!(out.matches('\n').count(), src.matches('\n').count());
        assert_eq!(out.matches('\r').count(), src.matches('\r').count());
        assert_eq!(out.len(), src.len());
    }

    /// Pretty mode collapses the blank lines stripping leaves behind.
    #[test]
    fn pretty_collapses_blank_lines() {
        let src = "// @flow\nimport type {A} from 'm';\n\ntype B = {\n  x: number,\n};\n\nconst c = 1;\n\n\n";
        let options = StripOptions {
            pretty: true,
            source_maps: SourceMapMode::External,
            ..Default::default()
        };
        let out = strip(src, &options).unwrap();
        assert_eq!(out.code, "// \n\nconst c = 1;\n");
        let original: Vec<usize> = out
            .mappings
            .unwrap()
            .iter()
            .map(|m| m.original_line)
            .take(3)
            .collect();
        assert_eq!(original, vec![1, 2, 8]);
    }

    /// Pre-existing blank lines away from stripped code are kept.
    #[test]
    fn pretty_keeps_unrelated_blank_lines() {
        let src = "a();\n\n\nb(x: T);\n";
        assert_eq!(strip_all(src, true), "a();\n\n\nb(x);\n");
    }

    /// A file with only types becomes empty in pretty mode.
    #[test]
    fn pretty_output_of_types_only_is_empty() {
        assert_eq!(strip_all("type A = 1;\n\ninterface B {}\n", true), "");
    }

    /// External sourcemaps name the source and map stripped columns back.
    #[test]
    fn external_sourcemap() {
        let src = "// @flow\nf(x: number, y);\n";
        let options = StripOptions {
            pretty: true,
            source_maps: SourceMapMode::External,
            source_filename: Some("input.js".into()),
            ..Default::default()
        };
        let out = strip(src, &options).unwrap();
        assert_eq!(out.code, "// \nf(x, y);\n");
        let sm = sourcemap::SourceMap::from_slice(out.source_map.unwrap().as_bytes()).unwrap();
        assert_eq!(sm.get_source(0), Some("input.js"));
        let tok = sm.lookup_token(1, 3).unwrap();
        assert_eq!((tok.get_src_line(), tok.get_src_col()), (1, 11));
    }

    /// Inline sourcemaps are appended as a data URL comment.
    #[test]
    fn inline_sourcemap() {
        let src = "// @flow\nlet a: T = 1;";
        let options = StripOptions {
            source_maps: SourceMapMode::Inline,
            ..Default::default()
        };
        let out = strip(src, &options).unwrap();
        assert!(out.source_map.is_none());
        assert_eq!(out.mappings.map(|m| m.len()), Some(2));
        let (code, comment) = out.code.split_once("\n//# ").unwrap();
        assert_eq!(code, "//      \nlet a    = 1;");
        assert!(comment.starts_with("sourceMappingURL=data:application/json;charset=utf-8;base64,"));
        assert!(comment.ends_with('\n'));
    }
}
