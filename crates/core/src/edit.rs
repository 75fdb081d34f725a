//! Edit and sourcemap utilities.
//!
//! The stripper reports [`StripRange`]s, byte ranges of the input that hold type-only syntax.
//! This module turns them into [`Edit`]s (non-overlapping byte-range replacements over the
//! input), tracks where every output byte came from, and builds sourcemaps and line mappings
//! from that origin map.
//!
//! Key ideas:
//!
//! - Internal offsets are byte-based.
//! - Sourcemap columns are emitted as UTF-16 code unit columns (matching typical JS sourcemap
//!   consumers).
//! - In [`EditMode::Blank`] every stripped character becomes one space per UTF-16 code unit and
//!   line breaks are kept, so everything that survives stays on its line and column.
//! - In [`EditMode::Delete`] stripped text disappears except for its line breaks.
//! - A range may carry a moved suffix (the `=>` of an arrow function whose return type starts
//!   on an earlier line). The suffix is emitted at the start of the replacement and keeps its
//!   original origins.
//!
//! Invariants:
//!
//! - `edits` are sorted by ascending `start` and do not overlap ([`validate_edits`]).
//! - Every output byte has either a `Some(input_byte)` origin or is inserted padding (`None`).

use crate::{StripError, utf16::LineIndex};

/// A byte range of the input to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripRange {
    pub start: usize,
    pub end: usize,
    /// Keep `moved..end` and emit it where the range starts.
    pub moved: Option<usize>,
    /// Never widen this range over the whitespace before it.
    pub pinned: bool,
}

impl StripRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            moved: None,
            pinned: false,
        }
    }

    pub fn pinned(start: usize, end: usize) -> Self {
        Self {
            pinned: true,
            ..Self::new(start, end)
        }
    }

    pub fn moved(start: usize, end: usize, moved_from: usize) -> Self {
        Self {
            moved: Some(moved_from),
            ..Self::new(start, end)
        }
    }
}

/// Sort ranges, drop empty ones and merge the ones that overlap.
///
/// Touching ranges merge too, unless one of them carries a moved suffix.
pub fn normalize_ranges(mut ranges: Vec<StripRange>) -> Vec<StripRange> {
    ranges.retain(|r| r.start < r.end);
    ranges.sort_by_key(|r| (r.start, r.end));

    let mut merged: Vec<StripRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        if let Some(last) = merged.last_mut() {
            let joins = range.start < last.end
                || (range.start == last.end && last.moved.is_none() && range.moved.is_none());
            if joins {
                if range.end > last.end {
                    last.end = range.end;
                    last.moved = range.moved;
                }
                last.pinned |= range.pinned;
                continue;
            }
        }
        merged.push(range);
    }
    merged
}

/// How stripped text is replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditMode {
    /// Replace with spaces, keeping line breaks.
    #[default]
    Blank,
    /// Remove, keeping line breaks.
    Delete,
}

/// A source-to-source rewrite of one stripped range.
#[derive(Debug, Clone)]
pub struct Edit {
    /// Start byte offset (inclusive) in the input code.
    pub start: usize,
    /// End byte offset (exclusive) in the input code.
    pub end: usize,
    /// Replacement text inserted into the output code.
    pub replacement: String,
    /// For each output byte in `replacement`, the originating byte offset in the input code.
    ///
    /// - `Some(input_byte)` means this output byte came from (or blanks) the input byte.
    /// - `None` means this output byte is inserted padding and should be considered unmapped.
    pub output_byte_to_input_byte: Vec<Option<usize>>,
    /// If non-zero, the first `moved_len` bytes of `replacement` were moved from the end of the
    /// edit span.
    pub moved_len: usize,
}

/// Turn normalized ranges into edits over `source`.
pub fn edits_from_ranges(source: &str, ranges: &[StripRange], mode: EditMode) -> Vec<Edit> {
    let mut edits: Vec<Edit> = Vec::with_capacity(ranges.len());
    let mut floor = 0usize;
    for range in ranges {
        let start = match mode {
            EditMode::Delete if !range.pinned => widen_left(source, range.start, range.end, floor),
            _ => range.start,
        };
        let keep_from = range.moved.unwrap_or(range.end);
        let moved = &source[keep_from..range.end];

        let mut replacement = String::with_capacity(range.end - start);
        let mut origins: Vec<Option<usize>> = Vec::with_capacity(range.end - start);
        replacement.push_str(moved);
        origins.extend((keep_from..range.end).map(Some));

        for (off, ch) in source[start..keep_from].char_indices() {
            let at = start + off;
            match (ch, mode) {
                ('\n' | '\r', _) => {
                    replacement.push(ch);
                    origins.push(Some(at));
                }
                (_, EditMode::Blank) => {
                    for _ in 0..ch.len_utf16() {
                        replacement.push(' ');
                        origins.push(Some(at));
                    }
                }
                (_, EditMode::Delete) => {}
            }
        }

        if mode == EditMode::Blank && !moved.is_empty() {
            // Pad for the moved text so the rest of its line keeps its columns.
            for _ in 0..moved.encode_utf16().count() {
                replacement.push(' ');
                origins.push(None);
            }
        }

        edits.push(Edit {
            start,
            end: range.end,
            replacement,
            output_byte_to_input_byte: origins,
            moved_len: moved.len(),
        });
        floor = range.end;
    }
    edits
}

/// Extend `start` left over spaces and tabs when the span is followed by whitespace, a closing
/// separator or the end of input, unless that would glue two words together.
fn widen_left(source: &str, start: usize, end: usize, floor: usize) -> usize {
    let after = source[end..].chars().next();
    if after.is_some_and(|c| {
        !matches!(c, ' ' | '\t' | '\n' | '\r' | ',' | ';' | ')' | ']' | '}')
    }) {
        return start;
    }
    let bytes = source.as_bytes();
    let mut widened = start;
    while widened > floor && matches!(bytes[widened - 1], b' ' | b'\t') {
        widened -= 1;
    }
    if widened == start {
        return start;
    }
    let before = source[..widened].chars().next_back();
    if before.is_some_and(is_word_char) && after.is_some_and(is_word_char) {
        start
    } else {
        widened
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || !c.is_ascii()
}

/// Validate edit invariants required by this module.
///
/// This performs cheap structural checks only:
///
/// - `start <= end` and `end <= input_len`
/// - edits are non-overlapping (when provided in ascending `start` order)
/// - `output_byte_to_input_byte.len() == replacement.len()`
/// - `moved_len <= replacement.len()`
/// - any `Some(input_byte)` origin is `< input_len`
pub fn validate_edits(input_len: usize, edits: &[Edit]) -> Result<(), StripError> {
    let mut prev_end: usize = 0;
    for (idx, e) in edits.iter().enumerate() {
        if e.start > e.end {
            return Err(StripError::InvalidEdit(format!(
                "start > end at index {idx}: start={}, end={}",
                e.start, e.end
            )));
        }
        if e.end > input_len {
            return Err(StripError::InvalidEdit(format!(
                "edit out of bounds at index {idx}: end={} > input_len={}",
                e.end, input_len
            )));
        }
        if idx > 0 && e.start < prev_end {
            return Err(StripError::OverlappingEdits {
                a_start: edits[idx - 1].start,
                a_end: edits[idx - 1].end,
                b_start: e.start,
                b_end: e.end,
            });
        }
        if e.output_byte_to_input_byte.len() != e.replacement.len() {
            return Err(StripError::InvalidEdit(format!(
                "output_byte_to_input_byte length mismatch at index {idx}: map_len={}, replacement_len={}",
                e.output_byte_to_input_byte.len(),
                e.replacement.len()
            )));
        }
        if e.moved_len > e.replacement.len() {
            return Err(StripError::InvalidEdit(format!(
                "moved_len too large at index {idx}: moved_len={} > replacement_len={}",
                e.moved_len,
                e.replacement.len()
            )));
        }
        if let Some(in_byte) = e
            .output_byte_to_input_byte
            .iter()
            .flatten()
            .find(|&&b| b >= input_len)
        {
            return Err(StripError::InvalidEdit(format!(
                "mapped input byte out of bounds at index {idx}: in_byte={in_byte} >= input_len={input_len}"
            )));
        }
        prev_end = e.end;
    }
    Ok(())
}

/// Build a map from output byte offset to input byte offset.
///
/// Unchanged bytes map 1:1; replacement bytes take their origins from the edit.
pub fn build_output_to_input_map(input_len: usize, edits: &[Edit]) -> Vec<Option<usize>> {
    let mut out_to_in: Vec<Option<usize>> = Vec::with_capacity(input_len);
    let mut in_cursor = 0usize;
    for e in edits {
        out_to_in.extend((in_cursor..e.start).map(Some));
        out_to_in.extend_from_slice(&e.output_byte_to_input_byte);
        in_cursor = e.end;
    }
    out_to_in.extend((in_cursor..input_len).map(Some));
    out_to_in
}

/// Create a sourcemap for `output_code`, mapping back to the indexed input.
///
/// Mapping model:
///
/// - An anchor is added at every output line start and wherever the origin of consecutive
///   output bytes stops being contiguous (moved text, the end of a deletion, padding).
/// - Blanked bytes map to the character they replace, so a blanked span and the code around it
///   share one segment.
/// - Inserted padding is marked unmapped (`u32::MAX`/no source).
pub fn create_sourcemap(
    input: &LineIndex<'_>,
    output_code: &str,
    source_filename: &str,
    out_to_in: &[Option<usize>],
) -> sourcemap::SourceMap {
    let out_utf16 = LineIndex::new(output_code);
    let bytes = output_code.as_bytes();

    let mut builder = sourcemap::SourceMapBuilder::new(None);
    let source_id = builder.add_source(source_filename);
    builder.set_source_contents(source_id, Some(input.source()));

    // Origin of the previous byte on the current line; `None` at a line start.
    let mut prev: Option<Option<usize>> = None;
    for (out_byte, &origin) in out_to_in.iter().enumerate().take(bytes.len()) {
        match bytes[out_byte] {
            b'\n' => {
                prev = None;
                continue;
            }
            b'\r' => continue,
            _ => {}
        }
        let contiguous = match (prev, origin) {
            (Some(Some(p)), Some(o)) => o == p + 1,
            (Some(None), None) => true,
            _ => false,
        };
        prev = Some(origin);
        if contiguous {
            continue;
        }

        let (out_line, out_col) = out_utf16.byte_to_line_utf16_col(out_byte);
        match origin {
            Some(in_byte) => {
                let (in_line, in_col) = input.byte_to_line_utf16_col(in_byte);
                builder.add(
                    out_line as u32,
                    out_col as u32,
                    in_line as u32,
                    in_col as u32,
                    Some(source_filename),
                    None,
                    false,
                );
            }
            None => {
                builder.add(
                    out_line as u32,
                    out_col as u32,
                    u32::MAX,
                    u32::MAX,
                    None,
                    None,
                    false,
                );
            }
        }
    }

    builder.into_sourcemap()
}

/// Serialize a sourcemap to JSON.
pub fn sourcemap_to_json(map: &sourcemap::SourceMap) -> Result<String, StripError> {
    let mut buf: Vec<u8> = Vec::new();
    map.to_writer(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Association of one output line with the input line it came from. Both are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineMapping {
    pub generated_line: usize,
    pub original_line: usize,
}

/// One mapping per output line, taken from the first mapped byte on that line (its line break
/// included). Lines without any mapped byte fall back to the last input line.
pub fn line_mappings(
    input: &LineIndex<'_>,
    output_code: &str,
    out_to_in: &[Option<usize>],
) -> Vec<LineMapping> {
    let starts = crate::utf16::line_starts(output_code);
    let last_input_line = input.line_count();
    starts
        .iter()
        .enumerate()
        .map(|(line, &start)| {
            let end = starts
                .get(line + 1)
                .copied()
                .unwrap_or(output_code.len())
                .min(out_to_in.len());
            let original_line = out_to_in[start.min(end)..end]
                .iter()
                .flatten()
                .next()
                .map_or(last_input_line, |&b| input.line_for_byte(b) + 1);
            LineMapping {
                generated_line: line + 1,
                original_line,
            }
        })
        .collect()
}
