//! Line index with UTF-16 columns.
//!
//! Everything in this crate is byte-based internally. Token positions, error positions and
//! sourcemap columns, however, are reported the way JavaScript tooling counts them: columns in
//! UTF-16 code units. [`LineIndex`] maps a byte offset to `(line, utf16_col)`.
//!
//! Per-line checkpoints (every N chars) keep a conversion from rescanning the whole line, which
//! matters for minified inputs where a single line can be megabytes long. Offsets that fall
//! inside a multi-byte UTF-8 sequence clamp to the start of the containing scalar value.

use std::cmp::Ordering;

use crate::token::Position;

/// A precomputed UTF-16 column index for an entire string.
///
/// Lines end before their `\n`. For CRLF input the `\r` is excluded as well.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    s: &'a str,
    line_starts: Vec<usize>,
    lines: Vec<LineCheckpoints>,
}

impl<'a> LineIndex<'a> {
    pub fn new(s: &'a str) -> Self {
        let line_starts = line_starts(s);
        let mut lines: Vec<LineCheckpoints> = Vec::with_capacity(line_starts.len());
        for (i, &start) in line_starts.iter().enumerate() {
            let mut end = match line_starts.get(i + 1).copied() {
                Some(next) => next.saturating_sub(1),
                None => s.len(),
            };
            if end > start && s.as_bytes().get(end - 1) == Some(&b'\r') {
                end -= 1;
            }
            lines.push(LineCheckpoints::new(s, start, end));
        }
        Self {
            s,
            line_starts,
            lines,
        }
    }

    pub fn source(&self) -> &'a str {
        self.s
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte offsets where each line begins; always starts with `0`.
    pub fn line_starts(&self) -> &[usize] {
        &self.line_starts
    }

    /// Return the 0-based line containing `byte`. Offsets past the end land on the last line.
    pub fn line_for_byte(&self, byte: usize) -> usize {
        match self.line_starts.binary_search_by(|&probe| {
            if probe <= byte {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        }
    }

    /// Convert an absolute byte offset into a 0-based `(line, utf16_col)` pair.
    pub fn byte_to_line_utf16_col(&self, byte: usize) -> (usize, usize) {
        let line = self.line_for_byte(byte);
        let col = self.lines[line].byte_to_utf16_col(self.s, byte);
        (line, col)
    }

    /// 1-based position of `byte`, as reported in tokens and errors.
    pub fn position(&self, byte: usize) -> Position {
        let (line, column) = self.byte_to_line_utf16_col(byte);
        Position {
            line: line + 1,
            column: column + 1,
        }
    }
}

/// Byte offsets of line starts: `0`, then one past every `\n`.
pub fn line_starts(s: &str) -> Vec<usize> {
    let mut starts = vec![0usize];
    starts.extend(memchr::memchr_iter(b'\n', s.as_bytes()).map(|i| i + 1));
    starts
}

#[derive(Debug, Clone)]
struct LineCheckpoints {
    start: usize,
    end: usize,
    ascii: bool,
    checkpoints: Vec<Checkpoint>,
}

impl LineCheckpoints {
    const STRIDE_CHARS: usize = 64;

    fn new(s: &str, start: usize, end: usize) -> Self {
        let mut checkpoints = vec![Checkpoint {
            byte: start,
            utf16_col: 0,
        }];

        let line = &s[start..end];
        // Byte and UTF-16 columns coincide on ASCII lines.
        if line.is_ascii() {
            return Self {
                start,
                end,
                ascii: true,
                checkpoints,
            };
        }

        let mut utf16_col = 0usize;
        for (n, (rel, ch)) in line.char_indices().enumerate() {
            utf16_col += ch.len_utf16();
            if (n + 1) % Self::STRIDE_CHARS == 0 {
                checkpoints.push(Checkpoint {
                    byte: start + rel + ch.len_utf8(),
                    utf16_col,
                });
            }
        }
        if checkpoints.last().map(|c| c.byte) != Some(end) {
            checkpoints.push(Checkpoint {
                byte: end,
                utf16_col,
            });
        }

        Self {
            start,
            end,
            ascii: false,
            checkpoints,
        }
    }

    fn byte_to_utf16_col(&self, s: &str, abs_byte: usize) -> usize {
        if abs_byte <= self.start {
            return 0;
        }
        let clamped = abs_byte.min(self.end);
        if self.ascii {
            return clamped - self.start;
        }

        let cp_idx = match self.checkpoints.binary_search_by(|c| c.byte.cmp(&clamped)) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        };
        let cp = self.checkpoints[cp_idx];
        if cp.byte == clamped {
            return cp.utf16_col;
        }

        let mut cur_utf16 = cp.utf16_col;
        for (rel, ch) in s[cp.byte..self.end].char_indices() {
            if cp.byte + rel + ch.len_utf8() > clamped {
                break;
            }
            cur_utf16 += ch.len_utf16();
        }
        cur_utf16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Checkpoint {
    byte: usize,
    utf16_col: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Naive scan-from-line-start conversion used as the oracle.
    fn naive_col(line: &str, rel_byte: usize) -> usize {
        line.char_indices()
            .take_while(|(i, ch)| i + ch.len_utf8() <= rel_byte)
            .map(|(_, ch)| ch.len_utf16())
            .sum()
    }

    #[test]
    fn ascii_columns_equal_bytes() {
        let idx = LineIndex::new("abc");
        assert_eq!(idx.byte_to_line_utf16_col(0), (0, 0));
        assert_eq!(idx.byte_to_line_utf16_col(2), (0, 2));
        assert_eq!(idx.byte_to_line_utf16_col(3), (0, 3));
        assert_eq!(idx.position(1), Position { line: 1, column: 2 });
    }

    #[test]
    fn astral_chars_take_two_units() {
        let idx = LineIndex::new("a🙂b");
        assert_eq!(idx.byte_to_line_utf16_col(1), (0, 1));
        assert_eq!(idx.byte_to_line_utf16_col(5), (0, 3));
        // Inside the emoji: clamp to its start.
        assert_eq!(idx.byte_to_line_utf16_col(3), (0, 1));
    }

    #[test]
    fn bmp_multibyte_chars_take_one_unit() {
        let idx = LineIndex::new("あい");
        assert_eq!(idx.byte_to_line_utf16_col(3), (0, 1));
        assert_eq!(idx.byte_to_line_utf16_col(6), (0, 2));
    }

    #[test]
    fn positions_are_line_relative() {
        let idx = LineIndex::new("a🙂\nあb");
        assert_eq!(idx.line_starts(), &[0, 6]);
        assert_eq!(idx.line_count(), 2);
        assert_eq!(idx.byte_to_line_utf16_col(6), (1, 0));
        assert_eq!(idx.byte_to_line_utf16_col(9), (1, 1));
        assert_eq!(idx.position(9), Position { line: 2, column: 2 });
    }

    #[test]
    fn crlf_does_not_count_carriage_return() {
        let idx = LineIndex::new("ab\r\ncd");
        assert_eq!(idx.byte_to_line_utf16_col(3), (0, 2));
        assert_eq!(idx.byte_to_line_utf16_col(4), (1, 0));
    }

    #[test]
    fn checkpoints_match_naive_scan() {
        let mut line = String::new();
        for _ in 0..200 {
            line.push('a');
            line.push('🙂');
            line.push('あ');
        }
        let s = format!("{line}\nnext");
        let idx = LineIndex::new(&s);
        for rel in [0usize, 1, 2, 5, 63, 64, 65, 256, 999, 1500, line.len()] {
            let (_, got) = idx.byte_to_line_utf16_col(rel);
            assert_eq!(got, naive_col(&line, rel), "mismatch at byte {rel}");
        }
    }
}
