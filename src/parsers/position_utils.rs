//! Conversions between tree-sitter byte offsets and LSP positions
//!
//! Tree-sitter reports byte offsets and UTF-8 columns, while LSP clients
//! address text by line and UTF-16 code unit. Every range stored in the
//! symbol index goes through [`LineIndex`] so that the two never get mixed.

use ropey::Rope;
use tower_lsp::lsp_types::{Position, Range};

/// Position lookup table for one document snapshot.
#[derive(Debug, Clone)]
pub struct LineIndex {
    rope: Rope,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        Self { rope: Rope::from_str(text) }
    }

    /// Converts a byte offset into an LSP position.
    ///
    /// Offsets past the end of the text clamp to the end of the document.
    pub fn position_of(&self, byte: usize) -> Position {
        let byte = byte.min(self.rope.len_bytes());
        let line = self.rope.byte_to_line(byte);
        let char_idx = self.rope.byte_to_char(byte);
        let line_start = self.rope.line_to_char(line);
        let character = self.rope.char_to_utf16_cu(char_idx) - self.rope.char_to_utf16_cu(line_start);
        Position::new(line as u32, character as u32)
    }

    /// Converts a byte span into an LSP range.
    pub fn range_of(&self, start: usize, end: usize) -> Range {
        Range::new(self.position_of(start), self.position_of(end))
    }

    /// Converts an LSP position into a byte offset.
    ///
    /// Positions past the end of a line clamp to the end of that line, and
    /// lines past the end of the document clamp to the end of the document.
    pub fn offset_of(&self, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.rope.len_lines() {
            return self.rope.len_bytes();
        }
        let line_start = self.rope.line_to_char(line);
        let line_len = self.line_len_without_newline(line);
        let line_start_cu = self.rope.char_to_utf16_cu(line_start);
        let line_end_cu = self.rope.char_to_utf16_cu(line_start + line_len);
        let target_cu = (line_start_cu + position.character as usize).min(line_end_cu);
        let char_idx = self.rope.utf16_cu_to_char(target_cu);
        self.rope.char_to_byte(char_idx)
    }

    /// Returns the text of `line` without its line terminator.
    pub fn line_text(&self, line: u32) -> String {
        let line = line as usize;
        if line >= self.rope.len_lines() {
            return String::new();
        }
        let start = self.rope.line_to_char(line);
        let len = self.line_len_without_newline(line);
        self.rope.slice(start..start + len).to_string()
    }

    fn line_len_without_newline(&self, line: usize) -> usize {
        let slice = self.rope.line(line);
        let mut len = slice.len_chars();
        while len > 0 {
            let c = slice.char(len - 1);
            if c == '\n' || c == '\r' {
                len -= 1;
            } else {
                break;
            }
        }
        len
    }
}

/// Returns true when `position` lies within `range`, end inclusive.
///
/// The inclusive end lets a cursor placed right after the last character of a
/// string literal still resolve to that literal.
pub fn range_contains(range: &Range, position: Position) -> bool {
    position_le(range.start, position) && position_le(position, range.end)
}

/// Returns true when `a` is before or equal to `b`.
pub fn position_le(a: Position, b: Position) -> bool {
    (a.line, a.character) <= (b.line, b.character)
}
