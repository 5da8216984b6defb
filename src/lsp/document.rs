use ropey::Rope;

use tokio::sync::RwLock;
use tower_lsp::lsp_types::{Position, TextDocumentContentChangeEvent, Url};

use crate::errors::IndexError;

pub use crate::lsp::models::{LspDocument, LspDocumentState};

/// Converts an LSP position (UTF-16 columns) to a char index in the Rope.
///
/// Columns past the end of a line clamp to the line end, lines past the end
/// of the text clamp to the end of the text.
fn position_to_char_index(position: &Position, text: &Rope) -> usize {
    let line = position.line as usize;
    if line >= text.len_lines() {
        return text.len_chars();
    }
    let line_start = text.line_to_char(line);
    let line_slice = text.line(line);
    let mut line_len = line_slice.len_chars();
    while line_len > 0 && matches!(line_slice.char(line_len - 1), '\n' | '\r') {
        line_len -= 1;
    }
    let start_cu = text.char_to_utf16_cu(line_start);
    let end_cu = text.char_to_utf16_cu(line_start + line_len);
    let target = (start_cu + position.character as usize).min(end_cu);
    text.utf16_cu_to_char(target)
}

impl LspDocumentState {
    /// Applies a list of content changes in order.
    ///
    /// Returns the full updated text, or an error when `version` is not newer
    /// than the current one; the text is left untouched in that case.
    pub fn apply(&mut self, changes: Vec<TextDocumentContentChangeEvent>, version: i32) -> Result<String, IndexError> {
        if version <= self.version {
            return Err(IndexError::OutdatedVersion {
                uri: self.uri.clone(),
                incoming: version,
                current: self.version,
            });
        }
        for change in changes {
            if let Some(range) = change.range {
                let start = position_to_char_index(&range.start, &self.text);
                let end = position_to_char_index(&range.end, &self.text).max(start);
                self.text.remove(start..end);
                self.text.insert(start, &change.text);
            } else {
                self.text = Rope::from_str(&change.text);
            }
        }
        self.version = version;
        Ok(self.text.to_string())
    }
}

impl LspDocument {
    pub fn new(id: u32, uri: Url, text: &str, version: i32) -> Self {
        Self {
            id,
            state: RwLock::new(LspDocumentState {
                uri,
                text: Rope::from_str(text),
                version,
            }),
        }
    }

    /// Returns the URI of the document.
    pub async fn uri(&self) -> Url {
        self.state.read().await.uri.clone()
    }

    /// Returns the current text of the document as a string.
    pub async fn text(&self) -> String {
        self.state.read().await.text.to_string()
    }

    /// Returns the current version of the document.
    pub async fn version(&self) -> i32 {
        self.state.read().await.version
    }

    /// Applies changes to the document and returns the new text.
    pub async fn apply(&self, changes: Vec<TextDocumentContentChangeEvent>, version: i32) -> Result<String, IndexError> {
        let mut state = self.state.write().await;
        state.apply(changes, version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_lsp::lsp_types::Range;

    /// Helper to create a test LspDocument.
    fn create_test_document(uri: &str, text: &str) -> Arc<LspDocument> {
        Arc::new(LspDocument::new(1, Url::parse(uri).unwrap(), text, 0))
    }

    fn ranged(start: (u32, u32), end: (u32, u32), text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range: Some(Range {
                start: Position { line: start.0, character: start.1 },
                end: Position { line: end.0, character: end.1 },
            }),
            range_length: None,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_apply_full_change() {
        let doc = create_test_document("file:///mymod.module", "initial text");
        let changes = vec![TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: "new text".to_string(),
        }];

        let result = doc.apply(changes, 1).await;
        assert_eq!(result.ok().as_deref(), Some("new text"), "Text should be updated");
        assert_eq!(doc.version().await, 1, "Version should be updated");
    }

    #[tokio::test]
    async fn test_apply_incremental_change() {
        let doc = create_test_document("file:///mymod.module", "hello world");
        let result = doc.apply(vec![ranged((0, 6), (0, 11), "there")], 1).await;
        assert_eq!(result.ok().as_deref(), Some("hello there"));
        assert_eq!(doc.version().await, 1, "Version should be updated");
    }

    #[tokio::test]
    async fn test_apply_multiple_incremental() {
        let doc = create_test_document("file:///mymod.module", "hello world\nsecond line");
        let changes = vec![
            ranged((0, 6), (0, 11), "rust"),
            ranged((0, 0), (0, 5), "hi"),
            ranged((1, 0), (1, 6), "next"),
        ];

        let result = doc.apply(changes, 1).await;
        assert_eq!(result.ok().as_deref(), Some("hi rust\nnext line"));
        assert_eq!(doc.version().await, 1, "Version should be updated");
    }

    #[tokio::test]
    async fn test_apply_utf16_columns() {
        // "😀" is two UTF-16 code units.
        let doc = create_test_document("file:///mymod.module", "t('😀 @name');");
        let result = doc.apply(vec![ranged((0, 6), (0, 11), "@user")], 1).await;
        assert_eq!(result.ok().as_deref(), Some("t('😀 @user');"));
    }

    #[tokio::test]
    async fn test_long_edit_sessions_keep_only_current_text() {
        let doc = create_test_document("file:///mymod.module", "");
        for version in 1..=500 {
            let result = doc.apply(vec![ranged((0, 0), (0, 0), "x")], version).await;
            assert!(result.is_ok());
        }
        let state = doc.state.read().await;
        assert_eq!(state.version, 500);
        assert_eq!(state.text.len_chars(), 500);
        assert_eq!(state.text.to_string(), "x".repeat(500));
    }

    #[tokio::test]
    async fn test_apply_outdated_version() {
        let doc = create_test_document("file:///mymod.module", "initial text");
        let changes = vec![TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: "new text".to_string(),
        }];

        assert!(doc.apply(changes.clone(), 1).await.is_ok());
        let result = doc.apply(changes, 1).await;
        assert!(matches!(result, Err(IndexError::OutdatedVersion { incoming: 1, current: 1, .. })));
        assert_eq!(doc.text().await, "new text", "Text should remain from previous change");
        assert_eq!(doc.version().await, 1, "Version should not change");
    }
}
