use ropey::Rope;

use tower_lsp::lsp_types::Url;

/// State for an open text document managed by the LSP server.
///
/// Only the current text is kept; the engine snapshots it on every version.
#[derive(Debug)]
pub struct LspDocumentState {
    pub uri: Url,
    pub text: Rope,
    pub version: i32,
}

/// LSP document with state for open files.
#[derive(Debug)]
pub struct LspDocument {
    pub id: u32,
    pub state: tokio::sync::RwLock<LspDocumentState>,
}
