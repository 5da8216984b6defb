//! LSP protocol handler implementations
//!
//! This module contains the `tower_lsp::LanguageServer` implementation for
//! the Drupal backend:
//! - Lifecycle handlers (initialize, initialized, shutdown)
//! - Document lifecycle (did_open, did_change, did_close)
//! - Queries (hover, goto_definition, completion, code_action)

use std::path::PathBuf;
use std::sync::Arc;

use tower_lsp::LanguageServer;
use tower_lsp::jsonrpc::Result as LspResult;
use tower_lsp::lsp_types::{
    CodeActionKind, CodeActionOptions, CodeActionParams, CodeActionProviderCapability, CodeActionResponse,
    CompletionOptions, CompletionOptionsCompletionItem, CompletionParams, CompletionResponse,
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams, GotoDefinitionParams,
    GotoDefinitionResponse, Hover, HoverParams, HoverProviderCapability, InitializeParams, InitializeResult,
    InitializedParams, OneOf, ServerCapabilities, ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind,
};
use tracing::{debug, info, warn};

use crate::lsp::document::LspDocument;

use super::state::DrupalBackend;

/// Picks the workspace root: the command-line override, then the client's
/// root URI, then its first workspace folder.
fn workspace_root(override_root: Option<&PathBuf>, params: &InitializeParams) -> Option<PathBuf> {
    if let Some(root) = override_root {
        return Some(root.clone());
    }
    #[allow(deprecated)]
    let root_uri = params.root_uri.as_ref();
    let folder_uri = params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
        .map(|folder| &folder.uri);
    root_uri.or(folder_uri).and_then(|uri| match uri.to_file_path() {
        Ok(path) => Some(path),
        Err(()) => {
            warn!("Failed to convert root URI to path: {}. Skipping workspace indexing.", uri);
            None
        }
    })
}

fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::INCREMENTAL)),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        definition_provider: Some(OneOf::Left(true)),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(vec!["@".to_string(), "'".to_string(), "\"".to_string()]),
            all_commit_characters: None,
            resolve_provider: Some(false),
            completion_item: Some(CompletionOptionsCompletionItem {
                label_details_support: Some(true),
            }),
            work_done_progress_options: Default::default(),
        }),
        code_action_provider: Some(CodeActionProviderCapability::Options(CodeActionOptions {
            code_action_kinds: Some(vec![CodeActionKind::REFACTOR_INLINE]),
            ..Default::default()
        })),
        ..Default::default()
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for DrupalBackend {
    /// Handles the LSP initialize request, recording the workspace root.
    async fn initialize(&self, params: InitializeParams) -> LspResult<InitializeResult> {
        info!("Received initialize: {:?}", params.client_info);

        let root = workspace_root(self.root_override.as_ref(), &params);
        info!("Workspace root: {:?}", root);
        *self.root_dir.write().await = root;

        Ok(InitializeResult {
            capabilities: server_capabilities(),
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    /// Starts the workspace scan. Queries block until it finishes.
    async fn initialized(&self, _params: InitializedParams) {
        match self.root_dir.read().await.clone() {
            Some(root) => self.start_workspace(root),
            None => {
                info!("No workspace root, serving open documents only");
                self.engine.mark_ready();
            }
        }
    }

    /// Handles the LSP shutdown request.
    async fn shutdown(&self) -> LspResult<()> {
        info!("Received shutdown request");
        self.stop_file_watcher();
        let _ = self.shutdown_tx.send(());
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        let text = params.text_document.text;
        info!("Opening document: URI={}, version={}", uri, version);

        let document = Arc::new(LspDocument::new(self.next_document_id(), uri.clone(), &text, version));
        if let Some(previous) = self.documents_by_uri.insert(uri.clone(), document) {
            debug!("Replaced already open document {} (id {})", uri, previous.id);
        }
        self.index_document(uri, version, text).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        debug!("textDocument/didChange: URI={}, version={}", uri, version);

        let Some(document) = self.documents_by_uri.get(&uri).map(|entry| entry.value().clone()) else {
            warn!("Failed to find document with URI={}", uri);
            return;
        };
        match document.apply(params.content_changes, version).await {
            Ok(text) => self.index_document(uri, version, text).await,
            Err(e) if e.is_benign() => debug!("{}", e),
            Err(e) => warn!("Failed to apply changes to {}: {}", uri, e),
        }
    }

    /// Closes a document: the file on disk becomes authoritative again.
    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        match self.documents_by_uri.remove(&uri) {
            Some((_, document)) => info!("Closed document: {}, id: {}", uri, document.id),
            None => warn!("Failed to find document with URI={}", uri),
        }
        self.reload_closed_document(uri.clone()).await;
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn hover(&self, params: HoverParams) -> LspResult<Option<Hover>> {
        let position = params.text_document_position_params;
        Ok(self
            .engine
            .hover(&position.text_document.uri, position.position)
            .await)
    }

    async fn goto_definition(&self, params: GotoDefinitionParams) -> LspResult<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params;
        Ok(self
            .engine
            .definition(&position.text_document.uri, position.position)
            .await)
    }

    async fn completion(&self, params: CompletionParams) -> LspResult<Option<CompletionResponse>> {
        let position = params.text_document_position;
        Ok(self
            .engine
            .completion(&position.text_document.uri, position.position)
            .await)
    }

    async fn code_action(&self, params: CodeActionParams) -> LspResult<Option<CodeActionResponse>> {
        let actions = self
            .engine
            .code_action(&params.text_document.uri, params.range.start)
            .await;
        Ok((!actions.is_empty()).then_some(actions))
    }
}
