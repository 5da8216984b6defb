pub mod config;
pub mod errors;
pub mod extractors;
pub mod ir;
pub mod logging;
pub mod lsp;
pub mod parsers;
