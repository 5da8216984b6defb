pub mod backend;
pub mod document;
pub mod engine;
pub mod features;
pub mod models;
pub mod resolver;
pub mod symbol_index;
pub mod workspace;
