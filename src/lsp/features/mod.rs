//! Query handlers behind the protocol methods
//!
//! Each handler is a pure function over a read view of the symbol index and,
//! where it needs text, one document snapshot.

pub mod code_action;
pub mod completion;
pub mod goto_definition;
pub mod hover;
