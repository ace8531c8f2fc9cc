//! Parsed Thrift document model and type resolution
//!
//! This crate provides the types produced by the Thrift IDL parser, helpers
//! for loading parsed documents, namespace resolution and the symbol table
//! used to resolve identifier references to their definitions.

pub mod error;
pub mod namespace;
pub mod parse;
pub mod resolver;
pub mod search;
pub mod types;
pub mod utils;

pub use error::*;
pub use namespace::*;
pub use parse::{parse_document_content, parse_document_file};
pub use resolver::*;
pub use search::*;
pub use types::*;
