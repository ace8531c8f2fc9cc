//! Document loading utilities
//!
//! Documents arrive as the JSON form of the parser's syntax tree.

use crate::error::IdlError;
use crate::types::ThriftDocument;
use std::fs;
use std::path::Path;

pub fn parse_document_file<P: AsRef<Path>>(path: P) -> Result<ThriftDocument, IdlError> {
    let content = fs::read_to_string(&path).map_err(|source| IdlError::Read {
        path: path.as_ref().display().to_string(),
        source,
    })?;

    parse_document_content(&content)
}

pub fn parse_document_content(content: &str) -> Result<ThriftDocument, IdlError> {
    Ok(serde_json::from_str(content)?)
}
