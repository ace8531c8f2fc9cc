pub mod check;
pub mod generate;
pub mod inspect;

use anyhow::{Context, Result};
use std::path::Path;
use thrift_idl::{parse_document_file, ThriftDocument};

pub(crate) fn load_document(path: &Path) -> Result<ThriftDocument> {
    parse_document_file(path).with_context(|| format!("Failed to load document {}", path.display()))
}
