//! Error types for code generation and for executing generated codecs.

use crate::exception::ApplicationException;
use thiserror::Error;
use thrift_idl::ResolveError;

pub type Result<T> = std::result::Result<T, ThriftError>;

/// Generation-time failures. All of these are fatal for the document.
#[derive(Debug, Clone, Error)]
pub enum CodegenError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("FieldID for {struct_name}.{field}{} is null", line_suffix(.line))]
    MissingFieldId {
        struct_name: String,
        field: String,
        line: Option<u32>,
    },

    #[error("Field id {id} is declared more than once in {struct_name}")]
    DuplicateFieldId { struct_name: String, id: i16 },

    #[error("Invalid default value for {field}: {reason}")]
    InvalidDefault { field: String, reason: String },

    /// A generator bug, never expected for valid input.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn line_suffix(line: &Option<u32>) -> String {
    line.map(|l| format!(" on line {}", l)).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Unexpected end of input: needed {needed} bytes, {available} available")]
    EndOfFile { needed: usize, available: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    Unknown,
    InvalidData,
    NegativeSize,
    SizeLimit,
    BadVersion,
    NotImplemented,
    DepthLimit,
    MissingRequiredField,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProtocolError {
    pub kind: ProtocolErrorKind,
    pub message: String,
}

impl ProtocolError {
    pub fn new(kind: ProtocolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::new(ProtocolErrorKind::InvalidData, message)
    }

    pub fn missing_required_field(message: impl Into<String>) -> Self {
        Self::new(ProtocolErrorKind::MissingRequiredField, message)
    }
}

/// Any failure raised while executing a generated procedure.
#[derive(Debug, Error)]
pub enum ThriftError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Application(#[from] ApplicationException),

    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

impl ThriftError {
    pub fn protocol_kind(&self) -> Option<ProtocolErrorKind> {
        match self {
            ThriftError::Protocol(err) => Some(err.kind),
            _ => None,
        }
    }
}
