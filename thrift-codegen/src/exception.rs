//! Generic protocol-level exception carried in EXCEPTION messages.

use crate::error::Result;
use crate::protocol::{Protocol, WireType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const STRUCT_NAME: &str = "TApplicationException";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationExceptionKind {
    Unknown,
    UnknownMethod,
    InvalidMessageType,
    WrongMethodName,
    BadSequenceId,
    /// Reply carried neither a result nor a declared exception.
    MissingResult,
    InternalError,
    ProtocolError,
    InvalidTransform,
    InvalidProtocol,
    UnsupportedClientType,
}

impl ApplicationExceptionKind {
    pub fn code(self) -> i32 {
        match self {
            ApplicationExceptionKind::Unknown => 0,
            ApplicationExceptionKind::UnknownMethod => 1,
            ApplicationExceptionKind::InvalidMessageType => 2,
            ApplicationExceptionKind::WrongMethodName => 3,
            ApplicationExceptionKind::BadSequenceId => 4,
            ApplicationExceptionKind::MissingResult => 5,
            ApplicationExceptionKind::InternalError => 6,
            ApplicationExceptionKind::ProtocolError => 7,
            ApplicationExceptionKind::InvalidTransform => 8,
            ApplicationExceptionKind::InvalidProtocol => 9,
            ApplicationExceptionKind::UnsupportedClientType => 10,
        }
    }

    /// Codes outside the known range map to `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => ApplicationExceptionKind::UnknownMethod,
            2 => ApplicationExceptionKind::InvalidMessageType,
            3 => ApplicationExceptionKind::WrongMethodName,
            4 => ApplicationExceptionKind::BadSequenceId,
            5 => ApplicationExceptionKind::MissingResult,
            6 => ApplicationExceptionKind::InternalError,
            7 => ApplicationExceptionKind::ProtocolError,
            8 => ApplicationExceptionKind::InvalidTransform,
            9 => ApplicationExceptionKind::InvalidProtocol,
            10 => ApplicationExceptionKind::UnsupportedClientType,
            _ => ApplicationExceptionKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ApplicationException {
    pub kind: ApplicationExceptionKind,
    pub message: String,
}

impl ApplicationException {
    pub fn new(kind: ApplicationExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ApplicationExceptionKind::Unknown, message)
    }

    pub fn unknown_method(method: &str) -> Self {
        Self::new(
            ApplicationExceptionKind::UnknownMethod,
            format!("Unknown function {}", method),
        )
    }

    pub fn read(input: &mut dyn Protocol) -> Result<Self> {
        let mut message = String::new();
        let mut kind = ApplicationExceptionKind::Unknown;

        input.read_struct_begin()?;
        loop {
            let field = input.read_field_begin()?;
            if field.field_type == WireType::Stop {
                break;
            }
            match (field.id, field.field_type) {
                (1, WireType::String) => message = input.read_string()?,
                (2, WireType::I32) => kind = ApplicationExceptionKind::from_code(input.read_i32()?),
                (_, other) => input.skip(other)?,
            }
            input.read_field_end()?;
        }
        input.read_struct_end()?;

        Ok(Self { kind, message })
    }

    pub fn write(&self, output: &mut dyn Protocol) -> Result<()> {
        output.write_struct_begin(STRUCT_NAME)?;
        output.write_field_begin("message", WireType::String, 1)?;
        output.write_string(&self.message)?;
        output.write_field_end()?;
        output.write_field_begin("type", WireType::I32, 2)?;
        output.write_i32(self.kind.code())?;
        output.write_field_end()?;
        output.write_field_stop()?;
        output.write_struct_end()
    }
}
