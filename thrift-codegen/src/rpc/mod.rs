//! Client and Processor runtime built on the generated service codecs.

pub mod client;
pub mod processor;

pub use client::{Client, PendingCall};
pub use processor::{Processor, ServiceHandler};

use crate::error::ThriftError;
use crate::exception::ApplicationException;
use crate::value::StructValue;
use thiserror::Error;

/// Failure outcome of a single client call.
#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Application(#[from] ApplicationException),

    /// One of the method's declared exceptions.
    #[error("Call raised declared exception {}", .0.name)]
    Declared(StructValue),

    #[error(transparent)]
    Protocol(#[from] ThriftError),

    #[error("Call was dropped before a reply arrived")]
    Cancelled,
}

/// Failure returned by a [`ServiceHandler`].
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Replied as the matching declared exception slot of the result struct.
    #[error("Handler raised declared exception {}", .0.name)]
    Declared(StructValue),

    /// Replied as an UNKNOWN application exception carrying the message.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to decode arguments for {method}: {source}")]
    InvalidArguments {
        method: String,
        #[source]
        source: ThriftError,
    },

    #[error(transparent)]
    Thrift(#[from] ThriftError),
}
