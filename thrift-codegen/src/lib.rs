//! # thrift-codegen
//!
//! Binary-protocol codec and RPC codegen engine for parsed Thrift documents.
//!
//! This crate turns a resolved document into executable codecs:
//!
//! - **Codec IR** - Decode/encode procedures for every struct, union and exception
//! - **Service Codecs** - Synthesized argument/result structs and method tables
//! - **Virtual Machine** - Executes the IR against any [`protocol::Protocol`]
//! - **RPC Runtime** - `Client` and `Processor` driven by the service codecs
//! - **TypeScript Generation** - Render the same IR as TypeScript classes
//!
//! ## Example
//!
//! ```rust,ignore
//! use thrift_codegen::{compile_document, BinaryProtocol, MemoryTransport, StructValue, Vm};
//!
//! let compiled = compile_document(&document)?;
//! let mut output = BinaryProtocol::new(MemoryTransport::new());
//! Vm::new(&compiled).encode(&StructValue::new("User").with("id", 1), &mut output)?;
//! ```

pub mod codec;
pub mod compiler;
pub mod constants;
pub mod error;
pub mod exception;
pub mod ir;
pub mod protocol;
pub mod rpc;
pub mod service;
pub mod structs;
pub mod typescript;
pub mod value;
pub mod vm;

// Re-export commonly used items
pub use compiler::{compile_document, CompiledDocument, DocumentCompiler};
pub use error::{CodegenError, ProtocolError, ProtocolErrorKind, Result, ThriftError, TransportError};
pub use exception::{ApplicationException, ApplicationExceptionKind};
pub use protocol::{
    BinaryProtocol, BinaryProtocolConfig, MemoryTransport, MessageHeader, MessageType, Protocol, Transport,
    WireType,
};
pub use rpc::{CallError, Client, HandlerError, PendingCall, ProcessError, Processor, ServiceHandler};
pub use service::{MethodCodec, ServiceCodec};
pub use structs::{FieldLayout, StructCodec};
pub use typescript::{write_typescript_to_file, TypeScriptCompiler, TypeScriptConfig, TypeScriptOutput};
pub use value::{StructValue, Value};
pub use vm::Vm;
