//! Abstract protocol handle consumed by generated codecs.
//!
//! Generated procedures only ever talk to [`Protocol`]; the binary protocol in
//! [`binary`] is the one wire format implemented here.

pub mod binary;
pub mod transport;

pub use binary::{BinaryProtocol, BinaryProtocolConfig};
pub use transport::{MemoryTransport, Transport};

use crate::error::{ProtocolError, ProtocolErrorKind, Result};
use serde::{Deserialize, Serialize};

/// On-the-wire shape tag written alongside every field and container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WireType {
    Stop,
    Void,
    Bool,
    Byte,
    Double,
    I16,
    I32,
    I64,
    String,
    Struct,
    Map,
    Set,
    List,
}

impl WireType {
    pub fn code(self) -> u8 {
        match self {
            WireType::Stop => 0,
            WireType::Void => 1,
            WireType::Bool => 2,
            WireType::Byte => 3,
            WireType::Double => 4,
            WireType::I16 => 6,
            WireType::I32 => 8,
            WireType::I64 => 10,
            WireType::String => 11,
            WireType::Struct => 12,
            WireType::Map => 13,
            WireType::Set => 14,
            WireType::List => 15,
        }
    }

    pub fn from_code(code: u8) -> std::result::Result<Self, ProtocolError> {
        Ok(match code {
            0 => WireType::Stop,
            1 => WireType::Void,
            2 => WireType::Bool,
            3 => WireType::Byte,
            4 => WireType::Double,
            6 => WireType::I16,
            8 => WireType::I32,
            10 => WireType::I64,
            11 => WireType::String,
            12 => WireType::Struct,
            13 => WireType::Map,
            14 => WireType::Set,
            15 => WireType::List,
            other => {
                return Err(ProtocolError::invalid_data(format!(
                    "Unknown wire type {}",
                    other
                )))
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Call,
    Reply,
    Exception,
    Oneway,
}

impl MessageType {
    pub fn code(self) -> u8 {
        match self {
            MessageType::Call => 1,
            MessageType::Reply => 2,
            MessageType::Exception => 3,
            MessageType::Oneway => 4,
        }
    }

    pub fn from_code(code: u8) -> std::result::Result<Self, ProtocolError> {
        match code {
            1 => Ok(MessageType::Call),
            2 => Ok(MessageType::Reply),
            3 => Ok(MessageType::Exception),
            4 => Ok(MessageType::Oneway),
            other => Err(ProtocolError::invalid_data(format!(
                "Unknown message type {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub name: String,
    pub message_type: MessageType,
    pub sequence_id: i32,
}

impl MessageHeader {
    pub fn new(name: impl Into<String>, message_type: MessageType, sequence_id: i32) -> Self {
        Self {
            name: name.into(),
            message_type,
            sequence_id,
        }
    }
}

/// Result of a field-begin read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThriftField {
    pub name: String,
    pub field_type: WireType,
    pub id: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThriftList {
    pub element_type: WireType,
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThriftSet {
    pub element_type: WireType,
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThriftMap {
    pub key_type: WireType,
    pub value_type: WireType,
    pub size: usize,
}

pub const DEFAULT_MAX_DEPTH: usize = 64;

pub trait Protocol {
    fn write_message_begin(&mut self, header: &MessageHeader) -> Result<()>;
    fn write_message_end(&mut self) -> Result<()>;
    fn write_struct_begin(&mut self, name: &str) -> Result<()>;
    fn write_struct_end(&mut self) -> Result<()>;
    fn write_field_begin(&mut self, name: &str, field_type: WireType, id: i16) -> Result<()>;
    fn write_field_end(&mut self) -> Result<()>;
    fn write_field_stop(&mut self) -> Result<()>;
    fn write_map_begin(&mut self, map: &ThriftMap) -> Result<()>;
    fn write_map_end(&mut self) -> Result<()>;
    fn write_list_begin(&mut self, list: &ThriftList) -> Result<()>;
    fn write_list_end(&mut self) -> Result<()>;
    fn write_set_begin(&mut self, set: &ThriftSet) -> Result<()>;
    fn write_set_end(&mut self) -> Result<()>;
    fn write_bool(&mut self, value: bool) -> Result<()>;
    fn write_byte(&mut self, value: i8) -> Result<()>;
    fn write_i16(&mut self, value: i16) -> Result<()>;
    fn write_i32(&mut self, value: i32) -> Result<()>;
    fn write_i64(&mut self, value: i64) -> Result<()>;
    fn write_double(&mut self, value: f64) -> Result<()>;
    fn write_string(&mut self, value: &str) -> Result<()>;
    fn write_binary(&mut self, value: &[u8]) -> Result<()>;
    fn flush(&mut self) -> Result<()>;

    fn read_message_begin(&mut self) -> Result<MessageHeader>;
    fn read_message_end(&mut self) -> Result<()>;
    fn read_struct_begin(&mut self) -> Result<()>;
    fn read_struct_end(&mut self) -> Result<()>;
    fn read_field_begin(&mut self) -> Result<ThriftField>;
    fn read_field_end(&mut self) -> Result<()>;
    fn read_map_begin(&mut self) -> Result<ThriftMap>;
    fn read_map_end(&mut self) -> Result<()>;
    fn read_list_begin(&mut self) -> Result<ThriftList>;
    fn read_list_end(&mut self) -> Result<()>;
    fn read_set_begin(&mut self) -> Result<ThriftSet>;
    fn read_set_end(&mut self) -> Result<()>;
    fn read_bool(&mut self) -> Result<bool>;
    fn read_byte(&mut self) -> Result<i8>;
    fn read_i16(&mut self) -> Result<i16>;
    fn read_i32(&mut self) -> Result<i32>;
    fn read_i64(&mut self) -> Result<i64>;
    fn read_double(&mut self) -> Result<f64>;
    fn read_string(&mut self) -> Result<String>;
    fn read_binary(&mut self) -> Result<Vec<u8>>;

    /// Nesting limit applied by `skip`.
    fn max_depth(&self) -> usize {
        DEFAULT_MAX_DEPTH
    }

    /// Consume one value of the given wire type without materializing it.
    fn skip(&mut self, wire_type: WireType) -> Result<()> {
        let depth = self.max_depth();
        skip_value(self, wire_type, depth)
    }
}

fn skip_value<P: Protocol + ?Sized>(protocol: &mut P, wire_type: WireType, depth: usize) -> Result<()> {
    if depth == 0 {
        return Err(ProtocolError::new(
            ProtocolErrorKind::DepthLimit,
            "Maximum skip depth exceeded",
        )
        .into());
    }

    match wire_type {
        WireType::Stop => {
            return Err(ProtocolError::invalid_data("Cannot skip a STOP marker").into());
        }
        WireType::Void => {}
        WireType::Bool => {
            protocol.read_bool()?;
        }
        WireType::Byte => {
            protocol.read_byte()?;
        }
        WireType::Double => {
            protocol.read_double()?;
        }
        WireType::I16 => {
            protocol.read_i16()?;
        }
        WireType::I32 => {
            protocol.read_i32()?;
        }
        WireType::I64 => {
            protocol.read_i64()?;
        }
        WireType::String => {
            protocol.read_binary()?;
        }
        WireType::Struct => {
            protocol.read_struct_begin()?;
            loop {
                let field = protocol.read_field_begin()?;
                if field.field_type == WireType::Stop {
                    break;
                }
                skip_value(protocol, field.field_type, depth - 1)?;
                protocol.read_field_end()?;
            }
            protocol.read_struct_end()?;
        }
        WireType::Map => {
            let map = protocol.read_map_begin()?;
            for _ in 0..map.size {
                skip_value(protocol, map.key_type, depth - 1)?;
                skip_value(protocol, map.value_type, depth - 1)?;
            }
            protocol.read_map_end()?;
        }
        WireType::Set => {
            let set = protocol.read_set_begin()?;
            for _ in 0..set.size {
                skip_value(protocol, set.element_type, depth - 1)?;
            }
            protocol.read_set_end()?;
        }
        WireType::List => {
            let list = protocol.read_list_begin()?;
            for _ in 0..list.size {
                skip_value(protocol, list.element_type, depth - 1)?;
            }
            protocol.read_list_end()?;
        }
    }

    Ok(())
}
