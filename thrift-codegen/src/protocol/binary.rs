//! Thrift binary protocol: big-endian fixed-width integers, length-prefixed
//! strings and no framing for struct or container ends.

use super::{
    MessageHeader, MessageType, Protocol, ThriftField, ThriftList, ThriftMap, ThriftSet,
    Transport, WireType, DEFAULT_MAX_DEPTH,
};
use crate::error::{ProtocolError, ProtocolErrorKind, Result};

const VERSION_1: u32 = 0x8001_0000;
const VERSION_MASK: u32 = 0xffff_0000;
const TYPE_MASK: u32 = 0x0000_00ff;

/// Configuration for [`BinaryProtocol`]
#[derive(Debug, Clone)]
pub struct BinaryProtocolConfig {
    /// Reject message headers without a version word
    pub strict_read: bool,
    /// Write versioned message headers
    pub strict_write: bool,
    pub max_string_size: usize,
    pub max_container_size: usize,
    pub max_depth: usize,
}

impl Default for BinaryProtocolConfig {
    fn default() -> Self {
        Self {
            strict_read: false,
            strict_write: true,
            max_string_size: 16 * 1024 * 1024,
            max_container_size: 1_000_000,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl BinaryProtocolConfig {
    pub fn with_strict_read(mut self, strict: bool) -> Self {
        self.strict_read = strict;
        self
    }

    pub fn with_strict_write(mut self, strict: bool) -> Self {
        self.strict_write = strict;
        self
    }

    pub fn with_max_string_size(mut self, limit: usize) -> Self {
        self.max_string_size = limit;
        self
    }

    pub fn with_max_container_size(mut self, limit: usize) -> Self {
        self.max_container_size = limit;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

pub struct BinaryProtocol<T> {
    transport: T,
    config: BinaryProtocolConfig,
}

impl<T: Transport> BinaryProtocol<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, BinaryProtocolConfig::default())
    }

    pub fn with_config(transport: T, config: BinaryProtocolConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &BinaryProtocolConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.transport.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_size(&mut self, limit: usize, what: &str) -> Result<usize> {
        let size = self.read_i32()?;
        if size < 0 {
            return Err(ProtocolError::new(
                ProtocolErrorKind::NegativeSize,
                format!("Negative {} size: {}", what, size),
            )
            .into());
        }
        let size = size as usize;
        if size > limit {
            return Err(ProtocolError::new(
                ProtocolErrorKind::SizeLimit,
                format!("{} size {} exceeds limit {}", what, size, limit),
            )
            .into());
        }
        Ok(size)
    }

    fn write_size(&mut self, size: usize) -> Result<()> {
        let size = i32::try_from(size).map_err(|_| {
            ProtocolError::new(
                ProtocolErrorKind::SizeLimit,
                format!("Size {} does not fit the wire format", size),
            )
        })?;
        self.write_i32(size)
    }

    fn read_wire_type(&mut self) -> Result<WireType> {
        let code = self.read_byte()? as u8;
        Ok(WireType::from_code(code)?)
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.transport.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl<T: Transport> Protocol for BinaryProtocol<T> {
    fn write_message_begin(&mut self, header: &MessageHeader) -> Result<()> {
        if self.config.strict_write {
            let version = VERSION_1 | u32::from(header.message_type.code());
            self.write_i32(version as i32)?;
            self.write_string(&header.name)?;
        } else {
            self.write_string(&header.name)?;
            self.write_byte(header.message_type.code() as i8)?;
        }
        self.write_i32(header.sequence_id)
    }

    fn write_message_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_struct_begin(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn write_struct_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_field_begin(&mut self, _name: &str, field_type: WireType, id: i16) -> Result<()> {
        self.write_byte(field_type.code() as i8)?;
        self.write_i16(id)
    }

    fn write_field_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> Result<()> {
        self.write_byte(WireType::Stop.code() as i8)
    }

    fn write_map_begin(&mut self, map: &ThriftMap) -> Result<()> {
        self.write_byte(map.key_type.code() as i8)?;
        self.write_byte(map.value_type.code() as i8)?;
        self.write_size(map.size)
    }

    fn write_map_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_list_begin(&mut self, list: &ThriftList) -> Result<()> {
        self.write_byte(list.element_type.code() as i8)?;
        self.write_size(list.size)
    }

    fn write_list_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_set_begin(&mut self, set: &ThriftSet) -> Result<()> {
        self.write_byte(set.element_type.code() as i8)?;
        self.write_size(set.size)
    }

    fn write_set_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_byte(i8::from(value))
    }

    fn write_byte(&mut self, value: i8) -> Result<()> {
        Ok(self.transport.write_all(&value.to_be_bytes())?)
    }

    fn write_i16(&mut self, value: i16) -> Result<()> {
        Ok(self.transport.write_all(&value.to_be_bytes())?)
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        Ok(self.transport.write_all(&value.to_be_bytes())?)
    }

    fn write_i64(&mut self, value: i64) -> Result<()> {
        Ok(self.transport.write_all(&value.to_be_bytes())?)
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        Ok(self.transport.write_all(&value.to_bits().to_be_bytes())?)
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_binary(value.as_bytes())
    }

    fn write_binary(&mut self, value: &[u8]) -> Result<()> {
        self.write_size(value.len())?;
        Ok(self.transport.write_all(value)?)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.transport.flush()?)
    }

    fn read_message_begin(&mut self) -> Result<MessageHeader> {
        let size = self.read_i32()?;
        if size < 0 {
            let word = size as u32;
            if word & VERSION_MASK != VERSION_1 {
                return Err(ProtocolError::new(
                    ProtocolErrorKind::BadVersion,
                    format!("Bad version in readMessageBegin: {:#010x}", word),
                )
                .into());
            }
            let message_type = MessageType::from_code((word & TYPE_MASK) as u8)?;
            let name = self.read_string()?;
            let sequence_id = self.read_i32()?;
            Ok(MessageHeader {
                name,
                message_type,
                sequence_id,
            })
        } else {
            if self.config.strict_read {
                return Err(ProtocolError::new(
                    ProtocolErrorKind::BadVersion,
                    "No version identifier found in readMessageBegin",
                )
                .into());
            }
            let size = size as usize;
            if size > self.config.max_string_size {
                return Err(ProtocolError::new(
                    ProtocolErrorKind::SizeLimit,
                    format!("Message name size {} exceeds limit", size),
                )
                .into());
            }
            let name = String::from_utf8(self.read_bytes(size)?)
                .map_err(|e| ProtocolError::invalid_data(format!("Invalid message name: {}", e)))?;
            let message_type = MessageType::from_code(self.read_byte()? as u8)?;
            let sequence_id = self.read_i32()?;
            Ok(MessageHeader {
                name,
                message_type,
                sequence_id,
            })
        }
    }

    fn read_message_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_struct_begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_struct_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_field_begin(&mut self) -> Result<ThriftField> {
        let field_type = self.read_wire_type()?;
        let id = match field_type {
            WireType::Stop => 0,
            _ => self.read_i16()?,
        };
        Ok(ThriftField {
            name: String::new(),
            field_type,
            id,
        })
    }

    fn read_field_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_map_begin(&mut self) -> Result<ThriftMap> {
        let key_type = self.read_wire_type()?;
        let value_type = self.read_wire_type()?;
        let size = self.read_size(self.config.max_container_size, "map")?;
        Ok(ThriftMap {
            key_type,
            value_type,
            size,
        })
    }

    fn read_map_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_list_begin(&mut self) -> Result<ThriftList> {
        let element_type = self.read_wire_type()?;
        let size = self.read_size(self.config.max_container_size, "list")?;
        Ok(ThriftList { element_type, size })
    }

    fn read_list_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_set_begin(&mut self) -> Result<ThriftSet> {
        let element_type = self.read_wire_type()?;
        let size = self.read_size(self.config.max_container_size, "set")?;
        Ok(ThriftSet { element_type, size })
    }

    fn read_set_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_byte()? != 0)
    }

    fn read_byte(&mut self) -> Result<i8> {
        Ok(i8::from_be_bytes(self.read_array()?))
    }

    fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(u64::from_be_bytes(self.read_array()?)))
    }

    fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_binary()?;
        String::from_utf8(bytes)
            .map_err(|e| ProtocolError::invalid_data(format!("Invalid UTF-8 string: {}", e)).into())
    }

    fn read_binary(&mut self) -> Result<Vec<u8>> {
        let len = self.read_size(self.config.max_string_size, "string")?;
        self.read_bytes(len)
    }

    fn max_depth(&self) -> usize {
        self.config.max_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ThriftError;
    use crate::protocol::MemoryTransport;

    fn written(protocol: &mut BinaryProtocol<MemoryTransport>) -> Vec<u8> {
        protocol.flush().unwrap();
        protocol.transport().written().to_vec()
    }

    #[test]
    fn test_strict_message_header_layout() {
        let mut protocol = BinaryProtocol::new(MemoryTransport::new());
        protocol
            .write_message_begin(&MessageHeader::new("ping", MessageType::Call, 1))
            .unwrap();

        assert_eq!(
            written(&mut protocol),
            vec![0x80, 0x01, 0x00, 0x01, 0, 0, 0, 4, b'p', b'i', b'n', b'g', 0, 0, 0, 1]
        );
    }

    #[test]
    fn test_legacy_message_header_accepted() {
        let mut writer = BinaryProtocol::with_config(
            MemoryTransport::new(),
            BinaryProtocolConfig::default().with_strict_write(false),
        );
        writer
            .write_message_begin(&MessageHeader::new("echo", MessageType::Reply, 7))
            .unwrap();
        let bytes = written(&mut writer);

        let mut reader = BinaryProtocol::new(MemoryTransport::with_input(&bytes));
        let header = reader.read_message_begin().unwrap();
        assert_eq!(header, MessageHeader::new("echo", MessageType::Reply, 7));

        let mut strict = BinaryProtocol::with_config(
            MemoryTransport::with_input(&bytes),
            BinaryProtocolConfig::default().with_strict_read(true),
        );
        let err = strict.read_message_begin().unwrap_err();
        assert_eq!(err.protocol_kind(), Some(ProtocolErrorKind::BadVersion));
    }

    #[test]
    fn test_field_header_and_stop() {
        let mut protocol = BinaryProtocol::new(MemoryTransport::new());
        protocol.write_field_begin("id", WireType::I32, 3).unwrap();
        protocol.write_i32(-2).unwrap();
        protocol.write_field_stop().unwrap();
        let bytes = written(&mut protocol);
        assert_eq!(bytes, vec![8, 0, 3, 0xff, 0xff, 0xff, 0xfe, 0]);

        let mut reader = BinaryProtocol::new(MemoryTransport::with_input(&bytes));
        let field = reader.read_field_begin().unwrap();
        assert_eq!((field.field_type, field.id), (WireType::I32, 3));
        assert_eq!(reader.read_i32().unwrap(), -2);
        assert_eq!(reader.read_field_begin().unwrap().field_type, WireType::Stop);
    }

    #[test]
    fn test_negative_container_size_rejected() {
        let bytes = [WireType::I32.code(), 0xff, 0xff, 0xff, 0xff];
        let mut reader = BinaryProtocol::new(MemoryTransport::with_input(bytes));
        let err = reader.read_list_begin().unwrap_err();
        assert_eq!(err.protocol_kind(), Some(ProtocolErrorKind::NegativeSize));
    }

    #[test]
    fn test_container_size_limit() {
        let bytes = [WireType::I32.code(), 0, 0, 0, 11];
        let mut reader = BinaryProtocol::with_config(
            MemoryTransport::with_input(bytes),
            BinaryProtocolConfig::default().with_max_container_size(10),
        );
        let err = reader.read_set_begin().unwrap_err();
        assert_eq!(err.protocol_kind(), Some(ProtocolErrorKind::SizeLimit));
    }

    #[test]
    fn test_truncated_string_is_transport_error() {
        let bytes = [0, 0, 0, 5, b'a', b'b'];
        let mut reader = BinaryProtocol::new(MemoryTransport::with_input(bytes));
        assert!(matches!(
            reader.read_string(),
            Err(ThriftError::Transport(_))
        ));
    }

    #[test]
    fn test_skip_nested_struct() {
        let mut writer = BinaryProtocol::new(MemoryTransport::new());
        writer.write_field_begin("inner", WireType::Struct, 1).unwrap();
        writer.write_field_begin("values", WireType::List, 1).unwrap();
        writer
            .write_list_begin(&ThriftList {
                element_type: WireType::String,
                size: 2,
            })
            .unwrap();
        writer.write_string("a").unwrap();
        writer.write_string("bc").unwrap();
        writer.write_field_stop().unwrap();
        writer.write_field_stop().unwrap();
        writer.write_i16(77).unwrap();
        let bytes = written(&mut writer);

        let mut reader = BinaryProtocol::new(MemoryTransport::with_input(&bytes));
        reader.skip(WireType::Struct).unwrap();
        assert_eq!(reader.read_i16().unwrap(), 77);
    }

    #[test]
    fn test_skip_depth_limit() {
        // struct { 1: struct { 1: struct { ... } } } nested beyond the limit
        let mut bytes = Vec::new();
        for _ in 0..4 {
            bytes.extend_from_slice(&[WireType::Struct.code(), 0, 1]);
        }
        bytes.extend_from_slice(&[0, 0, 0, 0, 0]);
        let mut reader = BinaryProtocol::with_config(
            MemoryTransport::with_input(&bytes),
            BinaryProtocolConfig::default().with_max_depth(3),
        );
        let err = reader.skip(WireType::Struct).unwrap_err();
        assert_eq!(err.protocol_kind(), Some(ProtocolErrorKind::DepthLimit));
    }
}
