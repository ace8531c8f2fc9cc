//! Interpreter for generated codec procedures.
//!
//! Runs the decode/encode statement lists of a [`CompiledDocument`] against a
//! live [`Protocol`], with the same control flow a rendered procedure has.

use crate::compiler::CompiledDocument;
use crate::error::{CodegenError, ProtocolError, ProtocolErrorKind, Result};
use crate::ir::{ContainerKind, Expr, FieldInit, ScalarKind, Stmt, ValueCodec};
use crate::protocol::{
    BinaryProtocol, BinaryProtocolConfig, MemoryTransport, Protocol, ThriftField, ThriftList, ThriftMap,
    ThriftSet, WireType,
};
use crate::structs::StructCodec;
use crate::value::{StructValue, Value};
use std::collections::{BTreeMap, HashMap};
use thrift_idl::StructKind;

pub struct Vm<'d> {
    document: &'d CompiledDocument,
}

/// Local binding inside a decode procedure.
#[derive(Debug)]
enum Slot {
    Value(Value),
    Header(ThriftField),
    Size(usize),
}

#[derive(Debug, Default)]
struct DecodeFrame {
    locals: HashMap<String, Slot>,
    staged: BTreeMap<String, Value>,
}

struct EncodeFrame<'v> {
    this: &'v StructValue,
    locals: HashMap<String, &'v Value>,
}

enum Flow {
    Next,
    Break,
    Return(StructValue),
}

fn internal(message: impl Into<String>) -> crate::error::ThriftError {
    CodegenError::Internal(message.into()).into()
}

fn depth_limit(name: &str, limit: usize) -> crate::error::ThriftError {
    ProtocolError::new(
        ProtocolErrorKind::DepthLimit,
        format!("Struct {} nests deeper than {} levels", name, limit),
    )
    .into()
}

impl<'d> Vm<'d> {
    pub fn new(document: &'d CompiledDocument) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &'d CompiledDocument {
        self.document
    }

    /// Run the decode procedure of `struct_name`.
    pub fn decode(&self, struct_name: &str, input: &mut dyn Protocol) -> Result<StructValue> {
        self.decode_at(struct_name, input, 0)
    }

    /// Run the encode procedure named by the value's own struct name.
    pub fn encode(&self, value: &StructValue, output: &mut dyn Protocol) -> Result<()> {
        self.encode_at(&value.name, value, output, 0)
    }

    /// Run the encode procedure of `struct_name`, whatever the value is called.
    pub fn encode_as(&self, struct_name: &str, value: &StructValue, output: &mut dyn Protocol) -> Result<()> {
        self.encode_at(struct_name, value, output, 0)
    }

    /// Run the encode procedure of `struct_name` into a scratch buffer.
    ///
    /// Lets callers reject a value before writing a message header, since
    /// nothing written to a real output can be taken back.
    pub fn validate_as(&self, struct_name: &str, value: &StructValue, max_depth: usize) -> Result<()> {
        let mut scratch = BinaryProtocol::with_config(
            MemoryTransport::new(),
            BinaryProtocolConfig::default().with_max_depth(max_depth),
        );
        self.encode_at(struct_name, value, &mut scratch, 0)
    }

    fn codec(&self, name: &str) -> Result<&'d StructCodec> {
        self.document
            .struct_codec(name)
            .ok_or_else(|| internal(format!("No codec generated for struct {}", name)))
    }

    fn decode_at(&self, name: &str, input: &mut dyn Protocol, depth: usize) -> Result<StructValue> {
        if depth >= input.max_depth() {
            return Err(depth_limit(name, input.max_depth()));
        }
        let codec = self.codec(name)?;
        tracing::trace!("decode {} (depth {})", name, depth);

        let mut frame = DecodeFrame::default();
        match self.exec_decode(&codec.decode, &mut frame, input, depth)? {
            Flow::Return(value) => Ok(value),
            Flow::Next | Flow::Break => Err(internal(format!(
                "Decode procedure for {} ended without constructing a value",
                name
            ))),
        }
    }

    fn encode_at(&self, name: &str, value: &StructValue, output: &mut dyn Protocol, depth: usize) -> Result<()> {
        if depth >= output.max_depth() {
            return Err(depth_limit(name, output.max_depth()));
        }
        let codec = self.codec(name)?;
        tracing::trace!("encode {} (depth {})", name, depth);

        let mut frame = EncodeFrame {
            this: value,
            locals: HashMap::new(),
        };
        self.exec_encode(&codec.encode, &mut frame, output, depth)
    }

    fn exec_decode(
        &self,
        stmts: &[Stmt],
        frame: &mut DecodeFrame,
        input: &mut dyn Protocol,
        depth: usize,
    ) -> Result<Flow> {
        for stmt in stmts {
            tracing::trace!("exec {}", stmt.op_name());
            match stmt {
                Stmt::ReadStructBegin => input.read_struct_begin()?,
                Stmt::ReadStructEnd => input.read_struct_end()?,
                Stmt::ReadFieldBegin { header } => {
                    let field = input.read_field_begin()?;
                    frame.locals.insert(header.clone(), Slot::Header(field));
                }
                Stmt::ReadFieldEnd => input.read_field_end()?,
                Stmt::ReadContainerBegin { kind, metadata } => {
                    let size = match kind {
                        ContainerKind::List { .. } => input.read_list_begin()?.size,
                        ContainerKind::Set { .. } => input.read_set_begin()?.size,
                        ContainerKind::Map { .. } => input.read_map_begin()?.size,
                    };
                    frame.locals.insert(metadata.clone(), Slot::Size(size));
                }
                Stmt::ReadContainerEnd { kind } => match kind {
                    ContainerKind::List { .. } => input.read_list_end()?,
                    ContainerKind::Set { .. } => input.read_set_end()?,
                    ContainerKind::Map { .. } => input.read_map_end()?,
                },
                Stmt::Read { codec, dest } => {
                    let value = match codec {
                        ValueCodec::Scalar { kind } => read_scalar(*kind, input)?,
                        ValueCodec::Struct { name } => {
                            Value::Struct(self.decode_at(name, input, depth + 1)?)
                        }
                    };
                    frame.locals.insert(dest.clone(), Slot::Value(value));
                }
                Stmt::NewContainer { kind, dest } => {
                    let empty = match kind {
                        ContainerKind::List { .. } => Value::List(Vec::new()),
                        ContainerKind::Set { .. } => Value::Set(Vec::new()),
                        ContainerKind::Map { .. } => Value::Map(Vec::new()),
                    };
                    frame.locals.insert(dest.clone(), Slot::Value(empty));
                }
                Stmt::Insert {
                    container,
                    key,
                    value,
                    ..
                } => {
                    let element = take_value(frame, value)?;
                    let key = key.as_ref().map(|k| take_value(frame, k)).transpose()?;
                    match (frame.locals.get_mut(container), key) {
                        (Some(Slot::Value(Value::List(items))), None)
                        | (Some(Slot::Value(Value::Set(items))), None) => items.push(element),
                        (Some(Slot::Value(Value::Map(entries))), Some(key)) => {
                            entries.push((key, element))
                        }
                        _ => return Err(internal(format!("{} is not an open container", container))),
                    }
                }
                Stmt::Skip { header } => {
                    let wire_type = header_of(frame, header)?.field_type;
                    input.skip(wire_type)?;
                }
                Stmt::Loop { body } => loop {
                    match self.exec_decode(body, frame, input, depth)? {
                        Flow::Next => continue,
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                },
                Stmt::BreakIfStop { header } => {
                    if header_of(frame, header)?.field_type == WireType::Stop {
                        return Ok(Flow::Break);
                    }
                }
                Stmt::Switch {
                    header,
                    cases,
                    default,
                } => {
                    let field = header_of(frame, header)?;
                    let (id, observed) = (field.id, field.field_type);
                    let body = match cases.iter().find(|case| case.id == id) {
                        Some(case) => &case.body,
                        None => {
                            tracing::debug!("Skipping unknown field id {} ({:?})", id, observed);
                            default
                        }
                    };
                    match self.exec_decode(body, frame, input, depth)? {
                        Flow::Next => {}
                        other => return Ok(other),
                    }
                }
                Stmt::IfWireType {
                    header,
                    expected,
                    then,
                    otherwise,
                } => {
                    let field = header_of(frame, header)?;
                    let body = if field.field_type == *expected {
                        then
                    } else {
                        tracing::warn!(
                            "Field {} arrived as {:?}, expected {:?}; skipping",
                            field.id,
                            field.field_type,
                            expected
                        );
                        otherwise
                    };
                    match self.exec_decode(body, frame, input, depth)? {
                        Flow::Next => {}
                        other => return Ok(other),
                    }
                }
                Stmt::Repeat { metadata, body, .. } => {
                    let size = match frame.locals.get(metadata) {
                        Some(Slot::Size(size)) => *size,
                        _ => return Err(internal(format!("{} is not container metadata", metadata))),
                    };
                    for _ in 0..size {
                        match self.exec_decode(body, frame, input, depth)? {
                            Flow::Next => {}
                            Flow::Break => break,
                            ret @ Flow::Return(_) => return Ok(ret),
                        }
                    }
                }
                Stmt::Stage { field, value } => {
                    let value = take_value(frame, value)?;
                    frame.staged.insert(field.clone(), value);
                }
                Stmt::Construct {
                    struct_name,
                    kind,
                    fields,
                } => {
                    let staged = std::mem::take(&mut frame.staged);
                    return Ok(Flow::Return(construct(struct_name, *kind, fields, staged)?));
                }
                other => {
                    return Err(internal(format!(
                        "{} cannot run inside a decode procedure",
                        other.op_name()
                    )))
                }
            }
        }
        Ok(Flow::Next)
    }

    fn exec_encode<'v>(
        &self,
        stmts: &[Stmt],
        frame: &mut EncodeFrame<'v>,
        output: &mut dyn Protocol,
        depth: usize,
    ) -> Result<()> {
        for stmt in stmts {
            tracing::trace!("exec {}", stmt.op_name());
            match stmt {
                Stmt::RequireSingleField {
                    source,
                    struct_name,
                    fields,
                } => {
                    let target = resolve_struct(source, frame)?;
                    let set = fields
                        .iter()
                        .filter(|f| target.get(f).is_some_and(|v| !v.is_void()))
                        .count();
                    if set != 1 {
                        return Err(ProtocolError::invalid_data(format!(
                            "Union {} must have exactly one field set, found {}",
                            struct_name, set
                        ))
                        .into());
                    }
                }
                Stmt::RequirePresent { source, field } => {
                    if !is_present(resolve(source, frame)?) {
                        return Err(ProtocolError::missing_required_field(format!(
                            "Required field {} is unset!",
                            field
                        ))
                        .into());
                    }
                }
                Stmt::WriteStructBegin { name } => output.write_struct_begin(name)?,
                Stmt::WriteStructEnd => output.write_struct_end()?,
                Stmt::WriteFieldBegin {
                    name,
                    wire_type,
                    id,
                } => output.write_field_begin(name, *wire_type, *id)?,
                Stmt::WriteFieldEnd => output.write_field_end()?,
                Stmt::WriteFieldStop => output.write_field_stop()?,
                Stmt::WriteContainerBegin { kind, source } => {
                    let value = require(source, frame)?;
                    let size = match (kind, value) {
                        (ContainerKind::List { .. }, Value::List(items))
                        | (ContainerKind::Set { .. }, Value::Set(items)) => items.len(),
                        (ContainerKind::Map { .. }, Value::Map(entries)) => entries.len(),
                        (kind, other) => return Err(type_mismatch(&kind.name().to_lowercase(), other)),
                    };
                    match *kind {
                        ContainerKind::List { element } => output.write_list_begin(&ThriftList {
                            element_type: element,
                            size,
                        })?,
                        ContainerKind::Set { element } => output.write_set_begin(&ThriftSet {
                            element_type: element,
                            size,
                        })?,
                        ContainerKind::Map { key, value } => output.write_map_begin(&ThriftMap {
                            key_type: key,
                            value_type: value,
                            size,
                        })?,
                    }
                }
                Stmt::WriteContainerEnd { kind } => match kind {
                    ContainerKind::List { .. } => output.write_list_end()?,
                    ContainerKind::Set { .. } => output.write_set_end()?,
                    ContainerKind::Map { .. } => output.write_map_end()?,
                },
                Stmt::Write { codec, source } => {
                    let value = require(source, frame)?;
                    match codec {
                        ValueCodec::Scalar { kind } => write_scalar(*kind, value, output)?,
                        ValueCodec::Struct { name } => {
                            let nested = value.as_struct().ok_or_else(|| type_mismatch(name, value))?;
                            self.encode_at(name, nested, output, depth + 1)?;
                        }
                    }
                }
                Stmt::ForEach {
                    source,
                    key,
                    value,
                    body,
                    ..
                } => match (require(source, frame)?, key) {
                    (Value::List(items), None) | (Value::Set(items), None) => {
                        for item in items {
                            frame.locals.insert(value.clone(), item);
                            self.exec_encode(body, frame, output, depth)?;
                        }
                    }
                    (Value::Map(entries), Some(key)) => {
                        for (k, v) in entries {
                            frame.locals.insert(key.clone(), k);
                            frame.locals.insert(value.clone(), v);
                            self.exec_encode(body, frame, output, depth)?;
                        }
                    }
                    (other, _) => return Err(type_mismatch("container", other)),
                },
                Stmt::IfPresent { source, body } => {
                    if is_present(resolve(source, frame)?) {
                        self.exec_encode(body, frame, output, depth)?;
                    }
                }
                other => {
                    return Err(internal(format!(
                        "{} cannot run inside an encode procedure",
                        other.op_name()
                    )))
                }
            }
        }
        Ok(())
    }
}

fn take_value(frame: &mut DecodeFrame, name: &str) -> Result<Value> {
    match frame.locals.remove(name) {
        Some(Slot::Value(value)) => Ok(value),
        _ => Err(internal(format!("{} is not bound to a value", name))),
    }
}

fn header_of<'f>(frame: &'f DecodeFrame, name: &str) -> Result<&'f ThriftField> {
    match frame.locals.get(name) {
        Some(Slot::Header(field)) => Ok(field),
        _ => Err(internal(format!("{} is not bound to a field header", name))),
    }
}

fn construct(
    struct_name: &str,
    kind: StructKind,
    fields: &[FieldInit],
    mut staged: BTreeMap<String, Value>,
) -> Result<StructValue> {
    // Validation sees only what was on the wire; defaults fill in afterwards.
    if fields
        .iter()
        .any(|field| field.required && !staged.contains_key(&field.name))
    {
        return Err(ProtocolError::missing_required_field(format!(
            "Unable to read {} from input",
            struct_name
        ))
        .into());
    }

    if kind == StructKind::Union {
        let set = fields
            .iter()
            .filter(|field| staged.contains_key(&field.name))
            .count();
        match set {
            1 => {}
            0 => {
                return Err(ProtocolError::invalid_data(format!(
                    "Union {} was decoded with no field set",
                    struct_name
                ))
                .into())
            }
            n => {
                return Err(ProtocolError::invalid_data(format!(
                    "Union {} was decoded with {} fields set",
                    struct_name, n
                ))
                .into())
            }
        }
    }

    let mut value = StructValue::new(struct_name);
    for field in fields {
        if let Some(decoded) = staged.remove(&field.name) {
            value.set(field.name.clone(), decoded);
        } else if let Some(default) = &field.default {
            value.set(field.name.clone(), default.clone());
        }
    }

    Ok(value)
}

fn resolve_struct<'v>(expr: &Expr, frame: &EncodeFrame<'v>) -> Result<&'v StructValue> {
    match expr {
        Expr::This => Ok(frame.this),
        other => {
            let value = require(other, frame)?;
            value.as_struct().ok_or_else(|| type_mismatch("struct", value))
        }
    }
}

fn resolve<'v>(expr: &Expr, frame: &EncodeFrame<'v>) -> Result<Option<&'v Value>> {
    match expr {
        Expr::This => Err(internal("the struct itself is not a field value")),
        Expr::Local { name } => frame
            .locals
            .get(name)
            .copied()
            .map(Some)
            .ok_or_else(|| internal(format!("{} is not bound", name))),
        Expr::Field { base, name } => Ok(resolve_struct(base, frame)?.get(name)),
    }
}

fn require<'v>(expr: &Expr, frame: &EncodeFrame<'v>) -> Result<&'v Value> {
    resolve(expr, frame)?.ok_or_else(|| internal(format!("{:?} has no value", expr)))
}

fn is_present(value: Option<&Value>) -> bool {
    value.is_some_and(|v| !v.is_void())
}

fn type_mismatch(expected: &str, found: &Value) -> crate::error::ThriftError {
    ProtocolError::invalid_data(format!(
        "Expected {} value, found {}",
        expected,
        found.type_name()
    ))
    .into()
}

fn read_scalar(kind: ScalarKind, input: &mut dyn Protocol) -> Result<Value> {
    Ok(match kind {
        ScalarKind::Bool => Value::Bool(input.read_bool()?),
        ScalarKind::Byte => Value::Byte(input.read_byte()?),
        ScalarKind::I16 => Value::I16(input.read_i16()?),
        ScalarKind::I32 => Value::I32(input.read_i32()?),
        ScalarKind::I64 => Value::I64(input.read_i64()?),
        ScalarKind::Double => Value::Double(input.read_double()?),
        ScalarKind::String => Value::String(input.read_string()?),
        ScalarKind::Binary => Value::Binary(input.read_binary()?),
    })
}

fn write_scalar(kind: ScalarKind, value: &Value, output: &mut dyn Protocol) -> Result<()> {
    match (kind, value) {
        (ScalarKind::Bool, Value::Bool(v)) => output.write_bool(*v),
        (ScalarKind::Byte, Value::Byte(v)) => output.write_byte(*v),
        (ScalarKind::I16, Value::I16(v)) => output.write_i16(*v),
        (ScalarKind::I32, Value::I32(v)) => output.write_i32(*v),
        (ScalarKind::I64, Value::I64(v)) => output.write_i64(*v),
        (ScalarKind::Double, Value::Double(v)) => output.write_double(*v),
        (ScalarKind::String, Value::String(v)) => output.write_string(v),
        (ScalarKind::Binary, Value::Binary(v)) => output.write_binary(v),
        (kind, other) => Err(type_mismatch(&kind.method_suffix().to_lowercase(), other)),
    }
}
