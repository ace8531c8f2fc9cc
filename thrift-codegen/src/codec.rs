//! Per-type read/write fragment generation.
//!
//! `emit_read` and `emit_write` are mirror images: every branch that reads a
//! container header, element or struct has a matching branch that writes it.

use crate::error::CodegenError;
use crate::ir::{ContainerKind, Expr, NameAllocator, ScalarKind, Stmt, ValueCodec};
use crate::protocol::WireType;
use thrift_idl::{FieldType, ResolvedIdentifier, SymbolTable};

/// Deepest type nesting the generator will follow.
pub const MAX_TYPE_DEPTH: usize = 64;

/// State threaded through one generation pass.
pub struct GenState<'s, 'a> {
    pub symbols: &'s SymbolTable<'a>,
    pub names: NameAllocator,
    /// Local bound to the field header currently being decoded.
    pub header: Option<String>,
    depth: usize,
}

impl<'s, 'a> GenState<'s, 'a> {
    pub fn new(symbols: &'s SymbolTable<'a>) -> Self {
        Self {
            symbols,
            names: NameAllocator::new(),
            header: None,
            depth: 0,
        }
    }

    fn enter(&mut self, field_type: &FieldType) -> Result<(), CodegenError> {
        self.depth += 1;
        if self.depth > MAX_TYPE_DEPTH {
            return Err(CodegenError::Internal(format!(
                "Type {} nests deeper than {} levels",
                field_type.display_name(),
                MAX_TYPE_DEPTH
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }
}

/// What an identifier reference contributes to a codec.
enum IdentifierShape<'a> {
    Struct(&'a str),
    Enum,
    Alias(&'a FieldType),
}

fn identifier_shape<'a>(
    symbols: &SymbolTable<'a>,
    name: &str,
) -> Result<IdentifierShape<'a>, CodegenError> {
    match symbols.resolve_type(name)? {
        ResolvedIdentifier::StructLike { definition, .. } => {
            Ok(IdentifierShape::Struct(definition.name.as_str()))
        }
        ResolvedIdentifier::Enum(_) => Ok(IdentifierShape::Enum),
        ResolvedIdentifier::Typedef { underlying, .. } => Ok(IdentifierShape::Alias(underlying)),
        ResolvedIdentifier::Const(def) => Err(CodegenError::Internal(format!(
            "Const {} reached codec generation as a type",
            def.name
        ))),
        ResolvedIdentifier::Service(def) => Err(CodegenError::Internal(format!(
            "Service {} reached codec generation as a type",
            def.name
        ))),
    }
}

fn scalar_kind(field_type: &FieldType) -> Option<ScalarKind> {
    match field_type {
        FieldType::Bool => Some(ScalarKind::Bool),
        FieldType::Byte | FieldType::I8 => Some(ScalarKind::Byte),
        FieldType::I16 => Some(ScalarKind::I16),
        FieldType::I32 => Some(ScalarKind::I32),
        FieldType::I64 => Some(ScalarKind::I64),
        FieldType::Double => Some(ScalarKind::Double),
        FieldType::String => Some(ScalarKind::String),
        FieldType::Binary => Some(ScalarKind::Binary),
        FieldType::List { .. }
        | FieldType::Set { .. }
        | FieldType::Map { .. }
        | FieldType::Identifier { .. }
        | FieldType::Void => None,
    }
}

/// Wire tag written for a value of `field_type`.
pub fn wire_type_for(field_type: &FieldType, symbols: &SymbolTable) -> Result<WireType, CodegenError> {
    wire_type_at(field_type, symbols, 0)
}

fn wire_type_at(
    field_type: &FieldType,
    symbols: &SymbolTable,
    depth: usize,
) -> Result<WireType, CodegenError> {
    if depth > MAX_TYPE_DEPTH {
        return Err(CodegenError::Internal(format!(
            "Type {} nests deeper than {} levels",
            field_type.display_name(),
            MAX_TYPE_DEPTH
        )));
    }
    Ok(match field_type {
        FieldType::Bool => WireType::Bool,
        FieldType::Byte | FieldType::I8 => WireType::Byte,
        FieldType::I16 => WireType::I16,
        FieldType::I32 => WireType::I32,
        FieldType::I64 => WireType::I64,
        FieldType::Double => WireType::Double,
        FieldType::String | FieldType::Binary => WireType::String,
        FieldType::List { .. } => WireType::List,
        FieldType::Set { .. } => WireType::Set,
        FieldType::Map { .. } => WireType::Map,
        FieldType::Void => WireType::Void,
        FieldType::Identifier { value } => match identifier_shape(symbols, value)? {
            IdentifierShape::Struct(_) => WireType::Struct,
            IdentifierShape::Enum => WireType::I32,
            IdentifierShape::Alias(underlying) => wire_type_at(underlying, symbols, depth + 1)?,
        },
    })
}

fn container_kind(field_type: &FieldType, symbols: &SymbolTable) -> Result<Option<ContainerKind>, CodegenError> {
    let element = |ty: &FieldType| -> Result<WireType, CodegenError> {
        match wire_type_for(ty, symbols)? {
            WireType::Void => Err(CodegenError::Internal(format!(
                "void cannot be an element of {}",
                field_type.display_name()
            ))),
            wire_type => Ok(wire_type),
        }
    };
    Ok(match field_type {
        FieldType::List { value_type } => Some(ContainerKind::List {
            element: element(value_type)?,
        }),
        FieldType::Set { value_type } => Some(ContainerKind::Set {
            element: element(value_type)?,
        }),
        FieldType::Map {
            key_type,
            value_type,
        } => Some(ContainerKind::Map {
            key: element(key_type)?,
            value: element(value_type)?,
        }),
        _ => None,
    })
}

/// Statements that read one value of `field_type` and bind it to `target`.
pub fn emit_read(
    state: &mut GenState,
    field_type: &FieldType,
    target: &str,
) -> Result<Vec<Stmt>, CodegenError> {
    state.enter(field_type)?;
    let result = read_inner(state, field_type, target);
    state.leave();
    result
}

fn read_inner(
    state: &mut GenState,
    field_type: &FieldType,
    target: &str,
) -> Result<Vec<Stmt>, CodegenError> {
    if let Some(kind) = scalar_kind(field_type) {
        return Ok(vec![Stmt::Read {
            codec: ValueCodec::Scalar { kind },
            dest: target.to_string(),
        }]);
    }

    match field_type {
        FieldType::Identifier { value } => match identifier_shape(state.symbols, value)? {
            IdentifierShape::Struct(name) => Ok(vec![Stmt::Read {
                codec: ValueCodec::Struct {
                    name: name.to_string(),
                },
                dest: target.to_string(),
            }]),
            IdentifierShape::Enum => Ok(vec![Stmt::Read {
                codec: ValueCodec::Scalar {
                    kind: ScalarKind::I32,
                },
                dest: target.to_string(),
            }]),
            IdentifierShape::Alias(underlying) => emit_read(state, underlying, target),
        },
        FieldType::List { value_type } | FieldType::Set { value_type } => {
            let kind = container_kind(field_type, state.symbols)?
                .ok_or_else(|| CodegenError::Internal("list/set without container kind".into()))?;
            let metadata = state.names.fresh("metadata");
            let counter = state.names.fresh("i");
            let element = state.names.fresh("value");

            let mut body = emit_read(state, value_type, &element)?;
            body.push(Stmt::Insert {
                kind,
                container: target.to_string(),
                key: None,
                value: element,
            });

            Ok(vec![
                Stmt::ReadContainerBegin {
                    kind,
                    metadata: metadata.clone(),
                },
                Stmt::NewContainer {
                    kind,
                    dest: target.to_string(),
                },
                Stmt::Repeat {
                    metadata,
                    counter,
                    body,
                },
                Stmt::ReadContainerEnd { kind },
            ])
        }
        FieldType::Map {
            key_type,
            value_type,
        } => {
            let kind = container_kind(field_type, state.symbols)?
                .ok_or_else(|| CodegenError::Internal("map without container kind".into()))?;
            let metadata = state.names.fresh("metadata");
            let counter = state.names.fresh("i");
            let key = state.names.fresh("key");
            let element = state.names.fresh("value");

            let mut body = emit_read(state, key_type, &key)?;
            body.extend(emit_read(state, value_type, &element)?);
            body.push(Stmt::Insert {
                kind,
                container: target.to_string(),
                key: Some(key),
                value: element,
            });

            Ok(vec![
                Stmt::ReadContainerBegin {
                    kind,
                    metadata: metadata.clone(),
                },
                Stmt::NewContainer {
                    kind,
                    dest: target.to_string(),
                },
                Stmt::Repeat {
                    metadata,
                    counter,
                    body,
                },
                Stmt::ReadContainerEnd { kind },
            ])
        }
        FieldType::Void => {
            let header = state.header.clone().ok_or_else(|| {
                CodegenError::Internal("void is only readable as a struct field".into())
            })?;
            Ok(vec![Stmt::Skip { header }])
        }
        FieldType::Bool
        | FieldType::Byte
        | FieldType::I8
        | FieldType::I16
        | FieldType::I32
        | FieldType::I64
        | FieldType::Double
        | FieldType::String
        | FieldType::Binary => Err(CodegenError::Internal(format!(
            "Scalar {} fell through scalar dispatch",
            field_type.display_name()
        ))),
    }
}

/// Statements that write the value found at `source` as `field_type`.
pub fn emit_write(
    state: &mut GenState,
    field_type: &FieldType,
    source: Expr,
) -> Result<Vec<Stmt>, CodegenError> {
    state.enter(field_type)?;
    let result = write_inner(state, field_type, source);
    state.leave();
    result
}

fn write_inner(
    state: &mut GenState,
    field_type: &FieldType,
    source: Expr,
) -> Result<Vec<Stmt>, CodegenError> {
    if let Some(kind) = scalar_kind(field_type) {
        return Ok(vec![Stmt::Write {
            codec: ValueCodec::Scalar { kind },
            source,
        }]);
    }

    match field_type {
        FieldType::Identifier { value } => match identifier_shape(state.symbols, value)? {
            IdentifierShape::Struct(name) => Ok(vec![Stmt::Write {
                codec: ValueCodec::Struct {
                    name: name.to_string(),
                },
                source,
            }]),
            IdentifierShape::Enum => Ok(vec![Stmt::Write {
                codec: ValueCodec::Scalar {
                    kind: ScalarKind::I32,
                },
                source,
            }]),
            IdentifierShape::Alias(underlying) => emit_write(state, underlying, source),
        },
        FieldType::List { value_type } | FieldType::Set { value_type } => {
            let kind = container_kind(field_type, state.symbols)?
                .ok_or_else(|| CodegenError::Internal("list/set without container kind".into()))?;
            let element = state.names.fresh("value");
            let body = emit_write(state, value_type, Expr::local(element.clone()))?;

            Ok(vec![
                Stmt::WriteContainerBegin {
                    kind,
                    source: source.clone(),
                },
                Stmt::ForEach {
                    kind,
                    source,
                    key: None,
                    value: element,
                    body,
                },
                Stmt::WriteContainerEnd { kind },
            ])
        }
        FieldType::Map {
            key_type,
            value_type,
        } => {
            let kind = container_kind(field_type, state.symbols)?
                .ok_or_else(|| CodegenError::Internal("map without container kind".into()))?;
            let key = state.names.fresh("key");
            let element = state.names.fresh("value");
            let mut body = emit_write(state, key_type, Expr::local(key.clone()))?;
            body.extend(emit_write(state, value_type, Expr::local(element.clone()))?);

            Ok(vec![
                Stmt::WriteContainerBegin {
                    kind,
                    source: source.clone(),
                },
                Stmt::ForEach {
                    kind,
                    source,
                    key: Some(key),
                    value: element,
                    body,
                },
                Stmt::WriteContainerEnd { kind },
            ])
        }
        // Nothing exists on the wire for a void value.
        FieldType::Void => Ok(Vec::new()),
        FieldType::Bool
        | FieldType::Byte
        | FieldType::I8
        | FieldType::I16
        | FieldType::I32
        | FieldType::I64
        | FieldType::Double
        | FieldType::String
        | FieldType::Binary => Err(CodegenError::Internal(format!(
            "Scalar {} fell through scalar dispatch",
            field_type.display_name()
        ))),
    }
}
