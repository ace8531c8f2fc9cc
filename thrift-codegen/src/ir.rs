//! Intermediate representation of generated codec procedures.
//!
//! A procedure is a flat `Vec<Stmt>` with nested blocks for control flow.
//! The VM executes it directly and the TypeScript backend renders it, so
//! both views of a struct codec come from the same tree.

use crate::protocol::WireType;
use crate::value::Value;
use serde::Serialize;
use std::collections::HashMap;
use thrift_idl::StructKind;

/// Typed protocol primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Bool,
    Byte,
    I16,
    I32,
    I64,
    Double,
    String,
    Binary,
}

impl ScalarKind {
    pub fn wire_type(self) -> WireType {
        match self {
            ScalarKind::Bool => WireType::Bool,
            ScalarKind::Byte => WireType::Byte,
            ScalarKind::I16 => WireType::I16,
            ScalarKind::I32 => WireType::I32,
            ScalarKind::I64 => WireType::I64,
            ScalarKind::Double => WireType::Double,
            ScalarKind::String | ScalarKind::Binary => WireType::String,
        }
    }

    /// Suffix of the protocol method, as in `readI32` / `writeI32`.
    pub fn method_suffix(self) -> &'static str {
        match self {
            ScalarKind::Bool => "Bool",
            ScalarKind::Byte => "Byte",
            ScalarKind::I16 => "I16",
            ScalarKind::I32 => "I32",
            ScalarKind::I64 => "I64",
            ScalarKind::Double => "Double",
            ScalarKind::String => "String",
            ScalarKind::Binary => "Binary",
        }
    }
}

/// How one value is moved across the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "codec", rename_all = "lowercase")]
pub enum ValueCodec {
    Scalar { kind: ScalarKind },
    /// Call the decode/encode procedure of the named struct-like type.
    Struct { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "container", rename_all = "lowercase")]
pub enum ContainerKind {
    List { element: WireType },
    Set { element: WireType },
    Map { key: WireType, value: WireType },
}

impl ContainerKind {
    pub fn name(self) -> &'static str {
        match self {
            ContainerKind::List { .. } => "List",
            ContainerKind::Set { .. } => "Set",
            ContainerKind::Map { .. } => "Map",
        }
    }

    pub fn wire_type(self) -> WireType {
        match self {
            ContainerKind::List { .. } => WireType::List,
            ContainerKind::Set { .. } => WireType::Set,
            ContainerKind::Map { .. } => WireType::Map,
        }
    }
}

/// Source of a value being encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "expr", rename_all = "lowercase")]
pub enum Expr {
    /// The struct instance the procedure was called with.
    This,
    Local { name: String },
    Field { base: Box<Expr>, name: String },
}

impl Expr {
    pub fn local(name: impl Into<String>) -> Self {
        Expr::Local { name: name.into() }
    }

    pub fn field(base: Expr, name: impl Into<String>) -> Self {
        Expr::Field {
            base: Box::new(base),
            name: name.into(),
        }
    }

    pub fn this_field(name: impl Into<String>) -> Self {
        Expr::field(Expr::This, name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Case {
    pub id: i16,
    pub body: Vec<Stmt>,
}

/// One slot of a `Construct`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInit {
    pub name: String,
    pub id: i16,
    pub required: bool,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op")]
pub enum Stmt {
    ReadStructBegin,
    ReadStructEnd,
    /// Bind the next field header to `header`.
    ReadFieldBegin { header: String },
    ReadFieldEnd,
    ReadContainerBegin { kind: ContainerKind, metadata: String },
    ReadContainerEnd { kind: ContainerKind },
    Read { codec: ValueCodec, dest: String },
    NewContainer { kind: ContainerKind, dest: String },
    Insert {
        kind: ContainerKind,
        container: String,
        key: Option<String>,
        value: String,
    },
    /// Skip a value of the wire type reported by the field header bound to `header`.
    Skip { header: String },

    Loop { body: Vec<Stmt> },
    BreakIfStop { header: String },
    Switch {
        header: String,
        cases: Vec<Case>,
        default: Vec<Stmt>,
    },
    IfWireType {
        header: String,
        expected: WireType,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    /// Run `body` once per element announced by `metadata`.
    Repeat {
        metadata: String,
        counter: String,
        body: Vec<Stmt>,
    },

    /// Record a decoded field value for the final `Construct`.
    Stage { field: String, value: String },
    Construct {
        struct_name: String,
        kind: StructKind,
        fields: Vec<FieldInit>,
    },

    WriteStructBegin { name: String },
    WriteStructEnd,
    WriteFieldBegin {
        name: String,
        wire_type: WireType,
        id: i16,
    },
    WriteFieldEnd,
    WriteFieldStop,
    WriteContainerBegin { kind: ContainerKind, source: Expr },
    WriteContainerEnd { kind: ContainerKind },
    Write { codec: ValueCodec, source: Expr },
    /// Bind each element (and key, for maps) of `source` and run `body`.
    ForEach {
        kind: ContainerKind,
        source: Expr,
        key: Option<String>,
        value: String,
        body: Vec<Stmt>,
    },
    IfPresent { source: Expr, body: Vec<Stmt> },
    RequirePresent { source: Expr, field: String },
    /// Exactly one of `fields` must be set on `source`.
    RequireSingleField {
        source: Expr,
        struct_name: String,
        fields: Vec<String>,
    },
}

impl Stmt {
    /// Variant name, for logs.
    pub fn op_name(&self) -> &'static str {
        match self {
            Stmt::ReadStructBegin => "ReadStructBegin",
            Stmt::ReadStructEnd => "ReadStructEnd",
            Stmt::ReadFieldBegin { .. } => "ReadFieldBegin",
            Stmt::ReadFieldEnd => "ReadFieldEnd",
            Stmt::ReadContainerBegin { .. } => "ReadContainerBegin",
            Stmt::ReadContainerEnd { .. } => "ReadContainerEnd",
            Stmt::Read { .. } => "Read",
            Stmt::NewContainer { .. } => "NewContainer",
            Stmt::Insert { .. } => "Insert",
            Stmt::Skip { .. } => "Skip",
            Stmt::Loop { .. } => "Loop",
            Stmt::BreakIfStop { .. } => "BreakIfStop",
            Stmt::Switch { .. } => "Switch",
            Stmt::IfWireType { .. } => "IfWireType",
            Stmt::Repeat { .. } => "Repeat",
            Stmt::Stage { .. } => "Stage",
            Stmt::Construct { .. } => "Construct",
            Stmt::WriteStructBegin { .. } => "WriteStructBegin",
            Stmt::WriteStructEnd => "WriteStructEnd",
            Stmt::WriteFieldBegin { .. } => "WriteFieldBegin",
            Stmt::WriteFieldEnd => "WriteFieldEnd",
            Stmt::WriteFieldStop => "WriteFieldStop",
            Stmt::WriteContainerBegin { .. } => "WriteContainerBegin",
            Stmt::WriteContainerEnd { .. } => "WriteContainerEnd",
            Stmt::Write { .. } => "Write",
            Stmt::ForEach { .. } => "ForEach",
            Stmt::IfPresent { .. } => "IfPresent",
            Stmt::RequirePresent { .. } => "RequirePresent",
            Stmt::RequireSingleField { .. } => "RequireSingleField",
        }
    }
}

/// Hands out collision-free temporary names for one generation pass.
#[derive(Debug, Default)]
pub struct NameAllocator {
    counters: HashMap<String, usize>,
    next: usize,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `value` -> `value_1`, then `metadata` -> `metadata_2`, and so on.
    pub fn fresh(&mut self, prefix: &str) -> String {
        self.next += 1;
        *self.counters.entry(prefix.to_string()).or_insert(0) += 1;
        format!("{}_{}", prefix, self.next)
    }

    /// How many names were issued with `prefix`.
    pub fn issued(&self, prefix: &str) -> usize {
        self.counters.get(prefix).copied().unwrap_or(0)
    }
}

/// Depth-first visit of every statement, including nested blocks.
pub fn walk<'s>(stmts: &'s [Stmt], visit: &mut dyn FnMut(&'s Stmt)) {
    for stmt in stmts {
        visit(stmt);
        match stmt {
            Stmt::Loop { body }
            | Stmt::Repeat { body, .. }
            | Stmt::ForEach { body, .. }
            | Stmt::IfPresent { body, .. } => walk(body, visit),
            Stmt::Switch { cases, default, .. } => {
                for case in cases {
                    walk(&case.body, visit);
                }
                walk(default, visit);
            }
            Stmt::IfWireType {
                then, otherwise, ..
            } => {
                walk(then, visit);
                walk(otherwise, visit);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_names_never_collide() {
        let mut names = NameAllocator::new();
        let a = names.fresh("value");
        let b = names.fresh("metadata");
        let c = names.fresh("value");
        assert_eq!(a, "value_1");
        assert_eq!(b, "metadata_2");
        assert_eq!(c, "value_3");
        assert_eq!(names.issued("value"), 2);
    }

    #[test]
    fn test_walk_visits_nested_blocks() {
        let stmts = vec![Stmt::Loop {
            body: vec![
                Stmt::ReadFieldBegin {
                    header: "ret".into(),
                },
                Stmt::Switch {
                    header: "ret".into(),
                    cases: vec![Case {
                        id: 1,
                        body: vec![Stmt::ReadFieldEnd],
                    }],
                    default: vec![Stmt::Skip {
                        header: "ret".into(),
                    }],
                },
            ],
        }];

        let mut count = 0;
        walk(&stmts, &mut |_| count += 1);
        assert_eq!(count, 5);
    }
}
