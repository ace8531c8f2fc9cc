//! Core type definitions for parsed Thrift documents

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ThriftDocument {
    #[serde(default)]
    pub body: Vec<Statement>,
}

impl ThriftDocument {
    pub fn namespaces(&self) -> impl Iterator<Item = &NamespaceDefinition> {
        self.body.iter().filter_map(|statement| match statement {
            Statement::Namespace(ns) => Some(ns),
            _ => None,
        })
    }

    pub fn includes(&self) -> impl Iterator<Item = &IncludeDefinition> {
        self.body.iter().filter_map(|statement| match statement {
            Statement::Include(include) => Some(include),
            _ => None,
        })
    }

    /// Every struct, union and exception, in document order.
    pub fn struct_likes(&self) -> impl Iterator<Item = &StructLike> {
        self.body.iter().filter_map(|statement| match statement {
            Statement::Struct(def) | Statement::Union(def) | Statement::Exception(def) => {
                Some(def)
            }
            _ => None,
        })
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceDefinition> {
        self.body.iter().filter_map(|statement| match statement {
            Statement::Service(service) => Some(service),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum Statement {
    #[serde(rename = "NamespaceDefinition")]
    Namespace(NamespaceDefinition),
    #[serde(rename = "IncludeDefinition")]
    Include(IncludeDefinition),
    #[serde(rename = "ConstDefinition")]
    Const(ConstDefinition),
    #[serde(rename = "StructDefinition")]
    Struct(StructLike),
    #[serde(rename = "UnionDefinition")]
    Union(StructLike),
    #[serde(rename = "ExceptionDefinition")]
    Exception(StructLike),
    #[serde(rename = "EnumDefinition")]
    Enum(EnumDefinition),
    #[serde(rename = "TypedefDefinition")]
    Typedef(TypedefDefinition),
    #[serde(rename = "ServiceDefinition")]
    Service(ServiceDefinition),
}

impl Statement {
    /// Name of the definition, `None` for namespace and include statements.
    pub fn definition_name(&self) -> Option<&str> {
        match self {
            Statement::Namespace(_) | Statement::Include(_) => None,
            Statement::Const(def) => Some(&def.name),
            Statement::Struct(def) | Statement::Union(def) | Statement::Exception(def) => {
                Some(&def.name)
            }
            Statement::Enum(def) => Some(&def.name),
            Statement::Typedef(def) => Some(&def.name),
            Statement::Service(def) => Some(&def.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NamespaceDefinition {
    pub scope: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IncludeDefinition {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub initializer: ConstValue,
}

/// Which flavor of struct-like definition a [`StructLike`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StructKind {
    Struct,
    Union,
    Exception,
}

/// A struct, union or exception definition.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StructLike {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl StructLike {
    pub fn has_required_field(&self) -> bool {
        self.fields
            .iter()
            .any(|field| field.requiredness == Requiredness::Required)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Requiredness {
    Required,
    Optional,
    #[default]
    Default,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    /// Absent when the IDL omitted the `N:` prefix.
    #[serde(default, rename = "fieldID")]
    pub field_id: Option<i16>,
    pub field_type: FieldType,
    #[serde(default)]
    pub requiredness: Requiredness,
    #[serde(default)]
    pub default_value: Option<ConstValue>,
    /// Source line of the definition, for diagnostics.
    #[serde(default)]
    pub line: Option<u32>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_id: i16, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_id: Some(field_id),
            field_type,
            requiredness: Requiredness::Default,
            default_value: None,
            line: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.requiredness = Requiredness::Required;
        self
    }

    pub fn optional(mut self) -> Self {
        self.requiredness = Requiredness::Optional;
        self
    }

    pub fn with_default(mut self, value: ConstValue) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// Logical type of a field, argument or return slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    Bool,
    Byte,
    I8,
    I16,
    I32,
    I64,
    Double,
    String,
    Binary,
    List {
        #[serde(rename = "valueType")]
        value_type: Box<FieldType>,
    },
    Set {
        #[serde(rename = "valueType")]
        value_type: Box<FieldType>,
    },
    Map {
        #[serde(rename = "keyType")]
        key_type: Box<FieldType>,
        #[serde(rename = "valueType")]
        value_type: Box<FieldType>,
    },
    Identifier {
        value: String,
    },
    Void,
}

impl FieldType {
    pub fn identifier(name: impl Into<String>) -> Self {
        FieldType::Identifier { value: name.into() }
    }

    pub fn list(value_type: FieldType) -> Self {
        FieldType::List {
            value_type: Box::new(value_type),
        }
    }

    pub fn set(value_type: FieldType) -> Self {
        FieldType::Set {
            value_type: Box::new(value_type),
        }
    }

    pub fn map(key_type: FieldType, value_type: FieldType) -> Self {
        FieldType::Map {
            key_type: Box::new(key_type),
            value_type: Box::new(value_type),
        }
    }

    /// Human readable IDL spelling, used in diagnostics and rendered comments.
    pub fn display_name(&self) -> String {
        match self {
            FieldType::Bool => "bool".to_string(),
            FieldType::Byte => "byte".to_string(),
            FieldType::I8 => "i8".to_string(),
            FieldType::I16 => "i16".to_string(),
            FieldType::I32 => "i32".to_string(),
            FieldType::I64 => "i64".to_string(),
            FieldType::Double => "double".to_string(),
            FieldType::String => "string".to_string(),
            FieldType::Binary => "binary".to_string(),
            FieldType::List { value_type } => format!("list<{}>", value_type.display_name()),
            FieldType::Set { value_type } => format!("set<{}>", value_type.display_name()),
            FieldType::Map {
                key_type,
                value_type,
            } => format!(
                "map<{},{}>",
                key_type.display_name(),
                value_type.display_name()
            ),
            FieldType::Identifier { value } => value.clone(),
            FieldType::Void => "void".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EnumDefinition {
    pub name: String,
    #[serde(default)]
    pub members: Vec<EnumMember>,
}

impl EnumDefinition {
    /// Member names paired with their numeric values.
    ///
    /// Members without an initializer continue from the previous value,
    /// starting at zero.
    pub fn member_values(&self) -> Vec<(&str, i32)> {
        let mut next = 0i32;
        self.members
            .iter()
            .map(|member| {
                let value = member.initializer.unwrap_or(next);
                next = value.wrapping_add(1);
                (member.name.as_str(), value)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EnumMember {
    pub name: String,
    #[serde(default)]
    pub initializer: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedefDefinition {
    pub name: String,
    pub definition_type: FieldType,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServiceDefinition {
    pub name: String,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub functions: Vec<FunctionDefinition>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinition {
    pub name: String,
    pub return_type: FieldType,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub throws: Vec<FieldDefinition>,
    #[serde(default)]
    pub oneway: bool,
}

/// Literal value of a constant initializer or field default.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ConstValue {
    Int(i64),
    Double(f64),
    Bool(bool),
    String(String),
    List(Vec<ConstValue>),
    Map(Vec<ConstEntry>),
    Identifier(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConstEntry {
    pub key: ConstValue,
    pub value: ConstValue,
}
