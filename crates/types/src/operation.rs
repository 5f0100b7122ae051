//! Declarative install-time operations
//!
//! An operation is an opaque record until the installer interprets it. The
//! serialized field names (`Area`, `Method`, `Value`, `Value2`) are shared
//! with already published configuration documents and must not change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subsystem an operation acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperationArea {
    Files,
    Registry,
    Processes,
}

impl fmt::Display for OperationArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Files => write!(f, "Files"),
            Self::Registry => write!(f, "Registry"),
            Self::Processes => write!(f, "Processes"),
        }
    }
}

/// Action performed within an area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperationMethod {
    Create,
    Delete,
    Rename,
    SetValue,
    DeleteValue,
    Start,
    Stop,
    Execute,
}

impl fmt::Display for OperationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "Create",
            Self::Delete => "Delete",
            Self::Rename => "Rename",
            Self::SetValue => "SetValue",
            Self::DeleteValue => "DeleteValue",
            Self::Start => "Start",
            Self::Stop => "Stop",
            Self::Execute => "Execute",
        };
        f.write_str(name)
    }
}

/// All `(area, method)` pairs the installer knows how to execute
pub const SUPPORTED_OPERATIONS: &[(OperationArea, OperationMethod)] = &[
    (OperationArea::Files, OperationMethod::Create),
    (OperationArea::Files, OperationMethod::Delete),
    (OperationArea::Files, OperationMethod::Rename),
    (OperationArea::Registry, OperationMethod::Create),
    (OperationArea::Registry, OperationMethod::Delete),
    (OperationArea::Registry, OperationMethod::SetValue),
    (OperationArea::Registry, OperationMethod::DeleteValue),
    (OperationArea::Processes, OperationMethod::Start),
    (OperationArea::Processes, OperationMethod::Stop),
    (OperationArea::Processes, OperationMethod::Execute),
];

/// A single declarative install-time action
///
/// `Value2` may be a single string, an array, `null` or missing in
/// published documents. Whichever form was read is written back as long as
/// it can still hold `arguments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "OperationRecord", into = "OperationRecord")]
pub struct Operation {
    pub area: OperationArea,
    pub method: OperationMethod,
    /// Target path, key or process name
    pub target: String,
    /// Ordered items/arguments
    pub arguments: Vec<String>,
    value2_form: Value2Form,
}

/// How `Value2` was written in the source document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Value2Form {
    List,
    Text,
    Null,
    Absent,
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.area == other.area
            && self.method == other.method
            && self.target == other.target
            && self.arguments == other.arguments
    }
}

impl Eq for Operation {}

impl Operation {
    pub fn new(
        area: OperationArea,
        method: OperationMethod,
        target: impl Into<String>,
        arguments: Vec<String>,
    ) -> Self {
        Self {
            area,
            method,
            target: target.into(),
            arguments,
            value2_form: Value2Form::List,
        }
    }

    /// Whether the `(area, method)` pair is one the installer supports
    #[must_use]
    pub fn is_supported(&self) -> bool {
        SUPPORTED_OPERATIONS.contains(&(self.area, self.method))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.area, self.method, self.target)
    }
}

/// Wire shape of an operation
#[derive(Serialize, Deserialize)]
struct OperationRecord {
    #[serde(rename = "Area")]
    area: OperationArea,
    #[serde(rename = "Method")]
    method: OperationMethod,
    #[serde(rename = "Value")]
    target: String,
    #[serde(rename = "Value2", default, skip_serializing_if = "Value2::is_absent")]
    value2: Value2,
}

#[derive(Default, Serialize, Deserialize)]
#[serde(untagged)]
enum Value2 {
    Text(String),
    List(Vec<String>),
    Null(()),
    #[default]
    #[serde(skip)]
    Absent,
}

impl Value2 {
    fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl From<OperationRecord> for Operation {
    fn from(record: OperationRecord) -> Self {
        let (arguments, value2_form) = match record.value2 {
            Value2::Text(text) if text.is_empty() => (Vec::new(), Value2Form::Text),
            Value2::Text(text) => (vec![text], Value2Form::Text),
            Value2::List(items) => (items, Value2Form::List),
            Value2::Null(()) => (Vec::new(), Value2Form::Null),
            Value2::Absent => (Vec::new(), Value2Form::Absent),
        };
        Self {
            area: record.area,
            method: record.method,
            target: record.target,
            arguments,
            value2_form,
        }
    }
}

impl From<Operation> for OperationRecord {
    fn from(op: Operation) -> Self {
        let value2 = match (op.value2_form, op.arguments.len()) {
            (Value2Form::Text, 0 | 1) => {
                Value2::Text(op.arguments.into_iter().next().unwrap_or_default())
            }
            (Value2Form::Null, 0) => Value2::Null(()),
            (Value2Form::Absent, 0) => Value2::Absent,
            _ => Value2::List(op.arguments),
        };
        Self {
            area: op.area,
            method: op.method,
            target: op.target,
            value2,
        }
    }
}
