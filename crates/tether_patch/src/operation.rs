//! Patch operations and their JSON wire form.

use crate::error::{PatchError, PatchResult};
use crate::pointer::Pointer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of a patch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Insert a key or array element.
    Add,
    /// Delete a key or array element.
    Remove,
    /// Overwrite an existing value.
    Replace,
}

impl OpKind {
    /// Returns the wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Add => "add",
            OpKind::Remove => "remove",
            OpKind::Replace => "replace",
        }
    }

    /// Parses a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "add" => Some(OpKind::Add),
            "remove" => Some(OpKind::Remove),
            "replace" => Some(OpKind::Replace),
            _ => None,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single patch operation.
///
/// On the wire an operation is `{"op": .., "path": .., "value": ..}`, with
/// `value` omitted for `remove`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase", try_from = "Value")]
pub enum PatchOp {
    /// Insert `value` at `path`.
    Add {
        /// Target location.
        path: Pointer,
        /// Value to insert.
        value: Value,
    },
    /// Delete the value at `path`.
    Remove {
        /// Target location.
        path: Pointer,
    },
    /// Overwrite the value at `path`.
    Replace {
        /// Target location.
        path: Pointer,
        /// New value.
        value: Value,
    },
}

impl PatchOp {
    /// Creates an `add` operation.
    pub fn add(path: Pointer, value: Value) -> Self {
        PatchOp::Add { path, value }
    }

    /// Creates a `remove` operation.
    pub fn remove(path: Pointer) -> Self {
        PatchOp::Remove { path }
    }

    /// Creates a `replace` operation.
    pub fn replace(path: Pointer, value: Value) -> Self {
        PatchOp::Replace { path, value }
    }

    /// Returns the kind of this operation.
    pub fn kind(&self) -> OpKind {
        match self {
            PatchOp::Add { .. } => OpKind::Add,
            PatchOp::Remove { .. } => OpKind::Remove,
            PatchOp::Replace { .. } => OpKind::Replace,
        }
    }

    /// Returns the target path.
    pub fn path(&self) -> &Pointer {
        match self {
            PatchOp::Add { path, .. }
            | PatchOp::Remove { path }
            | PatchOp::Replace { path, .. } => path,
        }
    }

    /// Returns the carried value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => Some(value),
            PatchOp::Remove { .. } => None,
        }
    }

    /// Parses one operation from a JSON value.
    pub fn from_value(value: &Value) -> PatchResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| PatchError::NotAnObject(type_name(value).into()))?;

        let name = map.get("op").and_then(Value::as_str).ok_or(PatchError::MissingField {
            op: "patch".into(),
            field: "op",
        })?;
        let kind = OpKind::from_name(name).ok_or_else(|| PatchError::UnknownOp(name.into()))?;

        let path = map
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| PatchError::MissingField {
                op: name.into(),
                field: "path",
            })?;
        let path = Pointer::parse(path)?;

        let value = || {
            map.get("value").cloned().ok_or_else(|| PatchError::MissingField {
                op: name.into(),
                field: "value",
            })
        };

        Ok(match kind {
            OpKind::Add => PatchOp::Add {
                path,
                value: value()?,
            },
            OpKind::Remove => PatchOp::Remove { path },
            OpKind::Replace => PatchOp::Replace {
                path,
                value: value()?,
            },
        })
    }
}

impl TryFrom<Value> for PatchOp {
    type Error = PatchError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        PatchOp::from_value(&value)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Serializes a patch to its JSON array text.
pub fn encode_patch(ops: &[PatchOp]) -> PatchResult<String> {
    Ok(serde_json::to_string(ops)?)
}

/// Parses a patch from JSON text.
///
/// Each element goes through [`PatchOp::from_value`], so an unknown kind is
/// reported as [`PatchError::UnknownOp`] with the offending position.
pub fn decode_patch(text: &str) -> PatchResult<Vec<PatchOp>> {
    let value: Value = serde_json::from_str(text)?;
    let items = value.as_array().ok_or(PatchError::NotAnArray)?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| PatchOp::from_value(item).map_err(|e| e.at_operation(i)))
        .collect()
}
