//! Patch application.

use crate::error::{PatchError, PatchResult};
use crate::operation::PatchOp;
use crate::pointer::Pointer;
use serde_json::{Map, Value};

/// Applies a patch to `doc` in place, one operation at a time.
///
/// Array indices are resolved against the document as it stands when each
/// operation runs, so a `remove` shifts every later element of that array.
/// Application is not atomic: when an operation fails, the operations before
/// it stay applied and the error carries the failing position.
pub fn apply_patch(doc: &mut Value, ops: &[PatchOp]) -> PatchResult<()> {
    for (i, op) in ops.iter().enumerate() {
        apply_op(doc, op).map_err(|e| e.at_operation(i))?;
    }
    Ok(())
}

/// Applies a single operation to `doc` in place.
///
/// - `add` inserts into arrays (shifting later elements right, `-` appends)
///   and sets object keys, creating missing intermediate objects.
/// - `replace` overwrites an array element or sets an object key, creating
///   missing intermediate objects.
/// - `remove` deletes a key or element; an absent target is a no-op.
pub fn apply_op(doc: &mut Value, op: &PatchOp) -> PatchResult<()> {
    match op {
        PatchOp::Add { path, value } => set(doc, path, value.clone(), Mode::Insert),
        PatchOp::Replace { path, value } => set(doc, path, value.clone(), Mode::Overwrite),
        PatchOp::Remove { path } => remove(doc, path),
    }
}

/// Returns the value `path` addresses in `doc`, if there is one.
pub fn resolve<'a>(doc: &'a Value, path: &Pointer) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(doc, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(arr) => {
                let index = parse_index(path, segment).ok()?;
                arr.get(index)
            }
            _ => None,
        })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Insert,
    Overwrite,
}

fn set(doc: &mut Value, path: &Pointer, value: Value, mode: Mode) -> PatchResult<()> {
    let Some((parent_path, key)) = path.parent() else {
        *doc = value;
        return Ok(());
    };

    match walk_or_create(doc, &parent_path)? {
        Value::Object(map) => {
            map.insert(key.to_string(), value);
            Ok(())
        }
        Value::Array(arr) => {
            if mode == Mode::Insert && key == "-" {
                arr.push(value);
                return Ok(());
            }
            let index = parse_index(&parent_path, key)?;
            let len = arr.len();
            match mode {
                Mode::Insert if index <= len => arr.insert(index, value),
                Mode::Overwrite if index < len => arr[index] = value,
                _ => {
                    return Err(PatchError::IndexOutOfBounds {
                        path: parent_path.to_string(),
                        index,
                        len,
                    })
                }
            }
            Ok(())
        }
        _ => Err(PatchError::NotAContainer {
            path: parent_path.to_string(),
        }),
    }
}

fn remove(doc: &mut Value, path: &Pointer) -> PatchResult<()> {
    let (parent_path, key) = path.parent().ok_or(PatchError::RootRemoval)?;

    let Some(parent) = walk(doc, &parent_path)? else {
        return Ok(());
    };
    match parent {
        Value::Object(map) => {
            map.shift_remove(key);
            Ok(())
        }
        Value::Array(arr) => {
            let index = parse_index(&parent_path, key)?;
            if index < arr.len() {
                arr.remove(index);
            }
            Ok(())
        }
        _ => Err(PatchError::NotAContainer {
            path: parent_path.to_string(),
        }),
    }
}

/// Walks to `path`, returning `None` when a key or index along it is absent.
fn walk<'a>(doc: &'a mut Value, path: &Pointer) -> PatchResult<Option<&'a mut Value>> {
    let mut current = doc;
    for (depth, segment) in path.segments().iter().enumerate() {
        current = match current {
            Value::Object(map) => match map.get_mut(segment) {
                Some(child) => child,
                None => return Ok(None),
            },
            Value::Array(arr) => {
                let index = parse_index(&prefix(path, depth), segment)?;
                match arr.get_mut(index) {
                    Some(child) => child,
                    None => return Ok(None),
                }
            }
            _ => {
                return Err(PatchError::NotAContainer {
                    path: prefix(path, depth).to_string(),
                })
            }
        };
    }
    Ok(Some(current))
}

/// Walks to `path`, creating empty objects for missing object keys.
fn walk_or_create<'a>(doc: &'a mut Value, path: &Pointer) -> PatchResult<&'a mut Value> {
    let mut current = doc;
    for (depth, segment) in path.segments().iter().enumerate() {
        current = match current {
            Value::Object(map) => map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(arr) => {
                let index = parse_index(&prefix(path, depth), segment)?;
                let len = arr.len();
                arr.get_mut(index)
                    .ok_or_else(|| PatchError::IndexOutOfBounds {
                        path: prefix(path, depth).to_string(),
                        index,
                        len,
                    })?
            }
            _ => {
                return Err(PatchError::NotAContainer {
                    path: prefix(path, depth).to_string(),
                })
            }
        };
    }
    Ok(current)
}

fn prefix(path: &Pointer, depth: usize) -> Pointer {
    Pointer::from_segments(path.segments()[..depth].iter().cloned())
}

/// Parses a decimal array index; leading zeros and signs are rejected.
fn parse_index(array_path: &Pointer, segment: &str) -> PatchResult<usize> {
    let well_formed = !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_digit())
        && (segment == "0" || !segment.starts_with('0'));
    if !well_formed {
        return Err(PatchError::InvalidIndex {
            path: array_path.to_string(),
            segment: segment.to_string(),
        });
    }
    segment.parse().map_err(|_| PatchError::InvalidIndex {
        path: array_path.to_string(),
        segment: segment.to_string(),
    })
}
