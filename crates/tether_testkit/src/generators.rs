//! Property-based test generators using proptest.
//!
//! Keys are drawn from a small alphabet so that independently generated
//! documents overlap, which exercises the replace/recurse paths of a diff and
//! not only whole-document add/remove.

use proptest::prelude::*;
use serde_json::{json, Map, Number, Value};

/// Strategy for generating object keys, including ones that need escaping.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        8 => prop::string::string_regex("[a-f]{1,2}").expect("Invalid regex"),
        1 => Just("a/b".to_string()),
        1 => Just("c~d".to_string()),
        1 => Just("remove$".to_string()),
    ]
}

/// Strategy for generating scalar JSON values.
///
/// Numbers are integers so values survive a trip through JSON text unchanged.
pub fn json_leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(|n| Value::Number(Number::from(n))),
        prop::string::string_regex("[a-zA-Z0-9 ]{0,12}")
            .expect("Invalid regex")
            .prop_map(Value::String),
    ]
}

/// Strategy for generating arbitrary nested JSON values.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    json_leaf_strategy().prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec((key_strategy(), inner), 0..6).prop_map(object_from_pairs),
        ]
    })
}

/// Strategy for generating documents (an object at the root).
pub fn document_strategy() -> impl Strategy<Value = Value> {
    prop::collection::vec((key_strategy(), json_value_strategy()), 0..8).prop_map(object_from_pairs)
}

fn object_from_pairs(pairs: Vec<(String, Value)>) -> Value {
    let mut map = Map::new();
    for (key, value) in pairs {
        map.insert(key, value);
    }
    Value::Object(map)
}

/// A single edit made to a top-level field, as a form input would.
#[derive(Debug, Clone)]
pub struct FieldEdit {
    /// Field name at the document root.
    pub field: String,
    /// New field value.
    pub value: Value,
    /// Whether a commit signal follows this edit.
    pub commit: bool,
}

/// Strategy for generating field edits over a fixed set of fields.
pub fn field_edit_strategy() -> impl Strategy<Value = FieldEdit> {
    (
        prop::sample::select(vec!["hello", "name", "email"]),
        json_leaf_strategy(),
        prop::bool::weighted(0.3),
    )
        .prop_map(|(field, value, commit)| FieldEdit {
            field: field.to_string(),
            value,
            commit,
        })
}

/// Strategy for generating a sequence of field edits.
pub fn edit_sequence_strategy(
    min_edits: usize,
    max_edits: usize,
) -> impl Strategy<Value = Vec<FieldEdit>> {
    prop::collection::vec(field_edit_strategy(), min_edits..max_edits)
}

/// An edit to a document shaped like [`crate::fixtures::board_document`].
///
/// Indices are taken modulo the list length when applied, so any generated
/// edit has a target while the list is non-empty.
#[derive(Debug, Clone)]
pub enum ModelEdit {
    /// Sets a top-level field.
    SetField {
        /// Field name at the document root.
        field: String,
        /// New field value.
        value: Value,
    },
    /// Inserts a todo item.
    InsertItem {
        /// Insert position, modulo length + 1.
        index: usize,
        /// Title of the new item.
        title: String,
    },
    /// Removes a todo item.
    RemoveItem {
        /// Item position, modulo length.
        index: usize,
    },
    /// Changes the title of a todo item.
    RenameItem {
        /// Item position, modulo length.
        index: usize,
        /// New title.
        title: String,
    },
}

impl ModelEdit {
    /// Applies the edit to `doc`. Returns false if it had no target.
    pub fn apply_to(&self, doc: &mut Value) -> bool {
        match self {
            ModelEdit::SetField { field, value } => match doc.as_object_mut() {
                Some(map) => {
                    map.insert(field.clone(), value.clone());
                    true
                }
                None => false,
            },
            ModelEdit::InsertItem { index, title } => match items_mut(doc) {
                Some(items) => {
                    let at = index % (items.len() + 1);
                    items.insert(at, todo_item(title));
                    true
                }
                None => false,
            },
            ModelEdit::RemoveItem { index } => match items_mut(doc) {
                Some(items) if !items.is_empty() => {
                    let at = index % items.len();
                    items.remove(at);
                    true
                }
                _ => false,
            },
            ModelEdit::RenameItem { index, title } => match items_mut(doc) {
                Some(items) if !items.is_empty() => {
                    let at = index % items.len();
                    items[at]["title$"] = Value::String(title.clone());
                    true
                }
                _ => false,
            },
        }
    }
}

fn items_mut(doc: &mut Value) -> Option<&mut Vec<Value>> {
    doc.get_mut("items")?.as_array_mut()
}

fn todo_item(title: &str) -> Value {
    json!({"title$": title, "completed$": false, "remove$": null})
}

fn title_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z ]{1,8}").expect("Invalid regex")
}

/// Strategy for generating field and list edits.
pub fn model_edit_strategy() -> impl Strategy<Value = ModelEdit> {
    prop_oneof![
        3 => field_edit_strategy().prop_map(|edit| ModelEdit::SetField {
            field: edit.field,
            value: edit.value,
        }),
        2 => (any::<usize>(), title_strategy())
            .prop_map(|(index, title)| ModelEdit::InsertItem { index, title }),
        2 => any::<usize>().prop_map(|index| ModelEdit::RemoveItem { index }),
        2 => (any::<usize>(), title_strategy())
            .prop_map(|(index, title)| ModelEdit::RenameItem { index, title }),
    ]
}

/// Strategy for generating model edits, each flagged with whether a commit
/// signal follows it.
pub fn edit_script_strategy(
    min_edits: usize,
    max_edits: usize,
) -> impl Strategy<Value = Vec<(ModelEdit, bool)>> {
    prop::collection::vec(
        (model_edit_strategy(), prop::bool::weighted(0.3)),
        min_edits..max_edits,
    )
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
