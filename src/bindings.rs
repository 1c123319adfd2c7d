//! The flat map of bound values and its conversion into typed JSON.

use crate::command::Command;
use crate::error::BindError;
use crate::path::{OptionComparer, Segment, PATH_DELIMITER};
use crate::property::Property;
use crate::schema::{DataType, StringType};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Raw string values keyed by `:`-delimited path (`Read:0`, `Logging:Level`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Bindings {
    values: BTreeMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// First free index for list entries under `key`.
    pub fn next_index(&self, key: &str) -> usize {
        let prefix = format!("{}{}", key, PATH_DELIMITER);
        self.values
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|rest| rest.parse::<usize>().ok())
            .map(|index| index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Entries bound to `property`, ordered by key (list entries by index).
    pub fn matching<'a>(&'a self, property: &Property, comparer: OptionComparer) -> Vec<(&'a str, &'a str)> {
        let path = if property.data_type.is_simple_array() {
            property.path.child(Segment::AnyInteger)
        } else {
            property.path.clone()
        };

        let mut entries: Vec<(&str, &str)> = self
            .iter()
            .filter(|(key, _)| path.matches(key, comparer))
            .collect();
        entries.sort_by(|a, b| sort_key(a.0).cmp(&sort_key(b.0)));
        entries
    }

    /// Whether `property` sits in an optional object that has nothing bound.
    pub fn in_absent_parent(&self, property: &Property, comparer: OptionComparer) -> bool {
        match &property.meta.optional_parent {
            Some(parent) => !self.values.keys().any(|key| parent.is_prefix_of(key, comparer)),
            None => false,
        }
    }

    /// Build a nested JSON value from the bound entries of `command`.
    ///
    /// Sections become objects, index segments and list properties become
    /// arrays, and scalars are typed by their property. Absent properties
    /// take their default; absent booleans are `false`, absent lists empty
    /// and absent optional values `null`. Members of an absent optional
    /// object are left out entirely.
    pub fn to_value(&self, command: &Command) -> Result<Value, BindError> {
        self.to_value_with(command.properties(), OptionComparer::IgnoreCase)
    }

    pub fn to_value_with(&self, properties: &[Property], comparer: OptionComparer) -> Result<Value, BindError> {
        let mut root = Node::Map(BTreeMap::new());

        for property in properties {
            let entries = self.matching(property, comparer);
            let literal = !property.path.has_wildcards();

            if entries.is_empty() {
                if literal && !self.in_absent_parent(property, comparer) {
                    if let Some(value) = absent_value(property) {
                        let parts = path_parts(&property.path.to_string());
                        root.insert(&parts, property, Node::Leaf(value))?;
                    }
                }
                continue;
            }

            for (key, raw) in entries {
                let parts: Vec<String> = key.split(PATH_DELIMITER).map(str::to_string).collect();
                let leaf = scalar(raw, element_type(&property.data_type));
                root.insert(&parts, property, Node::Leaf(leaf))?;
            }
        }

        Ok(root.into_value())
    }
}

fn sort_key(key: &str) -> Vec<(u8, usize, &str)> {
    key.split(PATH_DELIMITER)
        .map(|part| match part.parse::<usize>() {
            Ok(index) => (0, index, ""),
            Err(_) => (1, 0, part),
        })
        .collect()
}

fn path_parts(path: &str) -> Vec<String> {
    path.split(PATH_DELIMITER).map(str::to_string).collect()
}

fn element_type(data_type: &DataType) -> &DataType {
    match data_type {
        DataType::Array { element } => element,
        other => other,
    }
}

fn absent_value(property: &Property) -> Option<Value> {
    if let Some(default) = &property.meta.default {
        let value = scalar(default, element_type(&property.data_type));
        return Some(match property.data_type {
            DataType::Array { .. } => Value::Array(vec![value]),
            _ => value,
        });
    }
    if property.meta.nullable {
        return Some(Value::Null);
    }
    match property.data_type {
        DataType::Boolean => Some(Value::Bool(false)),
        DataType::Array { .. } => Some(Value::Array(Vec::new())),
        _ => None,
    }
}

/// Convert a raw token into a typed JSON scalar, falling back to a string
/// when it does not parse.
fn scalar(raw: &str, data_type: &DataType) -> Value {
    match data_type {
        DataType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        DataType::Number(number) if number.is_integer => raw
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| raw.parse::<u64>().map(Value::from))
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        DataType::Number(_) => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        DataType::String(string) if string.is_enumeration() => {
            Value::String(enumeration_name(raw, string).unwrap_or(raw).to_string())
        }
        _ => Value::String(raw.to_string()),
    }
}

/// Resolve an enumeration token by name (case-insensitively) or by value.
pub(crate) fn enumeration_name<'a>(raw: &str, string: &'a StringType) -> Option<&'a str> {
    string
        .values
        .iter()
        .find(|v| OptionComparer::IgnoreCase.equals(&v.name, raw))
        .or_else(|| {
            let value = raw.parse::<i64>().ok()?;
            string.values.iter().find(|v| v.value == value)
        })
        .map(|v| v.name.as_str())
}

enum Node {
    Leaf(Value),
    Map(BTreeMap<String, Node>),
    List(BTreeMap<usize, Node>),
}

impl Node {
    /// Insert `leaf` at `parts`; containers are lists where the property
    /// path has an index segment or the property itself is a list.
    fn insert(&mut self, parts: &[String], property: &Property, leaf: Node) -> Result<(), BindError> {
        self.insert_at(parts, 0, property, leaf)
    }

    fn insert_at(&mut self, parts: &[String], depth: usize, property: &Property, leaf: Node) -> Result<(), BindError> {
        let conflict = || BindError::Conflict(parts.join(":"));
        let Some(part) = parts.get(depth) else {
            return Err(conflict());
        };
        let last = depth + 1 == parts.len();

        let child = match self {
            Node::Map(map) => map
                .entry(part.clone())
                .or_insert_with(|| container_for(property, depth + 1)),
            Node::List(list) => {
                let index = part.parse::<usize>().map_err(|_| conflict())?;
                list.entry(index)
                    .or_insert_with(|| container_for(property, depth + 1))
            }
            Node::Leaf(_) => return Err(conflict()),
        };

        if last {
            if matches!(child, Node::Leaf(_)) || is_empty_container(child) {
                *child = leaf;
                return Ok(());
            }
            return Err(conflict());
        }
        child.insert_at(parts, depth + 1, property, leaf)
    }

    fn into_value(self) -> Value {
        match self {
            Node::Leaf(value) => value,
            Node::Map(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, v.into_value()))
                    .collect::<Map<String, Value>>(),
            ),
            Node::List(list) => Value::Array(list.into_values().map(Node::into_value).collect()),
        }
    }
}

fn is_empty_container(node: &Node) -> bool {
    match node {
        Node::Map(map) => map.is_empty(),
        Node::List(list) => list.is_empty(),
        Node::Leaf(_) => false,
    }
}

/// Container for the value addressed by `depth` path parts.
fn container_for(property: &Property, depth: usize) -> Node {
    let segments = property.path.segments();
    let indexed = match segments.get(depth) {
        Some(segment) => *segment == Segment::AnyInteger,
        None => depth == segments.len() && property.data_type.is_simple_array(),
    };
    if indexed {
        Node::List(BTreeMap::new())
    } else {
        Node::Map(BTreeMap::new())
    }
}
