//! Bindable properties and the flattening of data type trees into them.

use crate::error::SchemaError;
use crate::path::{ConfigPath, Segment};
use crate::schema::{DataType, ValueParser};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A declarative validation rule attached to a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rule {
    /// Inclusive numeric bounds.
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// Inclusive length bounds; characters for strings, entries for lists.
    Length {
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
    },
    /// Regular expression the whole value must match.
    Pattern { pattern: String },
    /// Case-insensitive set of allowed values.
    OneOf { values: Vec<String> },
}

/// Per-property metadata.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PropertyMeta {
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Display priority hint; lower sorts first.
    pub order: i32,
    pub hidden: bool,
    pub masked: bool,
    pub positional: bool,
    /// The declared type was optional; absent values stay absent.
    pub nullable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<ValueParser>,
    /// Nearest optional object containing this property. Its members are
    /// only required once something under it is bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional_parent: Option<ConfigPath>,
}

impl PropertyMeta {
    /// Metadata inherited by the elements of a list or dictionary.
    fn for_element(&self) -> Self {
        Self {
            hidden: self.hidden,
            masked: self.masked,
            ..Self::default()
        }
    }
}

/// One addressable option value.
#[derive(Debug, Clone, Serialize)]
pub struct Property {
    pub path: ConfigPath,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(flatten)]
    pub meta: PropertyMeta,
}

impl Property {
    pub fn new(path: ConfigPath, data_type: DataType) -> Self {
        Self {
            path,
            data_type,
            meta: PropertyMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: PropertyMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Human readable description from the last section of the path.
    pub fn description(&self) -> Option<&str> {
        self.path
            .last_section()
            .and_then(|section| section.description.as_deref())
    }

    fn rebased(&self, path: ConfigPath) -> Self {
        Self {
            path,
            data_type: self.data_type.clone(),
            meta: self.meta.clone(),
        }
    }
}

/// How arrays of scalars are treated while flattening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPolicy {
    /// Arrays of scalars stay one property so tokens can be consumed greedily.
    KeepSimpleLists,
    /// Every array is expanded with an index wildcard.
    ExpandAll,
}

/// Linearize root properties into bindable leaves, in declaration order.
pub fn flatten(roots: &[Property], policy: ListPolicy) -> Result<Vec<Property>, SchemaError> {
    let mut result = Vec::new();
    for root in roots {
        flatten_into(&ConfigPath::root(), root, policy, None, &mut result)?;
    }
    Ok(result)
}

fn flatten_into(
    base: &ConfigPath,
    property: &Property,
    policy: ListPolicy,
    optional: Option<&ConfigPath>,
    result: &mut Vec<Property>,
) -> Result<(), SchemaError> {
    let path = base.join(&property.path);

    match &property.data_type {
        DataType::Array { element }
            if !(policy == ListPolicy::KeepSimpleLists && element.is_convertible_from_string()) =>
        {
            let item = Property {
                path: path.child(Segment::AnyInteger),
                data_type: element.as_ref().clone(),
                meta: property.meta.for_element(),
            };
            flatten_into(&ConfigPath::root(), &item, policy, optional, result)?;
        }
        DataType::Dictionary { key, value } => {
            let segment = match key.as_ref() {
                DataType::Number(number) if number.is_integer => Segment::AnyIntegerKey,
                key if key.is_convertible_from_string() => Segment::AnyString,
                other => {
                    return Err(SchemaError::UnsupportedType {
                        path: path.to_string(),
                        reason: format!("dictionary keys must be scalar, found {}", other.describe()),
                    })
                }
            };
            let entry = Property {
                path: path.child(segment),
                data_type: value.as_ref().clone(),
                meta: property.meta.for_element(),
            };
            flatten_into(&ConfigPath::root(), &entry, policy, optional, result)?;
        }
        DataType::Object(object) => {
            let optional = if property.meta.nullable && !path.is_empty() {
                Some(&path)
            } else {
                optional
            };
            for member in &object.properties {
                flatten_into(&path, member, policy, optional, result)?;
            }
        }
        // Scalars, and lists of scalars kept whole.
        data_type => {
            if path.is_empty() {
                return Err(SchemaError::UnsupportedType {
                    path: "<root>".to_string(),
                    reason: format!("a {} option needs a name", data_type.describe()),
                });
            }
            let mut leaf = property.rebased(path);
            if leaf.meta.optional_parent.is_none() {
                leaf.meta.optional_parent = optional.cloned();
            }
            result.push(leaf);
        }
    }

    Ok(())
}

/// Sort properties for display: required first, then by the order hint,
/// then case-insensitively by path.
pub fn display_order(properties: &[Property]) -> Vec<&Property> {
    let mut sorted: Vec<&Property> = properties.iter().collect();
    sorted.sort_by(|a, b| compare_for_display(a, b));
    sorted
}

fn compare_for_display(a: &Property, b: &Property) -> Ordering {
    b.meta
        .required
        .cmp(&a.meta.required)
        .then(a.meta.order.cmp(&b.meta.order))
        .then_with(|| {
            a.path
                .to_string()
                .to_lowercase()
                .cmp(&b.path.to_string().to_lowercase())
        })
}
