//! Data type descriptors produced by the introspector.

use crate::property::Property;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Concrete numeric primitive backing a [`NumberType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberKind {
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
}

impl NumberKind {
    pub fn is_integer(&self) -> bool {
        !matches!(self, NumberKind::F32 | NumberKind::F64)
    }

    pub fn is_signed(&self) -> bool {
        !matches!(
            self,
            NumberKind::U8
                | NumberKind::U16
                | NumberKind::U32
                | NumberKind::U64
                | NumberKind::U128
                | NumberKind::Usize
        )
    }

    /// Parse `text` as this primitive, reporting overflow and format errors.
    pub fn check(&self, text: &str) -> Result<(), String> {
        fn parse<T: std::str::FromStr>(text: &str) -> Result<(), String>
        where
            T::Err: fmt::Display,
        {
            text.parse::<T>().map(drop).map_err(|e| e.to_string())
        }

        match self {
            NumberKind::I8 => parse::<i8>(text),
            NumberKind::I16 => parse::<i16>(text),
            NumberKind::I32 => parse::<i32>(text),
            NumberKind::I64 => parse::<i64>(text),
            NumberKind::I128 => parse::<i128>(text),
            NumberKind::Isize => parse::<isize>(text),
            NumberKind::U8 => parse::<u8>(text),
            NumberKind::U16 => parse::<u16>(text),
            NumberKind::U32 => parse::<u32>(text),
            NumberKind::U64 => parse::<u64>(text),
            NumberKind::U128 => parse::<u128>(text),
            NumberKind::Usize => parse::<usize>(text),
            NumberKind::F32 => parse::<f32>(text),
            NumberKind::F64 => parse::<f64>(text),
        }
    }
}

/// A numeric value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumberType {
    pub kind: NumberKind,
    pub is_integer: bool,
    pub is_signed: bool,
}

impl NumberType {
    pub fn new(kind: NumberKind) -> Self {
        Self {
            kind,
            is_integer: kind.is_integer(),
            is_signed: kind.is_signed(),
        }
    }
}

/// One named constant of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationValue {
    pub name: String,
    pub value: i64,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A named function that checks whether a string can construct a value.
#[derive(Clone)]
pub struct ValueParser {
    name: String,
    parse: Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>,
}

impl ValueParser {
    pub fn new<F>(name: impl Into<String>, parse: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parse: Arc::new(parse),
        }
    }

    /// A parser backed by a [`std::str::FromStr`] implementation.
    pub fn of<T>(name: impl Into<String>) -> Self
    where
        T: std::str::FromStr,
        T::Err: fmt::Display,
    {
        Self::new(name, |text| {
            text.parse::<T>().map(drop).map_err(|e| e.to_string())
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parse(&self, text: &str) -> Result<(), String> {
        (self.parse)(text)
    }
}

impl fmt::Debug for ValueParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValueParser").field(&self.name).finish()
    }
}

impl PartialEq for ValueParser {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Serialize for ValueParser {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// A string value, optionally restricted to an enumeration or checked by a
/// custom parse function.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StringType {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<EnumerationValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser: Option<ValueParser>,
}

impl StringType {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn enumeration(name: impl Into<String>, values: Vec<EnumerationValue>) -> Self {
        Self {
            name: Some(name.into()),
            values,
            parser: None,
        }
    }

    pub fn parsed(name: impl Into<String>, parser: ValueParser) -> Self {
        Self {
            name: Some(name.into()),
            values: Vec::new(),
            parser: Some(parser),
        }
    }

    pub fn is_enumeration(&self) -> bool {
        !self.values.is_empty()
    }
}

/// A structured type with named members.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectType {
    pub name: String,
    pub properties: Vec<Property>,
}

/// Structural description of a declared option type.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataType {
    Boolean,
    String(StringType),
    Number(NumberType),
    Array { element: Box<DataType> },
    Dictionary { key: Box<DataType>, value: Box<DataType> },
    Object(Arc<ObjectType>),
    Any,
}

impl DataType {
    pub fn string() -> Self {
        DataType::String(StringType::plain())
    }

    pub fn number(kind: NumberKind) -> Self {
        DataType::Number(NumberType::new(kind))
    }

    pub fn array(element: DataType) -> Self {
        DataType::Array {
            element: Box::new(element),
        }
    }

    pub fn dictionary(key: DataType, value: DataType) -> Self {
        DataType::Dictionary {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// Whether a single token can be bound to a value of this type.
    pub fn is_convertible_from_string(&self) -> bool {
        match self {
            DataType::Boolean | DataType::String(_) | DataType::Number(_) | DataType::Any => true,
            DataType::Array { .. } | DataType::Dictionary { .. } | DataType::Object(_) => false,
        }
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, DataType::Boolean)
    }

    /// An array whose elements are each bindable from one token.
    pub fn is_simple_array(&self) -> bool {
        matches!(self, DataType::Array { element } if element.is_convertible_from_string())
    }

    /// Short human readable name used in validation messages.
    pub fn describe(&self) -> String {
        match self {
            DataType::Boolean => "boolean".to_string(),
            DataType::String(s) => match &s.name {
                Some(name) => name.clone(),
                None => "string".to_string(),
            },
            DataType::Number(n) if n.is_integer && !n.is_signed => {
                "non-negative integer".to_string()
            }
            DataType::Number(n) if n.is_integer => "integer".to_string(),
            DataType::Number(_) => "number".to_string(),
            DataType::Array { element } => format!("list of {}", element.describe()),
            DataType::Dictionary { value, .. } => format!("map of {}", value.describe()),
            DataType::Object(obj) => obj.name.clone(),
            DataType::Any => "any".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convertible_from_string() {
        assert!(DataType::Boolean.is_convertible_from_string());
        assert!(DataType::string().is_convertible_from_string());
        assert!(DataType::number(NumberKind::I64).is_convertible_from_string());
        assert!(DataType::Any.is_convertible_from_string());
        assert!(!DataType::array(DataType::string()).is_convertible_from_string());
        assert!(!DataType::dictionary(DataType::string(), DataType::string())
            .is_convertible_from_string());
    }

    #[test]
    fn test_simple_array() {
        assert!(DataType::array(DataType::string()).is_simple_array());
        assert!(!DataType::array(DataType::array(DataType::string())).is_simple_array());
        assert!(!DataType::string().is_simple_array());
    }

    #[test]
    fn test_number_flags_follow_kind() {
        let unsigned = NumberType::new(NumberKind::U32);
        assert!(unsigned.is_integer);
        assert!(!unsigned.is_signed);

        let float = NumberType::new(NumberKind::F64);
        assert!(!float.is_integer);
        assert!(float.is_signed);
    }

    #[test]
    fn test_number_kind_check_range() {
        assert!(NumberKind::U8.check("255").is_ok());
        assert!(NumberKind::U8.check("256").is_err());
        assert!(NumberKind::U8.check("-1").is_err());
        assert!(NumberKind::I64.check("-42").is_ok());
        assert!(NumberKind::F64.check("3.14").is_ok());
        assert!(NumberKind::I32.check("3.14").is_err());
    }

    #[test]
    fn test_value_parser_from_str() {
        let parser = ValueParser::of::<std::net::IpAddr>("ip_addr");
        assert_eq!(parser.name(), "ip_addr");
        assert!(parser.parse("127.0.0.1").is_ok());
        assert!(parser.parse("localhost").is_err());
    }

    #[test]
    fn test_describe() {
        assert_eq!(DataType::number(NumberKind::U16).describe(), "non-negative integer");
        assert_eq!(
            DataType::array(DataType::Boolean).describe(),
            "list of boolean"
        );
    }

    #[test]
    fn test_serialize_tagged() {
        let json = serde_json::to_value(DataType::array(DataType::number(NumberKind::I32))).unwrap();
        assert_eq!(json["type"], "array");
        assert_eq!(json["element"]["type"], "number");
        assert_eq!(json["element"]["kind"], "i32");
    }
}
