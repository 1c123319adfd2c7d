//! Type introspection: turning declared option types into [`DataType`] trees.
//!
//! Types are declared explicitly, either as [`TypeDecl`] values (usually
//! loaded from a JSON pipeline definition) or through the [`Describe`] trait.
//! Object types live in a registry held by the [`Introspector`], which
//! memoizes each resolved object by name and rejects types that contain
//! themselves.

use crate::error::SchemaError;
use crate::path::ConfigSection;
use crate::property::{Property, PropertyMeta, Rule};
use crate::schema::{DataType, EnumerationValue, NumberKind, ObjectType, StringType, ValueParser};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, trace};

/// A declared option type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDecl {
    Any,
    Bool,
    String,
    Enum {
        name: String,
        values: Vec<EnumerationValue>,
    },
    Number {
        number: NumberKind,
    },
    Nullable {
        inner: Box<TypeDecl>,
    },
    Sequence {
        element: Box<TypeDecl>,
        #[serde(default = "single_rank")]
        rank: u32,
    },
    Map {
        key: Box<TypeDecl>,
        value: Box<TypeDecl>,
    },
    /// A type constructed from one string by a registered parser.
    Parsable {
        parser: String,
    },
    /// A registered object type.
    Object {
        name: String,
    },
}

fn single_rank() -> u32 {
    1
}

impl TypeDecl {
    pub fn number(number: NumberKind) -> Self {
        TypeDecl::Number { number }
    }

    pub fn nullable(inner: TypeDecl) -> Self {
        TypeDecl::Nullable {
            inner: Box::new(inner),
        }
    }

    pub fn sequence(element: TypeDecl) -> Self {
        TypeDecl::Sequence {
            element: Box::new(element),
            rank: 1,
        }
    }

    pub fn map(key: TypeDecl, value: TypeDecl) -> Self {
        TypeDecl::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn parsable(parser: impl Into<String>) -> Self {
        TypeDecl::Parsable {
            parser: parser.into(),
        }
    }

    pub fn object(name: impl Into<String>) -> Self {
        TypeDecl::Object { name: name.into() }
    }
}

/// Shorthand type names: `bool`, `string`, `any`, numeric kinds (`i64`,
/// `u16`, `f64`, ...), the built-in parsers (`char`, `path`, `ip_addr`,
/// `socket_addr`), a `[]` suffix for lists and a `?` suffix for optional
/// values. Any other identifier names an object type.
impl FromStr for TypeDecl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(inner) = s.strip_suffix('?') {
            return Ok(TypeDecl::nullable(inner.parse()?));
        }
        if let Some(element) = s.strip_suffix("[]") {
            return Ok(TypeDecl::sequence(element.parse()?));
        }

        let decl = match s {
            "" => return Err("empty type name".to_string()),
            "any" => TypeDecl::Any,
            "bool" => TypeDecl::Bool,
            "string" => TypeDecl::String,
            "char" | "path" | "ip_addr" | "socket_addr" => TypeDecl::parsable(s),
            other => match serde_json::from_value::<NumberKind>(serde_json::Value::from(other)) {
                Ok(number) => TypeDecl::number(number),
                Err(_) if is_identifier(other) => TypeDecl::object(other),
                Err(_) => return Err(format!("invalid type name '{}'", other)),
            },
        };
        Ok(decl)
    }
}

fn is_identifier(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

/// A member of a declared object type.
#[derive(Debug, Clone)]
pub struct MemberDecl {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeDecl,
    pub required: bool,
    pub default: Option<String>,
    pub order: i32,
    pub hidden: bool,
    pub masked: bool,
    pub positional: bool,
    pub rules: Vec<Rule>,
    /// Names of registered parsers run as extra validators.
    pub validators: Vec<String>,
}

impl MemberDecl {
    pub fn new(name: impl Into<String>, ty: TypeDecl) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            required: false,
            default: None,
            order: 0,
            hidden: false,
            masked: false,
            positional: false,
            rules: Vec::new(),
            validators: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn positional(mut self) -> Self {
        self.positional = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// A declared object type, optionally deriving from a base type.
#[derive(Debug, Clone)]
pub struct ObjectDecl {
    pub name: String,
    pub base: Option<String>,
    pub members: Vec<MemberDecl>,
}

impl ObjectDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            members: Vec::new(),
        }
    }

    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn member(mut self, member: MemberDecl) -> Self {
        self.members.push(member);
        self
    }
}

/// The result of resolving a [`TypeDecl`].
#[derive(Debug, Clone)]
pub struct Resolved {
    pub data_type: DataType,
    /// The declaration was wrapped in [`TypeDecl::Nullable`].
    pub nullable: bool,
}

/// Resolves declared types against a registry of object types and parsers.
#[derive(Debug)]
pub struct Introspector {
    objects: HashMap<String, ObjectDecl>,
    parsers: HashMap<String, ValueParser>,
    cache: HashMap<String, Arc<ObjectType>>,
    in_progress: Vec<String>,
}

impl Default for Introspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Introspector {
    /// An introspector with the built-in parsers registered.
    pub fn new() -> Self {
        let mut introspector = Self {
            objects: HashMap::new(),
            parsers: HashMap::new(),
            cache: HashMap::new(),
            in_progress: Vec::new(),
        };
        introspector.register_parser(ValueParser::of::<char>("char"));
        introspector.register_parser(ValueParser::new("path", |text| {
            if text.is_empty() {
                Err("path must not be empty".to_string())
            } else {
                Ok(())
            }
        }));
        introspector.register_parser(ValueParser::of::<IpAddr>("ip_addr"));
        introspector.register_parser(ValueParser::of::<SocketAddr>("socket_addr"));
        introspector
    }

    /// Register a parse function; a later registration with the same name
    /// replaces the earlier one.
    pub fn register_parser(&mut self, parser: ValueParser) {
        self.parsers.insert(parser.name().to_string(), parser);
    }

    pub fn parser(&self, name: &str) -> Result<ValueParser, SchemaError> {
        self.parsers
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownParser(name.to_string()))
    }

    pub fn register_object(&mut self, decl: ObjectDecl) -> Result<(), SchemaError> {
        if self.objects.contains_key(&decl.name) {
            return Err(SchemaError::DuplicateType(decl.name));
        }
        debug!(name = %decl.name, members = decl.members.len(), "Registered object type");
        self.objects.insert(decl.name.clone(), decl);
        Ok(())
    }

    pub fn has_object(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    /// Resolve a declared type into its data type tree.
    pub fn resolve(&mut self, decl: &TypeDecl) -> Result<Resolved, SchemaError> {
        self.resolve_at(decl, "<root>")
    }

    /// Resolve a Rust type through its [`Describe`] implementation.
    pub fn describe<T: Describe>(&mut self) -> Result<Resolved, SchemaError> {
        T::register(self)?;
        self.resolve(&T::type_decl())
    }

    /// Build the property for one member, carrying its metadata.
    pub fn member_property(&mut self, member: &MemberDecl) -> Result<Property, SchemaError> {
        let resolved = self.resolve_at(&member.ty, &member.name)?;

        let mut section = ConfigSection::new(&member.name);
        if let Some(description) = &member.description {
            section = section.with_description(description);
        }

        let validators = member
            .validators
            .iter()
            .map(|name| self.parser(name))
            .collect::<Result<Vec<_>, _>>()?;

        let meta = PropertyMeta {
            required: member.required,
            default: member.default.clone(),
            order: member.order,
            hidden: member.hidden,
            masked: member.masked,
            positional: member.positional,
            nullable: resolved.nullable,
            rules: member.rules.clone(),
            validators,
            optional_parent: None,
        };
        Ok(Property::new(section.into(), resolved.data_type).with_meta(meta))
    }

    fn resolve_at(&mut self, decl: &TypeDecl, path: &str) -> Result<Resolved, SchemaError> {
        let data_type = match decl {
            TypeDecl::Any => DataType::Any,
            TypeDecl::Bool => DataType::Boolean,
            TypeDecl::String => DataType::string(),
            TypeDecl::Enum { name, values } => {
                DataType::String(StringType::enumeration(name, values.clone()))
            }
            TypeDecl::Number { number } => DataType::number(*number),
            TypeDecl::Nullable { inner } => {
                let resolved = self.resolve_at(inner, path)?;
                return Ok(Resolved {
                    data_type: resolved.data_type,
                    nullable: true,
                });
            }
            TypeDecl::Sequence { element, rank } => {
                if *rank != 1 {
                    return Err(SchemaError::UnsupportedType {
                        path: path.to_string(),
                        reason: format!("sequences of rank {} are not supported", rank),
                    });
                }
                DataType::array(self.resolve_at(element, path)?.data_type)
            }
            TypeDecl::Map { key, value } => {
                let key = self.resolve_at(key, path)?.data_type;
                let value = self.resolve_at(value, path)?.data_type;
                DataType::dictionary(key, value)
            }
            TypeDecl::Parsable { parser } => {
                DataType::String(StringType::parsed(parser, self.parser(parser)?))
            }
            TypeDecl::Object { name } => DataType::Object(self.resolve_object(name)?),
        };

        Ok(Resolved {
            data_type,
            nullable: false,
        })
    }

    fn resolve_object(&mut self, name: &str) -> Result<Arc<ObjectType>, SchemaError> {
        if let Some(cached) = self.cache.get(name) {
            trace!(name, "Object type cache hit");
            return Ok(Arc::clone(cached));
        }

        if let Some(start) = self.in_progress.iter().position(|n| n == name) {
            let mut chain = self.in_progress[start..].to_vec();
            chain.push(name.to_string());
            return Err(SchemaError::CycleDetected {
                type_name: name.to_string(),
                chain,
            });
        }

        let lineage = self.lineage(name)?;
        self.in_progress.push(name.to_string());
        let built = self.build_object(name, &lineage);
        self.in_progress.pop();

        let object = Arc::new(built?);
        debug!(name, properties = object.properties.len(), "Resolved object type");
        self.cache.insert(name.to_string(), Arc::clone(&object));
        Ok(object)
    }

    /// Declarations from the root base type down to `name`.
    fn lineage(&self, name: &str) -> Result<Vec<ObjectDecl>, SchemaError> {
        let mut lineage = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        let mut current = Some(name.to_string());

        while let Some(type_name) = current {
            if seen.contains(&type_name) {
                seen.push(type_name);
                return Err(SchemaError::CycleDetected {
                    type_name: name.to_string(),
                    chain: seen,
                });
            }
            let decl = self
                .objects
                .get(&type_name)
                .ok_or_else(|| SchemaError::UnknownType(type_name.clone()))?;
            current = decl.base.clone();
            seen.push(type_name);
            lineage.push(decl.clone());
        }

        lineage.reverse();
        Ok(lineage)
    }

    fn build_object(&mut self, name: &str, lineage: &[ObjectDecl]) -> Result<ObjectType, SchemaError> {
        // Base members keep their position; a redeclared member replaces it.
        let mut members: Vec<&MemberDecl> = Vec::new();
        for decl in lineage {
            for member in &decl.members {
                match members.iter_mut().find(|m| m.name == member.name) {
                    Some(slot) => *slot = member,
                    None => members.push(member),
                }
            }
        }

        let properties = members
            .into_iter()
            .map(|member| {
                trace!(object = name, member = %member.name, "Introspecting member");
                self.member_property(member)
            })
            .collect::<Result<Vec<_>, SchemaError>>()?;

        Ok(ObjectType {
            name: name.to_string(),
            properties,
        })
    }
}

/// Rust types that can describe themselves as a [`TypeDecl`].
///
/// Object types implement [`Describe::register`] to add their
/// [`ObjectDecl`] (and those of their members) to the introspector.
pub trait Describe {
    fn type_decl() -> TypeDecl;

    fn register(_introspector: &mut Introspector) -> Result<(), SchemaError> {
        Ok(())
    }
}

macro_rules! describe_as {
    ($($ty:ty => $decl:expr),* $(,)?) => {
        $(
            impl Describe for $ty {
                fn type_decl() -> TypeDecl {
                    $decl
                }
            }
        )*
    };
}

describe_as! {
    bool => TypeDecl::Bool,
    String => TypeDecl::String,
    char => TypeDecl::parsable("char"),
    PathBuf => TypeDecl::parsable("path"),
    IpAddr => TypeDecl::parsable("ip_addr"),
    SocketAddr => TypeDecl::parsable("socket_addr"),
    serde_json::Value => TypeDecl::Any,
    i8 => TypeDecl::number(NumberKind::I8),
    i16 => TypeDecl::number(NumberKind::I16),
    i32 => TypeDecl::number(NumberKind::I32),
    i64 => TypeDecl::number(NumberKind::I64),
    i128 => TypeDecl::number(NumberKind::I128),
    isize => TypeDecl::number(NumberKind::Isize),
    u8 => TypeDecl::number(NumberKind::U8),
    u16 => TypeDecl::number(NumberKind::U16),
    u32 => TypeDecl::number(NumberKind::U32),
    u64 => TypeDecl::number(NumberKind::U64),
    u128 => TypeDecl::number(NumberKind::U128),
    usize => TypeDecl::number(NumberKind::Usize),
    f32 => TypeDecl::number(NumberKind::F32),
    f64 => TypeDecl::number(NumberKind::F64),
}

impl<T: Describe> Describe for Option<T> {
    fn type_decl() -> TypeDecl {
        TypeDecl::nullable(T::type_decl())
    }

    fn register(introspector: &mut Introspector) -> Result<(), SchemaError> {
        T::register(introspector)
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn type_decl() -> TypeDecl {
        TypeDecl::sequence(T::type_decl())
    }

    fn register(introspector: &mut Introspector) -> Result<(), SchemaError> {
        T::register(introspector)
    }
}

impl<K: Describe, V: Describe> Describe for HashMap<K, V> {
    fn type_decl() -> TypeDecl {
        TypeDecl::map(K::type_decl(), V::type_decl())
    }

    fn register(introspector: &mut Introspector) -> Result<(), SchemaError> {
        K::register(introspector)?;
        V::register(introspector)
    }
}

impl<K: Describe, V: Describe> Describe for BTreeMap<K, V> {
    fn type_decl() -> TypeDecl {
        TypeDecl::map(K::type_decl(), V::type_decl())
    }

    fn register(introspector: &mut Introspector) -> Result<(), SchemaError> {
        K::register(introspector)?;
        V::register(introspector)
    }
}
