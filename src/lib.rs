//! argbind - schema-driven command-line argument binding.
//!
//! Option types are described once, either through the [`Describe`] trait or
//! a JSON pipeline definition, and flattened into addressable properties.
//! Each parse tokenizes the argument vector, selects a registered command,
//! binds tokens to properties and validates the result, producing a flat
//! `:`-delimited value map that can be deserialized into the host's options.

pub mod bindings;
pub mod command;
pub mod config;
pub mod error;
pub mod introspect;
pub mod output;
pub mod parser;
pub mod path;
pub mod pipeline;
pub mod property;
pub mod schema;
pub mod token;
pub mod validate;

pub use bindings::Bindings;
pub use command::{Command, Handler, Matcher, ParseContext, Request};
pub use config::{Config, ConfigError};
pub use error::{BindError, ParseError, SchemaError};
pub use introspect::{Describe, Introspector, MemberDecl, ObjectDecl, TypeDecl};
pub use parser::{ParseOutcome, Parser};
pub use path::{ConfigPath, ConfigSection, OptionComparer, Segment};
pub use pipeline::{AppInfo, CommandPipeline, ExitCode};
pub use property::{display_order, flatten, ListPolicy, Property, PropertyMeta, Rule};
pub use schema::{DataType, NumberKind, ValueParser};
pub use token::{tokenize, AliasTable, Token, TokenKind};
