//! JSON pipeline definitions.
//!
//! A definition names the application, its aliases, any object types and the
//! commands with their options. [`Config::build_pipeline`] turns a validated
//! definition into a [`CommandPipeline`].

use crate::command::Command;
use crate::error::SchemaError;
use crate::introspect::{Introspector, MemberDecl, ObjectDecl, TypeDecl};
use crate::path::OptionComparer;
use crate::pipeline::{AppInfo, CommandPipeline};
use crate::property::Rule;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// The minimum supported schema version.
pub const MIN_SCHEMA_VERSION: u32 = 1;
/// The maximum supported schema version.
pub const MAX_SCHEMA_VERSION: u32 = 1;

/// Errors that can occur while loading and validating a definition.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse JSON config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported schema version {0} (supported: 1)")]
    UnsupportedSchemaVersion(u32),

    #[error("duplicate option name: {0}")]
    DuplicateName(String),

    #[error("duplicate command name: {0}")]
    DuplicateCommandName(String),

    #[error("duplicate type name: {0}")]
    DuplicateTypeName(String),

    #[error("invalid short option '{0}': must be a single ASCII letter or digit")]
    InvalidShortOption(String),

    #[error("'choices' on option '{0}' is empty: must have at least one valid value")]
    EmptyChoices(String),

    #[error("'choices' on option '{0}' has duplicate value: {1}")]
    DuplicateChoice(String, String),

    #[error("'choices' cannot be used with a boolean option '{0}'")]
    ChoicesOnFlag(String),

    #[error("invalid pipeline definition: {0}")]
    Schema(#[from] SchemaError),
}

/// An option type, written either as a shorthand name (`"string[]"`,
/// `"i64?"`, `"Server"`) or as a tagged object
/// (`{"kind": "enum", "name": "Level", "values": [...]}`).
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec(pub TypeDecl);

impl Default for TypeSpec {
    fn default() -> Self {
        TypeSpec(TypeDecl::String)
    }
}

impl<'de> Deserialize<'de> for TypeSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, MapAccess, Visitor};

        struct TypeSpecVisitor;

        impl<'de> Visitor<'de> for TypeSpecVisitor {
            type Value = TypeSpec;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a type name or a type object")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value.parse::<TypeDecl>().map(TypeSpec).map_err(E::custom)
            }

            fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                TypeDecl::deserialize(de::value::MapAccessDeserializer::new(map)).map(TypeSpec)
            }
        }

        deserializer.deserialize_any(TypeSpecVisitor)
    }
}

/// Configuration for a single option or object member.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionConfig {
    /// Name used on the command line (`--name`) and as the binding key
    pub name: String,
    /// Short alias character (e.g., 'v' for -v)
    pub short: Option<char>,
    /// Value type; plain string when omitted
    #[serde(rename = "type", default)]
    pub ty: TypeSpec,
    #[serde(default)]
    pub required: bool,
    /// Default value if not provided
    pub default: Option<String>,
    /// Help text for this option
    pub help: Option<String>,
    /// Display priority; lower sorts first
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub hidden: bool,
    /// Value is a secret and should not be echoed
    #[serde(default)]
    pub masked: bool,
    /// Bound by position instead of by name
    #[serde(default)]
    pub positional: bool,
    /// Allowed values, compared case-insensitively
    pub choices: Option<Vec<String>>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Names of registered parsers run as extra validators
    #[serde(default)]
    pub validators: Vec<String>,
}

impl OptionConfig {
    fn to_member(&self) -> MemberDecl {
        let mut rules = self.rules.clone();
        if let Some(choices) = &self.choices {
            rules.push(Rule::OneOf {
                values: choices.clone(),
            });
        }
        MemberDecl {
            name: self.name.clone(),
            description: self.help.clone(),
            ty: self.ty.0.clone(),
            required: self.required,
            default: self.default.clone(),
            order: self.order,
            hidden: self.hidden,
            masked: self.masked,
            positional: self.positional,
            rules,
            validators: self.validators.clone(),
        }
    }

    fn is_flag(&self) -> bool {
        matches!(self.ty.0, TypeDecl::Bool)
    }
}

/// A named object type usable as an option type.
#[derive(Debug, Clone, Deserialize)]
pub struct TypeConfig {
    pub name: String,
    /// Type whose members this one inherits
    pub base: Option<String>,
    #[serde(default)]
    pub members: Vec<OptionConfig>,
}

/// Configuration for a command.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandConfig {
    /// Whitespace separated name; empty for the root command
    #[serde(default)]
    pub name: String,
    /// Help text for this command
    pub help: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    /// Keep unrecognized tokens instead of failing
    #[serde(default)]
    pub allow_unrecognized: bool,
    #[serde(default)]
    pub options: Vec<OptionConfig>,
}

fn default_schema_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// Top-level pipeline definition.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Schema version for the config format (default: 1)
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub copyright: Option<String>,
    /// Compare option names exactly; command names always ignore case
    #[serde(default)]
    pub case_sensitive: bool,
    /// Register the built-in help and version commands
    #[serde(default = "default_true")]
    pub builtin_commands: bool,
    /// Extra aliases, e.g. `{"-r": "--read"}`
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub types: Vec<TypeConfig>,
    /// Options of the root command
    #[serde(default)]
    pub options: Vec<OptionConfig>,
    #[serde(default)]
    pub commands: Vec<CommandConfig>,
}

impl Config {
    /// Parse a JSON string into a Config.
    pub fn from_json(json: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Validate the definition without building it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version < MIN_SCHEMA_VERSION || self.schema_version > MAX_SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedSchemaVersion(self.schema_version));
        }

        let mut type_names = HashSet::new();
        for ty in &self.types {
            if !type_names.insert(&ty.name) {
                return Err(ConfigError::DuplicateTypeName(ty.name.clone()));
            }
            Self::validate_options(&ty.members)?;
        }

        Self::validate_options(&self.options)?;

        let mut command_names = HashSet::new();
        if !self.options.is_empty() {
            command_names.insert(String::new());
        }
        for command in &self.commands {
            let name = normalize_command_name(&command.name);
            if !command_names.insert(name.clone()) {
                return Err(ConfigError::DuplicateCommandName(name));
            }
            Self::validate_options(&command.options)?;
        }

        Ok(())
    }

    fn validate_options(options: &[OptionConfig]) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for option in options {
            if !names.insert(option.name.to_lowercase()) {
                return Err(ConfigError::DuplicateName(option.name.clone()));
            }
            Self::validate_option(option)?;
        }
        Ok(())
    }

    fn validate_option(option: &OptionConfig) -> Result<(), ConfigError> {
        if let Some(short) = option.short {
            if !short.is_ascii_alphanumeric() {
                return Err(ConfigError::InvalidShortOption(short.to_string()));
            }
        }

        if let Some(choices) = &option.choices {
            if option.is_flag() {
                return Err(ConfigError::ChoicesOnFlag(option.name.clone()));
            }
            if choices.is_empty() {
                return Err(ConfigError::EmptyChoices(option.name.clone()));
            }
            let mut seen = HashSet::new();
            for choice in choices {
                if !seen.insert(choice.to_lowercase()) {
                    return Err(ConfigError::DuplicateChoice(
                        option.name.clone(),
                        choice.clone(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Application metadata, falling back to `app` / `0.0.0`.
    pub fn app_info(&self) -> AppInfo {
        AppInfo {
            name: self.name.clone().unwrap_or_else(|| "app".to_string()),
            version: self.version.clone().unwrap_or_else(|| "0.0.0".to_string()),
            description: self.description.clone(),
            copyright: self.copyright.clone(),
        }
    }

    /// Validate the definition and build a pipeline that parses `args`.
    pub fn build_pipeline<I, S>(&self, args: I) -> Result<CommandPipeline, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.validate()?;

        let comparer = if self.case_sensitive {
            OptionComparer::Exact
        } else {
            OptionComparer::IgnoreCase
        };
        let pipeline = if self.builtin_commands {
            CommandPipeline::with_defaults(self.app_info())?
        } else {
            CommandPipeline::new(self.app_info())
        };
        let mut pipeline = pipeline.with_args(args).with_comparer(comparer);

        let mut introspector = Introspector::new();
        for ty in &self.types {
            let decl = ty
                .members
                .iter()
                .fold(ObjectDecl::new(&ty.name), |decl, member| decl.member(member.to_member()));
            let decl = match &ty.base {
                Some(base) => decl.base(base),
                None => decl,
            };
            introspector.register_object(decl)?;
        }

        for (alias, full) in &self.aliases {
            pipeline.alias(alias, full)?;
        }

        if !self.options.is_empty() || self.commands.is_empty() {
            let root = build_command(Command::new(""), &self.options, &mut introspector, &mut pipeline)?;
            pipeline.add_command(root)?;
        }

        for config in &self.commands {
            let mut command = Command::new(&config.name);
            if let Some(help) = &config.help {
                command = command.description(help);
            }
            if config.hidden {
                command = command.hidden();
            }
            if config.allow_unrecognized {
                command = command.allow_unrecognized_tokens();
            }
            let command = build_command(command, &config.options, &mut introspector, &mut pipeline)?;
            pipeline.add_command(command)?;
        }

        debug!(
            commands = pipeline.commands().len(),
            aliases = pipeline.aliases().len(),
            "Built pipeline from config"
        );
        Ok(pipeline)
    }
}

fn normalize_command_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_command(
    mut command: Command,
    options: &[OptionConfig],
    introspector: &mut Introspector,
    pipeline: &mut CommandPipeline,
) -> Result<Command, ConfigError> {
    for option in options {
        if let Some(short) = option.short {
            let alias = format!("-{}", short);
            // Commands may share a short option for the same long name.
            if pipeline.aliases().resolve(&alias) != Some(option.name.as_str()) {
                pipeline.alias(&alias, &option.name)?;
            }
        }
        command = command.option(option.to_member(), introspector)?;
    }
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NumberKind;
    use std::io::Write;

    fn parse_config(json: &str) -> Config {
        Config::from_json(json).expect("Failed to parse config")
    }

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = parse_config(r#"{"name": "test"}"#);
        assert_eq!(config.schema_version, 1);
        assert!(config.builtin_commands);
        assert!(config.commands.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_type_shorthand_and_tagged_forms() {
        let config = parse_config(
            r#"{
                "options": [
                    {"name": "read", "type": "string[]"},
                    {"name": "offset", "type": "i64?"},
                    {"name": "level", "type": {"kind": "enum", "name": "Level",
                        "values": [{"name": "Low", "value": 0}, {"name": "High", "value": 1}]}},
                    {"name": "file"}
                ]
            }"#,
        );
        assert_eq!(config.options[0].ty.0, TypeDecl::sequence(TypeDecl::String));
        assert_eq!(
            config.options[1].ty.0,
            TypeDecl::nullable(TypeDecl::number(NumberKind::I64))
        );
        assert!(matches!(config.options[2].ty.0, TypeDecl::Enum { .. }));
        assert_eq!(config.options[3].ty.0, TypeDecl::String);
    }

    #[test]
    fn test_invalid_type_name_fails_to_parse() {
        let result = Config::from_json(r#"{"options": [{"name": "x", "type": "not a type"}]}"#);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_unsupported_schema_version() {
        let config = parse_config(r#"{"schema_version": 7}"#);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedSchemaVersion(7))
        ));
    }

    #[test]
    fn test_duplicate_option_names() {
        let config = parse_config(r#"{"options": [{"name": "file"}, {"name": "FILE"}]}"#);
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateName(n)) if n == "FILE"));
    }

    #[test]
    fn test_duplicate_command_names() {
        let config = parse_config(r#"{"commands": [{"name": "remote add"}, {"name": "Remote  Add"}]}"#);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateCommandName(n)) if n == "remote add"
        ));
    }

    #[test]
    fn test_choices_validation() {
        let empty = parse_config(r#"{"options": [{"name": "fmt", "choices": []}]}"#);
        assert!(matches!(empty.validate(), Err(ConfigError::EmptyChoices(_))));

        let dup = parse_config(r#"{"options": [{"name": "fmt", "choices": ["json", "JSON"]}]}"#);
        assert!(matches!(dup.validate(), Err(ConfigError::DuplicateChoice(_, c)) if c == "JSON"));

        let flag = parse_config(r#"{"options": [{"name": "v", "type": "bool", "choices": ["x"]}]}"#);
        assert!(matches!(flag.validate(), Err(ConfigError::ChoicesOnFlag(_))));
    }

    #[test]
    fn test_invalid_short_option() {
        let config = parse_config(r#"{"options": [{"name": "x", "short": "-"}]}"#);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidShortOption(_))));
    }

    #[test]
    fn test_build_pipeline_with_commands_and_types() {
        let config = parse_config(
            r#"{
                "name": "tool",
                "version": "1.2.0",
                "aliases": {"-q": "--quiet"},
                "types": [
                    {"name": "Server", "members": [
                        {"name": "Host", "required": true},
                        {"name": "Port", "type": "u16", "default": "80"}
                    ]}
                ],
                "commands": [
                    {"name": "deploy", "help": "Deploy the app", "options": [
                        {"name": "Servers", "type": "Server[]"},
                        {"name": "quiet", "type": "bool"},
                        {"name": "target", "short": "t", "positional": true}
                    ]}
                ]
            }"#,
        );
        let pipeline = config.build_pipeline(args(&["deploy", "prod", "-q"])).unwrap();
        assert_eq!(pipeline.app().name, "tool");

        let deploy = pipeline.find_command("deploy").unwrap();
        assert_eq!(deploy.get_description(), Some("Deploy the app"));
        let paths: Vec<String> = deploy.properties().iter().map(|p| p.path.to_string()).collect();
        assert_eq!(paths, vec!["Servers:#:Host", "Servers:#:Port", "quiet", "target"]);

        let outcome = pipeline.parse().unwrap();
        assert_eq!(outcome.bindings.get("target"), Some("prod"));
        assert_eq!(outcome.bindings.get("quiet"), Some("true"));
    }

    #[test]
    fn test_root_command_from_top_level_options() {
        let config = parse_config(
            r#"{"options": [{"name": "Read", "type": "string[]", "short": "r", "required": true}]}"#,
        );
        let pipeline = config.build_pipeline(args(&["-r", "a", "b"])).unwrap();
        let outcome = pipeline.parse().unwrap();
        assert_eq!(outcome.bindings.get("Read:0"), Some("a"));
        assert_eq!(outcome.bindings.get("Read:1"), Some("b"));
    }

    #[test]
    fn test_case_sensitive_config() {
        let config = parse_config(
            r#"{"case_sensitive": true, "options": [{"name": "Level", "type": "u8"}]}"#,
        );
        let pipeline = config.build_pipeline(args(&["--level", "3"])).unwrap();
        let outcome = pipeline.parse().unwrap();
        assert_eq!(outcome.bindings.get("level"), Some("3"));
        assert_eq!(outcome.bindings.get("Level"), None);
    }

    #[test]
    fn test_unknown_type_is_schema_error() {
        let config = parse_config(r#"{"options": [{"name": "x", "type": "Missing"}]}"#);
        assert!(matches!(
            config.build_pipeline(Vec::<String>::new()),
            Err(ConfigError::Schema(SchemaError::UnknownType(_)))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"name": "from-file", "version": "0.1.0"}}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.app_info(), AppInfo::new("from-file", "0.1.0"));
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::from_file(dir.path().join("missing.json"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
