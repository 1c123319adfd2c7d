//! Commands, their matchers and the per-attempt parse context.

use crate::bindings::Bindings;
use crate::error::SchemaError;
use crate::introspect::{Introspector, MemberDecl, TypeDecl};
use crate::parser::ParseOutcome;
use crate::path::{ConfigPath, OptionComparer, Segment};
use crate::pipeline::ExitCode;
use crate::property::{flatten, ListPolicy, Property, Rule};
use crate::schema::DataType;
use crate::token::Token;
use crate::validate::compile_pattern;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Callback invoked with a successful parse.
pub type Handler = Arc<dyn Fn(&ParseOutcome<'_>) -> anyhow::Result<ExitCode> + Send + Sync>;

/// What the user asked the selected command to do.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Request {
    /// Run the command.
    #[default]
    Run,
    /// Show usage, optionally for a named command (`help remote add`).
    Help { target: Option<String> },
    Version,
}

/// Mutable state for one match attempt.
///
/// A fresh context is built for every candidate command and dropped when the
/// candidate does not match.
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub tokens: Vec<Token>,
    pub bindings: Bindings,
    pub success: bool,
    pub request: Request,
    pub comparer: OptionComparer,
}

impl ParseContext {
    pub fn new(tokens: Vec<Token>, comparer: OptionComparer) -> Self {
        Self {
            tokens,
            bindings: Bindings::new(),
            success: false,
            request: Request::Run,
            comparer,
        }
    }

    fn has_key(&self, names: &[String]) -> bool {
        self.tokens.iter().any(|token| {
            token.is_key()
                && names
                    .iter()
                    .any(|name| OptionComparer::IgnoreCase.equals(token.text(), name))
        })
    }
}

/// Decides whether a command applies to a token stream.
#[derive(Clone)]
pub enum Matcher {
    /// Leading value tokens equal to the command's name segments.
    Name,
    /// `--help` anywhere, or a leading `help` value followed by a target.
    Help { names: Vec<String> },
    /// `--version` anywhere.
    Version { names: Vec<String> },
    Custom(Arc<dyn Fn(&mut ParseContext) + Send + Sync>),
}

impl Matcher {
    pub fn apply(&self, command: &Command, ctx: &mut ParseContext) {
        match self {
            Matcher::Name => match_name(command.name(), ctx),
            Matcher::Help { names } => match_help(names, ctx),
            Matcher::Version { names } => {
                if ctx.has_key(names) {
                    ctx.success = true;
                    ctx.request = Request::Version;
                }
            }
            Matcher::Custom(matcher) => matcher(ctx),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Name => f.write_str("Name"),
            Matcher::Help { names } => f.debug_struct("Help").field("names", names).finish(),
            Matcher::Version { names } => f.debug_struct("Version").field("names", names).finish(),
            Matcher::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Command names always match case-insensitively; the context's comparer
/// only governs option keys.
fn match_name(name: &ConfigPath, ctx: &mut ParseContext) {
    let segments = name.segments();
    if ctx.tokens.len() < segments.len() {
        return;
    }

    let matched = segments.iter().zip(&ctx.tokens).all(|(segment, token)| {
        token.is_value()
            && matches!(segment, Segment::Section(section) if OptionComparer::IgnoreCase.equals(&section.name, token.text()))
    });

    if matched {
        ctx.tokens.drain(..segments.len());
        ctx.success = true;
    }
}

fn match_help(names: &[String], ctx: &mut ParseContext) {
    let leading_values = ctx
        .tokens
        .iter()
        .take_while(|token| token.is_value())
        .map(Token::text);

    let target: Vec<&str> = match ctx.tokens.first() {
        Some(first)
            if first.is_value()
                && names.iter().any(|name| OptionComparer::IgnoreCase.equals(first.text(), name)) =>
        {
            leading_values.skip(1).collect()
        }
        _ if ctx.has_key(names) => leading_values.collect(),
        _ => return,
    };

    ctx.request = Request::Help {
        target: (!target.is_empty()).then(|| target.join(" ")),
    };
    ctx.tokens.clear();
    ctx.success = true;
}

/// A registered command: a name, a matcher and the options it binds.
#[derive(Clone)]
pub struct Command {
    name: ConfigPath,
    description: Option<String>,
    matcher: Matcher,
    options: Vec<Property>,
    properties: Vec<Property>,
    handler: Option<Handler>,
    allow_unrecognized_tokens: bool,
    hidden: bool,
}

impl Command {
    /// A command matched by its whitespace separated name. An empty name is
    /// the root command, which matches any input.
    pub fn new(name: &str) -> Self {
        Self::with_matcher(ConfigPath::from_words(name), Matcher::Name)
    }

    pub fn with_matcher(name: ConfigPath, matcher: Matcher) -> Self {
        Self {
            name,
            description: None,
            matcher,
            options: Vec::new(),
            properties: Vec::new(),
            handler: None,
            allow_unrecognized_tokens: false,
            hidden: false,
        }
    }

    /// The built-in help command.
    pub fn help() -> Self {
        Self::with_matcher(
            ConfigPath::from_words("help"),
            Matcher::Help {
                names: vec!["help".to_string()],
            },
        )
        .description("Show help and usage information")
    }

    /// The built-in version command.
    pub fn version() -> Self {
        Self::with_matcher(
            ConfigPath::from_words("version"),
            Matcher::Version {
                names: vec!["version".to_string()],
            },
        )
        .description("Show version information")
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn allow_unrecognized_tokens(mut self) -> Self {
        self.allow_unrecognized_tokens = true;
        self
    }

    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ParseOutcome<'_>) -> anyhow::Result<ExitCode> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Add one named option.
    pub fn option(self, member: MemberDecl, introspector: &mut Introspector) -> Result<Self, SchemaError> {
        let property = introspector.member_property(&member)?;
        self.property(property)
    }

    /// Expose every member of an object type as a top-level option.
    pub fn options_of(self, ty: &TypeDecl, introspector: &mut Introspector) -> Result<Self, SchemaError> {
        let resolved = introspector.resolve(ty)?;
        self.property(Property::new(ConfigPath::root(), resolved.data_type))
    }

    /// Add a root property and re-check the flattened property set.
    pub fn property(mut self, property: Property) -> Result<Self, SchemaError> {
        if property.meta.positional {
            check_positional(&property)?;
        }
        self.options.push(property);
        let properties = flatten(&self.options, ListPolicy::KeepSimpleLists)?;
        check_properties(&properties)?;
        debug!(command = %self.name, properties = properties.len(), "Updated command options");
        self.properties = properties;
        Ok(self)
    }

    pub fn name(&self) -> &ConfigPath {
        &self.name
    }

    /// Name as typed on the command line (`remote add`).
    pub fn display_name(&self) -> String {
        self.name
            .segments()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn get_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Root properties in declaration order.
    pub fn options(&self) -> &[Property] {
        &self.options
    }

    /// Flattened bindable properties; lists of scalars stay whole.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Positional properties in declaration order.
    pub fn positionals(&self) -> Vec<&Property> {
        self.properties.iter().filter(|p| p.meta.positional).collect()
    }

    /// Fully expanded properties for documentation.
    pub fn describe(&self) -> Result<Vec<Property>, SchemaError> {
        flatten(&self.options, ListPolicy::ExpandAll)
    }

    pub fn get_handler(&self) -> Option<&Handler> {
        self.handler.as_ref()
    }

    pub fn allows_unrecognized_tokens(&self) -> bool {
        self.allow_unrecognized_tokens
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Run the matcher against a fresh context.
    pub fn try_match(&self, tokens: &[Token], comparer: OptionComparer) -> Option<ParseContext> {
        let mut ctx = ParseContext::new(tokens.to_vec(), comparer);
        self.matcher.apply(self, &mut ctx);
        ctx.success.then_some(ctx)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name.to_string())
            .field("matcher", &self.matcher)
            .field("properties", &self.properties.len())
            .field("handler", &self.handler.is_some())
            .field("allow_unrecognized_tokens", &self.allow_unrecognized_tokens)
            .field("hidden", &self.hidden)
            .finish()
    }
}

fn check_positional(property: &Property) -> Result<(), SchemaError> {
    let bindable = property.data_type.is_convertible_from_string() || property.data_type.is_simple_array();
    if bindable && !property.path.has_wildcards() {
        return Ok(());
    }
    Err(SchemaError::UnsupportedType {
        path: property.path.to_string(),
        reason: "positional options must be a single value or a list of values".to_string(),
    })
}

fn check_properties(properties: &[Property]) -> Result<(), SchemaError> {
    for (i, property) in properties.iter().enumerate() {
        let path = property.path.to_string();

        if properties[..i]
            .iter()
            .any(|earlier| OptionComparer::IgnoreCase.equals(&earlier.path.to_string(), &path))
        {
            return Err(SchemaError::DuplicateProperty(path));
        }

        if property.meta.positional {
            check_positional(property)?;
        }

        for rule in &property.meta.rules {
            match rule {
                Rule::Pattern { pattern } => {
                    compile_pattern(pattern).map_err(|source| SchemaError::InvalidPattern {
                        path: path.clone(),
                        pattern: pattern.clone(),
                        source,
                    })?;
                }
                Rule::Range { .. } => {
                    let element = match &property.data_type {
                        DataType::Array { element } => element.as_ref(),
                        other => other,
                    };
                    if !matches!(element, DataType::Number(_) | DataType::Any) {
                        return Err(SchemaError::UnsupportedType {
                            path,
                            reason: format!("range rules apply to numbers, found {}", element.describe()),
                        });
                    }
                }
                _ => {}
            }
        }
    }
    Ok(())
}
