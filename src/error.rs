//! Error types for schema registration, parsing and binding.

use crate::command::Command;
use crate::pipeline::{CommandPipeline, ExitCode};
use thiserror::Error;

/// Errors raised while registering option types, commands and aliases.
///
/// These are programmer errors: they surface during setup and never while
/// parsing user input.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unsupported type at '{path}': {reason}")]
    UnsupportedType { path: String, reason: String },

    #[error("type '{type_name}' contains itself ({})", .chain.join(" -> "))]
    CycleDetected {
        type_name: String,
        chain: Vec<String>,
    },

    #[error("unknown type: {0}")]
    UnknownType(String),

    #[error("type registered twice: {0}")]
    DuplicateType(String),

    #[error("unknown value parser: {0}")]
    UnknownParser(String),

    #[error("invalid pattern '{pattern}' on '{path}': {source}")]
    InvalidPattern {
        path: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("duplicate property: {0}")]
    DuplicateProperty(String),

    #[error("duplicate command: {0}")]
    DuplicateCommand(String),

    #[error("invalid alias '{0}': must start with '-' or '/'")]
    InvalidAlias(String),

    #[error("duplicate alias: {0}")]
    DuplicateAlias(String),
}

/// A failed parse.
///
/// Every variant carries the pipeline so a single handler can render usage
/// text, and the selected command once one was matched.
#[derive(Debug, Error)]
pub enum ParseError<'p> {
    #[error("Required command was not provided.")]
    CommandNotMatched {
        pipeline: &'p CommandPipeline,
        args: Vec<String>,
    },

    #[error(
        "Unexpected options were included on the command line: {}",
        .tokens.join(", ")
    )]
    UnrecognizedTokens {
        pipeline: &'p CommandPipeline,
        command: &'p Command,
        tokens: Vec<String>,
    },

    #[error("{}", .messages.join("\n"))]
    ValidationFailed {
        pipeline: &'p CommandPipeline,
        command: &'p Command,
        messages: Vec<String>,
    },
}

impl<'p> ParseError<'p> {
    pub fn pipeline(&self) -> &'p CommandPipeline {
        match self {
            ParseError::CommandNotMatched { pipeline, .. }
            | ParseError::UnrecognizedTokens { pipeline, .. }
            | ParseError::ValidationFailed { pipeline, .. } => pipeline,
        }
    }

    /// The selected command, if matching got that far.
    pub fn command(&self) -> Option<&'p Command> {
        match self {
            ParseError::CommandNotMatched { .. } => None,
            ParseError::UnrecognizedTokens { command, .. }
            | ParseError::ValidationFailed { command, .. } => Some(command),
        }
    }

    /// Human readable error lines.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ParseError::ValidationFailed { messages, .. } => messages.clone(),
            other => vec![other.to_string()],
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::UsageError
    }

    /// Closest visible command name to the first argument, for "did you
    /// mean" hints when no command matched.
    pub fn suggestion(&self) -> Option<String> {
        let ParseError::CommandNotMatched { pipeline, args } = self else {
            return None;
        };
        let first = args.first()?.to_lowercase();

        pipeline
            .commands()
            .iter()
            .filter(|command| !command.is_hidden() && !command.name().is_empty())
            .map(|command| command.display_name())
            .map(|name| (strsim::levenshtein(&first, &name.to_lowercase()), name))
            .filter(|(distance, _)| *distance <= 2)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, name)| name)
    }
}

/// Errors converting bound values into a typed options value.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("failed to deserialize options: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("conflicting values bound at '{0}'")]
    Conflict(String),
}
