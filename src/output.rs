//! JSON documents describing parse outcomes, failures and command schemas.
//!
//! The library itself never prints; these renderings are what the `argbind`
//! binary writes to stdout.

use crate::bindings::Bindings;
use crate::command::{Command, Request};
use crate::error::{BindError, ParseError, SchemaError};
use crate::parser::ParseOutcome;
use crate::pipeline::{AppInfo, CommandPipeline};
use crate::property::{display_order, Property};
use crate::token::AliasTable;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Replacement text for values of masked properties.
pub const MASK: &str = "********";

fn request_name(request: &Request) -> &'static str {
    match request {
        Request::Run => "run",
        Request::Help { .. } => "help",
        Request::Version => "version",
    }
}

/// Render a successful parse.
///
/// Values of masked properties, bound or defaulted, are replaced by [`MASK`].
pub fn outcome_json(outcome: &ParseOutcome<'_>) -> Result<Value, BindError> {
    let mut document = Map::new();
    document.insert("status".into(), json!(request_name(&outcome.request)));
    document.insert("command".into(), json!(outcome.command.display_name()));

    match &outcome.request {
        Request::Help { target } => {
            document.insert("target".into(), json!(target));
        }
        Request::Version => {
            document.insert("version".into(), version_json(outcome.pipeline.app()));
        }
        Request::Run => {
            let bindings = masked_bindings(outcome);
            let properties = masked_defaults(outcome.command.properties());
            let values = bindings.to_value_with(&properties, outcome.pipeline.option_comparer())?;
            document.insert("bindings".into(), json!(bindings));
            document.insert("values".into(), values);
            document.insert("unrecognized".into(), json!(outcome.unrecognized));
        }
    }

    Ok(Value::Object(document))
}

fn masked_bindings(outcome: &ParseOutcome<'_>) -> Bindings {
    let comparer = outcome.pipeline.option_comparer();
    let secret: HashSet<&str> = outcome
        .command
        .properties()
        .iter()
        .filter(|property| property.meta.masked)
        .flat_map(|property| outcome.bindings.matching(property, comparer))
        .map(|(key, _)| key)
        .collect();

    let mut masked = Bindings::new();
    for (key, value) in outcome.bindings.iter() {
        masked.insert(key, if secret.contains(key) { MASK } else { value });
    }
    masked
}

fn masked_defaults(properties: &[Property]) -> Vec<Property> {
    properties
        .iter()
        .cloned()
        .map(|mut property| {
            if property.meta.masked && property.meta.default.is_some() {
                property.meta.default = Some(MASK.to_string());
            }
            property
        })
        .collect()
}

fn error_kind(err: &ParseError<'_>) -> &'static str {
    match err {
        ParseError::CommandNotMatched { .. } => "command_not_matched",
        ParseError::UnrecognizedTokens { .. } => "unrecognized_tokens",
        ParseError::ValidationFailed { .. } => "validation_failed",
    }
}

/// Render a failed parse with its messages, exit code and any suggestion.
pub fn error_json(err: &ParseError<'_>) -> Value {
    let mut document = json!({
        "status": "error",
        "kind": error_kind(err),
        "command": err.command().map(Command::display_name),
        "messages": err.messages(),
        "exit_code": err.exit_code().code(),
    });
    if let (Some(suggestion), Value::Object(map)) = (err.suggestion(), &mut document) {
        map.insert("suggestion".into(), json!(suggestion));
    }
    document
}

pub fn version_json(app: &AppInfo) -> Value {
    json!({
        "name": app.name,
        "version": app.version,
        "description": app.description,
        "copyright": app.copyright,
    })
}

fn property_json(property: &Property, aliases: &AliasTable) -> Value {
    let path = property.path.to_string();
    let meta = &property.meta;

    let mut document = Map::new();
    document.insert("path".into(), json!(path));
    document.insert("type".into(), json!(property.data_type.describe()));
    if let Some(description) = property.description() {
        document.insert("description".into(), json!(description));
    }
    document.insert("required".into(), json!(meta.required));
    document.insert("positional".into(), json!(meta.positional));
    document.insert("nullable".into(), json!(meta.nullable));
    document.insert("hidden".into(), json!(meta.hidden));
    document.insert("masked".into(), json!(meta.masked));
    if let Some(default) = &meta.default {
        let default = if meta.masked { MASK } else { default.as_str() };
        document.insert("default".into(), json!(default));
    }
    if !meta.rules.is_empty() {
        document.insert("rules".into(), json!(meta.rules));
    }
    document.insert("aliases".into(), json!(aliases.aliases_for(&path)));
    Value::Object(document)
}

/// The expanded property model of one command, in display order.
pub fn command_json(pipeline: &CommandPipeline, command: &Command) -> Result<Value, SchemaError> {
    let described = command.describe()?;
    let properties: Vec<Value> = display_order(&described)
        .into_iter()
        .map(|property| property_json(property, pipeline.aliases()))
        .collect();

    Ok(json!({
        "command": command.display_name(),
        "description": command.get_description(),
        "hidden": command.is_hidden(),
        "allow_unrecognized": command.allows_unrecognized_tokens(),
        "properties": properties,
    }))
}

/// The application metadata and every registered command.
pub fn schema_json(pipeline: &CommandPipeline) -> Result<Value, SchemaError> {
    let commands = pipeline
        .commands()
        .iter()
        .map(|command| command_json(pipeline, command))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({
        "app": version_json(pipeline.app()),
        "commands": commands,
    }))
}

/// Pretty-print a document.
pub fn render(document: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(document)
}
