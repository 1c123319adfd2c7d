//! Command selection and binding of tokens to properties.

use crate::bindings::Bindings;
use crate::command::{Command, Matcher, Request};
use crate::error::{BindError, ParseError};
use crate::path::{OptionComparer, Segment, PATH_DELIMITER};
use crate::pipeline::CommandPipeline;
use crate::property::Property;
use crate::token::{tokenize, Token, TokenKind};
use crate::validate::validate;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cmp::Reverse;
use tracing::{debug, trace};

/// The result of a successful parse.
#[derive(Debug)]
pub struct ParseOutcome<'p> {
    pub pipeline: &'p CommandPipeline,
    pub command: &'p Command,
    pub request: Request,
    pub bindings: Bindings,
    /// Tokens tolerated because the command allows unrecognized input.
    pub unrecognized: Vec<String>,
}

impl<'p> ParseOutcome<'p> {
    pub fn is_help(&self) -> bool {
        matches!(self.request, Request::Help { .. })
    }

    pub fn is_version(&self) -> bool {
        self.request == Request::Version
    }

    /// Nested JSON view of the bindings, typed by the command's properties.
    pub fn to_value(&self) -> Result<Value, BindError> {
        self.bindings
            .to_value_with(self.command.properties(), self.pipeline.option_comparer())
    }

    /// Deserialize the bindings into the host's option type.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        Ok(serde_json::from_value(self.to_value()?)?)
    }
}

/// Parses an argument vector against a pipeline.
pub struct Parser<'p> {
    pipeline: &'p CommandPipeline,
}

impl<'p> Parser<'p> {
    pub fn new(pipeline: &'p CommandPipeline) -> Self {
        Self { pipeline }
    }

    /// Parse the pipeline's own arguments.
    pub fn parse(&self) -> Result<ParseOutcome<'p>, ParseError<'p>> {
        self.parse_args(self.pipeline.args())
    }

    pub fn parse_args(&self, args: &[String]) -> Result<ParseOutcome<'p>, ParseError<'p>> {
        let pipeline = self.pipeline;
        let comparer = pipeline.option_comparer();
        let tokens = tokenize(args, pipeline.aliases());
        trace!(?tokens, "Parsing arguments");

        let Some((command, ctx)) = self
            .candidates()
            .into_iter()
            .find_map(|command| command.try_match(&tokens, comparer).map(|ctx| (command, ctx)))
        else {
            debug!(args = args.len(), "No command matched");
            return Err(ParseError::CommandNotMatched {
                pipeline,
                args: args.to_vec(),
            });
        };
        debug!(command = %command.display_name(), request = ?ctx.request, "Matched command");

        if ctx.request != Request::Run {
            return Ok(ParseOutcome {
                pipeline,
                command,
                request: ctx.request,
                bindings: ctx.bindings,
                unrecognized: Vec::new(),
            });
        }

        let mut binder = Binder::new(command, ctx.bindings, comparer);
        binder.bind(&ctx.tokens);
        let Binder {
            results: bindings,
            unrecognized,
            ..
        } = binder;

        if !unrecognized.is_empty() && !command.allows_unrecognized_tokens() {
            return Err(ParseError::UnrecognizedTokens {
                pipeline,
                command,
                tokens: unrecognized,
            });
        }

        let messages = validate(command.properties(), &bindings, comparer);
        if !messages.is_empty() {
            debug!(failures = messages.len(), "Validation failed");
            return Err(ParseError::ValidationFailed {
                pipeline,
                command,
                messages,
            });
        }

        Ok(ParseOutcome {
            pipeline,
            command,
            request: Request::Run,
            bindings,
            unrecognized,
        })
    }

    /// Help, then version, then user commands with longer names first so
    /// `remote add` is tried before `remote` and the root command last.
    fn candidates(&self) -> Vec<&'p Command> {
        let mut candidates: Vec<&'p Command> = self.pipeline.commands().iter().collect();
        candidates.sort_by_key(|command| match command.matcher() {
            Matcher::Help { .. } => (0, Reverse(0)),
            Matcher::Version { .. } => (1, Reverse(0)),
            _ => (2, Reverse(command.name().len())),
        });
        candidates
    }
}

/// A property resolved from a key token.
struct Resolution<'a> {
    property: &'a Property,
    /// Key under which values are stored, using the property's spelling.
    key: String,
    /// The key names a whole list rather than one of its entries.
    list: bool,
}

/// Binding state for one command.
struct Binder<'a> {
    command: &'a Command,
    comparer: OptionComparer,
    results: Bindings,
    unrecognized: Vec<String>,
    positional_index: usize,
}

impl<'a> Binder<'a> {
    fn new(command: &'a Command, results: Bindings, comparer: OptionComparer) -> Self {
        Self {
            command,
            comparer,
            results,
            unrecognized: Vec::new(),
            positional_index: 0,
        }
    }

    fn bind(&mut self, tokens: &[Token]) {
        let command = self.command;
        let positionals = command.positionals();
        let mut i = 0;

        while i < tokens.len() {
            let token = &tokens[i];
            match token.kind() {
                TokenKind::Unknown => {
                    self.unrecognized.push(token.text().to_string());
                    i += 1;
                }
                TokenKind::Value => {
                    while positionals
                        .get(self.positional_index)
                        .is_some_and(|p| self.is_bound(p))
                    {
                        self.positional_index += 1;
                    }

                    match positionals.get(self.positional_index) {
                        Some(property) if property.data_type.is_simple_array() => {
                            i = self.bind_run(&property.path.to_string(), tokens, i);
                        }
                        Some(property) => {
                            self.results.insert(property.path.to_string(), token.text());
                            i += 1;
                        }
                        None => {
                            self.unrecognized.push(format!(
                                "[position {}] {}",
                                self.positional_index,
                                token.text()
                            ));
                            i += 1;
                        }
                    }
                    self.positional_index += 1;
                }
                TokenKind::Key => {
                    let next_is_value = tokens.get(i + 1).is_some_and(Token::is_value);
                    i = match self.resolve(token.text()) {
                        Some(resolved) if next_is_value && resolved.list => {
                            self.bind_run(&resolved.key, tokens, i + 1)
                        }
                        Some(Resolution { key, .. }) if next_is_value => {
                            self.results.insert(key, tokens[i + 1].text());
                            i + 2
                        }
                        None if next_is_value => {
                            self.results.insert(token.text(), tokens[i + 1].text());
                            i + 2
                        }
                        Some(Resolution { property, key, .. }) if property.data_type.is_boolean() => {
                            self.results.insert(key, "true");
                            i + 1
                        }
                        None => {
                            self.results.insert(token.text(), "true");
                            i + 1
                        }
                        Some(_) => {
                            self.unrecognized.push(format!("--{}", token.text()));
                            i + 1
                        }
                    };
                }
            }
        }

        trace!(
            bound = self.results.len(),
            unrecognized = self.unrecognized.len(),
            "Bound tokens"
        );
    }

    fn is_bound(&self, property: &Property) -> bool {
        let key = property.path.to_string();
        if property.data_type.is_simple_array() {
            self.results.next_index(&key) > 0
        } else {
            self.results.contains_key(&key)
        }
    }

    /// Bind the run of value tokens starting at `start` as list entries,
    /// returning the index of the first token after the run.
    fn bind_run(&mut self, key: &str, tokens: &[Token], start: usize) -> usize {
        let mut index = self.results.next_index(key);
        let mut i = start;
        while let Some(token) = tokens.get(i).filter(|t| t.is_value()) {
            self.results
                .insert(format!("{}{}{}", key, PATH_DELIMITER, index), token.text());
            index += 1;
            i += 1;
        }
        i
    }

    /// Find the property named by a key, first by exact path, then by
    /// matching wildcard and list entry paths.
    fn resolve(&self, text: &str) -> Option<Resolution<'a>> {
        let command: &'a Command = self.command;
        let properties = command.properties();

        if let Some(property) = properties
            .iter()
            .find(|p| !p.path.has_wildcards() && self.comparer.equals(&p.path.to_string(), text))
        {
            return Some(Resolution {
                property,
                key: property.path.to_string(),
                list: property.data_type.is_simple_array(),
            });
        }

        properties.iter().find_map(|property| {
            let path = if property.data_type.is_simple_array() {
                property.path.child(Segment::AnyInteger)
            } else if property.path.has_wildcards() {
                property.path.clone()
            } else {
                return None;
            };
            if !path.matches(text, self.comparer) {
                return None;
            }
            Some(Resolution {
                property,
                key: canonical_key(path.segments(), text),
                list: false,
            })
        })
    }
}

/// Rewrite a matched key using the declared section names, keeping the
/// concrete indices and dictionary keys from the input.
fn canonical_key(segments: &[Segment], text: &str) -> String {
    let delimiter = PATH_DELIMITER.to_string();
    segments
        .iter()
        .zip(text.split(PATH_DELIMITER))
        .map(|(segment, part)| match segment {
            Segment::Section(section) => section.name.as_str(),
            Segment::AnyInteger | Segment::AnyIntegerKey | Segment::AnyString => part,
        })
        .collect::<Vec<_>>()
        .join(delimiter.as_str())
}
