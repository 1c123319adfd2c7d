//! Lexing of raw arguments into classified tokens.

use crate::error::SchemaError;
use std::collections::HashMap;
use tracing::trace;

/// Classification of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// An option name, with its leading marker stripped.
    Key,
    /// A plain value.
    Value,
    /// A short option bundle that could not be resolved.
    Unknown,
}

/// A classified unit of the argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    kind: TokenKind,
    text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn key(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Key, text)
    }

    pub fn value(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Value, text)
    }

    pub fn unknown(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Unknown, text)
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_key(&self) -> bool {
        self.kind == TokenKind::Key
    }

    pub fn is_value(&self) -> bool {
        self.kind == TokenKind::Value
    }
}

/// Maps alternate spellings (`-r`, `/R`) to canonical option names.
///
/// Lookups are exact. Canonical names are stored without their marker.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `alias` as another spelling of `full` (e.g. `-r` → `--read`).
    pub fn insert(&mut self, alias: &str, full: &str) -> Result<(), SchemaError> {
        if !has_marker(alias) || strip_marker(alias).is_empty() {
            return Err(SchemaError::InvalidAlias(alias.to_string()));
        }
        let canonical = strip_marker(full);
        if canonical.is_empty() {
            return Err(SchemaError::InvalidAlias(full.to_string()));
        }
        if self.entries.contains_key(alias) {
            return Err(SchemaError::DuplicateAlias(alias.to_string()));
        }
        self.entries.insert(alias.to_string(), canonical.to_string());
        Ok(())
    }

    /// Canonical name for an exact alias spelling.
    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.entries.get(alias).map(String::as_str)
    }

    /// All aliases of a canonical name, ignoring case, shortest first.
    pub fn aliases_for(&self, canonical: &str) -> Vec<&str> {
        let mut aliases: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, target)| target.eq_ignore_ascii_case(canonical))
            .map(|(alias, _)| alias.as_str())
            .collect();
        aliases.sort_by(|a, b| a.len().cmp(&b.len()).then(a.cmp(b)));
        aliases
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn has_marker(arg: &str) -> bool {
    arg.starts_with('-') || arg.starts_with('/')
}

fn strip_marker(arg: &str) -> &str {
    arg.trim_start_matches(['-', '/'])
}

/// Split an argument vector into tokens.
///
/// Long (`--name`), short (`-n`) and slash (`/name`) options become keys,
/// with an optional `=value` suffix emitted as a following value. Short
/// options are resolved through the alias table, including bundles such as
/// `-fdx` or `-ofile`. `--` forces the next argument to be a value.
pub fn tokenize(args: &[String], aliases: &AliasTable) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(args.len());
    let mut i = 0;

    while i < args.len() {
        let arg = args[i].as_str();
        i += 1;

        if arg == "--" {
            // A trailing "--" has nothing to escape.
            if let Some(next) = args.get(i) {
                tokens.push(Token::value(next.as_str()));
                i += 1;
            }
            continue;
        }

        let (normalized, key_start) = if arg.starts_with("--") {
            (arg.to_string(), 2)
        } else if arg.starts_with('-') && arg.len() > 1 {
            (arg.to_string(), 1)
        } else if let Some(rest) = arg.strip_prefix('/') {
            (format!("--{}", rest), 2)
        } else {
            tokens.push(Token::value(arg));
            continue;
        };

        let separator = normalized.find('=');
        let key_segment = match separator {
            Some(pos) => &normalized[..pos],
            None => normalized.as_str(),
        };

        if let Some(canonical) = aliases.resolve(key_segment) {
            tokens.push(Token::key(canonical));
        } else if key_start == 1 && separator.is_none() {
            push_short_bundle(key_segment, aliases, &mut tokens);
        } else {
            tokens.push(Token::key(&key_segment[key_start..]));
        }

        if let Some(pos) = separator {
            tokens.push(Token::value(&normalized[pos + 1..]));
        }
    }

    trace!(args = args.len(), tokens = tokens.len(), "Tokenized arguments");
    tokens
}

/// Resolve `-abc` as individual `-a -b -c` aliases, or `-ovalue` as an alias
/// followed by its value.
fn push_short_bundle(segment: &str, aliases: &AliasTable, tokens: &mut Vec<Token>) {
    let chars: Vec<char> = segment[1..].chars().collect();
    let resolved: Vec<Option<&str>> = chars
        .iter()
        .map(|c| aliases.resolve(&format!("-{}", c)))
        .collect();

    if resolved.iter().all(Option::is_some) {
        tokens.extend(resolved.into_iter().flatten().map(Token::key));
    } else if resolved.len() > 1 && resolved[0].is_some() {
        let first = resolved[0].unwrap_or_default();
        let rest: String = chars[1..].iter().collect();
        tokens.push(Token::key(first));
        tokens.push(Token::value(rest));
    } else {
        tokens.push(Token::unknown(segment));
    }
}
