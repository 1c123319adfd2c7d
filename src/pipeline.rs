//! Command registration, application metadata and exit codes.

use crate::command::{Command, Matcher, Request};
use crate::error::{ParseError, SchemaError};
use crate::parser::{ParseOutcome, Parser};
use crate::path::OptionComparer;
use crate::token::AliasTable;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error};

/// Application metadata shown by help and version output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
}

impl AppInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn copyright(mut self, copyright: impl Into<String>) -> Self {
        self.copyright = Some(copyright.into());
        self
    }
}

/// Process exit codes, following the BSD `sysexits.h` conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCode {
    Success = 0,
    UsageError = 64,
    DataError = 65,
    NoInput = 66,
    NoUser = 67,
    NoHost = 68,
    ServiceUnavailable = 69,
    InternalSoftwareError = 70,
    SystemError = 71,
    OsFileMissing = 72,
    CantCreate = 73,
    IoError = 74,
    TempFail = 75,
    ProtocolError = 76,
    NoPermission = 77,
    ConfigError = 78,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "The command completed successfully.",
            ExitCode::UsageError => "The command was used incorrectly.",
            ExitCode::DataError => "The input data was incorrect.",
            ExitCode::NoInput => "An input file did not exist or was not readable.",
            ExitCode::NoUser => "The user specified did not exist.",
            ExitCode::NoHost => "The host specified did not exist.",
            ExitCode::ServiceUnavailable => "A service is unavailable.",
            ExitCode::InternalSoftwareError => "An internal software error has been detected.",
            ExitCode::SystemError => "An operating system error has been detected.",
            ExitCode::OsFileMissing => "A system file does not exist or cannot be opened.",
            ExitCode::CantCreate => "A user specified output file cannot be created.",
            ExitCode::IoError => "An error occurred while doing I/O on some file.",
            ExitCode::TempFail => "A temporary failure occurred; try again later.",
            ExitCode::ProtocolError => "A remote system returned an invalid value during a protocol exchange.",
            ExitCode::NoPermission => "Insufficient permission to perform the operation.",
            ExitCode::ConfigError => "Something was found in an unconfigured or misconfigured state.",
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

/// Registered commands, aliases and the arguments to parse.
pub struct CommandPipeline {
    app: AppInfo,
    args: Vec<String>,
    commands: Vec<Command>,
    aliases: AliasTable,
    comparer: OptionComparer,
}

impl CommandPipeline {
    /// An empty pipeline with no commands or aliases.
    pub fn new(app: AppInfo) -> Self {
        Self {
            app,
            args: Vec::new(),
            commands: Vec::new(),
            aliases: AliasTable::new(),
            comparer: OptionComparer::default(),
        }
    }

    /// A pipeline with the built-in help and version commands and their
    /// short aliases (`-h`, `-?`, `-V`).
    pub fn with_defaults(app: AppInfo) -> Result<Self, SchemaError> {
        let mut pipeline = Self::new(app);
        pipeline
            .add_command(Command::help())?
            .add_command(Command::version())?
            .alias("-h", "--help")?
            .alias("-?", "--help")?
            .alias("-V", "--version")?;
        Ok(pipeline)
    }

    /// Set the arguments parsed by [`CommandPipeline::parse`], without the
    /// program name.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_comparer(mut self, comparer: OptionComparer) -> Self {
        self.comparer = comparer;
        self
    }

    pub fn alias(&mut self, alias: &str, full: &str) -> Result<&mut Self, SchemaError> {
        self.aliases.insert(alias, full)?;
        Ok(self)
    }

    /// Register a command. Names must be unique, ignoring case.
    pub fn add_command(&mut self, command: Command) -> Result<&mut Self, SchemaError> {
        let name = command.display_name();
        let named = |c: &Command| !matches!(c.matcher(), Matcher::Custom(_));
        if named(&command)
            && self
                .commands
                .iter()
                .any(|existing| named(existing) && OptionComparer::IgnoreCase.equals(&existing.display_name(), &name))
        {
            return Err(SchemaError::DuplicateCommand(name));
        }

        debug!(command = %name, properties = command.properties().len(), "Registered command");
        self.commands.push(command);
        Ok(self)
    }

    pub fn app(&self) -> &AppInfo {
        &self.app
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// All commands in registration order, including help and version.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Look up a command by its typed name (`remote add`), ignoring case.
    pub fn find_command(&self, name: &str) -> Option<&Command> {
        let words: Vec<&str> = name.split_whitespace().collect();
        self.commands.iter().find(|command| {
            let display = command.display_name();
            let segments: Vec<&str> = display.split(' ').filter(|s| !s.is_empty()).collect();
            segments.len() == words.len()
                && segments
                    .iter()
                    .zip(&words)
                    .all(|(a, b)| OptionComparer::IgnoreCase.equals(a, b))
        })
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn option_comparer(&self) -> OptionComparer {
        self.comparer
    }

    pub fn parse(&self) -> Result<ParseOutcome<'_>, ParseError<'_>> {
        Parser::new(self).parse()
    }

    pub fn parse_args(&self, args: &[String]) -> Result<ParseOutcome<'_>, ParseError<'_>> {
        Parser::new(self).parse_args(args)
    }

    /// Parse and invoke the selected command's handler.
    pub fn run(&self) -> ExitCode {
        self.run_with(|_| {})
    }

    /// Like [`CommandPipeline::run`], passing parse failures to `on_error`
    /// for rendering before returning their exit code.
    pub fn run_with<F>(&self, on_error: F) -> ExitCode
    where
        F: FnOnce(&ParseError<'_>),
    {
        let outcome = match self.parse() {
            Ok(outcome) => outcome,
            Err(err) => {
                on_error(&err);
                return err.exit_code();
            }
        };

        let Some(handler) = outcome.command.get_handler() else {
            debug!(command = %outcome.command.display_name(), "No handler registered");
            return ExitCode::Success;
        };

        match handler(&outcome) {
            Ok(code) => code,
            Err(err) => {
                error!(command = %outcome.command.display_name(), error = %format!("{:#}", err), "Command failed");
                match outcome.request {
                    Request::Run => ExitCode::InternalSoftwareError,
                    _ => ExitCode::IoError,
                }
            }
        }
    }
}

impl fmt::Debug for CommandPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandPipeline")
            .field("app", &self.app.name)
            .field("args", &self.args)
            .field(
                "commands",
                &self.commands.iter().map(Command::display_name).collect::<Vec<_>>(),
            )
            .field("aliases", &self.aliases.len())
            .field("comparer", &self.comparer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_pipeline_is_send_and_sync() {
        assert_send_sync::<CommandPipeline>();
    }

    #[test]
    fn test_defaults_register_help_and_version() {
        let pipeline = CommandPipeline::with_defaults(AppInfo::new("app", "1.2.3")).unwrap();
        let names: Vec<String> = pipeline.commands().iter().map(Command::display_name).collect();
        assert_eq!(names, vec!["help", "version"]);
        assert_eq!(pipeline.aliases().resolve("-?"), Some("help"));
        assert_eq!(pipeline.aliases().resolve("-V"), Some("version"));
    }

    #[test]
    fn test_duplicate_command_is_rejected() {
        let mut pipeline = CommandPipeline::new(AppInfo::new("app", "1.0"));
        pipeline.add_command(Command::new("read")).unwrap();
        assert!(matches!(
            pipeline.add_command(Command::new("READ")),
            Err(SchemaError::DuplicateCommand(name)) if name == "READ"
        ));
    }

    #[test]
    fn test_find_command() {
        let mut pipeline = CommandPipeline::new(AppInfo::new("app", "1.0"));
        pipeline
            .add_command(Command::new("remote"))
            .unwrap()
            .add_command(Command::new("remote add"))
            .unwrap();
        let found = pipeline.find_command("Remote  Add").unwrap();
        assert_eq!(found.display_name(), "remote add");
        assert!(pipeline.find_command("remote rm").is_none());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::UsageError.code(), 64);
        assert_eq!(ExitCode::ConfigError.code(), 78);
    }

    #[test]
    fn test_run_invokes_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        let mut pipeline = CommandPipeline::with_defaults(AppInfo::new("app", "1.0"))
            .unwrap()
            .with_args(["read"]);
        pipeline
            .add_command(Command::new("read").handler(move |outcome| {
                assert_eq!(outcome.command.display_name(), "read");
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(ExitCode::Success)
            }))
            .unwrap();

        assert_eq!(pipeline.run(), ExitCode::Success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_maps_failures() {
        let pipeline = CommandPipeline::with_defaults(AppInfo::new("app", "1.0"))
            .unwrap()
            .with_args(["unknown"]);

        let mut reported = Vec::new();
        let code = pipeline.run_with(|err| reported = err.messages());
        assert_eq!(code, ExitCode::UsageError);
        assert_eq!(reported, vec!["Required command was not provided."]);
    }

    #[test]
    fn test_handler_error_is_software_error() {
        let mut pipeline = CommandPipeline::new(AppInfo::new("app", "1.0")).with_args(Vec::<String>::new());
        pipeline
            .add_command(Command::new("").handler(|_| anyhow::bail!("boom")))
            .unwrap();
        assert_eq!(pipeline.run(), ExitCode::InternalSoftwareError);
    }

    #[test]
    fn test_app_info_from_json() {
        let app: AppInfo = serde_json::from_str(r#"{"name": "tool", "version": "2.0"}"#).unwrap();
        assert_eq!(app, AppInfo::new("tool", "2.0"));
    }
}
