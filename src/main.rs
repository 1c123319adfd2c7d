//! argbind - schema-driven argument binding from a JSON pipeline definition.

use anyhow::{bail, Context, Result};
use argbind::output::{command_json, error_json, outcome_json, render, schema_json};
use argbind::{CommandPipeline, Config, Request};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Bind command-line arguments against a JSON pipeline definition.
#[derive(Parser, Debug)]
#[command(name = "argbind", version, about, disable_help_subcommand = true)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// JSON pipeline definition
    #[arg(long, env = "ARGBIND_CONFIG")]
    config: Option<String>,

    /// File holding the JSON pipeline definition (overrides --config)
    #[arg(long)]
    config_file: Option<PathBuf>,
}

impl ConfigArgs {
    fn load(&self) -> Result<Config> {
        match (&self.config_file, &self.config) {
            (Some(path), _) => Config::from_file(path)
                .with_context(|| format!("failed to load config file {}", path.display())),
            (None, Some(json)) => Config::from_json(json).context("failed to parse config JSON"),
            (None, None) => bail!("a pipeline definition is required: pass --config, --config-file or set ARGBIND_CONFIG"),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse arguments and print the bound values as JSON
    Parse {
        #[command(flatten)]
        config: ConfigArgs,

        /// Arguments to parse
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Print the flattened options of the defined commands
    Schema {
        #[command(flatten)]
        config: ConfigArgs,

        /// Only describe this command (e.g. "remote add")
        #[arg(long)]
        command: Option<String>,
    },
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

fn describe(pipeline: &CommandPipeline, name: Option<&str>) -> Result<Value> {
    match name {
        Some(name) => {
            let Some(command) = pipeline.find_command(name) else {
                bail!("unknown command: {}", name);
            };
            command_json(pipeline, command).context("failed to describe command")
        }
        None => schema_json(pipeline).context("failed to describe pipeline"),
    }
}

fn parse(pipeline: &CommandPipeline) -> Result<ExitCode> {
    let outcome = match pipeline.parse() {
        Ok(outcome) => outcome,
        Err(err) => {
            debug!(error = %err, "Parse failed");
            println!("{}", render(&error_json(&err))?);
            return Ok(err.exit_code().into());
        }
    };

    let mut document = outcome_json(&outcome).context("failed to bind parsed values")?;
    if let Request::Help { target } = &outcome.request {
        let command = target.as_deref().and_then(|name| pipeline.find_command(name));
        let schema = match command {
            Some(command) => command_json(pipeline, command),
            None => schema_json(pipeline),
        }
        .context("failed to describe help target")?;
        if let Value::Object(map) = &mut document {
            map.insert("schema".into(), schema);
        }
    }

    println!("{}", render(&document)?);
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Parse { config, args } => {
            let cfg = config.load()?;
            let pipeline = cfg.build_pipeline(args).context("invalid config")?;
            parse(&pipeline)
        }
        Commands::Schema { config, command } => {
            let cfg = config.load()?;
            let pipeline = cfg
                .build_pipeline(Vec::<String>::new())
                .context("invalid config")?;
            println!("{}", render(&describe(&pipeline, command.as_deref())?)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
