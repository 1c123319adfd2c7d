//! Full parses through the public API: typed option structs described in
//! code, and pipelines built from JSON definitions.

use argbind::{
    AppInfo, Command, CommandPipeline, Config, Describe, ExitCode, Introspector, MemberDecl, ObjectDecl,
    NumberKind, ParseError, Request, Rule, SchemaError, TypeDecl,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

#[derive(Debug, Deserialize)]
struct RemoteAdd {
    name: String,
    url: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
    timeout: Option<u32>,
}

impl Describe for RemoteAdd {
    fn type_decl() -> TypeDecl {
        TypeDecl::object("RemoteAdd")
    }

    fn register(introspector: &mut Introspector) -> Result<(), SchemaError> {
        if introspector.has_object("RemoteAdd") {
            return Ok(());
        }
        introspector.register_object(
            ObjectDecl::new("RemoteAdd")
                .member(MemberDecl::new("name", String::type_decl()).positional().required())
                .member(
                    MemberDecl::new("url", String::type_decl())
                        .required()
                        .rule(Rule::Pattern {
                            pattern: "https?://.+".to_string(),
                        }),
                )
                .member(MemberDecl::new("tags", Vec::<String>::type_decl()))
                .member(MemberDecl::new("headers", HashMap::<String, String>::type_decl()))
                .member(MemberDecl::new("timeout", Option::<u32>::type_decl())),
        )
    }
}

fn args(s: &[&str]) -> Vec<String> {
    s.iter().map(|s| s.to_string()).collect()
}

fn remote_pipeline() -> CommandPipeline {
    let mut introspector = Introspector::new();
    RemoteAdd::register(&mut introspector).unwrap();

    let mut pipeline = CommandPipeline::with_defaults(AppInfo::new("git-lite", "0.3.0")).unwrap();
    pipeline
        .alias("-t", "--tags")
        .unwrap()
        .add_command(Command::new("remote").description("Manage remotes"))
        .unwrap()
        .add_command(
            Command::new("remote add")
                .options_of(&RemoteAdd::type_decl(), &mut introspector)
                .unwrap(),
        )
        .unwrap();
    pipeline
}

#[test]
fn test_described_struct_round_trips_through_bind() {
    let pipeline = remote_pipeline();
    let outcome = pipeline
        .parse_args(&args(&[
            "remote",
            "add",
            "origin",
            "--url=https://example.com/repo.git",
            "-t",
            "a",
            "b",
            "--headers:Accept",
            "json",
            "--timeout",
            "30",
        ]))
        .unwrap();

    assert_eq!(outcome.command.display_name(), "remote add");
    let options: RemoteAdd = outcome.bind().unwrap();
    assert_eq!(options.name, "origin");
    assert_eq!(options.url, "https://example.com/repo.git");
    assert_eq!(options.tags, vec!["a", "b"]);
    assert_eq!(options.headers.get("Accept").map(String::as_str), Some("json"));
    assert_eq!(options.timeout, Some(30));
}

#[test]
fn test_longest_command_name_wins() {
    let pipeline = remote_pipeline();
    let outcome = pipeline.parse_args(&args(&["remote"])).unwrap();
    assert_eq!(outcome.command.display_name(), "remote");

    let outcome = pipeline
        .parse_args(&args(&["remote", "add", "up", "--url", "http://x"]))
        .unwrap();
    assert_eq!(outcome.command.display_name(), "remote add");
}

#[test]
fn test_validation_reports_every_failure() {
    let pipeline = remote_pipeline();
    let err = pipeline
        .parse_args(&args(&["remote", "add", "--url", "ftp://x", "--timeout", "soon"]))
        .unwrap_err();

    assert_eq!(err.command().map(Command::display_name).as_deref(), Some("remote add"));
    assert_eq!(
        err.messages(),
        vec![
            "The name field is required.".to_string(),
            "The field url must match the regular expression 'https?://.+'.".to_string(),
            "'soon' is not a valid value for timeout: expected non-negative integer (invalid digit found in string)"
                .to_string(),
        ]
    );
    assert_eq!(err.exit_code(), ExitCode::UsageError);
}

#[test]
fn test_help_for_nested_command() {
    let pipeline = remote_pipeline();
    let outcome = pipeline.parse_args(&args(&["remote", "add", "-h"])).unwrap();
    assert!(outcome.is_help());
    assert_eq!(
        outcome.request,
        Request::Help {
            target: Some("remote add".to_string())
        }
    );
    assert!(outcome.bindings.is_empty());
}

#[test]
fn test_run_dispatches_to_handler() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);

    let mut introspector = Introspector::new();
    let fetch = Command::new("fetch")
        .option(MemberDecl::new("url", TypeDecl::String).positional().required(), &mut introspector)
        .unwrap()
        .option(
            MemberDecl::new("retries", TypeDecl::number(NumberKind::U8)).default_value("2"),
            &mut introspector,
        )
        .unwrap()
        .handler(move |outcome| {
            record.lock().unwrap().push(outcome.to_value()?);
            Ok(ExitCode::Success)
        });

    let mut pipeline = CommandPipeline::with_defaults(AppInfo::new("fetcher", "1.0.0"))
        .unwrap()
        .with_args(["fetch", "http://a", "-n", "5"]);
    pipeline.alias("-n", "--retries").unwrap().add_command(fetch).unwrap();

    assert_eq!(pipeline.run(), ExitCode::Success);
    let pipeline = pipeline.with_args(["fetch", "http://b"]);
    assert_eq!(pipeline.run(), ExitCode::Success);
    let pipeline = pipeline.with_args(["fetch"]);
    assert_eq!(pipeline.run(), ExitCode::UsageError);

    let values = seen.lock().unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values[0]["url"], "http://a");
    assert_eq!(values[0]["retries"], 5);
    assert_eq!(values[1]["retries"], 2);
}

#[test]
fn test_config_short_options_become_aliases() {
    let config = Config::from_json(
        r#"{
            "name": "fetcher",
            "commands": [
                {"name": "fetch", "options": [
                    {"name": "url", "positional": true, "required": true},
                    {"name": "verbose", "short": "v", "type": "bool"},
                    {"name": "quiet", "short": "q", "type": "bool"}
                ]}
            ]
        }"#,
    )
    .unwrap();
    let pipeline = config.build_pipeline(["fetch", "http://a", "-vq"]).unwrap();
    let value = pipeline.parse().unwrap().to_value().unwrap();
    assert_eq!(value["url"], "http://a");
    assert_eq!(value["verbose"], true);
    assert_eq!(value["quiet"], true);
}

#[test]
fn test_pipeline_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "name": "tool",
            "case_sensitive": true,
            "types": [
                {{"name": "Endpoint", "members": [
                    {{"name": "Host", "required": true}},
                    {{"name": "Port", "type": "u16", "default": "80"}}
                ]}}
            ],
            "options": [
                {{"name": "Endpoints", "type": "Endpoint[]"}},
                {{"name": "Mode", "choices": ["fast", "safe"]}}
            ]
        }}"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    let pipeline = config
        .build_pipeline(["--Endpoints:0:Host", "a", "--Endpoints:1:Host", "b", "--Endpoints:1:Port", "8080"])
        .unwrap();
    let value = pipeline.parse().unwrap().to_value().unwrap();
    assert_eq!(value["Endpoints"][0]["Host"], "a");
    assert_eq!(value["Endpoints"][1]["Port"], 8080);

    // Case-sensitive pipelines leave differently cased keys unresolved.
    let pipeline = config.build_pipeline(["--mode", "fast", "--Mode", "slow"]).unwrap();
    let err = pipeline.parse().unwrap_err();
    assert!(matches!(err, ParseError::ValidationFailed { .. }));
    assert_eq!(err.messages(), vec!["The field Mode must be one of: fast, safe."]);
}

#[test]
fn test_case_sensitive_config_still_matches_command_names() {
    let config = Config::from_json(
        r#"{
            "name": "fetcher",
            "case_sensitive": true,
            "commands": [
                {"name": "fetch", "options": [{"name": "url", "required": true}]}
            ]
        }"#,
    )
    .unwrap();

    let pipeline = config.build_pipeline(["FETCH", "--url", "http://a"]).unwrap();
    let outcome = pipeline.parse().unwrap();
    assert_eq!(outcome.command.display_name(), "fetch");
    assert_eq!(outcome.to_value().unwrap()["url"], "http://a");
    assert!(pipeline.find_command("Fetch").is_some());

    let pipeline = config.build_pipeline(["fetch", "--URL", "http://a"]).unwrap();
    let err = pipeline.parse().unwrap_err();
    assert_eq!(err.messages(), vec!["The url field is required."]);
}
