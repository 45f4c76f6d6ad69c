use crate::config::ValidatorConfig;
use crate::request::ValidationRequest;
use crate::validator::OpenApiValidator;
use anyhow::Context;
use clap::{Parser, Subcommand};
use http::Method;
use serde_json::{json, Value};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Command-line interface for brrtguard
///
/// Validates requests and responses against an OpenAPI contract without
/// running a server.
#[derive(Parser, Debug)]
#[command(name = "brrtguard")]
#[command(about = "OpenAPI request/response validator", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the operations the contract declares
    Routes {
        /// Path to the OpenAPI specification file (YAML or JSON)
        #[arg(short, long)]
        spec: PathBuf,
    },
    /// Validate one request
    Request {
        /// Path to the OpenAPI specification file (YAML or JSON)
        #[arg(short, long)]
        spec: PathBuf,

        /// HTTP method
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Request target including the query string (e.g. `/pets?limit=10`)
        #[arg(short, long)]
        url: String,

        /// Header as `name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Shorthand for `--header "content-type: ..."`
        #[arg(long)]
        content_type: Option<String>,

        /// JSON body file, or `-` for stdin
        #[arg(long, conflicts_with = "data")]
        body: Option<PathBuf>,

        /// Inline JSON body
        #[arg(short, long)]
        data: Option<String>,

        /// Accept undeclared query parameters
        #[arg(long, default_value_t = false)]
        allow_unknown_query: bool,
    },
    /// Validate one response body
    Response {
        /// Path to the OpenAPI specification file (YAML or JSON)
        #[arg(short, long)]
        spec: PathBuf,

        /// HTTP method of the originating request
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Target of the originating request
        #[arg(short, long)]
        url: String,

        /// Response status code
        #[arg(long, default_value_t = 200)]
        status: u16,

        /// JSON body file, or `-` for stdin
        #[arg(long, conflicts_with = "data")]
        body: Option<PathBuf>,

        /// Inline JSON body
        #[arg(short, long)]
        data: Option<String>,
    },
}

fn parse_method(method: &str) -> anyhow::Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method '{method}'"))
}

fn read_body(body: Option<&Path>, data: Option<&str>) -> anyhow::Result<Option<Value>> {
    let text = match (body, data) {
        (_, Some(inline)) => inline.to_string(),
        (Some(path), None) if path == Path::new("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read body from stdin")?;
            buf
        }
        (Some(path), None) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read body file {}", path.display()))?,
        (None, None) => return Ok(None),
    };
    let value = serde_json::from_str(&text).context("body is not valid JSON")?;
    Ok(Some(value))
}

fn split_header(raw: &str) -> anyhow::Result<(&str, &str)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("header '{raw}' must be formatted as 'name: value'"))?;
    Ok((name.trim(), value.trim()))
}

/// Execute a parsed command line, printing the outcome to stdout.
///
/// Returns `Ok(true)` when the validated message conforms (or the command
/// has nothing to validate), `Ok(false)` when validation failed.
///
/// # Errors
///
/// Fails on unreadable contracts, bodies or malformed arguments.
pub fn run_cli(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Routes { spec } => {
            let validator = OpenApiValidator::from_file(&spec, ValidatorConfig::default())?;
            for route in validator.routes().routes() {
                println!(
                    "{:<7} {} -> {}",
                    route.method.as_str(),
                    route.path_pattern,
                    route.operation_id.as_deref().unwrap_or("-")
                );
            }
            Ok(true)
        }
        Commands::Request {
            spec,
            method,
            url,
            headers,
            content_type,
            body,
            data,
            allow_unknown_query,
        } => {
            let mut config = ValidatorConfig::from_env();
            config.validate_requests = true;
            config.allow_unknown_query_parameters |= allow_unknown_query;
            let validator = OpenApiValidator::from_file(&spec, config)?;

            let mut req = ValidationRequest::new(parse_method(&method)?, url);
            for raw in &headers {
                let (name, value) = split_header(raw)?;
                req = req.with_header(name, value);
            }
            if let Some(ct) = content_type {
                req = req.with_header("content-type", ct);
            }
            if let Some(value) = read_body(body.as_deref(), data.as_deref())? {
                req = req.with_body(value);
            }

            match validator.validate_request(&mut req) {
                Ok(outcome) => {
                    let report = json!({
                        "valid": true,
                        "outcome": format!("{outcome:?}"),
                        "query": req.query,
                        "params": req.params,
                        "headers": req.headers,
                    });
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(true)
                }
                Err(failure) => {
                    println!("{}", serde_json::to_string_pretty(&failure.to_json())?);
                    Ok(false)
                }
            }
        }
        Commands::Response {
            spec,
            method,
            url,
            status,
            body,
            data,
        } => {
            let mut config = ValidatorConfig::from_env();
            config.validate_responses = true;
            let validator = OpenApiValidator::from_file(&spec, config)?;
            let req = ValidationRequest::new(parse_method(&method)?, url);
            let body = read_body(body.as_deref(), data.as_deref())?.unwrap_or(Value::Null);

            match validator.validate_response(&req, status, body) {
                Ok(_) => {
                    println!("{}", serde_json::to_string_pretty(&json!({"valid": true, "status": status}))?);
                    Ok(true)
                }
                Err(failure) => {
                    println!("{}", serde_json::to_string_pretty(&failure.to_json())?);
                    Ok(false)
                }
            }
        }
    }
}
