// crates/kube-gate-cli/src/main.rs
// ============================================================================
// Module: Kube Gate CLI Entry Point
// Description: Command dispatcher for the Kube Gate MCP server and tools.
// Purpose: Start the gateway and run one-shot tool calls from a shell.
// Dependencies: clap, kube-gate-cluster, kube-gate-config, kube-gate-mcp, tokio.
// ============================================================================

//! ## Overview
//! The Kube Gate CLI starts the MCP gateway (`serve`), validates and prints
//! configuration, and lists or invokes catalog tools without an MCP client.
//! Stdout carries protocol frames or command output only; diagnostics and
//! errors go to stderr. The process exits non-zero when the gateway cannot
//! start, for example when no cluster credential resolves.
//!
//! Security posture: tool arguments given on the command line are untrusted
//! and pass through the same validator as MCP calls.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use kube_gate_cluster::ClusterHandle;
use kube_gate_config::KubeGateConfig;
use kube_gate_config::config_toml_example;
use kube_gate_core::Catalog;
use kube_gate_core::ToolDefinition;
use kube_gate_mcp::McpServer;
use kube_gate_mcp::ToolRouter;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a tool arguments document.
const MAX_ARGUMENTS_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "kube-gate", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Kube Gate MCP server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Catalog tool utilities.
    Tools {
        /// Selected tools subcommand.
        #[command(subcommand)]
        command: ToolsCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to kube-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a config file.
    Validate(ConfigPathArgs),
    /// Print the effective configuration as JSON.
    Show(ConfigPathArgs),
    /// Print an annotated example config.
    Example,
}

/// Config file selection shared by commands.
#[derive(Args, Debug, Clone)]
struct ConfigPathArgs {
    /// Optional config file path (defaults to kube-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Tools subcommands.
#[derive(Subcommand, Debug)]
enum ToolsCommand {
    /// List the tools the configured catalog exposes.
    List(ToolsListCommand),
    /// Invoke one tool against the cluster and print the response envelope.
    Call(ToolsCallCommand),
}

/// Arguments for `tools list`.
#[derive(Args, Debug)]
struct ToolsListCommand {
    /// Config file selection.
    #[command(flatten)]
    config: ConfigPathArgs,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Arguments for `tools call`.
#[derive(Args, Debug)]
struct ToolsCallCommand {
    /// Config file selection.
    #[command(flatten)]
    config: ConfigPathArgs,
    /// Tool (operation) name.
    #[arg(value_name = "TOOL")]
    name: String,
    /// Tool arguments as a JSON object.
    #[arg(long, value_name = "JSON", conflicts_with = "args_file")]
    args: Option<String>,
    /// Path to a JSON file holding the tool arguments.
    #[arg(long, value_name = "PATH")]
    args_file: Option<PathBuf>,
}

/// Output formats for listing commands.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// One tool per line.
    Text,
    /// Tool definitions as JSON.
    Json,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("kube-gate {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Tools {
            command,
        } => command_tools(command).await,
    }
}

/// Emits the top-level help message for the CLI.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let handle = connect_cluster(&config).await?;
    let transport = config.server.transport;
    let server = McpServer::from_config(config, handle.adapter())
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    write_stderr_line(&format!(
        "kube-gate: serving {} tools over {}",
        server.router().tool_count(),
        transport.as_str()
    ))
    .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Resolves cluster credentials and reports the target on stderr.
async fn connect_cluster(config: &KubeGateConfig) -> CliResult<ClusterHandle> {
    let handle = ClusterHandle::connect(&config.cluster)
        .await
        .map_err(|err| CliError::new(format!("cluster connection failed: {err}")))?;
    let context = handle.context().map(|context| format!(", context {context}"));
    write_stderr_line(&format!(
        "kube-gate: cluster {} via {}{}",
        handle.server(),
        handle.source(),
        context.unwrap_or_default()
    ))
    .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    Ok(handle)
}

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<KubeGateConfig> {
    KubeGateConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(args) => command_config_validate(&args),
        ConfigCommand::Show(args) => command_config_show(&args),
        ConfigCommand::Example => {
            write_stdout_bytes(config_toml_example().as_bytes())
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Executes the config validation command.
fn command_config_validate(args: &ConfigPathArgs) -> CliResult<ExitCode> {
    let _config = load_config(args.config.as_deref())?;
    write_stdout_line("config valid").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Prints the effective configuration.
fn command_config_show(args: &ConfigPathArgs) -> CliResult<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    write_json_value(&config.summary())?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Tools Commands
// ============================================================================

/// Dispatches tools subcommands.
async fn command_tools(command: ToolsCommand) -> CliResult<ExitCode> {
    match command {
        ToolsCommand::List(command) => command_tools_list(&command),
        ToolsCommand::Call(command) => command_tools_call(command).await,
    }
}

/// Lists the configured catalog without contacting the cluster.
fn command_tools_list(command: &ToolsListCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.config.as_deref())?;
    let catalog = Catalog::builtin()
        .and_then(|catalog| catalog.restrict(&config.catalog_filter()))
        .map_err(|err| CliError::new(format!("catalog build failed: {err}")))?;
    let tools = catalog.tool_definitions();
    match command.format {
        OutputFormat::Text => write_stdout_bytes(render_tool_lines(&tools).as_bytes())
            .map_err(|err| CliError::new(output_error("stdout", &err)))?,
        OutputFormat::Json => {
            let value = serde_json::to_value(&tools)
                .map_err(|err| CliError::new(format!("tool serialization failed: {err}")))?;
            write_json_value(&value)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Invokes one tool and prints the response envelope.
///
/// Exits non-zero when the envelope reports an error.
async fn command_tools_call(command: ToolsCallCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.config.as_deref())?;
    let arguments = tool_arguments(command.args.as_deref(), command.args_file.as_deref())?;
    let handle = connect_cluster(&config).await?;
    let router = ToolRouter::from_config(&config, handle.adapter())
        .map_err(|err| CliError::new(format!("catalog build failed: {err}")))?;
    let report = router.call_tool(&command.name, arguments, &CancellationToken::new()).await;
    let envelope = serde_json::to_value(&report.response)
        .map_err(|err| CliError::new(format!("response serialization failed: {err}")))?;
    write_json_value(&envelope)?;
    if report.is_success() { Ok(ExitCode::SUCCESS) } else { Ok(ExitCode::FAILURE) }
}

/// Renders tool definitions as `name  effect  description` lines.
fn render_tool_lines(tools: &[ToolDefinition]) -> String {
    let width = tools.iter().map(|tool| tool.name.len()).max().unwrap_or(0);
    let mut output = String::new();
    for tool in tools {
        let effect = if tool.annotations.read_only_hint { "read" } else { "mutate" };
        output.push_str(&format!("{:width$}  {effect:<6}  {}\n", tool.name, tool.description));
    }
    output
}

/// Resolves tool arguments from `--args` or `--args-file`.
///
/// Missing arguments default to an empty object.
fn tool_arguments(inline: Option<&str>, file: Option<&Path>) -> CliResult<Value> {
    let bytes = match (inline, file) {
        (Some(text), _) => {
            if text.len() > MAX_ARGUMENTS_BYTES {
                return Err(CliError::new(format!(
                    "tool arguments exceed {MAX_ARGUMENTS_BYTES} bytes"
                )));
            }
            text.as_bytes().to_vec()
        }
        (None, Some(path)) => {
            read_bytes_with_limit(path, MAX_ARGUMENTS_BYTES).map_err(|err| match err {
                ReadLimitError::Io(err) => CliError::new(format!(
                    "failed to read tool arguments {}: {err}",
                    path.display()
                )),
                ReadLimitError::TooLarge {
                    size,
                    limit,
                } => CliError::new(format!(
                    "tool arguments {} exceed size limit ({size} > {limit})",
                    path.display()
                )),
            })?
        }
        (None, None) => return Ok(Value::Object(serde_json::Map::new())),
    };
    serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("invalid tool arguments: {err}")))
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a JSON value to stdout, pretty-printed.
fn write_json_value(value: &Value) -> CliResult<()> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .map_err(|err| CliError::new(format!("json output failed: {err}")))?;
    bytes.push(b'\n');
    write_stdout_bytes(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
