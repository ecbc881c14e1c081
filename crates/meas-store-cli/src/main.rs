// crates/meas-store-cli/src/main.rs
// ============================================================================
// Module: Measurement Store CLI Entry Point
// Description: Command dispatcher for browsing and exporting stored runs.
// Purpose: Provide thin command-line verbs over the SQLite dataset store.
// Dependencies: clap, meas-store-core, meas-store-sqlite, serde, tracing.
// ============================================================================

//! ## Overview
//! `meas-store` lists, inspects, and exports measurement runs held in a
//! SQLite-backed store, and updates the catalog's stop time and starred flag.
//! Settings come from `--config`, `MEAS_STORE_CONFIG`, or `meas-store.toml`;
//! `--db` overrides the database path. Logging goes to stderr and honours
//! `RUST_LOG`.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use meas_store_core::Run;
use meas_store_core::RunId;
use meas_store_core::RunQuery;
use meas_store_core::RunSummary;
use meas_store_core::codec::encode_int_sequence;
use meas_store_core::packing::pack_into;
use meas_store_sqlite::SqliteDatasetStore;
use meas_store_sqlite::SqliteStoreConfig;
use meas_store_sqlite::StoreSettings;
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "meas-store", version, about = "Browse and export stored measurement runs")]
struct Cli {
    /// Settings file (defaults to `MEAS_STORE_CONFIG` or meas-store.toml).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Database path, overriding the settings file.
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,
    /// Emit debug logs when `RUST_LOG` is unset.
    #[arg(short, long, action = ArgAction::SetTrue, global = true)]
    verbose: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List runs, most recent first.
    List(ListCommand),
    /// Describe one run and its channels.
    Show(ShowCommand),
    /// Export one run to a directory.
    Export(ExportCommand),
    /// List distinct setup/project/sample triples.
    Samples(SamplesCommand),
    /// Record a run's stop time.
    Finish(FinishCommand),
    /// Star or unstar a run.
    Star(StarCommand),
}

/// Output formats for listings and descriptions.
#[derive(ValueEnum, Copy, Clone, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Arguments for `list`.
#[derive(Args, Debug)]
struct ListCommand {
    /// Only runs from this setup.
    #[arg(long)]
    setup: Option<String>,
    /// Only runs from this project.
    #[arg(long)]
    project: Option<String>,
    /// Only runs on this sample.
    #[arg(long)]
    sample: Option<String>,
    /// Maximum rows (0 = all; defaults to the settings value).
    #[arg(long)]
    limit: Option<usize>,
    /// Lower time bound in unix seconds (0 = none).
    #[arg(long, default_value_t = 0)]
    start: i64,
    /// Upper time bound in unix seconds (0 = none).
    #[arg(long, default_value_t = 0)]
    stop: i64,
    /// Only starred runs.
    #[arg(long, action = ArgAction::SetTrue)]
    starred: bool,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Arguments for `show`.
#[derive(Args, Debug)]
struct ShowCommand {
    /// Run identifier.
    run_id: i64,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Arguments for `export`.
#[derive(Args, Debug)]
struct ExportCommand {
    /// Run identifier.
    run_id: i64,
    /// Output directory (created if missing).
    #[arg(long, value_name = "DIR")]
    output: PathBuf,
    /// Write payloads as raw little-endian f64 files instead of inline JSON.
    #[arg(long, action = ArgAction::SetTrue)]
    raw: bool,
}

/// Arguments for `samples`.
#[derive(Args, Debug)]
struct SamplesCommand {
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Arguments for `finish`.
#[derive(Args, Debug)]
struct FinishCommand {
    /// Run identifier.
    run_id: i64,
    /// Stop time in unix seconds (defaults to now).
    #[arg(long)]
    stop_time: Option<i64>,
}

/// Arguments for `star`.
#[derive(Args, Debug)]
struct StarCommand {
    /// Run identifier.
    run_id: i64,
    /// Clear the flag instead of setting it.
    #[arg(long, action = ArgAction::SetTrue)]
    off: bool,
}

// ============================================================================
// SECTION: Output Views
// ============================================================================

/// JSON view of a run without payload samples.
#[derive(Debug, Serialize)]
struct RunView<'a> {
    /// Run identifier.
    run_id: Option<RunId>,
    /// Per-run table name.
    table_name: Option<&'a str>,
    /// Run name.
    name: &'a str,
    /// Setup.
    setup: &'a str,
    /// Project.
    project: &'a str,
    /// Sample.
    sample: &'a str,
    /// Start time.
    start_time: i64,
    /// Stop time.
    stop_time: Option<i64>,
    /// Starred flag.
    starred: bool,
    /// Upload-complete flag.
    upload_complete: bool,
    /// Keywords.
    keywords: &'a [String],
    /// Channel descriptions.
    channels: Vec<ChannelView<'a>>,
    /// Rows that could not be decoded.
    faults: Vec<String>,
}

/// JSON view of one channel.
#[derive(Debug, Serialize)]
struct ChannelView<'a> {
    /// Channel name.
    name: &'a str,
    /// Display label.
    label: &'a str,
    /// Unit.
    unit: &'a str,
    /// Dependency names.
    dependency: &'a [String],
    /// Shape.
    shape: &'a [usize],
    /// Sample count.
    samples: usize,
}

impl<'a> RunView<'a> {
    /// Builds a view over a loaded run.
    fn new(run: &'a Run, faults: Vec<String>) -> Self {
        Self {
            run_id: run.run_id,
            table_name: run.table_name.as_deref(),
            name: &run.name,
            setup: &run.setup,
            project: &run.project,
            sample: &run.sample,
            start_time: run.start_time,
            stop_time: run.stop_time,
            starred: run.starred,
            upload_complete: run.upload_complete,
            keywords: &run.keywords,
            channels: run
                .channels
                .iter()
                .map(|channel| ChannelView {
                    name: &channel.name,
                    label: &channel.label,
                    unit: &channel.unit,
                    dependency: &channel.dependency,
                    shape: &channel.shape,
                    samples: channel.payload.len(),
                })
                .collect(),
            faults,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
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
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let settings = resolve_settings(cli.config.as_deref(), cli.db.as_deref())?;
    let store = SqliteDatasetStore::new(&settings.store).map_err(|err| {
        CliError::new(format!("failed to open {}: {err}", settings.store.path.display()))
    })?;
    match cli.command {
        Commands::List(command) => command_list(&store, &command, settings.default_list_limit),
        Commands::Show(command) => command_show(&store, &command),
        Commands::Export(command) => command_export(&store, &command),
        Commands::Samples(command) => command_samples(&store, &command),
        Commands::Finish(command) => command_finish(&store, &command),
        Commands::Star(command) => command_star(&store, &command),
    }
}

/// Installs the stderr log subscriber.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Resolves store settings from the settings file and `--db` override.
fn resolve_settings(config: Option<&Path>, db: Option<&Path>) -> CliResult<StoreSettings> {
    if config.is_none()
        && let Some(db) = db
    {
        let store = SqliteStoreConfig::new(db);
        store.validate().map_err(|err| CliError::new(format!("invalid --db path: {err}")))?;
        return Ok(StoreSettings::new(store));
    }
    let mut settings = StoreSettings::load(config)
        .map_err(|err| CliError::new(format!("failed to load settings: {err}")))?;
    if let Some(db) = db {
        settings.store.path = db.to_path_buf();
        settings
            .store
            .validate()
            .map_err(|err| CliError::new(format!("invalid --db path: {err}")))?;
    }
    Ok(settings)
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes `list`.
fn command_list(
    store: &SqliteDatasetStore,
    command: &ListCommand,
    default_limit: usize,
) -> CliResult<ExitCode> {
    let query = build_query(command, default_limit);
    let summaries = store.list_runs(&query).map_err(store_error)?;
    match command.format {
        OutputFormat::Json => write_json(&summaries)?,
        OutputFormat::Text => {
            for summary in &summaries {
                write_line(&format_summary_line(summary))?;
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `show`.
fn command_show(store: &SqliteDatasetStore, command: &ShowCommand) -> CliResult<ExitCode> {
    let partial = store.load_partial(RunId::new(command.run_id)).map_err(store_error)?;
    let faults: Vec<String> = partial.faults.iter().map(ToString::to_string).collect();
    let view = RunView::new(&partial.run, faults);
    match command.format {
        OutputFormat::Json => write_json(&view)?,
        OutputFormat::Text => {
            for line in describe_run(&view) {
                write_line(&line)?;
            }
        }
    }
    Ok(if view.faults.is_empty() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Executes `export`.
fn command_export(store: &SqliteDatasetStore, command: &ExportCommand) -> CliResult<ExitCode> {
    let mut run = store.load_run(RunId::new(command.run_id)).map_err(store_error)?;
    fs::create_dir_all(&command.output).map_err(|err| {
        CliError::new(format!("failed to create {}: {err}", command.output.display()))
    })?;
    if command.raw {
        for (index, channel) in run.channels.iter_mut().enumerate() {
            let path = command.output.join(raw_file_name(command.run_id, index));
            write_raw_payload(&path, &channel.payload)?;
            channel.payload = Vec::new();
        }
    }
    let json_path = command.output.join(format!("run_{}.json", command.run_id));
    let mut bytes = serde_json::to_vec_pretty(&run)
        .map_err(|err| CliError::new(format!("failed to serialize run: {err}")))?;
    bytes.push(b'\n');
    fs::write(&json_path, bytes).map_err(|err| {
        CliError::new(format!("failed to write {}: {err}", json_path.display()))
    })?;
    tracing::info!(run_id = command.run_id, output = %command.output.display(), "exported run");
    write_line(&json_path.display().to_string())?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `samples`.
fn command_samples(store: &SqliteDatasetStore, command: &SamplesCommand) -> CliResult<ExitCode> {
    let samples = store.samples().map_err(store_error)?;
    match command.format {
        OutputFormat::Json => write_json(&samples)?,
        OutputFormat::Text => {
            for info in &samples {
                write_line(&format!("{} / {} / {}", info.setup, info.project, info.sample))?;
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `finish`.
fn command_finish(store: &SqliteDatasetStore, command: &FinishCommand) -> CliResult<ExitCode> {
    let stop_time = match command.stop_time {
        Some(stop_time) => stop_time,
        None => unix_now()?,
    };
    store.finish(RunId::new(command.run_id), stop_time).map_err(store_error)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `star`.
fn command_star(store: &SqliteDatasetStore, command: &StarCommand) -> CliResult<ExitCode> {
    store.set_starred(RunId::new(command.run_id), !command.off).map_err(store_error)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the listing query for `list`.
fn build_query(command: &ListCommand, default_limit: usize) -> RunQuery {
    let mut query = RunQuery::all()
        .with_limit(command.limit.unwrap_or(default_limit))
        .with_time_range(command.start, command.stop);
    query.setup.clone_from(&command.setup);
    query.project.clone_from(&command.project);
    query.sample.clone_from(&command.sample);
    if command.starred { query.starred() } else { query }
}

/// Formats one listing row.
fn format_summary_line(summary: &RunSummary) -> String {
    let stop = summary.stop_time.map_or_else(|| "open".to_string(), |stop| stop.to_string());
    let mut flags = String::new();
    if summary.starred {
        flags.push('*');
    }
    if !summary.upload_complete {
        flags.push('!');
    }
    format!(
        "{:>6} {:<2} {} [{} / {} / {}] {} .. {}",
        summary.run_id,
        flags,
        summary.name,
        summary.setup,
        summary.project,
        summary.sample,
        summary.start_time,
        stop
    )
}

/// Renders a run description as text lines.
fn describe_run(view: &RunView<'_>) -> Vec<String> {
    let run_id = view.run_id.map_or_else(|| "?".to_string(), |run_id| run_id.to_string());
    let stop = view.stop_time.map_or_else(|| "open".to_string(), |stop| stop.to_string());
    let mut lines = vec![
        format!("run {run_id}: {}", view.name),
        format!("  provenance: {} / {} / {}", view.setup, view.project, view.sample),
        format!("  time: {} .. {stop}", view.start_time),
        format!("  starred: {}  upload complete: {}", view.starred, view.upload_complete),
        format!("  keywords: {}", view.keywords.join(", ")),
        "  channels:".to_string(),
    ];
    for (index, channel) in view.channels.iter().enumerate() {
        let mut line = format!(
            "    [{index}] {} \"{}\" ({}) shape {}",
            channel.name,
            channel.label,
            channel.unit,
            encode_int_sequence(channel.shape)
        );
        if !channel.dependency.is_empty() {
            line.push_str(&format!(" depends on {}", channel.dependency.join(", ")));
        }
        lines.push(line);
    }
    for fault in &view.faults {
        lines.push(format!("  damaged: {fault}"));
    }
    lines
}

/// Returns the raw payload file name for one channel.
fn raw_file_name(run_id: i64, index: usize) -> String {
    format!("run_{run_id}_channel_{index}.f64")
}

/// Streams a payload to disk as little-endian f64 samples.
fn write_raw_payload(path: &Path, payload: &[f64]) -> CliResult<()> {
    let write_error =
        |err: std::io::Error| CliError::new(format!("failed to write {}: {err}", path.display()));
    let file = File::create(path).map_err(write_error)?;
    let mut writer = BufWriter::new(file);
    pack_into(payload, &mut writer).map_err(write_error)?;
    writer.flush().map_err(write_error)
}

/// Returns the current unix time in seconds.
fn unix_now() -> CliResult<i64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| CliError::new(format!("system clock error: {err}")))?;
    i64::try_from(elapsed.as_secs())
        .map_err(|_| CliError::new("system clock out of range".to_string()))
}

/// Converts a store error into a CLI error.
fn store_error(error: meas_store_sqlite::SqliteStoreError) -> CliError {
    CliError::new(error.to_string())
}

/// Writes pretty JSON to stdout.
fn write_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to serialize output: {err}")))?;
    write_line(&text)
}

/// Writes a single line to stdout.
fn write_line(message: &str) -> CliResult<()> {
    write_stdout_line(message).map_err(|err| CliError::new(format!("failed to write stdout: {err}")))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
