use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use capjoin_core::{
    MergeEngine, MergeError, MergeOptions, MergeSummary, PcapFileSource, PcapWriter,
    TimestampPrecision,
};
use clap::Parser;
use glob::glob;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("CAPJOIN_BUILD_COMMIT"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "capjoin")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Merge timestamp-sorted packet captures into one chronological capture.",
    long_about = None,
    after_help = "Examples:\n  capjoin -w merged.pcap eth0.pcap eth1.pcap\n  capjoin -v 'rotated/*.pcap' > merged.pcap"
)]
struct Cli {
    /// Explain when skipping packets or entire input files
    #[arg(short, long)]
    verbose: bool,

    /// Output path; '-' writes to stdout
    #[arg(short = 'w', long = "output", value_name = "OUTPUT", default_value = "-")]
    output: PathBuf,

    /// Write nanosecond-resolution timestamps instead of microseconds
    #[arg(long)]
    nanosecond: bool,

    /// Write a JSON merge summary to this path
    #[arg(long, value_name = "PATH")]
    summary: Option<PathBuf>,

    /// Input .pcap or .pcapng files; glob patterns are expanded
    #[arg(required = true, value_name = "INPUT")]
    inputs: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cmd_merge(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

impl From<MergeError> for CliError {
    fn from(err: MergeError) -> Self {
        let hint = match &err {
            MergeError::LinktypeMismatch { .. } => {
                Some("only captures with the same link-layer type can be merged".to_string())
            }
            MergeError::Sink(_) => None,
        };
        CliError::new(err.to_string(), hint)
    }
}

/// An input argument after glob expansion.
enum InputArg {
    Path(PathBuf),
    Unresolved { pattern: String, reason: String },
}

enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    fn from_arg(arg: &Path) -> Self {
        if arg.as_os_str() == "-" {
            OutputTarget::Stdout
        } else {
            OutputTarget::File(arg.to_path_buf())
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::Stdout => write!(f, "stdout"),
            OutputTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

fn cmd_merge(cli: Cli) -> Result<(), CliError> {
    info!("capjoin v{}", env!("CARGO_PKG_VERSION"));

    let inputs = resolve_inputs(&cli.inputs);
    let output = OutputTarget::from_arg(&cli.output);
    if let OutputTarget::File(path) = &output {
        ensure_output_not_input(path, &inputs)?;
    }

    // Admission runs before anything is created on disk, so a link type
    // conflict leaves nothing behind.
    let mut engine: MergeEngine<PcapFileSource> = MergeEngine::new(MergeOptions::default());
    for input in inputs {
        match input {
            InputArg::Path(path) => engine.admit_path(&path)?,
            InputArg::Unresolved { pattern, reason } => engine.skip_input(pattern, reason),
        }
    }

    let writer: Box<dyn Write> = match &output {
        OutputTarget::Stdout => Box::new(io::stdout().lock()),
        OutputTarget::File(path) => {
            prepare_output_dir(path)?;
            Box::new(
                File::create(path).with_context(|| {
                    format!("Failed to create output file: {}", path.display())
                })?,
            )
        }
    };
    let precision = if cli.nanosecond {
        TimestampPrecision::Nanosecond
    } else {
        TimestampPrecision::Microsecond
    };
    info!(output = %output, pending = engine.pending(), "writing");
    let mut sink = PcapWriter::new(BufWriter::new(writer), precision);
    let summary = engine.run(&mut sink)?;

    if let Some(path) = cli.summary.as_ref() {
        write_summary(path, &summary)?;
    }
    Ok(())
}

fn write_summary(path: &Path, summary: &MergeSummary) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(summary).context("JSON serialization failed")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write summary: {}", path.display()))?;
    Ok(())
}

fn prepare_output_dir(output: &Path) -> Result<(), CliError> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    Ok(())
}

fn ensure_output_not_input(output: &Path, inputs: &[InputArg]) -> Result<(), CliError> {
    let Some(output_abs) = resolve_output_target(output)? else {
        return Ok(());
    };
    for input in inputs {
        let InputArg::Path(path) = input else {
            continue;
        };
        if fs::canonicalize(path).is_ok_and(|input_abs| input_abs == output_abs) {
            return Err(CliError::new(
                format!("output path must differ from input: {}", output.display()),
                Some("choose a different output path".to_string()),
            ));
        }
    }
    Ok(())
}

fn resolve_output_target(output: &Path) -> Result<Option<PathBuf>, CliError> {
    if let Ok(existing) = fs::canonicalize(output) {
        return Ok(Some(existing));
    }
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let Ok(dir) = fs::canonicalize(parent) else {
        return Ok(None);
    };
    let name = output.file_name().ok_or_else(|| {
        CliError::new(
            format!("invalid output path: {}", output.display()),
            Some("pass a file path or '-' for stdout".to_string()),
        )
    })?;
    Ok(Some(dir.join(name)))
}

fn resolve_inputs(inputs: &[PathBuf]) -> Vec<InputArg> {
    let mut resolved = Vec::new();
    for input in inputs {
        let pattern = input.to_string_lossy();
        if input.exists() || !is_glob_pattern(&pattern) {
            resolved.push(InputArg::Path(input.clone()));
            continue;
        }
        match expand_pattern(&pattern) {
            Ok(matches) if matches.is_empty() => resolved.push(InputArg::Unresolved {
                pattern: pattern.into_owned(),
                reason: "no files match pattern".to_string(),
            }),
            Ok(matches) => {
                debug!(%pattern, matches = matches.len(), "expanded input pattern");
                resolved.extend(matches.into_iter().map(InputArg::Path));
            }
            Err(reason) => resolved.push(InputArg::Unresolved {
                pattern: pattern.into_owned(),
                reason,
            }),
        }
    }
    resolved
}

fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>, String> {
    let paths = glob(pattern).map_err(|err| format!("invalid input pattern: {}", err.msg))?;
    let mut matches = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => matches.push(path),
            Ok(_) => {}
            Err(err) => debug!(%pattern, error = %err, "unreadable pattern match"),
        }
    }
    Ok(matches)
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
