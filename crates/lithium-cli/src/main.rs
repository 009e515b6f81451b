use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{ArgGroup, Parser, ValueEnum};
use lithium_core::util::{quantity, write_atomic};
use lithium_core::{
    resolve_oracle, resolve_strategy, CancelFlag, LithiumError, MinimizeOptions, OracleDriver,
    Reducer, ReductionReport, RepeatPolicy, SplitKind, Testcase,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "lithium")]
#[command(version)]
#[command(about = "Lithium, an automated testcase reduction tool")]
#[command(group(ArgGroup::new("atomizer").args(["lines", "chars", "js", "symbol", "attrs"])))]
struct Cli {
    /// Testcase file. default: last oracle argument
    #[arg(long)]
    testcase: Option<PathBuf>,

    /// Treat the file as a sequence of lines (the default)
    #[arg(short = 'l', long)]
    lines: bool,

    /// Treat the file as a sequence of characters
    #[arg(short = 'c', long = "char")]
    chars: bool,

    /// Same as --char but only operate within JS strings, keeping escapes intact
    #[arg(short = 'j', long)]
    js: bool,

    /// Treat the file as a sequence of strings separated by delimiter tokens
    #[arg(short = 's', long)]
    symbol: bool,

    /// Delimit the file by XML attributes
    #[arg(short = 'a', long)]
    attrs: bool,

    /// Split the file before these bytes (with --symbol)
    #[arg(long, default_value = "]}:")]
    cut_before: String,

    /// Split the file after these bytes (with --symbol)
    #[arg(long, default_value = "?=;{[\n")]
    cut_after: String,

    /// Reduction strategy to use
    #[arg(long, value_enum, default_value = "minimize")]
    strategy: StrategyName,

    /// Whether to repeat a chunk size if chunks are removed
    #[arg(long, value_enum, default_value = "last")]
    repeat: RepeatArg,

    /// Initial chunk size, must be a power of two. default: about half of the file
    #[arg(long)]
    max: Option<u64>,

    /// Minimum chunk size, must be a power of two
    #[arg(long, default_value_t = 1)]
    min: u64,

    /// Shortcut for --repeat=never --min=N --max=N
    #[arg(long)]
    chunk_size: Option<u64>,

    /// Treat the first round as if it removed chunks; possibly repeat it
    #[arg(long)]
    repeat_first_round: bool,

    /// If reduction takes more than this many seconds, stop cleanly
    #[arg(long, value_name = "SECONDS")]
    max_run_time: Option<u64>,

    /// Directory to use for intermediate files
    #[arg(long)]
    tempdir: Option<PathBuf>,

    /// Write a machine-readable run summary to this path
    #[arg(long, value_name = "PATH")]
    summary_json: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Oracle name or executable, its options, and the file to reduce
    #[arg(
        value_name = "ORACLE",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required = true,
        num_args = 1..
    )]
    oracle: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyName {
    CheckOnly,
    Minimize,
    MinimizeAround,
    MinimizeBalanced,
    MinimizeCollapseBrace,
    ReplacePropertiesByGlobals,
    ReplaceArgumentsByGlobals,
}

impl StrategyName {
    fn as_str(self) -> &'static str {
        match self {
            StrategyName::CheckOnly => "check-only",
            StrategyName::Minimize => "minimize",
            StrategyName::MinimizeAround => "minimize-around",
            StrategyName::MinimizeBalanced => "minimize-balanced",
            StrategyName::MinimizeCollapseBrace => "minimize-collapse-brace",
            StrategyName::ReplacePropertiesByGlobals => "replace-properties-by-globals",
            StrategyName::ReplaceArgumentsByGlobals => "replace-arguments-by-globals",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RepeatArg {
    Always,
    Last,
    Never,
}

impl From<RepeatArg> for RepeatPolicy {
    fn from(arg: RepeatArg) -> Self {
        match arg {
            RepeatArg::Always => RepeatPolicy::Always,
            RepeatArg::Last => RepeatPolicy::Last,
            RepeatArg::Never => RepeatPolicy::Never,
        }
    }
}

#[derive(Serialize)]
struct SummaryJson {
    schema_version: String,
    tool: ToolInfo,
    started_at: String,
    finished_at: String,
    input: InputInfo,
    #[serde(flatten)]
    report: ReductionReport,
}

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    version: String,
}

#[derive(Serialize)]
struct InputInfo {
    path: String,
    sha256: String,
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let cancel = CancelFlag::new();
    {
        let flag = cancel.clone();
        let _ = ctrlc::set_handler(move || flag.cancel());
    }

    let exit_code = match run(cli, cancel) {
        Ok(()) => 0,
        Err(err) => match err.downcast_ref::<LithiumError>() {
            Some(lithium) => {
                eprintln!("lithium: {lithium}");
                lithium.exit_code()
            }
            None => {
                eprintln!("lithium: tool error: {err}");
                2
            }
        },
    };
    std::process::exit(exit_code);
}

fn setup_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli, cancel: CancelFlag) -> Result<()> {
    let started_at = Utc::now();

    let (oracle_spec, oracle_args) = cli
        .oracle
        .split_first()
        .map(|(spec, args)| (spec.clone(), args.to_vec()))
        .ok_or_else(|| LithiumError::Config("no oracle specified".into()))?;

    let testcase_path = match &cli.testcase {
        Some(path) => path.clone(),
        None => oracle_args
            .last()
            .map(PathBuf::from)
            .ok_or_else(|| {
                LithiumError::Config(
                    "no testcase specified (use --testcase or pass it as the last oracle argument)"
                        .into(),
                )
            })?,
    };

    let strategy = resolve_strategy(cli.strategy.as_str(), build_options(&cli))?;
    let testcase = Testcase::load(&testcase_path, select_kind(&cli))
        .map_err(LithiumError::from)?;
    let driver = OracleDriver::new(resolve_oracle(&oracle_spec), oracle_args, cli.tempdir.clone())
        .context("create temp workspace")?;

    let report = Reducer::new(testcase, driver, strategy, cancel).run()?;

    println!(
        "lithium: {} to {}, {} oracle calls, {:.2}s",
        quantity(report.init_atoms, &report.atom),
        quantity(report.final_atoms, &report.atom),
        report.oracle_calls,
        report.duration_ms as f64 / 1000.0
    );

    if let Some(path) = &cli.summary_json {
        let summary = SummaryJson {
            schema_version: "0.1".to_string(),
            tool: ToolInfo {
                name: "lithium".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            started_at: started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            finished_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            input: InputInfo {
                path: testcase_path.display().to_string(),
                sha256: compute_sha256(&testcase_path)?,
            },
            report,
        };
        let payload = serde_json::to_string_pretty(&summary).context("serialize summary json")?;
        write_atomic(path, payload.as_bytes())
            .with_context(|| format!("write summary to {}", path.display()))?;
    }

    Ok(())
}

fn select_kind(cli: &Cli) -> SplitKind {
    if cli.chars {
        SplitKind::Char
    } else if cli.js {
        SplitKind::JsStr
    } else if cli.symbol {
        SplitKind::Symbol {
            cut_before: cli.cut_before.clone().into_bytes(),
            cut_after: cli.cut_after.clone().into_bytes(),
        }
    } else if cli.attrs {
        SplitKind::Attrs
    } else {
        SplitKind::Line
    }
}

fn build_options(cli: &Cli) -> MinimizeOptions {
    let mut options = match cli.chunk_size {
        Some(size) => MinimizeOptions::fixed_chunk_size(size),
        None => MinimizeOptions {
            chunk_min: cli.min,
            chunk_max: cli.max.unwrap_or(1 << 30),
            repeat: cli.repeat.into(),
            ..MinimizeOptions::default()
        },
    };
    options.repeat_first_round = cli.repeat_first_round;
    options.max_run_time = cli.max_run_time.map(Duration::from_secs);
    options
}

fn compute_sha256(path: &Path) -> Result<String> {
    let data = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}
