use std::path::PathBuf;
use std::sync::LazyLock;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};

static LONG_VERSION: LazyLock<String> = LazyLock::new(|| {
    format!(
        "{} ({})\nac4 {}\nbuilt {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_GIT_DESCRIBE").unwrap_or("unknown revision"),
        option_env!("AC4_VERSION").unwrap_or("unknown"),
        option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
    )
});

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = LONG_VERSION.as_str(),
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Tools for inspecting AC-4 TOCs and selecting presentations in AC-4 bitstreams",
    long_about   = None,
    after_help   = "Exit status is 0 on success, 1 on errors and 3 when --strict stops at a failing frame.",
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat per-frame parse failures as fatal errors.
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the TOC of every sync frame
    Info(InfoArgs),

    /// Keep a single presentation decodable in every sync frame.
    Select(SelectArgs),
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input AC-4 elementary stream (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Stop after this many frames.
    #[arg(long, value_name = "N")]
    pub frames: Option<usize>,

    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Plain)]
    pub format: ReportFormat,
}

#[derive(Debug, Args)]
pub struct SelectArgs {
    /// Input AC-4 elementary stream (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// presentation_id of the presentation to keep.
    #[arg(long, value_name = "ID")]
    pub presentation_id: u64,

    /// Output path for the rewritten stream (use "-" for stdout).
    #[arg(long, short, value_name = "PATH")]
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum ReportFormat {
    /// Aligned text, one block per frame.
    Plain,
    /// YAML document with one entry per frame.
    Yaml,
}

#[test]
fn select_requires_presentation_id() {
    assert!(Cli::try_parse_from(["ac4sel", "select", "in.ac4", "-o", "out.ac4"]).is_err());

    let cli = Cli::try_parse_from([
        "ac4sel",
        "--strict",
        "select",
        "in.ac4",
        "--presentation-id",
        "3",
        "-o",
        "out.ac4",
    ])
    .unwrap();
    assert!(cli.strict);
    assert!(matches!(
        cli.command,
        Commands::Select(SelectArgs {
            presentation_id: 3,
            ..
        })
    ));
}

#[test]
fn info_defaults() {
    let cli = Cli::try_parse_from(["ac4sel", "info", "-"]).unwrap();
    let Commands::Info(args) = cli.command else {
        panic!("expected info");
    };
    assert_eq!(args.format, ReportFormat::Plain);
    assert_eq!(args.frames, None);
    assert_eq!(args.input, PathBuf::from("-"));
}
