// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use mkvbatch::app_config::{self, BatchRequest, Config};
use mkvbatch::app_controller::{BatchResponse, BatchStatus, Controller};
use mkvbatch::errors::AppError;
use mkvbatch::language_utils::{self, LanguageSelection};
use mkvbatch::progress::TerminalProgress;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge, remove or extract subtitles for every video in a directory
    Process(ProcessArgs),

    /// List the languages that can be assigned to merged subtitles
    Languages {
        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions for mkvbatch
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// Directory scanned for videos and subtitles
    #[arg(value_name = "INPUT_DIR")]
    input: PathBuf,

    /// Directory outputs are written to (not needed with --same-as-source)
    #[arg(value_name = "OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// Language code of merged subtitles (e.g. 'en', 'fre', 'deu')
    #[arg(short = 'L', long)]
    language: Option<String>,

    /// Blank out advertisement lines in subtitles before merging
    #[arg(long)]
    remove_ads: bool,

    /// Drop subtitle tracks already present in the video
    #[arg(long)]
    remove_existing_subtitles: bool,

    /// Delete the originals once a video is processed
    #[arg(long)]
    remove_old: bool,

    /// Copy videos without any subtitle track
    #[arg(long, conflicts_with = "extract_subtitles")]
    remove_subtitles: bool,

    /// Extract subtitle tracks from the videos
    #[arg(long)]
    extract_subtitles: bool,

    /// Write outputs next to their inputs
    #[arg(long)]
    same_as_source: bool,

    /// Mirror the input directory layout under the output directory
    #[arg(long)]
    remember_output_dir: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "mkvbatch.json")]
    config: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Print the batch response as JSON
    #[arg(long)]
    json: bool,
}

/// mkvbatch - batch subtitle muxing with MKVToolNix
#[derive(Parser, Debug)]
#[command(name = "mkvbatch")]
#[command(version)]
#[command(about = "Batch subtitle merge, removal and extraction for video files")]
#[command(long_about = "mkvbatch pairs every video in a directory tree with its subtitle files and
runs mkvmerge/mkvextract on each pair.

EXAMPLES:
    mkvbatch process ~/Downloads ~/Movies                   # Merge subtitles into MKV files
    mkvbatch process ~/Downloads ~/Movies -L fre --remove-ads
    mkvbatch process ~/Downloads --same-as-source --remove-old
    mkvbatch process ~/Downloads ~/Movies --remove-subtitles
    mkvbatch process ~/Downloads ~/Subs --extract-subtitles
    mkvbatch languages                                      # List subtitle languages
    mkvbatch completions bash > mkvbatch.bash               # Generate bash completions

CONFIGURATION:
    Configuration is stored in mkvbatch.json by default. If the file doesn't
    exist, a default one is created automatically. Command line flags are
    added on top of the settings it contains.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and label for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, label) = Self::style_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "{}{} {} {}\x1B[0m", color, now, label, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Start at info; the config or --log-level adjusts it later
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "mkvbatch", &mut std::io::stdout());
            Ok(())
        }
        Commands::Languages { json } => print_languages(json),
        Commands::Process(args) => {
            let response = run_process(args).await?;
            if response.status == BatchStatus::Error {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn print_languages(json: bool) -> Result<()> {
    let languages = language_utils::supported_languages();

    if json {
        let output = serde_json::to_string_pretty(languages).context("Failed to serialize languages")?;
        println!("{}", output);
    } else {
        for language in languages {
            println!("{}\t{}", language.code, language.text);
        }
    }

    Ok(())
}

async fn run_process(args: ProcessArgs) -> Result<BatchResponse> {
    if let Some(level) = &args.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_create(&args.config)
        .map_err(|e| AppError::Config(format!("{:#}", e)))?;

    if let Some(code) = &args.language {
        config.settings.language = LanguageSelection::from_code(code)
            .with_context(|| format!("Unsupported subtitle language: {}", code))?;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone().into();
    }

    // Flags only ever switch options on
    let settings = &mut config.settings;
    settings.remove_ads |= args.remove_ads;
    settings.remove_existing_subtitles |= args.remove_existing_subtitles;
    settings.remove_old |= args.remove_old;
    settings.remove_subtitles |= args.remove_subtitles;
    settings.extract_subtitles |= args.extract_subtitles;
    settings.same_as_source |= args.same_as_source;
    settings.remember_output_dir |= args.remember_output_dir;

    config
        .validate()
        .map_err(|e| AppError::Config(format!("Configuration validation failed: {:#}", e)))?;

    if args.log_level.is_none() {
        log::set_max_level(config.log_level.to_level_filter());
    }

    let request = BatchRequest::new(
        args.input.clone(),
        args.output.clone().unwrap_or_default(),
        config.settings.clone(),
    );

    let controller = Controller::with_config(&config).with_progress(Arc::new(TerminalProgress::new()));
    let response = controller.process_batch(&request).await;

    if args.json {
        let output = serde_json::to_string_pretty(&response).context("Failed to serialize batch response")?;
        println!("{}", output);
    } else {
        report(&response);
    }

    Ok(response)
}

fn report(response: &BatchResponse) {
    match response.status {
        BatchStatus::Complete => info!("Batch complete: {} file(s) processed", response.outcomes.len()),
        BatchStatus::Warning => warn!("Batch finished with warnings"),
        BatchStatus::Error => error!("Batch failed"),
    }

    if let Some(warning) = &response.warning {
        warn!("{}", warning);
    }
    if let Some(message) = &response.error {
        error!("{}", message);
    }
    for failure in &response.failures {
        error!("{}: {}", failure.video.display(), failure.reason);
    }
}
