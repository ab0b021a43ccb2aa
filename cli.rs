use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, DEFAULT_CONFIG_FILE};

/// Name of the log file written inside the output directory
pub const LOG_FILE_NAME: &str = "z_log.txt";

/// CLI arguments for the HDR capture converter
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sdr-autoconvert",
    version,
    about = "Watches a folder for HDR captures and converts them to SDR",
    long_about = "
Watches an input directory for newly created HDR captures (.jxr by default),
converts each one to SDR with an external tool and writes the result to an
output directory, optionally deleting the original.

Settings are read from config.json and any option given here is saved back.

COMMANDS (type while running):
  start | stop | pause | toggle | status | help | quit

EXAMPLES:
  sdr-autoconvert --input ~/Videos/Captures --output ~/Pictures/SDR
  sdr-autoconvert --delete-original --output-to-log=false
"
)]
pub struct CliArgs {
    /// Configuration file
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        default_value = DEFAULT_CONFIG_FILE,
        help = "Path of the JSON configuration file"
    )]
    pub config: PathBuf,

    /// Directory to watch
    #[arg(short = 'i', long = "input", value_name = "DIR", help = "Directory watched for new captures")]
    pub input_dir: Option<PathBuf>,

    /// Directory for converted files
    #[arg(short = 'o', long = "output", value_name = "DIR", help = "Directory converted files are written to")]
    pub output_dir: Option<PathBuf>,

    #[arg(
        long = "delete-original",
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Delete each original after a successful conversion"
    )]
    pub delete_original: Option<bool>,

    #[arg(
        long = "output-to-log",
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Write the log to z_log.txt in the output directory"
    )]
    pub output_to_log: Option<bool>,

    #[arg(long = "tool", value_name = "PROGRAM", help = "Conversion executable")]
    pub tool: Option<String>,

    #[arg(long = "extension", value_name = "EXT", help = "Extension of files to convert, without the dot")]
    pub extension: Option<String>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help = "Enable verbose logging")]
    pub verbose: bool,

    /// Log level
    #[arg(
        long = "log-level",
        value_enum,
        default_value_t = LogLevel::Info,
        help = "Set the logging level"
    )]
    pub log_level: LogLevel,

    #[arg(long = "no-autostart", help = "Wait for the start command instead of watching immediately")]
    pub no_autostart: bool,
}

/// Log level enumeration
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl CliArgs {
    /// Merge command line overrides into the loaded configuration.
    /// Returns true when anything changed.
    pub fn apply_to(&self, config: &mut AppConfig) -> bool {
        let before = config.clone();

        if let Some(dir) = &self.input_dir {
            config.input_dir = dir.to_string_lossy().into_owned();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.to_string_lossy().into_owned();
        }
        if let Some(delete) = self.delete_original {
            config.delete_original = delete;
        }
        if let Some(to_log) = self.output_to_log {
            config.output_to_log = to_log;
        }
        if let Some(tool) = &self.tool {
            config.conversion.tool = tool.clone();
        }
        if let Some(ext) = &self.extension {
            config.conversion.source_extension = ext.trim_start_matches('.').to_string();
        }

        *config != before
    }

    fn filter(&self) -> EnvFilter {
        let level = if self.verbose {
            "debug"
        } else {
            self.log_level.as_str()
        };

        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level
            ))
        })
    }

    /// Install the global subscriber, writing to `log_file` when given
    /// (truncated) and to stderr otherwise
    pub fn setup_logging(&self, log_file: Option<&Path>) -> Result<()> {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_target(false)
            .with_level(true);

        let installed = match log_file {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("cannot open log file {}", path.display()))?;
                builder
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init()
            }
            None => builder.with_writer(std::io::stderr).try_init(),
        };

        installed.map_err(|e| anyhow::anyhow!("logging already initialized: {}", e))
    }
}

/// Where the log goes for this configuration, if not stderr
pub fn log_file_for(config: &AppConfig) -> Option<PathBuf> {
    if config.output_to_log && !config.output_dir.is_empty() {
        Some(Path::new(&config.output_dir).join(LOG_FILE_NAME))
    } else {
        None
    }
}
