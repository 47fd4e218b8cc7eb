//! CLI interface module
//!
//! Provides command-line interface using clap derive macros.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

/// Exit codes for the CLI
///
/// These codes follow standard Unix conventions and provide
/// specific error categories for scripting and automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    GeneralError = 1,
    /// Argument error
    InvalidArgs = 2,
    /// Monitor root not found
    InputNotFound = 3,
    /// Configuration error
    ConfigError = 4,
    /// Processing error
    ProcessingError = 5,
    /// External tool (sender program, rasterizer) error
    ExternalToolError = 6,
}

impl ExitCode {
    /// Convert to process exit code
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Get human-readable description
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::InvalidArgs => "Invalid arguments",
            ExitCode::InputNotFound => "Monitor root not found",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::ProcessingError => "Processing error",
            ExitCode::ExternalToolError => "External tool error (sender, ImageMagick, etc.)",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.code()
    }
}

/// Empty-PDF directory monitor
#[derive(Parser, Debug)]
#[command(name = "blankwatch")]
#[command(version)]
#[command(about = "Watches a directory tree for structurally empty PDF files", long_about = None)]
pub struct Cli {
    /// Path to a configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Monitor a directory continuously
    Watch(WatchArgs),
    /// Run one scan cycle and exit
    Scan(ScanArgs),
    /// Send a test notification with the configured sender
    TestNotify,
    /// Validate the reconversion script configuration
    CheckReconversion,
    /// Show system information
    Info,
}

/// Arguments for the watch command
#[derive(clap::Args, Debug)]
pub struct WatchArgs {
    /// Directory to monitor (overrides the config file)
    pub root: Option<PathBuf>,

    /// Seconds between periodic rescans
    #[arg(long)]
    pub interval: Option<u64>,

    /// Only consider files modified within this many hours (0 = unlimited)
    #[arg(long)]
    pub age_window: Option<u64>,

    /// Number of concurrent detection workers
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Do not descend into subdirectories
    #[arg(long)]
    pub no_recursive: bool,
}

/// Arguments for the scan command
#[derive(clap::Args, Debug)]
pub struct ScanArgs {
    /// Directory to scan (overrides the config file)
    pub root: Option<PathBuf>,

    /// Only consider files modified within this many hours (0 = unlimited)
    #[arg(long)]
    pub age_window: Option<u64>,

    /// Number of concurrent detection workers
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Do not descend into subdirectories
    #[arg(long)]
    pub no_recursive: bool,
}

/// Create a styled progress bar for file processing
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .expect("Invalid progress bar template")
            .progress_chars("#>-"),
    );
    pb
}

/// Create a spinner for indeterminate progress
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_help_display() {
        let mut cmd = Cli::command();
        let help = cmd.render_help().to_string();
        assert!(help.contains("blankwatch"));
        assert!(help.contains("watch"));
        assert!(help.contains("scan"));
    }

    #[test]
    fn test_watch_option_parsing() {
        let cli = Cli::try_parse_from([
            "blankwatch",
            "watch",
            "/srv/conversions",
            "--interval",
            "10",
            "--age-window",
            "24",
            "--threads",
            "2",
            "--no-recursive",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        if let Commands::Watch(args) = cli.command {
            assert_eq!(args.root, Some(PathBuf::from("/srv/conversions")));
            assert_eq!(args.interval, Some(10));
            assert_eq!(args.age_window, Some(24));
            assert_eq!(args.threads, Some(2));
            assert!(args.no_recursive);
        } else {
            panic!("Expected Watch command");
        }
    }

    #[test]
    fn test_scan_default_values() {
        let cli = Cli::try_parse_from(["blankwatch", "scan", "/data"]).unwrap();

        if let Commands::Scan(args) = cli.command {
            assert_eq!(args.root, Some(PathBuf::from("/data")));
            assert_eq!(args.age_window, None);
            assert_eq!(args.threads, None);
            assert!(!args.no_recursive);
        } else {
            panic!("Expected Scan command");
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli =
            Cli::try_parse_from(["blankwatch", "--config", "/etc/blankwatch.toml", "info"])
                .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/etc/blankwatch.toml")));
        assert!(matches!(cli.command, Commands::Info));
    }

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::GeneralError.code(), 1);
        assert_eq!(ExitCode::InvalidArgs.code(), 2);
        assert_eq!(ExitCode::InputNotFound.code(), 3);
        assert_eq!(ExitCode::ConfigError.code(), 4);
        assert_eq!(ExitCode::ProcessingError.code(), 5);
        assert_eq!(ExitCode::ExternalToolError.code(), 6);
    }

    #[test]
    fn test_exit_code_descriptions() {
        assert_eq!(ExitCode::Success.description(), "Success");
        assert!(!ExitCode::InputNotFound.description().is_empty());
        assert!(!ExitCode::ConfigError.description().is_empty());
        assert!(!ExitCode::ExternalToolError.description().is_empty());
    }

    #[test]
    fn test_exit_code_into_i32() {
        let code: i32 = ExitCode::Success.into();
        assert_eq!(code, 0);

        let code: i32 = ExitCode::ExternalToolError.into();
        assert_eq!(code, 6);
    }

    #[test]
    fn test_spinner_creation() {
        let spinner = create_spinner("Scanning...");
        assert_eq!(spinner.message(), "Scanning...");
        spinner.finish_with_message("Complete");
    }

    #[test]
    fn test_progress_bar_display() {
        let pb = create_progress_bar(100);
        assert_eq!(pb.length(), Some(100));
        pb.set_position(50);
        assert_eq!(pb.position(), 50);
        pb.finish_with_message("done");
    }
}
