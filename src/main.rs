//! blankwatch - empty-PDF directory monitor
//!
//! CLI entry point

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use blankwatch::{
    create_spinner, Cli, CliOverrides, Commands, Config, DetectionResult, DirectoryScanner,
    ExitCode, FileRegistry, HybridDetector, MagickRasterizer, NullSink, OrchestratorOptions,
    Reconverter, ScanOrchestrator, ScannerOptions, Settings, SmsNotifier, TracingSink,
};

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(ExitCode::ConfigError.code());
        }
    };

    let code = match cli.command {
        Commands::Watch(ref args) => run_watch(&config, args),
        Commands::Scan(ref args) => run_scan(&config, args),
        Commands::TestNotify => run_test_notify(&config),
        Commands::CheckReconversion => run_check_reconversion(&config),
        Commands::Info => run_info(),
    };

    std::process::exit(code.code());
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, blankwatch::ConfigError> {
    match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

/// Assemble the detection/notification/reconversion stack from settings
fn build_orchestrator(
    settings: &Settings,
    registry: Arc<FileRegistry>,
) -> Result<ScanOrchestrator<MagickRasterizer>, ExitCode> {
    let sink = Arc::new(TracingSink);

    let notifier = if settings.notification_enabled {
        Some(Arc::new(SmsNotifier::new(
            settings.notifier.clone(),
            sink.clone(),
        )) as Arc<dyn blankwatch::BatchNotifier>)
    } else {
        None
    };

    let reconverter = if settings.reconversion_enabled {
        Some(Arc::new(Reconverter::new(
            settings.reconversion_template.clone(),
            sink,
        )) as Arc<dyn blankwatch::ReconversionRunner>)
    } else {
        None
    };

    let detector = HybridDetector::new(settings.detector.clone(), MagickRasterizer::new());
    ScanOrchestrator::new(
        detector,
        registry,
        notifier,
        reconverter,
        OrchestratorOptions {
            detection_threads: settings.detection_threads,
            reconversion_enabled: settings.reconversion_enabled,
        },
    )
    .map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::GeneralError
    })
}

fn resolve_root(settings: &Settings) -> Result<std::path::PathBuf, ExitCode> {
    let Some(root) = settings.root.clone() else {
        eprintln!("Error: no monitor root configured (pass a directory or set [monitor].root)");
        return Err(ExitCode::InvalidArgs);
    };
    if !root.is_dir() {
        eprintln!("Error: monitor root does not exist: {}", root.display());
        return Err(ExitCode::InputNotFound);
    }
    Ok(root)
}

fn scanner_options(root: std::path::PathBuf, settings: &Settings) -> ScannerOptions {
    ScannerOptions::new(root)
        .with_recursive(settings.recursive)
        .with_age_window_hours(settings.age_window_hours)
        .with_scan_interval(Duration::from_secs(settings.scan_interval_secs.max(1)))
}

fn run_watch(config: &Config, args: &blankwatch::cli::WatchArgs) -> ExitCode {
    let mut overrides = CliOverrides::new();
    if let Some(root) = &args.root {
        overrides = overrides.with_root(root);
    }
    if let Some(interval) = args.interval {
        overrides = overrides.with_scan_interval_secs(interval);
    }
    if let Some(hours) = args.age_window {
        overrides = overrides.with_age_window_hours(hours);
    }
    if let Some(threads) = args.threads {
        overrides = overrides.with_threads(threads);
    }
    if args.no_recursive {
        overrides = overrides.with_recursive(false);
    }
    let settings = config.merge_with_cli(&overrides);

    let root = match resolve_root(&settings) {
        Ok(root) => root,
        Err(code) => return code,
    };

    let registry = Arc::new(FileRegistry::new());
    let orchestrator = match build_orchestrator(&settings, Arc::clone(&registry)) {
        Ok(orchestrator) => Arc::new(orchestrator),
        Err(code) => return code,
    };

    let mut scanner = DirectoryScanner::new(scanner_options(root, &settings), registry);

    let dispatch = Arc::clone(&orchestrator);
    let result = scanner.start(Arc::new(move |batch| {
        // Fire-and-forget: the cycle completes on the worker pool
        let _ = dispatch.begin_cycle(batch);
    }));

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        return ExitCode::InputNotFound;
    }

    tracing::info!("monitoring started, press Ctrl-C to stop");

    // Unattended operation: the timer, watcher, and worker pool carry
    // the work from here until the process is terminated.
    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}

fn run_scan(config: &Config, args: &blankwatch::cli::ScanArgs) -> ExitCode {
    let mut overrides = CliOverrides::new();
    if let Some(root) = &args.root {
        overrides = overrides.with_root(root);
    }
    if let Some(hours) = args.age_window {
        overrides = overrides.with_age_window_hours(hours);
    }
    if let Some(threads) = args.threads {
        overrides = overrides.with_threads(threads);
    }
    if args.no_recursive {
        overrides = overrides.with_recursive(false);
    }
    let settings = config.merge_with_cli(&overrides);

    let root = match resolve_root(&settings) {
        Ok(root) => root,
        Err(code) => return code,
    };

    let registry = Arc::new(FileRegistry::new());
    let orchestrator = match build_orchestrator(&settings, Arc::clone(&registry)) {
        Ok(orchestrator) => orchestrator,
        Err(code) => return code,
    };

    let scanner = DirectoryScanner::new(scanner_options(root, &settings), Arc::clone(&registry));

    let spinner = create_spinner("Scanning...");
    let files = scanner.scan_all();
    spinner.finish_with_message(format!("Found {} PDF file(s)", files.len()));

    let handle = orchestrator.begin_cycle(files);
    handle.wait();

    let mut suspicious = 0usize;
    let mut failed = 0usize;
    for record in registry.snapshot() {
        match record.detection {
            DetectionResult::Failed => {
                failed += 1;
                println!(
                    "  {} - {} ({})",
                    record.file_name,
                    record.detection.label(),
                    record.error_message.as_deref().unwrap_or("unknown error")
                );
            }
            result if result.is_suspicious() => {
                suspicious += 1;
                println!(
                    "  {} - {} (size: {})",
                    record.file_name,
                    record.detection.label(),
                    record.formatted_size()
                );
            }
            _ => {}
        }
    }

    println!(
        "Scanned {} PDF(s): {} suspected empty, {} failed",
        handle.total(),
        suspicious,
        failed
    );

    ExitCode::Success
}

fn run_test_notify(config: &Config) -> ExitCode {
    let settings = config.to_settings();
    let notifier = SmsNotifier::new(settings.notifier, Arc::new(TracingSink));

    if notifier.test_notification() {
        println!("Test notification sent");
        ExitCode::Success
    } else {
        eprintln!("Test notification failed");
        ExitCode::ExternalToolError
    }
}

fn run_check_reconversion(config: &Config) -> ExitCode {
    let settings = config.to_settings();
    let reconverter = Reconverter::new(settings.reconversion_template, Arc::new(NullSink));

    match reconverter.validate_template() {
        Ok(template) => {
            println!("Reconversion template OK: {}", template.display());
            if !blankwatch::platform_supported() {
                println!(
                    "Note: script execution requires Windows (current platform: {})",
                    std::env::consts::OS
                );
            }
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Reconversion configuration invalid: {}", e);
            ExitCode::ConfigError
        }
    }
}

fn run_info() -> ExitCode {
    println!("blankwatch v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("System Information:");
    println!("  Platform: {}", std::env::consts::OS);
    println!("  Arch: {}", std::env::consts::ARCH);
    println!("  CPUs: {}", num_cpus::get());
    println!();

    println!("Config search paths:");
    for path in Config::search_paths() {
        let marker = if path.exists() { "(found)" } else { "" };
        println!("  {} {}", path.display(), marker);
    }
    println!();

    // The rasterizer depends on an ImageMagick installation
    let magick = std::process::Command::new("magick")
        .arg("--version")
        .output();
    match magick {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout);
            println!(
                "ImageMagick: {}",
                version.lines().next().unwrap_or("unknown version")
            );
        }
        _ => println!("ImageMagick: not found (pixel analysis will treat renders as failed)"),
    }

    println!(
        "Reconversion platform: {}",
        if blankwatch::platform_supported() {
            "supported"
        } else {
            "unsupported (requires Windows)"
        }
    );

    ExitCode::Success
}
