//! Typing Journal CLI
//!
//! Records typed text into local session files and daily logs.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing::warn;
use typing_journal::{
    agent::Agent,
    collector::{check_permission, Collector, CollectorConfig},
    config::Config,
    core::{DailyAggregate, Report, SessionController, SessionPolicy},
    logging::enable_logging,
    storage::{daily_log_key, JsonFileStore, RecordStore},
    transparency::{create_shared_log_with_persistence, TransparencyLog},
    PRIVACY_DECLARATION, VERSION,
};

#[derive(Parser)]
#[command(name = "typing-journal")]
#[command(version = VERSION)]
#[command(about = "Background journal of the text you type", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start recording until Ctrl+C
    Start(StartArgs),

    /// Show a day's aggregate and cumulative statistics
    Status {
        /// Date to show (YYYY-MM-DD), today if omitted
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show configuration
    Config,

    /// Display the recording disclosure
    Privacy,
}

#[derive(clap::Args)]
struct StartArgs {
    /// Directory for session files and daily logs
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Seconds of inactivity before a paragraph break
    #[arg(long)]
    paragraph_gap: Option<u64>,

    /// Start a new session after this many idle seconds
    #[arg(long)]
    split_after: Option<u64>,

    /// Seconds between live statistics lines
    #[arg(long)]
    report_interval: Option<u64>,

    /// Do not write the daily log
    #[arg(long)]
    no_daily_log: bool,

    /// Do not write per-session files
    #[arg(long)]
    no_session_files: bool,
}

impl StartArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(secs) = self.paragraph_gap {
            config.paragraph_gap = Duration::from_secs(secs);
        }
        if let Some(gap_secs) = self.split_after {
            config.session_policy = SessionPolicy::SplitOnIdle { gap_secs };
        }
        if let Some(secs) = self.report_interval {
            config.report_interval = Duration::from_secs(secs);
        }
        if self.no_daily_log {
            config.layout.daily_log = false;
        }
        if self.no_session_files {
            config.layout.session_files = false;
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start(args) => cmd_start(&args, cli.verbose),
        Commands::Status { date } => cmd_status(date),
        Commands::Config => cmd_config(),
        Commands::Privacy => {
            cmd_privacy();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_start(args: &StartArgs, verbose: bool) -> Result<()> {
    let mut config = Config::load().context("Could not load configuration")?;
    args.apply(&mut config);
    config.validate()?;
    config
        .ensure_directories()
        .context("Could not create output directories")?;

    let level = verbose.then_some(LevelFilter::DEBUG);
    enable_logging(&config.logs_dir(), level, true).context("Could not set up logging")?;

    println!("Typing Journal v{VERSION}");
    println!("{PRIVACY_DECLARATION}");

    if !check_permission() {
        eprintln!("Keyboard capture is not available.");
        eprintln!();
        eprintln!("On macOS, grant Input Monitoring permission:");
        eprintln!("1. Open System Settings > Privacy & Security");
        eprintln!("2. Select 'Input Monitoring'");
        eprintln!("3. Add your terminal (or this binary) to the allowed list");
        eprintln!("4. Restart the application");
        bail!("Input Monitoring permission not granted");
    }

    println!("Starting recording...");
    println!("  Output directory: {}", config.output_dir.display());
    println!("  Paragraph gap: {}s", config.paragraph_gap.as_secs());
    match config.session_policy {
        SessionPolicy::Continuous => println!("  Sessions: one per run"),
        SessionPolicy::SplitOnIdle { gap_secs } => {
            println!("  Sessions: new session after {gap_secs}s idle")
        }
    }
    println!(
        "  Session files: {}",
        if config.layout.session_files {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "  Daily log: {}",
        if config.layout.daily_log {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let transparency_log = create_shared_log_with_persistence(config.transparency_path());

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(Arc::clone(&running))?;

    let mut collector = Collector::new(CollectorConfig {
        channel_capacity: config.channel_capacity,
    });
    collector
        .start()
        .context("Keyboard capture is unavailable")?;

    let store = JsonFileStore::new(&config.output_dir)?;
    let controller = SessionController::new(config.tracker_settings()?, store);
    let agent = Agent::spawn(
        collector.receiver().clone(),
        controller,
        Arc::clone(&transparency_log),
        config.report_interval,
        print_report,
    )?;

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }

    println!();
    println!("Stopping recording...");
    collector.stop();
    transparency_log.record_events_dropped(collector.dropped_events());

    let summary = agent.shutdown()?;
    if let Some(session) = &summary.last_session {
        println!(
            "Last session: {} words, {} characters over {:.0}s",
            session.word_count, session.character_count, session.duration_seconds
        );
    }
    println!("Sessions this run: {}", summary.sessions_finalized);
    if summary.pending_writes > 0 {
        eprintln!(
            "Warning: {} record(s) could not be saved to {}",
            summary.pending_writes,
            config.output_dir.display()
        );
    }

    if let Err(e) = transparency_log.save() {
        warn!("Could not save transparency log: {e}");
    }

    println!();
    println!("{}", transparency_log.summary());
    Ok(())
}

fn print_report(report: &Report) {
    println!(
        "[{}] {} words | {:.1} wpm | {} chars | {} keys{}",
        report.at.format("%H:%M:%S"),
        report.words,
        report.wpm,
        report.characters,
        report.keystrokes,
        if report.pending_writes > 0 {
            format!(" | {} unsaved", report.pending_writes)
        } else {
            String::new()
        }
    );
}

fn cmd_status(date: Option<NaiveDate>) -> Result<()> {
    let config = Config::load().context("Could not load configuration")?;
    let date = date.unwrap_or_else(|| Local::now().date_naive());

    println!("Typing Journal Status");
    println!("=====================");
    println!();

    println!(
        "Keyboard capture: {}",
        if check_permission() {
            "Available ✓"
        } else {
            "Not available ✗"
        }
    );
    println!("Output directory: {}", config.output_dir.display());
    println!();

    let store = JsonFileStore::new(&config.output_dir)?;
    match store.load::<DailyAggregate>(&daily_log_key(date))? {
        Some(log) => {
            println!("Daily log for {date}:");
            println!("  Sessions: {}", log.total_sessions);
            println!("  Words: {}", log.total_words);
            println!("  Characters: {}", log.total_characters);
            println!("  Keystrokes: {}", log.total_keystrokes);
            for session in &log.sessions {
                println!(
                    "    {} - {} words, {} chars, {:.0}s",
                    session.start_time.format("%H:%M:%S"),
                    session.word_count,
                    session.character_count,
                    session.duration_seconds
                );
            }
        }
        None => println!("No sessions recorded on {date}."),
    }
    println!();

    let stats_path = config.transparency_path();
    if stats_path.exists() {
        let stats = TransparencyLog::with_persistence(stats_path).stats();
        println!("Cumulative Statistics:");
        println!("  Keystrokes captured: {}", stats.keystrokes_captured);
        println!("  Events dropped: {}", stats.events_dropped);
        println!("  Events rejected: {}", stats.events_rejected);
        println!("  Sessions finalized: {}", stats.sessions_finalized);
        println!("  Save failures: {}", stats.save_failures);
    } else {
        println!("No previous run data found.");
    }
    Ok(())
}

fn cmd_privacy() {
    println!("{PRIVACY_DECLARATION}");
}

fn cmd_config() -> Result<()> {
    let config = Config::load().context("Could not load configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
