//! Sentinel Sensor CLI
//!
//! Behavioral keystroke and pointer analysis with a resilient analyzer stream.

use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use sentinel_sensor::{
    collector::{EventSource, JsonLinesSource},
    config::Config,
    core::AnalysisResponse,
    session::{MonitorSession, SessionSettings},
    store::ProfileStore,
    transparency::{create_shared_log, TransparencyLog},
    transport::{SystemClock, TcpLineChannel, TransportNotice},
    PRIVACY_DECLARATION, VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How long `start` waits for the analyzer to answer the final payload.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "sentinel-sensor")]
#[command(version = VERSION)]
#[command(about = "Behavioral keystroke and pointer analysis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a monitoring session fed by JSON-lines events
    Start {
        /// Read events from this file instead of stdin
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Analyzer host
        #[arg(long)]
        host: Option<String>,

        /// Analyzer port
        #[arg(long)]
        port: Option<u16>,

        /// Upload interval in milliseconds
        #[arg(long)]
        interval: Option<u64>,

        /// Pseudonymise key identities
        #[arg(long)]
        privacy: bool,

        /// Store the activity history in opaque form
        #[arg(long)]
        opaque: bool,
    },

    /// Run the reference analyzer (requires server feature)
    Serve {
        /// Port to listen on (defaults to the configured analyzer port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show cumulative collection statistics
    Status {
        /// Zero the cumulative counters
        #[arg(long)]
        reset: bool,
    },

    /// Show the stored behavioral profile
    Profile,

    /// Show the stored activity history
    Logs {
        /// Decode the history as opaque first
        #[arg(long)]
        opaque: bool,

        /// Delete the stored history
        #[arg(long)]
        clear: bool,
    },

    /// Upload one image frame (requires upload feature)
    Upload {
        /// Image file to upload
        #[arg(required_unless_present = "check")]
        file: Option<PathBuf>,

        /// Only check that the endpoint is reachable
        #[arg(long)]
        check: bool,

        /// Upload endpoint base URL
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        endpoint: String,

        /// Bearer token
        #[arg(long, default_value = "")]
        token: String,
    },

    /// Display privacy declaration
    Privacy,

    /// Show configuration
    Config,
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config, using defaults: {e}");
        Config::default()
    });
    init_logging(&config.log_level);

    match cli.command {
        Commands::Start {
            input,
            host,
            port,
            interval,
            privacy,
            opaque,
        } => {
            let mut config = config;
            if let Some(host) = host {
                config.analyzer_host = host;
            }
            if let Some(port) = port {
                config.analyzer_port = port;
            }
            if let Some(interval) = interval {
                config.upload_interval = Duration::from_millis(interval);
            }
            config.privacy_mode |= privacy;
            config.opaque_storage |= opaque;
            cmd_start(&config, input);
        }
        Commands::Serve { port } => {
            cmd_serve(&config, port);
        }
        Commands::Status { reset } => {
            cmd_status(&config, reset);
        }
        Commands::Profile => {
            cmd_profile(&config);
        }
        Commands::Logs { opaque, clear } => {
            cmd_logs(&config, opaque || config.opaque_storage, clear);
        }
        Commands::Upload {
            file,
            check,
            endpoint,
            token,
        } => {
            cmd_upload(file.as_deref(), check, &endpoint, &token);
        }
        Commands::Privacy => {
            cmd_privacy();
        }
        Commands::Config => {
            cmd_config(&config);
        }
    }
}

fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_start(config: &Config, input: Option<PathBuf>) {
    println!("Sentinel Sensor v{VERSION}");
    println!();

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let mut source = match input {
        Some(path) => match std::fs::File::open(&path) {
            Ok(file) => JsonLinesSource::new(std::io::BufReader::new(file)),
            Err(e) => {
                eprintln!("Error opening {path:?}: {e}");
                std::process::exit(1);
            }
        },
        None => JsonLinesSource::stdin(),
    };

    println!("Starting monitoring...");
    println!(
        "  Analyzer: {}:{}",
        config.analyzer_host, config.analyzer_port
    );
    println!("  Upload interval: {}ms", config.upload_interval.as_millis());
    println!(
        "  Privacy mode: {}",
        if config.privacy_mode {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "  Opaque storage: {}",
        if config.opaque_storage {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let transparency_log = create_shared_log(Some(config.transparency_path()));
    let channel = TcpLineChannel::new(&config.analyzer_host, config.analyzer_port);
    let mut session = MonitorSession::new(
        SessionSettings::from_config(config),
        channel,
        SystemClock::new(),
        ProfileStore::open(&config.data_path),
        transparency_log.clone(),
    );
    session.on_notice(|notice| match notice {
        TransportNotice::Status(status) => println!("[Analyzer] {status}"),
        TransportNotice::Error(e) => eprintln!("[Analyzer] {e}"),
    });
    println!("Session ID: {}", session.id());

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    if let Err(e) = source.start() {
        eprintln!("Error starting event source: {e}");
        std::process::exit(1);
    }
    session.start();

    let receiver = source.receiver().clone();
    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => {
                session.record(event);
                while let Ok(event) = receiver.try_recv() {
                    session.record(event);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if source.is_finished() && receiver.is_empty() {
                    println!("Input ended");
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                eprintln!("Event source disconnected unexpectedly");
                break;
            }
        }

        for verdict in session.tick() {
            print_verdict(&verdict);
        }
    }

    println!();
    println!("Stopping monitoring...");
    source.stop();

    let verdicts = session.drain(DRAIN_TIMEOUT.as_millis() as u64, || {
        std::thread::sleep(Duration::from_millis(20))
    });
    for verdict in &verdicts {
        print_verdict(verdict);
    }

    let metrics = session.refresh_metrics().clone();
    println!(
        "  Keys: {} | WPM: {:.0} | Accuracy: {:.0}% | Flight: {:.0}ms | Dwell: {:.0}ms",
        metrics.total_keys,
        metrics.wpm,
        metrics.accuracy,
        metrics.avg_flight_time,
        metrics.avg_dwell_time
    );
    println!("  Final trust: {}", session.trust().score);

    match session.stop() {
        Ok(profile) => println!("  Profile updated ({} sessions)", profile.total_sessions),
        Err(e) => eprintln!("Warning: Could not update profile: {e}"),
    }

    println!();
    println!("{}", transparency_log.summary());
}

fn print_verdict(verdict: &AnalysisResponse) {
    println!(
        "[{}] {} | focus: {} | risk: {:.0} | trust: {} ({:+}){}",
        chrono::Local::now().format("%H:%M:%S"),
        verdict.current_activity,
        verdict.focus_level,
        verdict.risk_score,
        verdict.trust_score,
        verdict.trust_delta,
        if verdict.bot_detected {
            " | BOT DETECTED"
        } else {
            ""
        }
    );
}

#[cfg(feature = "server")]
fn cmd_serve(config: &Config, port: Option<u16>) {
    use sentinel_sensor::analyzer::server::{run, ServerConfig};

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error creating runtime: {e}");
            std::process::exit(1);
        }
    };

    let server_config = ServerConfig::new(
        port.unwrap_or(config.analyzer_port),
        config.analyzer.clone(),
    );

    let result: anyhow::Result<()> = runtime.block_on(async {
        let (addr, shutdown_tx) = run(server_config).await?;
        println!("Analyzer listening on {addr}");
        println!("Press Ctrl+C to stop");
        tokio::signal::ctrl_c().await?;
        let _ = shutdown_tx.send(());
        Ok(())
    });

    if let Err(e) = result {
        eprintln!("Analyzer error: {e}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "server"))]
fn cmd_serve(_config: &Config, _port: Option<u16>) {
    eprintln!("Error: serve requires the server feature (cargo build --features server)");
    std::process::exit(1);
}

fn cmd_status(config: &Config, reset: bool) {
    println!("Sentinel Sensor Status");
    println!("======================");
    println!();
    println!("Configuration:");
    println!(
        "  Analyzer: {}:{}",
        config.analyzer_host, config.analyzer_port
    );
    println!("  Privacy mode: {}", config.privacy_mode);
    println!("  Opaque storage: {}", config.opaque_storage);
    println!();

    let stats_path = config.transparency_path();
    if stats_path.exists() {
        let log = TransparencyLog::with_persistence(stats_path);
        if reset {
            log.reset();
            match log.save() {
                Ok(()) => println!("Cumulative statistics reset."),
                Err(e) => {
                    eprintln!("Error resetting statistics: {e}");
                    std::process::exit(1);
                }
            }
            println!();
        }
        let stats = log.stats();
        println!("Cumulative Statistics:");
        println!("  Key transitions: {}", stats.key_events);
        println!("  Pointer samples: {}", stats.mouse_events);
        println!("  Payloads streamed: {}", stats.payloads_sent);
        println!("  Verdicts received: {}", stats.verdicts_received);
        println!("  Transport errors: {}", stats.transport_errors);
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_profile(config: &Config) {
    let store = ProfileStore::open(&config.data_path);
    let profile = store.read_profile();

    println!("Behavioral Profile");
    println!("==================");
    println!();
    println!("  Sessions: {}", profile.total_sessions);
    println!("  Average WPM: {:.1}", profile.avg_wpm);
    println!("  Average flight time: {:.1}ms", profile.avg_flight_time);
    println!(
        "  Average pointer velocity: {:.3}px/ms",
        profile.avg_mouse_velocity
    );
    match profile.last_seen {
        Some(ts) => println!("  Last seen: {}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("  Last seen: never"),
    }
}

fn cmd_logs(config: &Config, opaque: bool, clear: bool) {
    let mut store = ProfileStore::open(&config.data_path);

    if clear {
        match store.clear_logs() {
            Ok(()) => println!("Activity history cleared."),
            Err(e) => {
                eprintln!("Error clearing history: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let logs = store.read_logs(opaque);
    if logs.is_empty() {
        println!("No activity recorded.");
        println!("Run 'sentinel-sensor start' to begin monitoring.");
        return;
    }

    for entry in logs {
        println!(
            "[{}] {} | focus: {} | risk: {:.0} | trust: {}{}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.activity,
            entry.focus_level,
            entry.risk_score,
            entry.trust_score,
            if entry.encrypted { " | opaque" } else { "" }
        );
        println!("    {}", entry.justification);
    }
}

#[cfg(feature = "upload")]
fn cmd_upload(file: Option<&std::path::Path>, check: bool, endpoint: &str, token: &str) {
    use sentinel_sensor::media::MediaFrame;
    use sentinel_sensor::{BackgroundUploader, UploadConfig};

    let uploader = match BackgroundUploader::new(UploadConfig::new(endpoint, token)) {
        Ok(uploader) => uploader,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("Device ID: {}", uploader.device_id());

    if check {
        match uploader.test_connection() {
            Ok(true) => println!("Upload endpoint reachable: {endpoint}"),
            Ok(false) => {
                eprintln!("Upload endpoint answered with an error: {endpoint}");
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("Upload endpoint unreachable: {e}");
                std::process::exit(1);
            }
        }
    }

    let Some(file) = file else {
        return;
    };
    let frame = match MediaFrame::from_file(file) {
        Ok(frame) => frame,
        Err(e) => {
            eprintln!("Error reading {file:?}: {e}");
            std::process::exit(1);
        }
    };

    match uploader.upload_blocking(&frame) {
        Ok(()) => println!("Uploaded {} bytes ({})", frame.bytes.len(), frame.mime_type),
        Err(e) => {
            eprintln!("Upload failed: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(not(feature = "upload"))]
fn cmd_upload(_file: Option<&std::path::Path>, _check: bool, _endpoint: &str, _token: &str) {
    eprintln!("Error: upload requires the upload feature (cargo build --features upload)");
    std::process::exit(1);
}

fn cmd_privacy() {
    println!("{PRIVACY_DECLARATION}");
}

fn cmd_config(config: &Config) {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
