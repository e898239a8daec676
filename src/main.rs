use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use logscope::app::Config;
use logscope::capture::CaptureFilter;
use logscope::LogService;

/// logscope - adb logcat capture and SDK event extraction
#[derive(Parser)]
#[command(name = "logscope")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Config file (defaults to ~/.config/logscope/config.toml)
    #[arg(long, env = "LOGSCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Target device id (required when several devices are attached)
    #[arg(short, long, global = true, env = "ANDROID_SERIAL")]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List attached devices
    Devices,
    /// Dump recent logcat output once (bounded by the capture deadline)
    Capture {
        /// Only this log tag
        #[arg(long, conflicts_with = "grep")]
        tag: Option<String>,
        /// Only messages matching this expression
        #[arg(long)]
        grep: Option<String>,
    },
    /// Logs of the process that most recently logged with the given tag
    AppLogs {
        /// Tag used to find the process (defaults to the SDK tag)
        #[arg(long)]
        tag: Option<String>,
        /// Number of lines to return (defaults to views.record_line_count)
        #[arg(long)]
        lines: Option<usize>,
    },
    /// Newest raw lines from a short continuous capture
    Tail {
        /// Number of lines (defaults to views.record_line_count)
        #[arg(long)]
        lines: Option<usize>,
    },
    /// Latest conversion data
    Conversion,
    /// In-app events
    InApp,
    /// Latest launch event
    Launch,
    /// Deep link resolution
    DeepLink {
        /// Show the raw `deepLink` records instead of the merged result
        #[arg(long)]
        records: bool,
    },
    /// SDK errors
    Errors,
    /// Raw lines containing a keyword
    Search { keyword: String },
    /// Identifiers for attribution verification
    Identifiers {
        /// Application id (package name)
        #[arg(long, env = "LOGSCOPE_APP_ID")]
        app_id: Option<String>,
    },
    /// Stream captured lines until Ctrl-C (SDK tag unless another filter is given)
    Watch {
        /// Only this log tag
        #[arg(long, conflicts_with_all = ["grep", "all"])]
        tag: Option<String>,
        /// Only messages matching this expression
        #[arg(long, conflicts_with = "all")]
        grep: Option<String>,
        /// Every process on the device
        #[arg(long)]
        all: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_default(),
    };

    // ログ初期化
    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    init_logging(&level)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(cli, config))
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let log_dir = directories::ProjectDirs::from("", "", "logscope")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("logscope"));

    // 標準出力はクエリ結果専用なので、ログはファイル（不可なら stderr）へ
    match std::fs::create_dir_all(&log_dir)
        .and_then(|_| std::fs::File::create(log_dir.join("logscope.log")))
    {
        Ok(log_file) => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(log_file))
            .init(),
        Err(_) => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    info!("logscope starting");
    Ok(())
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let sdk_tag = config.capture.sdk_tag.clone();
    let line_count = config.views.record_line_count;
    let service = LogService::new(config);
    let device = cli.device.as_deref();

    let output = match cli.command {
        Commands::Devices => service.list_devices().await,
        Commands::Capture { tag, grep } => {
            let filter = to_filter(tag, grep);
            match service.capture_once(device, &filter).await {
                Ok(lines) if lines.is_empty() => logscope::extract::NO_ENTRY.to_string(),
                Ok(lines) => lines.join("\n"),
                Err(e) => e.to_string(),
            }
        }
        Commands::AppLogs { tag, lines } => {
            let tag = tag.unwrap_or(sdk_tag);
            service
                .app_logs(device, &tag, lines.unwrap_or(line_count))
                .await
        }
        Commands::Watch { tag, grep, all } => {
            let filter = match (tag, grep, all) {
                (None, None, false) => None,
                (tag, grep, _) => Some(to_filter(tag, grep)),
            };
            return watch(&service, device, filter).await;
        }
        query => {
            if let Err(e) = service.ensure_capture(device, None).await {
                println!("{}", e);
                return Ok(());
            }
            let output = match query {
                Commands::Conversion => service.conversion().await,
                Commands::InApp => service.in_app_events().await,
                Commands::Launch => service.launch().await,
                Commands::DeepLink { records: true } => service.deep_link_records().await,
                Commands::DeepLink { records: false } => service.deep_link_analysis().await,
                Commands::Errors => service.sdk_errors().await,
                Commands::Search { keyword } => service.search(&keyword).await,
                Commands::Tail { lines } => service.recent(lines.unwrap_or(line_count)).await,
                Commands::Identifiers { app_id } => {
                    service.install_identifiers(app_id.as_deref()).await
                }
                _ => unreachable!("handled above"),
            };
            service.stop().await;
            output
        }
    };

    println!("{}", output);
    Ok(())
}

/// 常駐キャプチャを開始し、Ctrl-C まで新しい行を出力
async fn watch(
    service: &LogService,
    device: Option<&str>,
    filter: Option<CaptureFilter>,
) -> Result<()> {
    let status = match service.ensure_capture(device, filter).await {
        Ok(status) => status,
        Err(e) => {
            println!("{}", e);
            return Ok(());
        }
    };
    eprintln!(
        "Capturing {} (session {}), Ctrl-C to stop",
        status.device.as_deref().unwrap_or("?"),
        status.session_id
    );

    let session = service.session();
    let mut cursor = 0u64;
    let mut tick = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
            _ = tick.tick() => {
                let (lines, next) = session.lines_since(cursor).await;
                cursor = next;
                for line in lines {
                    println!("{}", line);
                }
                if !session.is_running().await {
                    eprintln!("Capture ended ({})", session.state().as_str());
                    break;
                }
            }
        }
    }

    service.stop().await;
    Ok(())
}

fn to_filter(tag: Option<String>, grep: Option<String>) -> CaptureFilter {
    match (tag, grep) {
        (Some(tag), _) => CaptureFilter::Tag(tag),
        (None, Some(expr)) => CaptureFilter::Grep(expr),
        (None, None) => CaptureFilter::None,
    }
}
