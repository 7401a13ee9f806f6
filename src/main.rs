use clap::Parser;
use ledger_monitor::aggregator::Aggregator;
use ledger_monitor::analysis::{AnalysisPoller, LoadingTracker};
use ledger_monitor::api::{run_api, ApiContext};
use ledger_monitor::backend::{BackendClient, Credentials, DEFAULT_BACKEND_URL};
use ledger_monitor::ledger::memory::Memory;
use ledger_monitor::ledger::{Ledger, LedgerInterface};
use ledger_monitor::source::live::{LiveStream, DEFAULT_WS_URL};
use ledger_monitor::source::replay::ReplayStream;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::net::SocketAddr;
use std::process::exit;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(version, about, long_about = "Live transaction ledger cache for the monitoring dashboard")]
struct Args {
    /// The socket address and port where the application should listen to for API requests.
    #[arg(short, long, default_value = "127.0.0.1:8080", env = "LEDGER_MONITOR_API_SOCKET")]
    api_socket: SocketAddr,
    /// The WebSocket url pushing one transaction per message.
    #[arg(short, long, env = "LEDGER_MONITOR_WS_URL", conflicts_with = "file_path")]
    ws_url: Option<String>,
    /// The path to a local JSON file containing a list of transactions, as written by the
    /// record tool. Replayed instead of connecting to the live stream.
    #[arg(short, long, default_value = None)]
    file_path: Option<String>,
    /// Base url of the monitoring backend for analysis, predictions and reports.
    #[arg(short, long, default_value = DEFAULT_BACKEND_URL, env = "LEDGER_MONITOR_BACKEND_URL")]
    backend_url: String,
    /// Bearer token for the backend.
    #[arg(long, env = "LEDGER_MONITOR_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Seconds between two network analysis refreshes.
    #[arg(long, default_value_t = 10)]
    analysis_interval: u64,
    /// Log level of this application.
    #[arg(short, long, default_value = "debug")]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    SimpleLogger::new()
        .with_level(LevelFilter::Error)
        .with_module_level("ledger_monitor", args.log_level)
        .init()
        .expect("simple_logger init failed");
    let token = CancellationToken::new();
    let ledger_token = token.clone();
    log::debug!("Create ledger");
    let (ledger_tx, ledger_rx) = mpsc::channel(20);
    let ledger = LedgerInterface::new(ledger_tx);
    let ledger_task = tokio::spawn(async move {
        Memory::default().run(ledger_rx, ledger_token).await
    });

    let backend = match BackendClient::new(&args.backend_url, Credentials::new(args.token)) {
        Ok(backend) => backend,
        Err(error) => {
            log::error!("Failed to create backend client {}", error);
            exit(1);
        }
    };
    let loading = LoadingTracker::default();

    log::debug!("Create source stream + aggregator and start it!");
    let aggregator_task;
    if let Some(file_path) = args.file_path {
        let stream = match ReplayStream::new(&file_path) {
            Ok(stream) => stream,
            Err(error) => {
                log::error!("Failed to create stream {}", error);
                exit(1);
            }
        };
        let mut aggregator = Aggregator::new(stream, ledger.clone());
        aggregator_task = tokio::spawn(async move {
            aggregator.run().await
        });
    } else {
        let url = args.ws_url.unwrap_or_else(|| DEFAULT_WS_URL.to_string());
        let stream = match LiveStream::connect(url, token.clone()).await {
            Ok(stream) => stream,
            Err(error) => {
                log::error!("Failed to create stream {}", error);
                exit(1);
            }
        };
        let mut aggregator = Aggregator::new(stream, ledger.clone());
        aggregator_task = tokio::spawn(async move {
            aggregator.run().await
        });
    }

    log::debug!("Create analysis poller");
    let poller = AnalysisPoller::new(
        backend.clone(),
        ledger.clone(),
        loading.clone(),
        Duration::from_secs(args.analysis_interval.max(1)),
        token.clone(),
    );
    let poller_task = tokio::spawn(poller.run());

    log::debug!("Create and start API");
    let context = ApiContext { ledger, backend, loading };
    let api_task = tokio::spawn(run_api(args.api_socket, context, token.clone()));

    let shutdown_task = tokio::spawn(async move {
        // Wait for Ctrl-C.
        if let Err(error) = signal::ctrl_c().await {
            log::error!("Failed to listen for shutdown signal: {}", error);
        }
        log::debug!("Shutdown signal received!");
        // Let the rest of the application know about the shutdown.
        token.cancel();
    });

    // Wait for all tasks to be done!
    let (ledger_result, aggregator_result, _, _, _) = tokio::join!(
        ledger_task,
        aggregator_task,
        poller_task,
        api_task,
        shutdown_task
    );
    if let Ok(Err(error)) = ledger_result {
        log::error!("Ledger stopped with {}", error);
    }
    if let Ok(admitted) = aggregator_result {
        log::info!("Admitted {} transactions this session", admitted);
    }

    log::debug!("Done!");
}
