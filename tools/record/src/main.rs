use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::exit;
use clap::Parser;
use ledger_monitor::source::live::{LiveStream, DEFAULT_WS_URL};
use ledger_monitor::source::{SourceEvent, SourceStream};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(version, about, long_about = "Records live transactions into a replay file")]
struct Args {
    /// The directory where the application will store the generated JSON file.
    out: PathBuf,
    #[arg(short, long, default_value_t = 100)]
    /// The number of transactions to record.
    limit: usize,
    #[arg(short, long, default_value = DEFAULT_WS_URL)]
    /// The WebSocket url pushing the transactions.
    ws_url: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if !args.out.exists() {
        eprintln!("ERROR: out path doesn't exist {:?}", args.out);
        exit(1);
    }

    let mut stream = match LiveStream::connect(args.ws_url, CancellationToken::new()).await {
        Ok(stream) => stream,
        Err(error) => {
            eprintln!("ERROR: Failed to connect {}", error);
            exit(1);
        }
    };

    let mut transactions = Vec::with_capacity(args.limit);
    while transactions.len() < args.limit {
        match stream.next().await {
            SourceEvent::Next(transaction) => {
                println!(
                    "Transaction received: {} - Transactions total: {}",
                    transaction.id,
                    transactions.len() + 1
                );
                transactions.push(transaction);
            }
            SourceEvent::Failure(error) => {
                eprintln!("Stopped due to failure: {}", error);
                break
            }
            SourceEvent::EndOfStream => {
                println!("Stream closed");
                break
            }
        }
    }

    stream.close().await;

    let first = transactions.first().map(|transaction| transaction.timestamp).unwrap_or_default();
    let out_path = args.out.join(format!("start_{}_count_{}.json", first, transactions.len()));
    let file = match fs::File::create(&out_path) {
        Ok(file) => file,
        Err(error) => {
            eprintln!("ERROR: Failed to create file {:?}: {}", out_path, error);
            exit(1);
        }
    };
    let mut writer = io::BufWriter::new(file);
    if let Err(error) = serde_json::to_writer(&mut writer, &transactions) {
        eprintln!("ERROR: Failed to write {:?}: {}", out_path, error);
        exit(1);
    }
    if let Err(error) = writer.flush() {
        eprintln!("ERROR: Failed to flush {:?}: {}", out_path, error);
        exit(1);
    }
    println!("Saved to {}", out_path.display());
}
