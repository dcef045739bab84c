//! upcase-cli: send text through the upcase channel
//!
//! Run with: `upcase-cli [--buffer-size N] [--nonblocking] [--stream [--count N]] <string>`

use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use upcase::{BlockingMode, Device, DeviceConfig};

#[derive(Parser)]
#[command(name = "upcase-cli")]
#[command(about = "Write a string through the upcase channel and print what comes back")]
struct Cli {
    /// Internal buffer size in bytes (default: $UPCASE_BUFFER_SIZE, then 8192)
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Open the session in non-blocking mode
    #[arg(long)]
    nonblocking: bool,

    /// Keep writing from one task while another reads and prints
    #[arg(long)]
    stream: bool,

    /// Number of reads before --stream stops
    #[arg(long, default_value_t = 10)]
    count: usize,

    /// Text to send
    text: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {e}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let Some(text) = cli.text else {
        println!("upcase-cli: <string>");
        return Ok(());
    };

    let config = match cli.buffer_size {
        Some(buffer_size) => DeviceConfig::with_buffer_size(buffer_size),
        None => DeviceConfig::from_env()?,
    };
    let device = Device::init(config)?;

    let mode = if cli.nonblocking {
        BlockingMode::NonBlocking
    } else {
        BlockingMode::Blocking
    };

    if cli.stream {
        let total = upcase_cli::echo_stream(&device, mode, text.as_bytes(), cli.count, |chunk| {
            println!("{}", String::from_utf8_lossy(chunk));
        })
        .await?;
        info!("read {total} bytes in {} chunks", cli.count);
    } else {
        let out = upcase_cli::echo_once(&device, mode, text.as_bytes()).await?;
        println!("{}", String::from_utf8_lossy(&out));
    }

    Ok(())
}
