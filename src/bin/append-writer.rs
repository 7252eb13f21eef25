//! Writer used to exercise `tailsync`: truncates a file and appends a
//! numbered line on every tick, flushing after each pause.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

#[derive(Parser)]
#[command(name = "append-writer")]
#[command(about = "Append numbered lines to a file at a fixed rate", long_about = None)]
struct Cli {
    /// File to create (truncated if it exists)
    path: PathBuf,

    /// Milliseconds between lines
    #[arg(long, default_value_t = 250)]
    interval_ms: u64,

    /// Stop and close the file after this many lines; runs until killed otherwise
    #[arg(long)]
    count: Option<u64>,

    /// Text placed before each line number
    #[arg(long, default_value = "line")]
    prefix: String,
}

async fn write_lines(cli: &Cli) -> std::io::Result<u64> {
    let mut writer = BufWriter::new(File::create(&cli.path).await?);
    let interval = Duration::from_millis(cli.interval_ms);

    let mut written = 0;
    while cli.count.is_none_or(|count| written < count) {
        written += 1;
        let line = format!("{}{}\n", cli.prefix, written);
        tracing::info!(line = line.trim_end(), "writing");
        writer.write_all(line.as_bytes()).await?;
        tokio::time::sleep(interval).await;
        writer.flush().await?;
    }

    writer.shutdown().await?;
    Ok(written)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match write_lines(&cli).await {
        Ok(written) => tracing::info!(written, path = %cli.path.display(), "closed file"),
        Err(e) => {
            eprintln!("Error writing {}: {}", cli.path.display(), e);
            process::exit(1);
        }
    }
}
