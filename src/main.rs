use clap::{Parser, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tailsync::{Interest, PollOptions, Strategy, TailOptions, TailStream, Termination};
use tokio_stream::StreamExt;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// One task alternating between waiting and reading
    Blocking,
    /// Separate watcher and reader tasks, one event at a time
    Handoff,
    /// Re-read on an interval; no change notification
    Poll,
}

#[derive(Parser)]
#[command(name = "tailsync")]
#[command(about = "Print lines appended to a file until its writer closes it", long_about = None)]
struct Cli {
    /// File to follow
    path: PathBuf,

    #[arg(long, value_enum, default_value_t = Mode::Blocking)]
    mode: Mode,

    /// Line separator
    #[arg(long, default_value = "\n")]
    separator: String,

    /// Drop empty and whitespace-only lines
    #[arg(long)]
    skip_blank: bool,

    /// Poll mode: milliseconds between reads
    #[arg(long, default_value_t = 500)]
    poll_interval_ms: u64,

    /// Poll mode: milliseconds without new lines before assuming the file is closed
    #[arg(long, default_value_t = 5000)]
    quiet_period_ms: u64,

    /// Keep following when the file is opened again instead of stopping
    #[arg(long)]
    ignore_open: bool,
}

impl Cli {
    fn options(&self) -> TailOptions {
        let strategy = match self.mode {
            Mode::Blocking => Strategy::Blocking,
            Mode::Handoff => Strategy::Handoff,
            Mode::Poll => Strategy::Polling(PollOptions {
                interval: Duration::from_millis(self.poll_interval_ms),
                quiet_period: Duration::from_millis(self.quiet_period_ms),
            }),
        };
        let interest = if self.ignore_open {
            Interest::MODIFIED | Interest::CLOSED
        } else {
            Interest::all()
        };

        TailOptions::default()
            .with_separator(self.separator.clone())
            .with_skip_blank(self.skip_blank)
            .with_strategy(strategy)
            .with_interest(interest)
    }
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

    let mut stream = match TailStream::new(&cli.path, cli.options()) {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Error setting up tail: {}", e);
            process::exit(1);
        }
    };

    tracing::info!(path = %cli.path.display(), mode = ?cli.mode, "following file");
    while let Some(lines) = stream.next().await {
        let mut stdout = std::io::stdout().lock();
        for line in lines {
            if writeln!(stdout, "{}", line).is_err() {
                // stdout is gone (e.g. closed pipe); nothing left to do
                process::exit(1);
            }
        }
        if stdout.flush().is_err() {
            process::exit(1);
        }
    }

    // The coordinator has already logged how the tail ended
    let termination: Termination = stream.finish().await;
    process::exit(termination.exit_code());
}
