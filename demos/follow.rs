//! Follows a file with the hand-off strategy and reports each batch.
//!
//! Usage:
//!     cargo run --example follow -- /tmp/somefile
//!
//! Pair it with the bundled writer in another terminal:
//!     cargo run --bin append-writer -- /tmp/somefile --count 20

use std::env;
use std::process;
use tailsync::{Strategy, TailOptions, follow};
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() {
    let Some(path) = env::args().nth(1) else {
        eprintln!("Usage: follow <file_path>");
        process::exit(1);
    };

    let options = TailOptions::default().with_strategy(Strategy::Handoff);
    let mut stream = match follow(&path, options) {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Error setting up tail: {}", e);
            process::exit(1);
        }
    };

    let mut batch_count = 0;
    while let Some(lines) = stream.next().await {
        batch_count += 1;
        println!("Batch #{} ({} lines)", batch_count, lines.len());
        for line in &lines {
            println!("  Read: {}", line);
        }
    }

    let termination = stream.finish().await;
    println!("Stopped after {} batches: {}", batch_count, termination);
    process::exit(termination.exit_code());
}
