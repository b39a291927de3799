#![forbid(unsafe_code)]

mod client;
mod output;
mod track;

use anyhow::{Context, Result};
use clap::Parser;
use output::OutputMode;
use std::io::Write;
use std::path::PathBuf;
use std::{env, thread, time::Duration};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::client::ForumClient;
use unravel_core::SnapshotStore;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "unravel: attribute anonymous forum posts by diffing poll snapshots",
    long_about = "Polls a class forum's statistics and posts, keeps the two most recent \
                  snapshots of each, and diffs them to work out which enrolled user \
                  authored or edited an anonymous post.",
    after_help = "EXAMPLES:\n    # Track a class, polling every 3 seconds\n    unravel -u me@example.edu -p secret -c j9x7k2\n\n    # One cycle, machine-readable output\n    unravel -u me@example.edu -p secret -c j9x7k2 --once --json"
)]
struct Cli {
    /// Forum account email.
    #[arg(short = 'u', long)]
    email: String,

    /// Forum account password.
    #[arg(short = 'p', long)]
    password: String,

    /// Class id, as in piazza.com/class/{class_id}.
    #[arg(short = 'c', long)]
    class_id: String,

    /// Seconds to sleep between poll cycles.
    #[arg(long, default_value_t = 3)]
    interval: u64,

    /// Snapshot database path. Defaults to `{class_id}.sqlite3`.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Run a single poll cycle and exit.
    #[arg(long)]
    once: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long)]
    json: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }

    fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.sqlite3", self.class_id)))
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("UNRAVEL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "unravel_core=debug,unravel_cli=debug,info"
        } else {
            "unravel_core=info,unravel_cli=info,warn"
        })
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let client = ForumClient::login(&cli.email, &cli.password, &cli.class_id)
        .context("forum authentication")?;
    let store = SnapshotStore::open(&cli.db_path()).context("open snapshot store")?;

    let mode = cli.output_mode();
    let stdout = std::io::stdout();
    loop {
        if let Some(attribution) = track::run_cycle(&client, &store)? {
            let mut out = stdout.lock();
            output::render(&mut out, mode, &attribution)?;
            out.flush()?;
        }

        if cli.once {
            break;
        }
        info!(seconds = cli.interval, "sleeping until next poll");
        thread::sleep(Duration::from_secs(cli.interval));
    }

    Ok(())
}
