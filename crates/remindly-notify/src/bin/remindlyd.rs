use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use remindly_core::sweep::SweepKind;
use remindly_core::{RemindlyCore, SessionManager};
use remindly_notify::{shutdown_on_eof, Daemon, FanOut, JsonLinesChannel};

#[derive(Parser, Debug)]
#[command(name = "remindlyd", about = "Run payment and medication reminder sweeps.")]
struct Args {
    /// SQLite database file
    #[arg(long, default_value = "remindly.db")]
    db: PathBuf,

    /// Key-value store file (imported once, or used if the database is read-only)
    #[arg(long, default_value = "remindly-store.json")]
    kv_file: PathBuf,

    /// User whose records are swept
    #[arg(short, long)]
    user: String,

    /// Upper bound on the sleep between ticks, in seconds
    #[arg(long, default_value_t = 30)]
    tick_seconds: u64,

    /// Run the due sweeps once and exit
    #[arg(long)]
    once: bool,

    /// Stop cleanly when stdin is closed, for hosts that spawn the daemon.
    /// Without it the loop runs until the process is killed.
    #[arg(long)]
    stop_on_stdin_eof: bool,

    /// Only run these sweeps (reminder, daily-digest, medication)
    #[arg(long, value_parser = parse_sweep, value_delimiter = ',')]
    only: Vec<SweepKind>,
}

fn parse_sweep(s: &str) -> Result<SweepKind, String> {
    SweepKind::parse(s).ok_or_else(|| format!("unknown sweep '{s}'"))
}

fn dispatcher() -> Result<FanOut> {
    let fan_out = FanOut::new().with_channel(JsonLinesChannel::stdout());

    #[cfg(feature = "telegram")]
    let fan_out = match remindly_notify::TelegramConfig::from_env() {
        Ok(config) => fan_out.with_channel(
            remindly_notify::TelegramChannel::new(config).context("building Telegram client")?,
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Telegram delivery disabled");
            fan_out
        }
    };

    Ok(fan_out)
}

fn main() -> Result<()> {
    // stdout carries notifications, logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "remindly_core=info,remindly_notify=info,remindlyd=info".into()),
        )
        .init();

    let args = Args::parse();
    if args.user.trim().is_empty() {
        return Err(anyhow!("--user must not be empty"));
    }
    if args.tick_seconds == 0 {
        return Err(anyhow!("--tick-seconds must be at least 1"));
    }

    let session = Arc::new(SessionManager::with_user(args.user.trim()));
    let core = RemindlyCore::open(&args.db, &args.kv_file, session)
        .with_context(|| format!("opening {}", args.db.display()))?;
    tracing::info!(db = %args.db.display(), store = ?core.store_tier(), "remindly core ready");

    let mut daemon = Daemon::new(core, dispatcher()?);
    if !args.only.is_empty() {
        for kind in SweepKind::ALL {
            if !args.only.contains(&kind) {
                daemon.scheduler_mut().cancel(kind);
            }
        }
    }

    if args.once {
        let reports = daemon.tick(Instant::now(), chrono::Local::now().naive_local());
        for (kind, report) in reports {
            tracing::info!(sweep = kind.as_str(), sent = report.sent, "sweep done");
        }
        return Ok(());
    }

    if args.stop_on_stdin_eof {
        shutdown_on_eof(std::io::stdin(), daemon.shutdown_handle());
    }
    daemon.run(Duration::from_secs(args.tick_seconds));
    Ok(())
}
