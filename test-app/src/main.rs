// tellstick test application -- CLI tool for exercising the Tellstick driver
// against real hardware or the scripted mock backend.
//
// Usage:
//   tellstick-test-app list
//   tellstick-test-app version
//   tellstick-test-app --serial A501ABCD send "S$k$k$k$k$k$k$k$k$k+" --wait 2
//   tellstick-test-app listen --duration 60
//   tellstick-test-app --mock -v version

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use tellstick::{LinePolicy, Message, Session, TELLDUS_VENDOR_ID, TellstickBuilder, list_devices};
use tellstick_core::UsbContext;
use tellstick_test_harness::{MockUsb, mock_candidate};
use tellstick_transport::NusbContext;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// tellstick test application -- talks to a Tellstick from the command line.
#[derive(Parser)]
#[command(name = "tellstick-test-app", version, about)]
struct Cli {
    /// Only use the Tellstick with this serial number.
    #[arg(long, global = true)]
    serial: Option<String>,

    /// Milliseconds between polls while waiting for messages.
    #[arg(long, global = true, default_value_t = 100)]
    poll_interval_ms: u64,

    /// Bulk read timeout in milliseconds.
    #[arg(long, global = true, default_value_t = 5000)]
    read_timeout_ms: u64,

    /// Keep the trailing carriage return on received messages.
    #[arg(long, global = true)]
    keep_cr: bool,

    /// Use a scripted mock Tellstick Duo instead of real hardware.
    /// Useful for verifying CLI wiring without a device attached.
    #[arg(long, global = true)]
    mock: bool,

    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List attached Tellsticks.
    List,

    /// Ask the firmware for its version and print the reply.
    Version {
        /// Seconds to wait for the reply.
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },

    /// Send a raw command string.
    Send {
        /// Command bytes, e.g. "V+" or "S...+".
        payload: String,

        /// Seconds to keep printing replies after sending (0 = don't wait).
        #[arg(long, default_value_t = 0)]
        wait: u64,
    },

    /// Print received messages as they arrive.
    Listen {
        /// Duration in seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// A mock Tellstick Duo that answers the version query and then reports one
/// received radio packet.
fn scripted_mock() -> MockUsb {
    let mock = MockUsb::new();
    mock.add_device(mock_candidate(TELLDUS_VENDOR_ID, 0x0c31, "MOCK0001"));

    let mut version = vec![0x01, 0x60];
    version.extend_from_slice(b"+V2\r\n");
    mock.push_read(&version);

    let event: &[u8] = b"+Wclass:command;protocol:arctech;model:selflearning;\
                          house:1234567;unit:1;group:0;method:turnon;\r\n";
    // Longer than one 64-byte FTDI packet.
    let mut framed = Vec::new();
    for chunk in event.chunks(62) {
        framed.extend_from_slice(&[0x01, 0x60]);
        framed.extend_from_slice(chunk);
    }
    mock.push_read(&framed);
    mock
}

fn context(cli: &Cli, mock: Option<&MockUsb>) -> Box<dyn UsbContext> {
    match mock {
        Some(mock) => mock.context(),
        None if cli.mock => scripted_mock().context(),
        None => Box::new(NusbContext::new()),
    }
}

async fn open(cli: &Cli, mock: Option<&MockUsb>) -> Result<Session> {
    let policy = if cli.keep_cr {
        LinePolicy::KeepCarriageReturn
    } else {
        LinePolicy::StripCarriageReturn
    };
    let mut builder = TellstickBuilder::new()
        .read_timeout(Duration::from_millis(cli.read_timeout_ms))
        .line_policy(policy);
    if let Some(serial) = &cli.serial {
        builder = builder.serial(serial);
    }

    let session = builder
        .build_with_context(context(cli, mock))
        .await
        .context("failed to open Tellstick")?;
    info!(
        product = session.product(),
        serial = session.serial(),
        "connected"
    );
    Ok(session)
}

/// Poll once, treating a read timeout as an empty poll.
async fn poll_once(session: &mut Session) -> Result<Vec<String>> {
    match session.poll().await {
        Ok(lines) => Ok(lines),
        Err(e) if e.is_timeout() => {
            debug!("poll timed out");
            Ok(Vec::new())
        }
        Err(e) => Err(e).context("poll failed"),
    }
}

/// Poll until `deadline` (or forever), printing every message.
///
/// Stops early when `until` returns true for a message.
async fn print_messages<F>(
    session: &mut Session,
    interval: Duration,
    deadline: Option<Instant>,
    mut until: F,
) -> Result<bool>
where
    F: FnMut(&str) -> bool,
{
    let mut ticker = tokio::time::interval(interval);
    loop {
        if deadline.is_some_and(|dl| Instant::now() >= dl) {
            return Ok(false);
        }
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted.");
                return Ok(false);
            }
        }
        for line in poll_once(session).await? {
            println!("{line}");
            if until(&line) {
                return Ok(true);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_list(cli: &Cli) -> Result<()> {
    let mut ctx = context(cli, None);
    let found = list_devices(ctx.as_mut()).await;
    ctx.exit().await;
    let found = found.context("failed to enumerate USB devices")?;

    if found.is_empty() {
        println!("No Tellstick found.");
        return Ok(());
    }

    println!("{:<16} {:<12} {:<14} Serial", "Model", "Location", "USB ID");
    println!("{}", "-".repeat(56));
    for (candidate, model) in &found {
        println!(
            "{:<16} {:<12} {:<14} {}",
            model.to_string(),
            candidate.id.to_string(),
            format!("{:04x}:{:04x}", candidate.vendor_id, candidate.product_id),
            candidate.serial.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

async fn cmd_version(cli: &Cli, session: &mut Session, timeout_secs: u64) -> Result<()> {
    session
        .send(&Message::new("V+"))
        .await
        .context("failed to send version query")?;

    let deadline = Instant::now() + Duration::from_secs(timeout_secs);
    let interval = Duration::from_millis(cli.poll_interval_ms);
    let answered = print_messages(session, interval, Some(deadline), |line| {
        line.starts_with("+V")
    })
    .await?;
    if !answered {
        bail!("no version reply within {timeout_secs}s");
    }
    Ok(())
}

async fn cmd_send(cli: &Cli, session: &mut Session, payload: &str, wait_secs: u64) -> Result<()> {
    let message = Message::new(payload);
    if message.len() > session.config().write_chunk_size {
        warn!(
            len = message.len(),
            limit = session.config().write_chunk_size,
            "payload exceeds one chunk, only the first chunk is sent"
        );
    }
    session
        .send(&message)
        .await
        .with_context(|| format!("failed to send {payload:?}"))?;
    println!("Sent {} bytes.", message.len());

    if wait_secs > 0 {
        let deadline = Instant::now() + Duration::from_secs(wait_secs);
        let interval = Duration::from_millis(cli.poll_interval_ms);
        print_messages(session, interval, Some(deadline), |_| false).await?;
    }
    Ok(())
}

async fn cmd_listen(cli: &Cli, session: &mut Session, duration_secs: u64) -> Result<()> {
    println!("Listening for messages (Ctrl-C to stop)...");
    let deadline = (duration_secs > 0).then(|| Instant::now() + Duration::from_secs(duration_secs));
    let interval = Duration::from_millis(cli.poll_interval_ms);
    print_messages(session, interval, deadline, |_| false).await?;
    if deadline.is_some() {
        println!("Listen duration elapsed.");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.poll_interval_ms == 0 {
        bail!("--poll-interval-ms must be non-zero");
    }

    // The `list` command does not open a session.
    if matches!(cli.command, Command::List) {
        return cmd_list(&cli).await;
    }

    let mut session = open(&cli, None).await?;
    let result = match &cli.command {
        Command::Version { timeout } => cmd_version(&cli, &mut session, *timeout).await,
        Command::Send { payload, wait } => cmd_send(&cli, &mut session, payload, *wait).await,
        Command::Listen { duration } => cmd_listen(&cli, &mut session, *duration).await,
        Command::List => unreachable!("list handled above"),
    };
    session.close().await;
    result
}
