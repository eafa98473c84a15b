use anyhow::{Context, Result};
use badgetap_cli::{AppConfig, Args, EVENT_QUEUE_CAPACITY, Orchestrator, console, input, simulate};
use badgetap_core::ReaderIdentity;
use badgetap_hardware::{CardSession, HardwareChannel, ReaderMonitor};
use badgetap_network::{Dispatcher, TcpQueueConnector};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Time between two simulated taps.
const SIMULATED_TAP_INTERVAL: Duration = Duration::from_secs(5);

/// How long in-flight taps may take to finish on exit.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let config = args.into_config().context("Invalid configuration")?;

    if config.simulate {
        let (channel, handle, reader) = simulate::simulated_channel()?;
        tokio::spawn(simulate::run_taps(handle, reader, SIMULATED_TAP_INTERVAL));
        return run(Arc::new(channel), config).await;
    }

    run_hardware(config).await
}

#[cfg(feature = "pcsc")]
async fn run_hardware(config: AppConfig) -> Result<()> {
    run(Arc::new(badgetap_hardware::PcscChannel::new()), config).await
}

#[cfg(not(feature = "pcsc"))]
async fn run_hardware(_config: AppConfig) -> Result<()> {
    anyhow::bail!("built without PC/SC support: rebuild with `--features pcsc` or pass --simulate")
}

async fn run<C: HardwareChannel + 'static>(channel: Arc<C>, config: AppConfig) -> Result<()> {
    let readers = discover_readers(&channel, &config.readers).await?;
    if readers.is_empty() {
        console::print_no_readers();
        return Ok(());
    }

    let connector = TcpQueueConnector::new(config.queue.clone())?;
    let orchestrator = Orchestrator::new(
        CardSession::new(Arc::clone(&channel)),
        Dispatcher::new(connector, config.retry.clone()),
    );
    let (sink, worker) = orchestrator.spawn(EVENT_QUEUE_CAPACITY, console::report);

    let monitor = ReaderMonitor::new(channel, config.monitor.clone());
    let subscription = monitor.subscribe(sink);
    monitor.start(&readers)?;
    console::print_banner(&readers);

    control_loop(&monitor, &readers).await;

    info!("Shutting down");
    monitor.shutdown().await;
    monitor.unsubscribe(subscription);
    if tokio::time::timeout(DRAIN_TIMEOUT, worker).await.is_err() {
        warn!("Gave up waiting for in-flight card reads");
    }
    Ok(())
}

async fn discover_readers<C: HardwareChannel + 'static>(
    channel: &Arc<C>,
    wanted: &[ReaderIdentity],
) -> Result<Vec<ReaderIdentity>> {
    let driver = Arc::clone(channel);
    let available = tokio::task::spawn_blocking(move || driver.list_readers())
        .await
        .context("Reader enumeration task failed")?
        .context("Could not list readers")?;

    if wanted.is_empty() {
        return Ok(available);
    }

    for reader in wanted {
        if !available.contains(reader) {
            warn!(reader = %reader, "Requested reader not found");
        }
    }
    Ok(available
        .into_iter()
        .filter(|reader| wanted.contains(reader))
        .collect())
}

/// Enter toggles monitoring, `q` or Ctrl-C quits.
async fn control_loop<C: HardwareChannel + 'static>(
    monitor: &ReaderMonitor<C>,
    readers: &[ReaderIdentity],
) {
    let mut lines = input::spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
    let mut stdin_open = true;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Could not listen for Ctrl-C");
                }
                return;
            }
            line = lines.recv(), if stdin_open => match line {
                Some(line) if input::is_quit(&line) => return,
                Some(_) => match monitor.toggle(readers) {
                    Ok(active) => console::print_monitoring(active),
                    Err(e) => console::print_error(&e.to_string()),
                },
                None => stdin_open = false,
            },
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .init();
}
