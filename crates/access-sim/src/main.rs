mod cli;
mod config;
mod shell;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use audit_log::AuditLog;
use policy_engine::{loader, IntegrityMonitor, IntegrityReport};

use crate::cli::Cli;
use crate::config::{Config, LogFormat};
use crate::shell::{Flow, Simulator};

const PROMPT: &str = "access-sim> ";

/// Lines buffered between an input reader and the shell.
const LINE_BUFFER: usize = 64;

// ---------------------------------------------------------------------------
// Background integrity checks
// ---------------------------------------------------------------------------

/// Compare the matrix with the baseline every `period` until shutdown.
async fn integrity_loop(
    monitor: Arc<IntegrityMonitor>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately; the scenario was just baselined.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => match monitor.check_integrity() {
                IntegrityReport::Diverged(divergences) => warn!(
                    count = divergences.len(),
                    "scheduled integrity check found unauthorized changes"
                ),
                IntegrityReport::NoBaseline => warn!("scheduled integrity check skipped: no baseline"),
                IntegrityReport::Intact => debug!("scheduled integrity check passed"),
            },
            _ = shutdown.recv() => break,
        }
    }
    debug!("integrity task stopped");
}

// ---------------------------------------------------------------------------
// Command input
// ---------------------------------------------------------------------------

/// Forward lines from `input` on a tokio task. The channel closes at EOF or
/// on the first read error.
fn spawn_script_reader<R>(input: R) -> mpsc::Receiver<String>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    tokio::spawn(async move {
        let mut lines = input.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    error!(%err, "failed to read script");
                    break;
                }
            }
        }
    });
    rx
}

/// Forward stdin lines from a dedicated OS thread.
///
/// A terminal read cannot be cancelled, so it must not run on the runtime's
/// blocking pool: shutdown would wait for the next line.
fn spawn_stdin_reader() -> std::io::Result<mpsc::Receiver<String>> {
    use std::io::BufRead;

    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        error!(%err, "failed to read stdin");
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

/// Feed lines to the simulator until the input closes or `quit`.
///
/// Command errors are reported and the loop carries on.
async fn run_shell(
    sim: &mut Simulator,
    mut lines: mpsc::Receiver<String>,
    out: &mut impl Write,
    interactive: bool,
) -> Result<()> {
    loop {
        if interactive {
            write!(out, "{PROMPT}")?;
            out.flush()?;
        }
        let Some(line) = lines.recv().await else {
            break;
        };

        match sim.execute(&line, out) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(err) => writeln!(out, "error: {err:#}")?,
        }
    }
    Ok(())
}

fn report_config_source(path: &Path, found: bool) {
    if found {
        info!(path = %path.display(), "configuration loaded");
    } else {
        warn!(
            path = %path.display(),
            "configuration file not found; using defaults"
        );
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then merge CLI overrides.
    let loaded = config::load(&cli.config)?;
    let config_found = loaded.is_some();
    let mut cfg: Config = loaded.unwrap_or_default();

    if let Some(ref scenario) = cli.scenario {
        cfg.scenario_file = Some(scenario.clone());
    }
    if let Some(ref path) = cli.audit_log {
        cfg.logging.audit_log_path = Some(path.clone());
    }
    if let Some(secs) = cli.integrity_interval {
        cfg.integrity.check_interval_secs = Some(secs);
    }

    // 3. Init tracing-subscriber. Diagnostics go to stderr so that stdout
    //    carries only shell output.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    match cfg.logging.format {
        LogFormat::Json => subscriber.json().with_thread_ids(true).init(),
        LogFormat::Pretty => subscriber.init(),
    }

    info!(
        config_file = %cli.config.display(),
        version = env!("CARGO_PKG_VERSION"),
        "access-sim starting"
    );
    report_config_source(&cli.config, config_found);

    // 4. Start the audit log, mirrored to disk when configured.
    let (audit, mirror_handle) = match cfg.logging.audit_log_path {
        Some(ref path) => {
            let (audit, handle) = audit_log::start_file_mirror(path)
                .await
                .context("failed to start audit log mirror")?;
            info!(path = %path.display(), "audit log mirrored to file");
            (audit, Some(handle))
        }
        None => (AuditLog::new(), None),
    };

    // 5. Load the scenario and take the initial baseline.
    let scenario = match cfg.scenario_file {
        Some(ref path) => loader::load_scenario(path).context("failed to load scenario")?,
        None => loader::default_scenario()?,
    };
    let mut sim = Simulator::new(audit, cfg.integrity.rebaseline_on_grant);
    sim.load(&scenario)?;

    // 6. Periodic integrity checks.
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let integrity_handle = match cfg.integrity.check_interval_secs {
        Some(0) => {
            warn!("integrity interval of 0 seconds ignored");
            None
        }
        Some(secs) => {
            info!(interval_secs = secs, "periodic integrity checks enabled");
            Some(tokio::spawn(integrity_loop(
                sim.monitor(),
                Duration::from_secs(secs),
                shutdown_tx.subscribe(),
            )))
        }
        None => None,
    };

    // 7. Run the command loop until the input ends, `quit` or ctrl-c.
    let (lines, interactive) = match cli.script {
        Some(ref path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open script {}", path.display()))?;
            (spawn_script_reader(BufReader::new(file)), false)
        }
        None => {
            println!("access-sim: type 'help' for commands, 'demo' for a walkthrough");
            let lines = spawn_stdin_reader().context("failed to start stdin reader")?;
            (lines, true)
        }
    };

    let mut stdout = std::io::stdout();
    let shell_result = tokio::select! {
        r = run_shell(&mut sim, lines, &mut stdout, interactive) => r,
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT (ctrl-c)");
            Ok(())
        }
    };

    // 8. Shut down. The mirror drains once every AuditLog clone is gone.
    info!("access-sim shutting down");
    let _ = shutdown_tx.send(());
    if let Some(handle) = integrity_handle {
        if let Err(err) = handle.await {
            warn!(%err, "integrity task failed");
        }
    }
    drop(sim);
    if let Some(handle) = mirror_handle {
        if let Err(err) = handle.await {
            warn!(%err, "audit mirror task failed");
        }
    }

    shell_result
}
