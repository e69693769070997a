mod cmd;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use cmd::{CommandEnum, Commands, SubCommandScan};
use memory_scan::config::{load_config, validate_config, Config, LoggingConfig};
use memory_scan::{
    process, Address, Memory, MemoryAddress, MemorySettings, OpenOutcome, ScanCancel, ScanEvent,
    ScanMode, ScanOutcome, SigScanner,
};

fn build_subscriber<W>(filter: EnvFilter, ansi: bool, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_target(false)
        .with_writer(writer)
        .finish()
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    build_subscriber(filter, logging.ansi, std::io::stderr).init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Opens `target` as a pid, or as a unique executable name
fn open_target(memory: &mut Memory, target: &str) -> Result<()> {
    if let Ok(pid) = target.parse::<u32>() {
        memory
            .open(pid)
            .with_context(|| format!("opening process {}", pid))?;
        return Ok(());
    }

    match memory.open_by_name(target)? {
        OpenOutcome::Opened(pid) => {
            debug!(pid, name = target, "resolved target");
            Ok(())
        }
        OpenOutcome::NotFound => bail!("no process named {}", target),
        OpenOutcome::Ambiguous(pids) => {
            print_json(&serde_json::json!({ "ambiguous": target, "candidates": pids }))?;
            bail!("{} matches {} processes, pass a pid instead", target, pids.len())
        }
    }
}

#[derive(Serialize)]
struct ScanReport {
    outcome: ScanOutcome,
    matches: Vec<Address>,
}

async fn run_scan(memory: Memory, config: &Config, args: SubCommandScan) -> Result<ScanReport> {
    let mode = if args.all {
        ScanMode::AllMatches
    } else {
        ScanMode::FirstMatch
    };
    let mut options = config.scan_options(mode);
    if let Some(chunk_size) = args.chunk_size {
        options.max_read_size = chunk_size;
    }

    let cancel = ScanCancel::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<ScanEvent>();

    let worker_cancel = cancel.clone();
    let worker = tokio::task::spawn_blocking(move || -> Result<ScanReport> {
        let mut scanner = SigScanner::new(&memory, options)?;
        scanner.set_cancel(worker_cancel);
        scanner.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        let outcome = scanner.scan_module(&args.pattern, args.mask.as_deref());
        let matches = scanner.matches().keys().copied().collect();
        Ok(ScanReport { outcome, matches })
    });

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling scan");
            cancel.cancel();
        }
    });

    let mut chunks = 0usize;
    while let Some(event) = rx.recv().await {
        match event {
            ScanEvent::Begin => info!("scan started"),
            ScanEvent::Progress { found } => {
                chunks += 1;
                debug!(chunks, found, "scanning");
            }
            ScanEvent::Found(address) => info!(%address, "signature found"),
            ScanEvent::Error(e) => warn!(error = %e, "scan reported an error"),
            ScanEvent::End => info!(chunks, "scan finished"),
        }
    }

    let report = worker.await.context("scan worker panicked")??;
    interrupt.abort();
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Commands = argh::from_env();
    let config = load_config(args.config.as_deref())?;
    init_tracing(&config.logging);
    validate_config(&config)?;

    debug!(version = memory_scan::core::VERSION, "memory-scan starting");
    let mut memory = Memory::with_settings(MemorySettings::from(&config.memory));

    let result = match args.cmds {
        CommandEnum::Regions(this) => {
            open_target(&mut memory, &this.target)?;
            let regions = memory.regions(this.all || config.memory.include_all_regions)?;
            print_json(&regions)
        }
        CommandEnum::Scan(this) => {
            open_target(&mut memory, &this.target)?;
            let report = run_scan(memory, &config, this).await?;
            print_json(&report)?;
            if report.outcome.is_failure() {
                bail!("scan failed");
            }
            Ok(())
        }
        CommandEnum::Read(this) => {
            open_target(&mut memory, &this.target)?;
            let region = memory.query_region(this.address)?;
            let value =
                MemoryAddress::new(this.address, region, this.kind, this.length, this.unicode);
            let text = value.read_value(&memory)?;
            print_json(&serde_json::json!({
                "address": this.address.to_string(),
                "kind": this.kind,
                "value": text,
            }))
        }
        CommandEnum::Write(this) => {
            open_target(&mut memory, &this.target)?;
            let region = memory.query_region(this.address)?;
            let mut value = MemoryAddress::new(this.address, region, this.kind, 0, this.unicode);
            let written = value.set_value(&memory, &this.value)?;
            print_json(&serde_json::json!({
                "address": this.address.to_string(),
                "written": written,
                "value": value.read_value(&memory)?,
            }))
        }
        CommandEnum::Suspend(this) => {
            open_target(&mut memory, &this.target)?;
            print_json(&memory.suspend()?)
        }
        CommandEnum::Resume(this) => {
            open_target(&mut memory, &this.target)?;
            print_json(&memory.resume()?)
        }
        CommandEnum::Kill(this) => {
            open_target(&mut memory, &this.target)?;
            let pid = memory.pid().context("no process attached")?;
            memory.close();
            process::terminate_process(pid)?;
            info!(pid, "process terminated");
            Ok(())
        }
    };

    if let Err(e) = &result {
        error!(error = %e, "command failed");
    }
    result
}
