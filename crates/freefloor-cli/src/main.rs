//! `freefloor` – floor detection command line interface.
//!
//! This binary wires the whole pipeline together:
//!
//! 1. Loads `~/.freefloor/config.toml` (or the path given as the first
//!    argument), writing a default configuration when the file is absent.
//! 2. Opens the configured RGB-D sensor and transform client and starts the
//!    detection loop on a periodic thread.
//! 3. Serves pixel-click queries, prints the resulting ground targets and
//!    optionally writes the visualization mask to disk.
//! 4. Drops the user into an **interactive REPL** (`/click`, `/status`,
//!    `/help`, `/quit`).
//! 5. Intercepts **Ctrl-C** to stop the loop and release every device.

mod config;
mod repl;
mod snapshot;

use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use freefloor_hal::DeviceRegistry;
use freefloor_middleware::{EventBus, InputPort, OutputPort, Topic};
use freefloor_runtime::{
    FloorDetectionLoop, PeriodicThread, SharedFloorState, TargetQueryHandler, init_tracing,
};
use freefloor_types::{Event, EventPayload};

use crate::snapshot::SnapshotSink;

const SERVICE_NAME: &str = "freefloor";
const CLICK_PORT: &str = "/freefloor/cli/click:o";
/// How long teardown waits for each async task to finish.
const TASK_GRACE: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    // RUST_LOG filters, FREEFLOOR_LOG_FORMAT=json switches to JSON lines and
    // OTEL_EXPORTER_OTLP_ENDPOINT enables span export.  User-facing output
    // still uses println!.
    let telemetry = init_tracing(SERVICE_NAME);
    debug!(span_export = telemetry.is_exporting(), "tracing initialised");

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(config::config_path);
    let loaded = match config::load_or_create(&path) {
        Ok(loaded) => loaded,
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    if loaded.created {
        println!(
            "  {} Default config written to {}",
            "✓".green().bold(),
            loaded.path.display().to_string().bold()
        );
    } else {
        println!("  Config loaded from {}", loaded.path.display().to_string().bold());
    }
    let cfg = loaded.config;

    // ── Shared shutdown flag / Ctrl-C ─────────────────────────────────────
    let bus = EventBus::default();
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        let bus = bus.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            println!();
            println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
            let alert = Event::new(
                SERVICE_NAME,
                EventPayload::Alert {
                    component: "cli".to_string(),
                    message: "operator interrupt".to_string(),
                },
            );
            bus.publish_to(Topic::SystemAlerts, alert);
            shutdown.store(true, Ordering::SeqCst);
        }) {
            warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
        }
    }

    // ── Detection loop ────────────────────────────────────────────────────
    let registry = DeviceRegistry::with_builtin_drivers();
    let shared = SharedFloorState::new();
    let floor_loop = match FloorDetectionLoop::init(&cfg, &registry, &bus, shared.clone()) {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, "floor detection loop failed to start");
            println!("{}: {}", "Startup failed".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };
    let counters = floor_loop.counters();
    let dimensions = floor_loop.dimensions();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("freefloor-io")
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            println!("{}: {}", "Unable to start the async runtime".red(), e);
            return ExitCode::FAILURE;
        }
    };

    // Async tasks stop on this signal; the bus itself never closes while
    // output ports hold it.
    let (stop_tasks, stop_rx) = watch::channel(false);

    // Subscribers first, so that the first mask and the first click are seen.
    let clicks_in = InputPort::open(cfg.clicked_pos_port.clone(), Topic::PixelClicks, &bus);
    let query_task = runtime.spawn(
        TargetQueryHandler::open(&cfg, &bus, shared.clone()).run(clicks_in, stop_rx.clone()),
    );
    runtime.spawn(print_targets(
        InputPort::open("/freefloor/cli/target:i", Topic::TargetPosition, &bus),
        stop_rx.clone(),
    ));
    runtime.spawn(print_alerts(
        InputPort::open("/freefloor/cli/alerts:i", Topic::SystemAlerts, &bus),
        stop_rx.clone(),
    ));
    let mut snapshot_task = None;
    if let Some(dir) = &cfg.snapshot_dir {
        let sink = SnapshotSink::new(dir, cfg.snapshot_every);
        println!(
            "  Writing every {} mask(s) to {}",
            cfg.snapshot_every,
            sink.target().display().to_string().bold()
        );
        snapshot_task = Some(runtime.spawn(sink.run(
            InputPort::open("/freefloor/cli/snapshot:i", Topic::FloorMask, &bus),
            stop_rx.clone(),
        )));
    }

    let thread = match PeriodicThread::spawn("floor-loop", cfg.period(), Arc::clone(&shutdown), floor_loop) {
        Ok(t) => t,
        Err(e) => {
            println!("{}: {}", "Unable to start the detection thread".red(), e);
            return ExitCode::FAILURE;
        }
    };
    info!(period_ms = cfg.period().as_millis() as u64, "floor detection running");

    println!(
        "  Sensor {}x{} running every {:.0} ms.",
        dimensions.0,
        dimensions.1,
        cfg.period_s * 1000.0
    );
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    let ctx = repl::ReplContext {
        clicks: OutputPort::open(CLICK_PORT, Topic::PixelClicks, &bus),
        counters,
        shared,
        dimensions,
    };
    repl::run(Arc::clone(&shutdown), &ctx);

    // ── Teardown ──────────────────────────────────────────────────────────
    if thread.join().is_none() {
        error!("detection thread panicked");
    }
    stop_tasks.send_replace(true);
    runtime.block_on(async {
        match tokio::time::timeout(TASK_GRACE, query_task).await {
            Ok(Ok(handler)) => debug!(released = handler.is_released(), "query handler joined"),
            Ok(Err(e)) => error!(error = %e, "query handler task failed"),
            Err(_) => warn!("query handler did not stop in time"),
        }
        if let Some(task) = snapshot_task {
            match tokio::time::timeout(TASK_GRACE, task).await {
                Ok(Ok(sink)) => debug!(written = sink.written(), "snapshot sink joined"),
                Ok(Err(e)) => error!(error = %e, "snapshot task failed"),
                Err(_) => warn!("snapshot sink did not stop in time"),
            }
        }
    });
    runtime.shutdown_timeout(TASK_GRACE);
    println!("{}", "  ✓ Devices released. Exiting freefloor.".green());
    ExitCode::SUCCESS
}

async fn print_targets(mut targets: InputPort, mut stop: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            event = targets.recv() => match event {
                Some(event) => {
                    if let EventPayload::Target(t) = event.payload {
                        println!("\n  {} x = {:.3} m, y = {:.3} m", "target".green().bold(), t.x, t.y);
                    }
                }
                None => break,
            },
            _ = stop.changed() => break,
        }
    }
}

async fn print_alerts(mut alerts: InputPort, mut stop: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            event = alerts.recv() => match event {
                Some(event) => {
                    if let EventPayload::Alert { component, message } = event.payload {
                        println!("\n  {} [{}] {}", "alert".yellow().bold(), component, message);
                    }
                }
                None => break,
            },
            _ = stop.changed() => break,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___              ___ _              "#.bold().cyan());
    println!("{}", r#"  | __| _ ___ ___  | __| |___  ___ _ _ "#.bold().cyan());
    println!("{}", r#"  | _| '_/ -_) -_) | _|| / _ \/ _ \ '_|"#.bold().cyan());
    println!("{}", r#"  |_||_| \___\___| |_| |_\___/\___/_|  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "freefloor".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Passable floor detection from RGB-D");
    println!();
}
