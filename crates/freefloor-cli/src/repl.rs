//! REPL – Read-Eval-Print Loop for the freefloor interactive shell.
//!
//! Supported slash-commands:
//!   /click u v    – query the ground position of pixel (u, v)
//!   /status       – cycle counters and the size of the passable set
//!   /help         – show this list
//!   /quit | /exit – gracefully exit the CLI

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use freefloor_middleware::OutputPort;
use freefloor_runtime::{CycleCounters, SharedFloorState};
use freefloor_types::{EventPayload, PixelClick};

/// How often the prompt checks the shutdown flag while waiting for input.
const POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Click { u: i64, v: i64 },
    Status,
    Help,
    Quit,
    Empty,
    /// Known command with unusable arguments.
    Usage(&'static str),
    Unknown(String),
}

/// Parse one input line.
pub fn parse(line: &str) -> Command {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Command::Empty;
    };
    let args: Vec<&str> = words.collect();
    match head {
        "/click" => match args.as_slice() {
            [u, v] => match (u.parse(), v.parse()) {
                (Ok(u), Ok(v)) => Command::Click { u, v },
                _ => Command::Usage("/click <u> <v>  (integer pixel coordinates)"),
            },
            _ => Command::Usage("/click <u> <v>"),
        },
        "/status" => Command::Status,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

/// What the shell needs from the running pipeline.
pub struct ReplContext {
    pub clicks: OutputPort,
    pub counters: Arc<CycleCounters>,
    pub shared: SharedFloorState,
    /// Resolution of the sensor, for `/status`.
    pub dimensions: (u32, u32),
}

/// Entry point for the interactive REPL.
///
/// Returns when the user quits, stdin closes, or `shutdown` is set.
pub fn run(shutdown: Arc<AtomicBool>, ctx: &ReplContext) {
    let lines = spawn_stdin_reader();
    prompt();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let line = match lines.recv_timeout(POLL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break, // EOF
        };

        match parse(&line) {
            Command::Empty => {}
            Command::Click { u, v } => cmd_click(ctx, u, v),
            Command::Status => cmd_status(ctx),
            Command::Help => cmd_help(),
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Command::Usage(usage) => println!("{} {}", "Usage:".yellow(), usage),
            Command::Unknown(other) => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
        prompt();
    }
    ctx.clicks.close();
}

/// Blocking stdin reads happen on their own thread so the prompt loop can
/// notice Ctrl-C without waiting for a newline.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        eprintln!("{}: {}", "Read error".red(), e);
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        eprintln!("{}: {}", "Unable to read stdin".red(), e);
    }
    rx
}

fn prompt() {
    print!("{} ", "freefloor>".bold().cyan());
    io::stdout().flush().ok();
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_click(ctx: &ReplContext, u: i64, v: i64) {
    match ctx.clicks.write(EventPayload::PixelClick(PixelClick { u, v })) {
        Ok(_) => println!("  click ({}, {}) sent on {}", u, v, ctx.clicks.name().dimmed()),
        Err(e) => println!("{}: {}", "Click not sent".red(), e),
    }
}

fn cmd_status(ctx: &ReplContext) {
    let stats = ctx.counters.snapshot();
    let (width, height) = ctx.dimensions;
    println!("{}", "Floor Detection".bold().underline());
    println!("  Resolution       : {}x{}", width, height);
    println!("  Completed cycles : {}", stats.completed.to_string().green());
    println!("  Skipped cycles   : {}", stats.skipped.to_string().yellow());
    println!("  Degraded cycles  : {}", stats.degraded.to_string().yellow());
    println!("  Published passes : {}", ctx.shared.pass_count());
    println!("  Passable pixels  : {}", ctx.shared.passable_count().to_string().bold());
}

fn cmd_help() {
    println!();
    println!("{}", "freefloor Commands".bold().underline());
    println!("  {}  – ground position of pixel (u, v)", "/click u v".bold().cyan());
    println!("  {}      – loop counters and passable pixel count", "/status".bold().cyan());
    println!("  {}        – this list", "/help".bold().cyan());
    println!("  {} – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
}
