//! KeySwift -- script-driven keyboard remapper for Linux.
//!
//! Entry point: flag parsing, logging, startup wiring, and signal handling.
//!
//! Startup order matters: the window monitor and virtual output come up
//! before the script engine (rules may read the window class on their first
//! evaluation), and devices are grabbed last so a startup failure never
//! leaves a keyboard captured with nothing consuming it.

mod cache;
mod cli;
mod config;
mod dev;
mod engine;
mod error;
mod event;
mod keys;
mod output;
mod pipeline;
mod wininfo;

use std::sync::Arc;
use std::thread;

use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use cache::ChordCache;
use cli::Cli;
use engine::ScriptEngine;
use error::{Error, Result};
use keys::KeyCatalog;
use output::{UinputSink, VirtualOutput};
use wininfo::dbus::WindowMonitor;
use wininfo::FocusState;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    log::info!("keyswift v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli) {
        log::error!("keyswift: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let script_path = config::resolve_script_path(cli.config).ok_or_else(|| {
        Error::Config("cannot resolve the default script path: $HOME is unset".into())
    })?;
    let script = config::read_script(&script_path)?;
    log::info!("keyswift: rules loaded from {}", script_path.display());

    let catalog = Arc::new(KeyCatalog::new());
    let chords = Arc::new(ChordCache::new(catalog.clone()));

    // Window-gated rules degrade to "never match" without the bus.
    let focus = Arc::new(FocusState::new());
    let _monitor = match WindowMonitor::start(focus.clone(), None) {
        Ok(monitor) => Some(monitor),
        Err(e) => {
            log::warn!("wininfo: bus unavailable, window class will be empty: {e}");
            None
        }
    };

    let sink = UinputSink::create(&cli.output_device_name, &catalog).map_err(Error::Output)?;
    let output = Arc::new(VirtualOutput::new(Box::new(sink)));
    log::info!("output: virtual keyboard {:?} ready", cli.output_device_name);

    let script_engine = Arc::new(ScriptEngine::compile(
        &script,
        catalog,
        chords,
        output.clone(),
        focus,
    )?);

    // Grab last: a failure past this point would otherwise leave keyboards
    // captured with nothing draining them.
    let manager = dev::DeviceManager::grab_matching(&cli.keyboards, &cli.output_device_name)?;
    log::info!(
        "keyswift: processing events from {} device(s), Ctrl+C to exit",
        manager.device_count()
    );

    spawn_signal_handler();

    let loops = manager.spawn_loops(script_engine, output);
    for handle in loops {
        let _ = handle.join();
    }
    log::info!("keyswift: all device loops ended");
    Ok(())
}

/// SIGINT/SIGTERM end the process; closing the fds releases the device grabs
/// and removes the virtual keyboard. An in-flight emission finishes first
/// because exit happens on this thread, not inside an output lock.
fn spawn_signal_handler() {
    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            log::warn!("keyswift: signal handler unavailable: {e}");
            return;
        }
    };
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            log::info!("keyswift: received signal {sig}, shutting down");
            std::process::exit(128 + sig);
        }
    });
}
