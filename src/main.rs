#![forbid(unsafe_code)]

mod constants;
mod display;
mod orchestrator;
mod profile;
mod window;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{Level as TraceLevel, info};
use tracing_subscriber::FmtSubscriber;
use x11rb::connection::Connection;
use x11rb::rust_connection::RustConnection;

use display::api::DisplayBackend;
use display::randr::RandrBackend;
use orchestrator::{ApplyOptions, apply_profile, restore_cached_windows};
use profile::ProfileStore;
use window::cache;
use window::x11::X11Windows;

#[derive(Parser)]
#[command(name = "displaysnap", version, about = "Save and restore multi-monitor layouts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List saved profiles
    List,
    /// Show a profile's monitor layout
    Show { name: String },
    /// Capture the current display layout under a name
    Save { name: String },
    /// Apply a saved profile to the displays
    Apply {
        name: String,
        /// Detach connected monitors the profile does not mention
        #[arg(long)]
        disable_extra: bool,
        /// Skip saving and restoring window positions
        #[arg(long)]
        no_windows: bool,
    },
    /// Delete a saved profile
    Delete { name: String },
    /// Rename a saved profile
    Rename { old_name: String, new_name: String },
    /// Swap two profiles in the display order (zero-based indices)
    Move { from: usize, to: usize },
    /// Export all profiles to a file
    Export { path: PathBuf },
    /// Import profiles from a file, overwriting same-named entries
    Import { path: PathBuf },
    /// Show the connected display devices and their current state
    Devices,
    /// Reposition windows from the last saved window cache
    RestoreWindows,
}

fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let cli = Cli::parse();
    let mut store = ProfileStore::load(ProfileStore::default_path());

    match cli.command {
        Command::List => {
            let names = store.names();
            if names.is_empty() {
                println!("No profiles saved.");
            } else {
                for profile in store.iter() {
                    println!(
                        "{} ({} monitor(s), updated {})",
                        profile.name,
                        profile.monitors.len(),
                        profile.updated_at
                    );
                }
            }
        }
        Command::Show { name } => {
            let profile = store
                .get(&name)
                .with_context(|| format!("No profile named '{name}'"))?;
            println!("{}:", profile.name);
            for monitor in &profile.monitors {
                println!("  {monitor}");
            }
        }
        Command::Save { name } => {
            let (conn, screen_num) = connect()?;
            let screen = &conn.setup().roots[screen_num];
            let mut backend = RandrBackend::new(&conn, screen)?;
            let profile = store.save_current_as(&name, &mut backend)?;
            println!("Saved '{}' with {} monitor(s).", profile.name, profile.monitors.len());
        }
        Command::Apply {
            name,
            disable_extra,
            no_windows,
        } => {
            let profile = store
                .get(&name)
                .with_context(|| format!("No profile named '{name}'"))?
                .clone();
            let (conn, screen_num) = connect()?;
            let screen = &conn.setup().roots[screen_num];
            let mut display = RandrBackend::new(&conn, screen)?;
            let mut windows = X11Windows::new(&conn, screen)?;
            let options = ApplyOptions {
                disable_extra,
                manage_windows: !no_windows,
            };
            let report = apply_profile(
                &mut display,
                &mut windows,
                &cache::default_path(),
                &profile,
                options,
            )?;
            println!("{}", report.outcome.summary());
            if report.evacuated > 0 {
                println!("Evacuated {} window(s).", report.evacuated);
            }
            if report.restored > 0 {
                println!("Restored {} window(s).", report.restored);
            }
            for warning in &report.window_warnings {
                println!("Warning: {warning}");
            }
            if !report.outcome.success {
                bail!("Profile '{name}' was not fully applied");
            }
        }
        Command::Delete { name } => {
            if store.delete(&name)? {
                println!("Deleted '{name}'.");
            } else {
                bail!("No profile named '{name}'");
            }
        }
        Command::Rename { old_name, new_name } => {
            if store.rename(&old_name, &new_name)? {
                println!("Renamed '{old_name}' to '{new_name}'.");
            } else {
                bail!("Rename failed: '{old_name}' missing or '{new_name}' already exists");
            }
        }
        Command::Move { from, to } => {
            if store.move_profile(from, to)? {
                println!("Moved profile {from} to position {to}.");
            } else {
                bail!("Move failed: index out of range");
            }
        }
        Command::Export { path } => {
            store.export_to(&path)?;
            println!("Exported {} profile(s) to {:?}.", store.names().len(), path);
        }
        Command::Import { path } => {
            let count = store.import_from(&path)?;
            println!("Imported {count} profile(s).");
        }
        Command::Devices => {
            let (conn, screen_num) = connect()?;
            let screen = &conn.setup().roots[screen_num];
            let mut backend = RandrBackend::new(&conn, screen)?;
            let snapshot = backend.snapshot()?;
            let active = backend.active_monitors()?;
            for device in &snapshot.all_devices {
                match active.iter().find(|m| &m.device_name == device) {
                    Some(monitor) => println!("{monitor}"),
                    None => println!("{device}: connected, inactive"),
                }
            }
        }
        Command::RestoreWindows => {
            let (conn, screen_num) = connect()?;
            let screen = &conn.setup().roots[screen_num];
            let mut windows = X11Windows::new(&conn, screen)?;
            let restored = restore_cached_windows(&mut windows, &cache::default_path())?;
            println!("Restored {restored} window(s).");
        }
    }

    Ok(())
}

fn connect() -> Result<(RustConnection, usize)> {
    let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X server")?;
    info!("Connected to X11 display, screen {screen_num}");
    Ok((conn, screen_num))
}
