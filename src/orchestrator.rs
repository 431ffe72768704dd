//! Profile application sequencing
//!
//! Evacuate windows off monitors about to disappear, reconcile the display
//! configuration, then repatriate windows onto monitors that just came back.
//! Window management is strictly best-effort: a window-layout problem never
//! blocks or fails the display reconciliation.

use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

use crate::display::api::DisplayBackend;
use crate::display::reconcile::{ReconcileOptions, ReconcileOutcome, reconcile};
use crate::profile::Profile;
use crate::window::api::WindowBackend;
use crate::window::{cache, restore, tracker};

#[derive(Debug, Clone, Copy)]
pub struct ApplyOptions {
    /// Detach connected monitors the profile does not mention
    pub disable_extra: bool,
    /// Save/evacuate/restore window positions around the reconciliation
    pub manage_windows: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            disable_extra: false,
            manage_windows: true,
        }
    }
}

#[derive(Debug)]
pub struct ApplyReport {
    pub outcome: ReconcileOutcome,
    pub evacuated: usize,
    pub restored: usize,
    /// Window-management problems, surfaced but never fatal
    pub window_warnings: Vec<String>,
}

/// Apply a profile end to end.
pub fn apply_profile(
    display: &mut dyn DisplayBackend,
    windows: &mut dyn WindowBackend,
    cache_path: &Path,
    profile: &Profile,
    options: ApplyOptions,
) -> Result<ApplyReport> {
    info!(profile = %profile.name, "Applying profile");

    let current_origins: HashSet<(i32, i32)> = display
        .active_monitors()?
        .iter()
        .map(|m| m.origin())
        .collect();
    let desired_origins: HashSet<(i32, i32)> = profile
        .monitors
        .iter()
        .filter(|m| m.enabled)
        .map(|m| m.origin())
        .collect();
    let vanishing: HashSet<(i32, i32)> = current_origins
        .difference(&desired_origins)
        .copied()
        .collect();

    let mut evacuated = 0;
    let mut window_warnings = Vec::new();

    // Snapshot and evacuate only when monitors are about to go away, so the
    // cached layout reflects the richer arrangement worth restoring later.
    if options.manage_windows && !vanishing.is_empty() {
        match evacuate_phase(windows, cache_path, &vanishing) {
            Ok((moved, mut warnings)) => {
                evacuated = moved;
                window_warnings.append(&mut warnings);
            }
            Err(e) => {
                warn!(error = %e, "Window evacuation failed, continuing with reconciliation");
                window_warnings.push(format!("evacuation failed: {e}"));
            }
        }
    }

    let reconcile_options = ReconcileOptions {
        disable_extra: options.disable_extra,
    };
    let outcome = reconcile(display, &profile.monitors, reconcile_options)?;

    let mut restored = 0;
    if options.manage_windows && outcome.success {
        match restore_phase(display, windows, cache_path, &current_origins) {
            Ok((count, mut warnings)) => {
                restored = count;
                window_warnings.append(&mut warnings);
            }
            Err(e) => {
                warn!(error = %e, "Window restore failed");
                window_warnings.push(format!("restore failed: {e}"));
            }
        }
    }

    Ok(ApplyReport {
        outcome,
        evacuated,
        restored,
        window_warnings,
    })
}

fn evacuate_phase(
    windows: &mut dyn WindowBackend,
    cache_path: &Path,
    vanishing: &HashSet<(i32, i32)>,
) -> Result<(usize, Vec<String>)> {
    let snapshot = tracker::snapshot(windows)?;
    cache::save(cache_path, &snapshot)?;
    let report = restore::evacuate(windows, vanishing)?;
    Ok((report.moved, report.warnings))
}

fn restore_phase(
    display: &mut dyn DisplayBackend,
    windows: &mut dyn WindowBackend,
    cache_path: &Path,
    previous_origins: &HashSet<(i32, i32)>,
) -> Result<(usize, Vec<String>)> {
    let new_origins: HashSet<(i32, i32)> = display
        .active_monitors()?
        .iter()
        .map(|m| m.origin())
        .collect();
    let newly_enabled: HashSet<(i32, i32)> = new_origins
        .difference(previous_origins)
        .copied()
        .collect();
    if newly_enabled.is_empty() {
        return Ok((0, Vec::new()));
    }

    let cached = cache::load(cache_path);
    let report = restore::restore(windows, &cached, &newly_enabled)?;
    Ok((report.restored, report.warnings))
}

/// Restore windows against whatever monitors are currently present, driven
/// from the cache left by an earlier evacuation.
pub fn restore_cached_windows(
    windows: &mut dyn WindowBackend,
    cache_path: &Path,
) -> Result<usize> {
    let available: HashSet<(i32, i32)> = windows.monitors()?.iter().map(|m| m.origin()).collect();
    let cached = cache::load(cache_path);
    let report = restore::restore(windows, &cached, &available)?;
    Ok(report.restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::api::{DisplayMode, ModeSettings};
    use crate::display::testing::{FakeDevice, FakeDisplay};
    use crate::profile::MonitorSpec;
    use crate::window::testing::{FakeWindows, monitor, window};
    use std::fs;
    use std::path::PathBuf;

    fn settings(width: u16, height: u16, x: i32) -> ModeSettings {
        ModeSettings {
            width,
            height,
            position_x: x,
            position_y: 0,
            refresh: 60,
            orientation: 0,
            bits_per_pixel: 24,
        }
    }

    fn mode(width: u16, height: u16) -> DisplayMode {
        DisplayMode {
            width,
            height,
            refresh: 60,
            bits_per_pixel: 24,
        }
    }

    fn spec(name: &str, x: i32, enabled: bool) -> MonitorSpec {
        MonitorSpec {
            device_name: name.to_string(),
            device_string: name.to_string(),
            width: 1920,
            height: 1080,
            position_x: x,
            position_y: 0,
            refresh_rate: 60,
            orientation: 0,
            bits_per_pixel: 24,
            is_primary: x == 0,
            enabled,
        }
    }

    fn profile(name: &str, monitors: Vec<MonitorSpec>) -> Profile {
        Profile {
            name: name.to_string(),
            monitors,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn dual_display() -> FakeDisplay {
        let mut display = FakeDisplay::default();
        display.devices.insert(
            "DP-1".to_string(),
            FakeDevice::attached(settings(1920, 1080, 0), vec![mode(1920, 1080)]),
        );
        display.devices.insert(
            "HDMI-1".to_string(),
            FakeDevice::attached(settings(1920, 1080, 1920), vec![mode(1920, 1080)]),
        );
        display.primary = Some("DP-1".to_string());
        display
    }

    fn dual_windows() -> FakeWindows {
        let mut backend = FakeWindows::default();
        backend.monitors = vec![
            monitor(0, 0, 1920, 1080, true),
            monitor(1920, 0, 1920, 1080, false),
        ];
        backend.windows = vec![
            window(1, "editor", "code", 2100, 50, 800, 600),
            window(2, "browser", "firefox", 100, 100, 1000, 700),
        ];
        backend
    }

    fn temp_cache(tag: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("displaysnap-orch-{tag}-{}.json", std::process::id()));
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn shrinking_layout_evacuates_then_growing_layout_restores() {
        let mut display = dual_display();
        let mut windows = dual_windows();
        let cache_path = temp_cache("cycle");

        // Shrink to the primary only
        let single = profile("single", vec![spec("DP-1", 0, true), spec("HDMI-1", 1920, false)]);
        let report =
            apply_profile(&mut display, &mut windows, &cache_path, &single, ApplyOptions::default())
                .unwrap();
        assert!(report.outcome.success);
        assert_eq!(report.evacuated, 1);
        assert!(windows.window_rect(1).x < 1920);

        // The second monitor is gone now as far as window placement goes
        windows.monitors.truncate(1);

        // Grow back to both monitors
        windows.monitors.push(monitor(1920, 0, 1920, 1080, false));
        let dual = profile("dual", vec![spec("DP-1", 0, true), spec("HDMI-1", 1920, true)]);
        let report =
            apply_profile(&mut display, &mut windows, &cache_path, &dual, ApplyOptions::default())
                .unwrap();
        assert!(report.outcome.success);
        assert_eq!(report.restored, 1);
        assert_eq!(windows.window_rect(1).x, 2100);
        let _ = fs::remove_file(&cache_path);
    }

    #[test]
    fn window_failure_never_fails_reconciliation() {
        let mut display = dual_display();
        let mut windows = dual_windows();
        windows.fail_enumeration = true;
        let cache_path = temp_cache("winfail");

        let single = profile("single", vec![spec("DP-1", 0, true), spec("HDMI-1", 1920, false)]);
        let report =
            apply_profile(&mut display, &mut windows, &cache_path, &single, ApplyOptions::default())
                .unwrap();
        assert!(report.outcome.success);
        assert_eq!(report.evacuated, 0);
        assert!(!report.window_warnings.is_empty());
        assert!(!display.devices["HDMI-1"].attached);
        let _ = fs::remove_file(&cache_path);
    }

    #[test]
    fn window_management_can_be_disabled_entirely() {
        let mut display = dual_display();
        let mut windows = dual_windows();
        let cache_path = temp_cache("nowin");

        let single = profile("single", vec![spec("DP-1", 0, true), spec("HDMI-1", 1920, false)]);
        let options = ApplyOptions {
            manage_windows: false,
            ..Default::default()
        };
        let report =
            apply_profile(&mut display, &mut windows, &cache_path, &single, options).unwrap();
        assert!(report.outcome.success);
        assert_eq!(report.evacuated, 0);
        assert!(windows.moves.is_empty());
        assert!(!cache_path.exists());
        let _ = fs::remove_file(&cache_path);
    }

    #[test]
    fn expanding_layout_does_not_snapshot_or_evacuate() {
        let mut display = dual_display();
        display.devices.get_mut("HDMI-1").unwrap().detach();
        let mut windows = dual_windows();
        windows.monitors.truncate(1);
        windows.windows.truncate(1);
        let cache_path = temp_cache("expand");

        let dual = profile("dual", vec![spec("DP-1", 0, true), spec("HDMI-1", 1920, true)]);
        let report =
            apply_profile(&mut display, &mut windows, &cache_path, &dual, ApplyOptions::default())
                .unwrap();
        assert!(report.outcome.success);
        assert_eq!(report.evacuated, 0);
        // No monitors vanished, so no snapshot was written
        assert!(!cache_path.exists());
        let _ = fs::remove_file(&cache_path);
    }

    #[test]
    fn restore_cached_windows_uses_current_monitors() {
        let mut windows = dual_windows();
        let cache_path = temp_cache("cachedrestore");
        let snapshot = tracker::snapshot(&mut windows).unwrap();
        cache::save(&cache_path, &snapshot).unwrap();

        // Displace the editor, then restore from cache
        windows
            .move_window(1, crate::window::api::Rect { x: 10, y: 10, width: 800, height: 600 })
            .unwrap();
        let restored = restore_cached_windows(&mut windows, &cache_path).unwrap();
        assert_eq!(restored, 2);
        assert_eq!(windows.window_rect(1).x, 2100);
        let _ = fs::remove_file(&cache_path);
    }
}
