//! Display-configuration reconciliation
//!
//! Drives the live device state toward a desired ordered list of monitor
//! specifications: detach passes first, then configure/re-enable, then one
//! global commit. Per-device problems never abort the pass; every device
//! named by the desired layout is accounted for in exactly one outcome
//! bucket.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::display::api::{DisplayBackend, ModeSettings, StageStatus, StagedChange};
use crate::display::matching::{MatchOutcome, best_mode};
use crate::profile::MonitorSpec;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Detach connected devices the desired layout does not mention
    /// (the primary device is always spared).
    pub disable_extra: bool,
}

/// Classified result of one reconciliation pass.
///
/// The four buckets hold plain device names; human-readable reasons go to
/// `warnings`. Every device named by the desired layout lands in exactly
/// one bucket.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub success: bool,
    /// Configured or re-enabled
    pub applied: Vec<String>,
    /// Named by the layout but unknown to the OS (disconnected hardware)
    pub skipped: Vec<String>,
    /// Detached, or already in the desired detached state
    pub disabled: Vec<String>,
    /// The OS rejected the change, or a primary-protection violation
    pub failed: Vec<String>,
    pub warnings: Vec<String>,
}

impl ReconcileOutcome {
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.applied.is_empty() {
            parts.push(format!("Applied: {}", self.applied.join(", ")));
        }
        if !self.skipped.is_empty() {
            parts.push(format!("Skipped (not connected): {}", self.skipped.join(", ")));
        }
        if !self.disabled.is_empty() {
            parts.push(format!("Disabled: {}", self.disabled.join(", ")));
        }
        if !self.failed.is_empty() {
            parts.push(format!("Failed: {}", self.failed.join(", ")));
        }
        for warning in &self.warnings {
            parts.push(format!("Warning: {warning}"));
        }
        if parts.is_empty() {
            "No changes".to_string()
        } else {
            parts.join("\n")
        }
    }
}

/// Converge the live display state toward `desired`.
///
/// Hard errors are reserved for the inability to query the OS at all;
/// everything per-device is classified into the outcome buckets.
pub fn reconcile(
    backend: &mut dyn DisplayBackend,
    desired: &[MonitorSpec],
    options: ReconcileOptions,
) -> Result<ReconcileOutcome> {
    let mut outcome = ReconcileOutcome {
        success: true,
        ..Default::default()
    };

    let mut snapshot = backend.snapshot()?;

    // Rescanning hardware costs over a second, so only do it when a desired
    // monitor is physically present yet detached and must come back.
    let needs_reenable = desired.iter().any(|m| {
        m.enabled
            && !snapshot.connected.contains(&m.device_name)
            && snapshot.all_devices.contains(&m.device_name)
    });
    if needs_reenable {
        info!("Detached monitor must be re-enabled, rescanning displays");
        backend.detect()?;
        snapshot = backend.snapshot()?;
    }

    let mut staged_any = false;

    // Disable pass. Also records the skipped bucket for every desired device
    // the OS does not know about, enabled or not.
    for monitor in desired {
        if !snapshot.all_devices.contains(&monitor.device_name) {
            debug!(device = %monitor.device_name, "Device unknown to the OS, skipping");
            outcome.skipped.push(monitor.device_name.clone());
            continue;
        }
        if monitor.enabled {
            continue;
        }

        if !snapshot.connected.contains(&monitor.device_name) {
            // Already detached, idempotent no-op
            outcome.disabled.push(monitor.device_name.clone());
            continue;
        }
        if snapshot.primary.as_deref() == Some(monitor.device_name.as_str()) {
            warn!(device = %monitor.device_name, "Refusing to disable the primary monitor");
            outcome.failed.push(monitor.device_name.clone());
            outcome
                .warnings
                .push(format!("{}: primary cannot be disabled", monitor.device_name));
            outcome.success = false;
            continue;
        }

        match backend.stage(&monitor.device_name, StagedChange::Detach)? {
            StageStatus::Staged => {
                staged_any = true;
                outcome.disabled.push(monitor.device_name.clone());
            }
            StageStatus::Rejected(reason) => {
                outcome.failed.push(monitor.device_name.clone());
                outcome
                    .warnings
                    .push(format!("{}: detach rejected: {reason}", monitor.device_name));
                outcome.success = false;
            }
        }
    }

    // Optionally detach connected devices the layout does not mention.
    if options.disable_extra {
        for device in &snapshot.connected {
            if desired.iter().any(|m| &m.device_name == device) {
                continue;
            }
            if snapshot.primary.as_deref() == Some(device.as_str()) {
                continue;
            }
            match backend.stage(device, StagedChange::Detach)? {
                StageStatus::Staged => {
                    staged_any = true;
                    outcome.disabled.push(device.clone());
                }
                StageStatus::Rejected(reason) => {
                    outcome
                        .warnings
                        .push(format!("{device}: detach rejected: {reason}"));
                }
            }
        }
    }

    // Configure/re-enable pass.
    for monitor in desired {
        if !monitor.enabled || !snapshot.all_devices.contains(&monitor.device_name) {
            continue; // Handled or skipped above
        }

        let attached = snapshot.connected.contains(&monitor.device_name);
        let staged = if attached {
            stage_reconfigure(backend, monitor, &mut outcome)?
        } else {
            stage_reenable(backend, monitor, &mut outcome)?
        };

        match staged {
            Some(StageStatus::Staged) => {
                staged_any = true;
                outcome.applied.push(monitor.device_name.clone());
            }
            Some(StageStatus::Rejected(reason)) => {
                outcome.failed.push(monitor.device_name.clone());
                outcome
                    .warnings
                    .push(format!("{}: change rejected: {reason}", monitor.device_name));
                outcome.success = false;
            }
            None => {} // Already classified
        }
    }

    if staged_any {
        if !backend.commit()? {
            outcome
                .warnings
                .push("applying staged display changes failed".to_string());
            outcome.success = false;
        }
    }

    info!(
        applied = outcome.applied.len(),
        skipped = outcome.skipped.len(),
        disabled = outcome.disabled.len(),
        failed = outcome.failed.len(),
        success = outcome.success,
        "Reconciliation pass complete"
    );
    Ok(outcome)
}

/// Overwrite an attached device's current mode with the desired fields.
fn stage_reconfigure(
    backend: &mut dyn DisplayBackend,
    monitor: &MonitorSpec,
    outcome: &mut ReconcileOutcome,
) -> Result<Option<StageStatus>> {
    let Some(mut settings) = backend.current_settings(&monitor.device_name)? else {
        // Attached but no readable mode: treat like disconnected hardware
        if !outcome.skipped.contains(&monitor.device_name) {
            outcome.skipped.push(monitor.device_name.clone());
        }
        return Ok(None);
    };

    settings.width = monitor.width;
    settings.height = monitor.height;
    settings.position_x = monitor.position_x;
    settings.position_y = monitor.position_y;
    settings.refresh = monitor.refresh_rate;
    settings.orientation = monitor.orientation;
    settings.bits_per_pixel = monitor.bits_per_pixel;

    let status = backend.stage(
        &monitor.device_name,
        StagedChange::Configure {
            settings,
            make_primary: monitor.is_primary,
        },
    )?;
    Ok(Some(status))
}

/// Bring a detached device back with its stored geometry, resolving a
/// concrete mode via the matching heuristic.
fn stage_reenable(
    backend: &mut dyn DisplayBackend,
    monitor: &MonitorSpec,
    outcome: &mut ReconcileOutcome,
) -> Result<Option<StageStatus>> {
    let modes = backend.supported_modes(&monitor.device_name)?;
    let rotated = monitor.is_rotated();

    let (mode, footprint) = match best_mode(
        &modes,
        monitor.width,
        monitor.height,
        monitor.refresh_rate,
        rotated,
        true,
    ) {
        MatchOutcome::Matched(mode) => (mode, (monitor.width, monitor.height)),
        MatchOutcome::Fallback(mode) => {
            warn!(
                device = %monitor.device_name,
                requested = format!("{}x{}", monitor.width, monitor.height),
                using = format!("{}x{}", mode.width, mode.height),
                "Requested mode unavailable, falling back to highest available"
            );
            outcome.warnings.push(format!(
                "{}: {}x{} not available, using {}x{}",
                monitor.device_name, monitor.width, monitor.height, mode.width, mode.height
            ));
            // The mode list is native landscape; the desktop footprint of a
            // rotated monitor swaps it back.
            let footprint = if rotated {
                (mode.height, mode.width)
            } else {
                (mode.width, mode.height)
            };
            (mode, footprint)
        }
        MatchOutcome::NoMatch => {
            outcome.failed.push(monitor.device_name.clone());
            outcome
                .warnings
                .push(format!("{}: no display modes available", monitor.device_name));
            outcome.success = false;
            return Ok(None);
        }
    };

    let settings = ModeSettings {
        width: footprint.0,
        height: footprint.1,
        position_x: monitor.position_x,
        position_y: monitor.position_y,
        refresh: mode.refresh,
        orientation: monitor.orientation,
        bits_per_pixel: monitor.bits_per_pixel,
    };

    let status = backend.stage(
        &monitor.device_name,
        StagedChange::Configure {
            settings,
            make_primary: monitor.is_primary,
        },
    )?;
    Ok(Some(status))
}
