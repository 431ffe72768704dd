//! Window evacuation and restoration
//!
//! Evacuation relocates windows off monitors about to be detached onto the
//! primary work area; restoration returns them once their monitor is back.
//! Both are best-effort: individual failures become warnings, never errors
//! that could block a display reconciliation.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::constants::evacuate::{BASE_OFFSET, EDGE_MARGIN, STAGGER_SLOTS, STAGGER_STEP};
use crate::window::api::{Rect, ShowState, WindowBackend};
use crate::window::tracker::{WindowSnapshot, is_eligible, resolve_monitor};

#[derive(Debug, Default)]
pub struct EvacuationReport {
    pub moved: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

/// Relocate every eligible window sitting on one of the given monitor
/// origins onto the primary work area.
///
/// The target position staggers by window id so repeated evacuations do not
/// stack perfectly, and is clamped so the window stays fully inside the
/// work area.
pub fn evacuate(
    backend: &mut dyn WindowBackend,
    origins: &HashSet<(i32, i32)>,
) -> Result<EvacuationReport> {
    let mut report = EvacuationReport::default();
    if origins.is_empty() {
        return Ok(report);
    }

    let monitors = backend.monitors()?;
    let windows = backend.list_windows()?;
    let Some(primary) = monitors.iter().find(|m| m.primary).copied() else {
        report.warnings.push("no primary monitor to evacuate onto".to_string());
        return Ok(report);
    };

    for window in windows.iter().filter(|w| is_eligible(w)) {
        if !origins.contains(&resolve_monitor(&window.rect, &monitors)) {
            continue;
        }
        let target = evacuation_rect(window.id, &window.rect, &primary.work_area);
        match backend.move_window(window.id, target) {
            Ok(()) => {
                debug!(window = window.id, title = %window.title, "Evacuated window to primary");
                report.moved += 1;
            }
            Err(e) => report
                .warnings
                .push(format!("failed to move window {} ({}): {e}", window.id, window.title)),
        }
    }
    info!(moved = report.moved, "Evacuation complete");
    Ok(report)
}

fn evacuation_rect(id: u32, current: &Rect, work: &Rect) -> Rect {
    let stagger = (id % STAGGER_SLOTS) as i32 * STAGGER_STEP;
    let mut x = work.x + BASE_OFFSET + stagger;
    let mut y = work.y + BASE_OFFSET + stagger;

    // Keep the window fully inside the work area
    if x + current.width as i32 > work.x + work.width as i32 {
        x = work.x + work.width as i32 - current.width as i32 - EDGE_MARGIN;
    }
    if y + current.height as i32 > work.y + work.height as i32 {
        y = work.y + work.height as i32 - current.height as i32 - EDGE_MARGIN;
    }
    Rect {
        x: x.max(work.x),
        y: y.max(work.y),
        width: current.width,
        height: current.height,
    }
}

/// Return saved windows to their captured rectangles and show states, for
/// every window whose monitor origin is in `available`.
///
/// Identity is best-effort: the saved handle is used if still valid,
/// otherwise a (title, process) lookup built from one fresh enumeration.
/// Two live windows sharing both fields can mismatch; the first encountered
/// wins, a known limitation. Windows captured minimized keep their stale
/// geometry and are not repositioned.
pub fn restore(
    backend: &mut dyn WindowBackend,
    saved: &[WindowSnapshot],
    available: &HashSet<(i32, i32)>,
) -> Result<RestoreReport> {
    let mut report = RestoreReport::default();
    if saved.is_empty() || available.is_empty() {
        return Ok(report);
    }

    let windows = backend.list_windows()?;
    let live_ids: HashSet<u32> = windows.iter().map(|w| w.id).collect();
    let mut by_identity: HashMap<(&str, &str), u32> = HashMap::new();
    for window in &windows {
        by_identity
            .entry((window.title.as_str(), window.process.as_str()))
            .or_insert(window.id);
    }

    for snap in saved {
        if !available.contains(&snap.monitor_origin()) {
            // Monitor still absent: leave the window where it is
            report.skipped += 1;
            continue;
        }
        if snap.state == ShowState::Minimized {
            report.skipped += 1;
            continue;
        }

        let target = if live_ids.contains(&snap.handle) && backend.is_valid(snap.handle) {
            Some(snap.handle)
        } else {
            by_identity
                .get(&(snap.title.as_str(), snap.process_name.as_str()))
                .copied()
        };
        let Some(id) = target else {
            debug!(title = %snap.title, "Saved window no longer exists, skipping");
            report.skipped += 1;
            continue;
        };

        match backend.move_window(id, snap.rect()) {
            Ok(()) => {
                debug!(window = id, title = %snap.title, x = snap.x, y = snap.y, "Restored window");
                report.restored += 1;
                // Reapply the captured show state so a maximized window
                // comes back maximized rather than floating at its old size
                if let Err(e) = backend.set_show_state(id, snap.state) {
                    report.warnings.push(format!(
                        "failed to restore state of window {} ({}): {e}",
                        id, snap.title
                    ));
                }
            }
            Err(e) => report
                .warnings
                .push(format!("failed to restore window {} ({}): {e}", id, snap.title)),
        }
    }
    info!(
        restored = report.restored,
        skipped = report.skipped,
        "Window restore complete"
    );
    Ok(report)
}
