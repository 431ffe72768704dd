//! Window position tracking
//!
//! Snapshots every eligible top-level window together with the origin of the
//! monitor it sits on. Monitor association is midpoint containment against a
//! rectangle list fetched once per batch, rather than a per-window OS query.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::denylist;
use crate::window::api::{MonitorRect, Rect, ShowState, WindowBackend, WindowInfo};

/// Saved placement of one window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    /// Window handle at capture time; may be stale by restore time
    pub handle: u32,
    pub title: String,
    pub process_name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub state: ShowState,
    /// Origin of the monitor the window was judged to be on
    pub monitor_x: i32,
    pub monitor_y: i32,
}

impl WindowSnapshot {
    pub fn rect(&self) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }

    pub fn monitor_origin(&self) -> (i32, i32) {
        (self.monitor_x, self.monitor_y)
    }
}

/// Whether a window is a real user window rather than shell furniture.
pub fn is_eligible(window: &WindowInfo) -> bool {
    if window.title.is_empty() {
        return false;
    }
    if denylist::TITLES.contains(&window.title.as_str()) {
        return false;
    }
    if denylist::PROCESSES.contains(&window.process.as_str()) {
        return false;
    }
    true
}

/// Resolve which monitor a rectangle sits on by midpoint containment.
/// Falls back to the primary monitor's origin when the midpoint is off
/// every monitor (window mid-drag, or left behind on a dead coordinate).
pub fn resolve_monitor(rect: &Rect, monitors: &[MonitorRect]) -> (i32, i32) {
    let midpoint = rect.midpoint();
    for monitor in monitors {
        if monitor.rect.contains(midpoint) {
            return monitor.origin();
        }
    }
    monitors
        .iter()
        .find(|m| m.primary)
        .or_else(|| monitors.first())
        .map(|m| m.origin())
        .unwrap_or((0, 0))
}

/// Capture the placement of every eligible window.
pub fn snapshot(backend: &mut dyn WindowBackend) -> Result<Vec<WindowSnapshot>> {
    let monitors = backend.monitors()?;
    let windows = backend.list_windows()?;

    let snapshots: Vec<WindowSnapshot> = windows
        .iter()
        .filter(|w| is_eligible(w))
        .map(|w| {
            let (monitor_x, monitor_y) = resolve_monitor(&w.rect, &monitors);
            WindowSnapshot {
                handle: w.id,
                title: w.title.clone(),
                process_name: w.process.clone(),
                x: w.rect.x,
                y: w.rect.y,
                width: w.rect.width,
                height: w.rect.height,
                state: w.state,
                monitor_x,
                monitor_y,
            }
        })
        .collect();
    debug!(
        captured = snapshots.len(),
        total = windows.len(),
        "Captured window positions"
    );
    Ok(snapshots)
}
