//! Window-management capability

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A rectangle in desktop coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn midpoint(&self) -> (i32, i32) {
        (
            self.x + self.width as i32 / 2,
            self.y + self.height as i32 / 2,
        )
    }

    pub fn contains(&self, point: (i32, i32)) -> bool {
        point.0 >= self.x
            && point.0 < self.x + self.width as i32
            && point.1 >= self.y
            && point.1 < self.y + self.height as i32
    }
}

/// Window show state. Minimized geometry is stale and never restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowState {
    Normal,
    Minimized,
    Maximized,
}

/// One top-level window as reported by the OS, before eligibility filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    /// Opaque handle; may be reused by the OS after the window closes
    pub id: u32,
    pub title: String,
    pub process: String,
    pub rect: Rect,
    pub state: ShowState,
}

/// One monitor's rectangle plus its usable work area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorRect {
    pub rect: Rect,
    pub work_area: Rect,
    pub primary: bool,
}

impl MonitorRect {
    /// Top-left corner, the stable identity for window association
    pub fn origin(&self) -> (i32, i32) {
        (self.rect.x, self.rect.y)
    }
}

/// OS window-management capability
///
/// Batch consumers call `list_windows` and `monitors` once per batch and
/// reuse the result for every item, trading a small mid-batch staleness risk
/// for an order-of-magnitude reduction in OS round-trips.
pub trait WindowBackend {
    /// Enumerate visible top-level windows. Implementations build any
    /// per-window lookup caches fresh inside this call; nothing survives
    /// across calls.
    fn list_windows(&mut self) -> Result<Vec<WindowInfo>>;

    /// Current monitor rectangle list.
    fn monitors(&mut self) -> Result<Vec<MonitorRect>>;

    /// Whether the handle still refers to a live window.
    fn is_valid(&mut self, id: u32) -> bool;

    /// Move/resize a window to the given rectangle.
    fn move_window(&mut self, id: u32, rect: Rect) -> Result<()>;

    /// Reapply a window's show state. `Normal` clears the maximized state,
    /// `Maximized` sets it; `Minimized` is never reapplied and is a no-op.
    fn set_show_state(&mut self, id: u32, state: ShowState) -> Result<()>;
}
