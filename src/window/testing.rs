//! In-memory window backend for tests

use anyhow::Result;

use crate::window::api::{MonitorRect, Rect, ShowState, WindowBackend, WindowInfo};

pub(crate) fn window(
    id: u32,
    title: &str,
    process: &str,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
) -> WindowInfo {
    WindowInfo {
        id,
        title: title.to_string(),
        process: process.to_string(),
        rect: Rect {
            x,
            y,
            width,
            height,
        },
        state: ShowState::Normal,
    }
}

pub(crate) fn monitor(x: i32, y: i32, width: u32, height: u32, primary: bool) -> MonitorRect {
    let rect = Rect {
        x,
        y,
        width,
        height,
    };
    MonitorRect {
        rect,
        work_area: rect,
        primary,
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeWindows {
    pub windows: Vec<WindowInfo>,
    pub monitors: Vec<MonitorRect>,
    /// When set, every enumeration fails (window manager unreachable)
    pub fail_enumeration: bool,
    pub moves: Vec<(u32, Rect)>,
}

impl FakeWindows {
    pub fn window_rect(&self, id: u32) -> Rect {
        self.windows
            .iter()
            .find(|w| w.id == id)
            .map(|w| w.rect)
            .expect("no such window")
    }
}

impl WindowBackend for FakeWindows {
    fn list_windows(&mut self) -> Result<Vec<WindowInfo>> {
        if self.fail_enumeration {
            anyhow::bail!("window enumeration unavailable");
        }
        Ok(self.windows.clone())
    }

    fn monitors(&mut self) -> Result<Vec<MonitorRect>> {
        if self.fail_enumeration {
            anyhow::bail!("monitor enumeration unavailable");
        }
        Ok(self.monitors.clone())
    }

    fn is_valid(&mut self, id: u32) -> bool {
        self.windows.iter().any(|w| w.id == id)
    }

    fn move_window(&mut self, id: u32, rect: Rect) -> Result<()> {
        let window = self
            .windows
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| anyhow::anyhow!("no such window {id}"))?;
        window.rect = rect;
        self.moves.push((id, rect));
        Ok(())
    }

    fn set_show_state(&mut self, id: u32, state: ShowState) -> Result<()> {
        let window = self
            .windows
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| anyhow::anyhow!("no such window {id}"))?;
        if state != ShowState::Minimized {
            window.state = state;
        }
        Ok(())
    }
}
