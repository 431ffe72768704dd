//! EWMH implementation of the window capability
//!
//! Atoms are interned once at construction to avoid repeated roundtrips.
//! Process names come from `_NET_WM_PID` plus `/proc/<pid>/comm`, cached in
//! a context object that lives for exactly one enumeration pass.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::xproto::{
    Atom, AtomEnum, CLIENT_MESSAGE_EVENT, ClientMessageData, ClientMessageEvent,
    ConfigureWindowAux, ConnectionExt as _, EventMask, MapState, Screen, Window,
};
use x11rb::rust_connection::RustConnection;

use crate::constants::ewmh;
use crate::window::api::{MonitorRect, Rect, ShowState, WindowBackend, WindowInfo};

/// Pre-cached X11 atoms to avoid repeated roundtrips
pub struct CachedAtoms {
    net_client_list: Atom,
    net_wm_name: Atom,
    utf8_string: Atom,
    net_wm_pid: Atom,
    net_wm_state: Atom,
    net_wm_state_hidden: Atom,
    net_wm_state_max_vert: Atom,
    net_wm_state_max_horz: Atom,
    net_wm_window_type: Atom,
    net_wm_window_type_normal: Atom,
    net_wm_window_type_dialog: Atom,
    net_workarea: Atom,
}

fn intern(conn: &RustConnection, name: &str) -> Result<Atom> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .with_context(|| format!("Failed to intern {name} atom"))?
        .reply()
        .with_context(|| format!("Failed to get reply for {name} atom"))?
        .atom)
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        Ok(Self {
            net_client_list: intern(conn, "_NET_CLIENT_LIST")?,
            net_wm_name: intern(conn, "_NET_WM_NAME")?,
            utf8_string: intern(conn, "UTF8_STRING")?,
            net_wm_pid: intern(conn, "_NET_WM_PID")?,
            net_wm_state: intern(conn, "_NET_WM_STATE")?,
            net_wm_state_hidden: intern(conn, "_NET_WM_STATE_HIDDEN")?,
            net_wm_state_max_vert: intern(conn, "_NET_WM_STATE_MAXIMIZED_VERT")?,
            net_wm_state_max_horz: intern(conn, "_NET_WM_STATE_MAXIMIZED_HORZ")?,
            net_wm_window_type: intern(conn, "_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_normal: intern(conn, "_NET_WM_WINDOW_TYPE_NORMAL")?,
            net_wm_window_type_dialog: intern(conn, "_NET_WM_WINDOW_TYPE_DIALOG")?,
            net_workarea: intern(conn, "_NET_WORKAREA")?,
        })
    }
}

/// pid → process name lookups for one enumeration pass.
///
/// The cache is an optimization only and must not outlive the pass; a fresh
/// context is built inside every `list_windows` call.
struct ProcessNameContext {
    names: HashMap<u32, String>,
}

impl ProcessNameContext {
    fn new() -> Self {
        Self {
            names: HashMap::new(),
        }
    }

    fn name_for(&mut self, pid: u32) -> String {
        self.names
            .entry(pid)
            .or_insert_with(|| {
                fs::read_to_string(format!("/proc/{pid}/comm"))
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default()
            })
            .clone()
    }
}

pub struct X11Windows<'a> {
    conn: &'a RustConnection,
    root: Window,
    atoms: CachedAtoms,
}

impl<'a> X11Windows<'a> {
    pub fn new(conn: &'a RustConnection, screen: &Screen) -> Result<Self> {
        Ok(Self {
            conn,
            root: screen.root,
            atoms: CachedAtoms::new(conn)?,
        })
    }

    fn atom_list(&self, window: Window, property: Atom) -> Result<Vec<Atom>> {
        let prop = self
            .conn
            .get_property(false, window, property, AtomEnum::ATOM, 0, 32)
            .context("Failed to query atom list property")?
            .reply()
            .context("Failed to get atom list reply")?;
        Ok(prop.value32().map(|v| v.collect()).unwrap_or_default())
    }

    fn title(&self, window: Window) -> Result<String> {
        let prop = self
            .conn
            .get_property(
                false,
                window,
                self.atoms.net_wm_name,
                self.atoms.utf8_string,
                0,
                1024,
            )
            .context("Failed to query _NET_WM_NAME")?
            .reply()
            .context("Failed to get _NET_WM_NAME reply")?;
        if !prop.value.is_empty() {
            return Ok(String::from_utf8_lossy(&prop.value).into_owned());
        }
        let prop = self
            .conn
            .get_property(false, window, AtomEnum::WM_NAME, AtomEnum::STRING, 0, 1024)
            .context("Failed to query WM_NAME")?
            .reply()
            .context("Failed to get WM_NAME reply")?;
        Ok(String::from_utf8_lossy(&prop.value).into_owned())
    }

    fn pid(&self, window: Window) -> Result<Option<u32>> {
        let prop = self
            .conn
            .get_property(
                false,
                window,
                self.atoms.net_wm_pid,
                AtomEnum::CARDINAL,
                0,
                1,
            )
            .context("Failed to query _NET_WM_PID")?
            .reply()
            .context("Failed to get _NET_WM_PID reply")?;
        Ok(prop.value32().and_then(|mut v| v.next()))
    }

    fn show_state(&self, window: Window) -> Result<ShowState> {
        let state = self.atom_list(window, self.atoms.net_wm_state)?;
        if state.contains(&self.atoms.net_wm_state_hidden) {
            return Ok(ShowState::Minimized);
        }
        if state.contains(&self.atoms.net_wm_state_max_vert)
            && state.contains(&self.atoms.net_wm_state_max_horz)
        {
            return Ok(ShowState::Maximized);
        }
        Ok(ShowState::Normal)
    }

    /// Tool/dock/panel windows advertise a non-normal window type.
    fn is_ordinary_type(&self, window: Window) -> Result<bool> {
        let types = self.atom_list(window, self.atoms.net_wm_window_type)?;
        Ok(types.is_empty()
            || types.contains(&self.atoms.net_wm_window_type_normal)
            || types.contains(&self.atoms.net_wm_window_type_dialog))
    }

    fn geometry(&self, window: Window) -> Result<Rect> {
        let geometry = self
            .conn
            .get_geometry(window)
            .context("Failed to request geometry")?
            .reply()
            .context("Failed to get geometry reply")?;
        let translated = self
            .conn
            .translate_coordinates(window, self.root, 0, 0)
            .context("Failed to translate coordinates")?
            .reply()
            .context("Failed to get translated coordinates")?;
        Ok(Rect {
            x: i32::from(translated.dst_x),
            y: i32::from(translated.dst_y),
            width: u32::from(geometry.width),
            height: u32::from(geometry.height),
        })
    }

    fn examine(&self, window: Window, ctx: &mut ProcessNameContext) -> Result<Option<WindowInfo>> {
        let attributes = self
            .conn
            .get_window_attributes(window)
            .context("Failed to request window attributes")?
            .reply()
            .context("Failed to get window attributes reply")?;
        if attributes.map_state != MapState::VIEWABLE {
            return Ok(None);
        }
        if !self.is_ordinary_type(window)? {
            return Ok(None);
        }

        let process = match self.pid(window)? {
            Some(pid) => ctx.name_for(pid),
            None => String::new(),
        };
        Ok(Some(WindowInfo {
            id: window,
            title: self.title(window)?,
            process,
            rect: self.geometry(window)?,
            state: self.show_state(window)?,
        }))
    }

    /// Desktop-wide work area for the current desktop, if the WM exports it.
    fn workarea(&self) -> Result<Option<Rect>> {
        let prop = self
            .conn
            .get_property(
                false,
                self.root,
                self.atoms.net_workarea,
                AtomEnum::CARDINAL,
                0,
                4,
            )
            .context("Failed to query _NET_WORKAREA")?
            .reply()
            .context("Failed to get _NET_WORKAREA reply")?;
        let values: Vec<u32> = prop.value32().map(|v| v.collect()).unwrap_or_default();
        if values.len() < 4 {
            return Ok(None);
        }
        Ok(Some(Rect {
            x: values[0] as i32,
            y: values[1] as i32,
            width: values[2],
            height: values[3],
        }))
    }
}

fn intersect(a: &Rect, b: &Rect) -> Option<Rect> {
    let left = a.x.max(b.x);
    let top = a.y.max(b.y);
    let right = (a.x + a.width as i32).min(b.x + b.width as i32);
    let bottom = (a.y + a.height as i32).min(b.y + b.height as i32);
    if right <= left || bottom <= top {
        return None;
    }
    Some(Rect {
        x: left,
        y: top,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    })
}

impl WindowBackend for X11Windows<'_> {
    fn list_windows(&mut self) -> Result<Vec<WindowInfo>> {
        let prop = self
            .conn
            .get_property(
                false,
                self.root,
                self.atoms.net_client_list,
                AtomEnum::WINDOW,
                0,
                u32::MAX,
            )
            .context("Failed to query _NET_CLIENT_LIST")?
            .reply()
            .context("Failed to get _NET_CLIENT_LIST reply")?;
        let ids: Vec<Window> = prop.value32().map(|v| v.collect()).unwrap_or_default();

        // Fresh per-pass context; nothing is cached across calls
        let mut ctx = ProcessNameContext::new();
        let mut windows = Vec::new();
        for id in ids {
            // A window can vanish between the list query and its inspection
            match self.examine(id, &mut ctx) {
                Ok(Some(info)) => windows.push(info),
                Ok(None) => {}
                Err(e) => debug!(window = id, error = %e, "Skipping uninspectable window"),
            }
        }
        Ok(windows)
    }

    fn monitors(&mut self) -> Result<Vec<MonitorRect>> {
        let reply = self
            .conn
            .randr_get_monitors(self.root, true)
            .context("Failed to request monitor list")?
            .reply()
            .context("Failed to get monitor list reply")?;
        let workarea = self.workarea()?;

        Ok(reply
            .monitors
            .iter()
            .map(|m| {
                let rect = Rect {
                    x: i32::from(m.x),
                    y: i32::from(m.y),
                    width: u32::from(m.width),
                    height: u32::from(m.height),
                };
                let work_area = workarea
                    .as_ref()
                    .and_then(|wa| intersect(&rect, wa))
                    .unwrap_or(rect);
                MonitorRect {
                    rect,
                    work_area,
                    primary: m.primary,
                }
            })
            .collect())
    }

    fn is_valid(&mut self, id: u32) -> bool {
        self.conn
            .get_window_attributes(id)
            .map(|cookie| cookie.reply().is_ok())
            .unwrap_or(false)
    }

    fn set_show_state(&mut self, id: u32, state: ShowState) -> Result<()> {
        let action = match state {
            ShowState::Maximized => ewmh::STATE_ADD,
            ShowState::Normal => ewmh::STATE_REMOVE,
            // Minimized geometry is stale; never reapply it
            ShowState::Minimized => return Ok(()),
        };

        // Send _NET_WM_STATE client message to the root window
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window: id,
            type_: self.atoms.net_wm_state,
            data: ClientMessageData::from([
                action,
                self.atoms.net_wm_state_max_vert,
                self.atoms.net_wm_state_max_horz,
                ewmh::SOURCE_PAGER,
                0,
            ]),
        };
        self.conn
            .send_event(
                false,
                self.root,
                EventMask::SUBSTRUCTURE_NOTIFY | EventMask::SUBSTRUCTURE_REDIRECT,
                &event,
            )
            .with_context(|| format!("Failed to send _NET_WM_STATE event for window {id}"))?;
        self.conn
            .flush()
            .context("Failed to flush after changing window state")?;
        Ok(())
    }

    fn move_window(&mut self, id: u32, rect: Rect) -> Result<()> {
        self.conn
            .configure_window(
                id,
                &ConfigureWindowAux::new()
                    .x(rect.x)
                    .y(rect.y)
                    .width(rect.width)
                    .height(rect.height),
            )
            .with_context(|| format!("Failed to move window {id}"))?;
        self.conn
            .flush()
            .context("Failed to flush after moving window")?;
        Ok(())
    }
}
