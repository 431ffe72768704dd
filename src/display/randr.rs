//! RandR implementation of the display capability
//!
//! Output names are the device identities. Staged changes accumulate in the
//! backend and are applied in one pass under a server grab, so the desktop
//! reshapes once rather than flickering per device.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{ConnectionExt as _, Screen, Window};
use x11rb::rust_connection::RustConnection;

use crate::constants::screen::{ASSUMED_DPI, MM_PER_INCH_X10};
use crate::display::api::{
    DeviceSnapshot, DisplayBackend, DisplayMode, ModeSettings, StageStatus, StagedChange,
};
use crate::profile::MonitorSpec;

pub struct RandrBackend<'a> {
    conn: &'a RustConnection,
    root: Window,
    root_depth: u8,
    pending: Vec<PendingChange>,
}

struct PendingChange {
    output: randr::Output,
    name: String,
    action: PendingAction,
}

enum PendingAction {
    Detach,
    Configure {
        settings: ModeSettings,
        /// Concrete RandR mode resolved at stage time
        mode: randr::Mode,
        make_primary: bool,
    },
}

impl<'a> RandrBackend<'a> {
    pub fn new(conn: &'a RustConnection, screen: &Screen) -> Result<Self> {
        conn.randr_query_version(1, 5)
            .context("Failed to query RandR version")?
            .reply()
            .context("RandR extension unavailable")?;
        Ok(Self {
            conn,
            root: screen.root,
            root_depth: screen.root_depth,
            pending: Vec::new(),
        })
    }

    fn resources(&self) -> Result<randr::GetScreenResourcesCurrentReply> {
        self.conn
            .randr_get_screen_resources_current(self.root)
            .context("Failed to request screen resources")?
            .reply()
            .context("Failed to get screen resources reply")
    }

    fn output_info(
        &self,
        output: randr::Output,
        config_timestamp: u32,
    ) -> Result<randr::GetOutputInfoReply> {
        self.conn
            .randr_get_output_info(output, config_timestamp)
            .context("Failed to request output info")?
            .reply()
            .context("Failed to get output info reply")
    }

    fn crtc_info(
        &self,
        crtc: randr::Crtc,
        config_timestamp: u32,
    ) -> Result<randr::GetCrtcInfoReply> {
        self.conn
            .randr_get_crtc_info(crtc, config_timestamp)
            .context("Failed to request crtc info")?
            .reply()
            .context("Failed to get crtc info reply")
    }

    /// Locate an output by its device name. None if no such connector.
    fn find_output(
        &self,
        resources: &randr::GetScreenResourcesCurrentReply,
        device: &str,
    ) -> Result<Option<(randr::Output, randr::GetOutputInfoReply)>> {
        for &output in &resources.outputs {
            let info = self.output_info(output, resources.config_timestamp)?;
            if String::from_utf8_lossy(&info.name) == device {
                return Ok(Some((output, info)));
            }
        }
        Ok(None)
    }

    fn primary_output(&self) -> Result<randr::Output> {
        Ok(self
            .conn
            .randr_get_output_primary(self.root)
            .context("Failed to request primary output")?
            .reply()
            .context("Failed to get primary output reply")?
            .output)
    }

    /// Whether the output is actively driving a monitor.
    fn is_active(
        &self,
        info: &randr::GetOutputInfoReply,
        config_timestamp: u32,
    ) -> Result<bool> {
        if info.crtc == x11rb::NONE {
            return Ok(false);
        }
        Ok(self.crtc_info(info.crtc, config_timestamp)?.mode != x11rb::NONE)
    }

    fn settings_from_crtc(
        &self,
        crtc: &randr::GetCrtcInfoReply,
        resources: &randr::GetScreenResourcesCurrentReply,
    ) -> ModeSettings {
        let refresh = resources
            .modes
            .iter()
            .find(|m| m.id == u32::from(crtc.mode))
            .map(refresh_rate)
            .unwrap_or(0);
        ModeSettings {
            width: crtc.width,
            height: crtc.height,
            position_x: i32::from(crtc.x),
            position_y: i32::from(crtc.y),
            refresh,
            orientation: rotation_to_degrees(crtc.rotation),
            bits_per_pixel: self.root_depth,
        }
    }
}

impl DisplayBackend for RandrBackend<'_> {
    fn snapshot(&mut self) -> Result<DeviceSnapshot> {
        let resources = self.resources()?;
        let primary_output = self.primary_output()?;
        let mut snapshot = DeviceSnapshot::default();

        for &output in &resources.outputs {
            let info = self.output_info(output, resources.config_timestamp)?;
            if !is_connected(&info) {
                continue; // Unplugged connector: unknown hardware
            }
            let name = String::from_utf8_lossy(&info.name).into_owned();
            if self.is_active(&info, resources.config_timestamp)? {
                snapshot.connected.insert(name.clone());
            }
            if output == primary_output {
                snapshot.primary = Some(name.clone());
            }
            snapshot.all_devices.insert(name);
        }
        debug!(
            connected = snapshot.connected.len(),
            all = snapshot.all_devices.len(),
            primary = ?snapshot.primary,
            "Enumerated display devices"
        );
        Ok(snapshot)
    }

    fn current_settings(&mut self, device: &str) -> Result<Option<ModeSettings>> {
        let resources = self.resources()?;
        let Some((_, info)) = self.find_output(&resources, device)? else {
            return Ok(None);
        };
        if info.crtc == x11rb::NONE {
            return Ok(None);
        }
        let crtc = self.crtc_info(info.crtc, resources.config_timestamp)?;
        if crtc.mode == x11rb::NONE {
            return Ok(None);
        }
        Ok(Some(self.settings_from_crtc(&crtc, &resources)))
    }

    fn supported_modes(&mut self, device: &str) -> Result<Vec<DisplayMode>> {
        let resources = self.resources()?;
        let Some((_, info)) = self.find_output(&resources, device)? else {
            return Ok(Vec::new());
        };
        Ok(info
            .modes
            .iter()
            .filter_map(|mode_id| {
                resources
                    .modes
                    .iter()
                    .find(|m| m.id == u32::from(*mode_id))
            })
            .map(|m| DisplayMode {
                width: m.width,
                height: m.height,
                refresh: refresh_rate(m),
                bits_per_pixel: self.root_depth,
            })
            .collect())
    }

    fn active_monitors(&mut self) -> Result<Vec<MonitorSpec>> {
        let resources = self.resources()?;
        let primary_output = self.primary_output()?;
        let mut monitors = Vec::new();

        for &output in &resources.outputs {
            let info = self.output_info(output, resources.config_timestamp)?;
            if !is_connected(&info) || info.crtc == x11rb::NONE {
                continue;
            }
            let crtc = self.crtc_info(info.crtc, resources.config_timestamp)?;
            if crtc.mode == x11rb::NONE {
                continue;
            }
            let name = String::from_utf8_lossy(&info.name).into_owned();
            let settings = self.settings_from_crtc(&crtc, &resources);
            monitors.push(MonitorSpec {
                device_string: name.clone(),
                device_name: name,
                width: settings.width,
                height: settings.height,
                position_x: settings.position_x,
                position_y: settings.position_y,
                refresh_rate: settings.refresh,
                orientation: settings.orientation,
                bits_per_pixel: settings.bits_per_pixel,
                is_primary: output == primary_output,
                enabled: true,
            });
        }
        Ok(monitors)
    }

    fn detect(&mut self) -> Result<bool> {
        // The non-"current" resources request forces the server to re-probe
        // every connector.
        info!("Probing for attached displays");
        self.conn
            .randr_get_screen_resources(self.root)
            .context("Failed to request display probe")?
            .reply()
            .context("Display probe failed")?;
        Ok(true)
    }

    fn stage(&mut self, device: &str, change: StagedChange) -> Result<StageStatus> {
        let resources = self.resources()?;
        let Some((output, info)) = self.find_output(&resources, device)? else {
            return Ok(StageStatus::Rejected(format!("no such output {device}")));
        };

        let action = match change {
            StagedChange::Detach => PendingAction::Detach,
            StagedChange::Configure {
                settings,
                make_primary,
            } => {
                // The mode table is native landscape; a rotated footprint
                // swaps back to find the panel mode.
                let rotated = matches!(settings.orientation, 90 | 270);
                let (native_w, native_h) = if rotated {
                    (settings.height, settings.width)
                } else {
                    (settings.width, settings.height)
                };
                let mode = info
                    .modes
                    .iter()
                    .filter_map(|mode_id| {
                        resources
                            .modes
                            .iter()
                            .find(|m| m.id == u32::from(*mode_id))
                    })
                    .filter(|m| m.width == native_w && m.height == native_h)
                    .min_by_key(|m| refresh_rate(m).abs_diff(settings.refresh));
                let Some(mode) = mode else {
                    return Ok(StageStatus::Rejected(format!(
                        "no {native_w}x{native_h} mode on {device}"
                    )));
                };
                PendingAction::Configure {
                    settings,
                    mode: mode.id,
                    make_primary,
                }
            }
        };

        self.pending.push(PendingChange {
            output,
            name: device.to_string(),
            action,
        });
        Ok(StageStatus::Staged)
    }

    fn commit(&mut self) -> Result<bool> {
        if self.pending.is_empty() {
            return Ok(true);
        }
        let resources = self.resources()?;
        self.conn.grab_server().context("Failed to grab server")?;
        let result = self.apply_pending(&resources);
        self.conn
            .ungrab_server()
            .context("Failed to ungrab server")?;
        self.conn.flush().context("Failed to flush connection")?;
        self.pending.clear();
        result
    }
}

impl RandrBackend<'_> {
    fn apply_pending(&self, resources: &randr::GetScreenResourcesCurrentReply) -> Result<bool> {
        let mut ok = true;

        // Detaches first so their CRTCs free up for re-enables.
        for change in self.pending.iter().filter(|c| matches!(c.action, PendingAction::Detach)) {
            let info = self.output_info(change.output, resources.config_timestamp)?;
            if info.crtc == x11rb::NONE {
                continue;
            }
            if !self.set_crtc(
                info.crtc,
                resources.config_timestamp,
                0,
                0,
                x11rb::NONE,
                randr::Rotation::ROTATE0,
                &[],
            )? {
                warn!(device = %change.name, "Detach rejected by the server");
                ok = false;
            } else {
                info!(device = %change.name, "Detached output");
            }
        }

        // Grow or shrink the screen to the bounding box of the target layout.
        if let Some((width, height)) = self.target_screen_size(resources)? {
            let mm_width = u32::from(width) * MM_PER_INCH_X10 / (ASSUMED_DPI * 10);
            let mm_height = u32::from(height) * MM_PER_INCH_X10 / (ASSUMED_DPI * 10);
            self.conn
                .randr_set_screen_size(self.root, width, height, mm_width, mm_height)
                .context("Failed to set screen size")?;
        }

        for change in &self.pending {
            let PendingAction::Configure {
                settings,
                mode,
                make_primary,
            } = &change.action
            else {
                continue;
            };
            let info = self.output_info(change.output, resources.config_timestamp)?;
            let Some(crtc) = self.pick_crtc(change.output, &info, resources)? else {
                warn!(device = %change.name, "No free crtc for output");
                ok = false;
                continue;
            };
            let status = self.set_crtc(
                crtc,
                resources.config_timestamp,
                settings.position_x as i16,
                settings.position_y as i16,
                *mode,
                degrees_to_rotation(settings.orientation),
                &[change.output],
            )?;
            if !status {
                warn!(device = %change.name, "Mode change rejected by the server");
                ok = false;
                continue;
            }
            info!(
                device = %change.name,
                size = format!("{}x{}", settings.width, settings.height),
                position = format!("({}, {})", settings.position_x, settings.position_y),
                refresh = settings.refresh,
                "Configured output"
            );
            if *make_primary {
                self.conn
                    .randr_set_output_primary(self.root, change.output)
                    .context("Failed to set primary output")?;
            }
        }

        Ok(ok)
    }

    fn set_crtc(
        &self,
        crtc: randr::Crtc,
        config_timestamp: u32,
        x: i16,
        y: i16,
        mode: randr::Mode,
        rotation: randr::Rotation,
        outputs: &[randr::Output],
    ) -> Result<bool> {
        let reply = self
            .conn
            .randr_set_crtc_config(
                crtc,
                x11rb::CURRENT_TIME,
                config_timestamp,
                x,
                y,
                mode,
                rotation,
                outputs,
            )
            .context("Failed to request crtc config")?
            .reply()
            .context("Failed to get crtc config reply")?;
        Ok(u8::from(reply.status) == u8::from(randr::SetConfig::SUCCESS))
    }

    /// The output's current CRTC, or the first candidate not driving
    /// anything else.
    fn pick_crtc(
        &self,
        output: randr::Output,
        info: &randr::GetOutputInfoReply,
        resources: &randr::GetScreenResourcesCurrentReply,
    ) -> Result<Option<randr::Crtc>> {
        if info.crtc != x11rb::NONE {
            return Ok(Some(info.crtc));
        }
        for &crtc in &info.crtcs {
            let crtc_info = self.crtc_info(crtc, resources.config_timestamp)?;
            if crtc_info.outputs.is_empty() || crtc_info.outputs == [output] {
                return Ok(Some(crtc));
            }
        }
        Ok(None)
    }

    /// Bounding box of staged configures plus untouched active CRTCs.
    fn target_screen_size(
        &self,
        resources: &randr::GetScreenResourcesCurrentReply,
    ) -> Result<Option<(u16, u16)>> {
        let touched: Vec<randr::Output> = self.pending.iter().map(|c| c.output).collect();
        let mut right: i32 = 0;
        let mut bottom: i32 = 0;

        for change in &self.pending {
            if let PendingAction::Configure { settings, .. } = &change.action {
                right = right.max(settings.position_x + i32::from(settings.width));
                bottom = bottom.max(settings.position_y + i32::from(settings.height));
            }
        }
        for &crtc in &resources.crtcs {
            let crtc_info = self.crtc_info(crtc, resources.config_timestamp)?;
            if crtc_info.mode == x11rb::NONE {
                continue;
            }
            if crtc_info.outputs.iter().any(|o| touched.contains(o)) {
                continue;
            }
            right = right.max(i32::from(crtc_info.x) + i32::from(crtc_info.width));
            bottom = bottom.max(i32::from(crtc_info.y) + i32::from(crtc_info.height));
        }

        if right <= 0 || bottom <= 0 {
            return Ok(None);
        }
        Ok(Some((right as u16, bottom as u16)))
    }
}

fn is_connected(info: &randr::GetOutputInfoReply) -> bool {
    u8::from(info.connection) == u8::from(randr::Connection::CONNECTED)
}

fn refresh_rate(mode: &randr::ModeInfo) -> u16 {
    let denominator = u32::from(mode.htotal) * u32::from(mode.vtotal);
    if denominator == 0 {
        return 0;
    }
    (f64::from(mode.dot_clock) / f64::from(denominator)).round() as u16
}

fn rotation_to_degrees(rotation: randr::Rotation) -> u16 {
    let bits = u16::from(rotation);
    if bits & u16::from(randr::Rotation::ROTATE90) != 0 {
        90
    } else if bits & u16::from(randr::Rotation::ROTATE180) != 0 {
        180
    } else if bits & u16::from(randr::Rotation::ROTATE270) != 0 {
        270
    } else {
        0
    }
}

fn degrees_to_rotation(degrees: u16) -> randr::Rotation {
    match degrees {
        90 => randr::Rotation::ROTATE90,
        180 => randr::Rotation::ROTATE180,
        270 => randr::Rotation::ROTATE270,
        _ => randr::Rotation::ROTATE0,
    }
}
