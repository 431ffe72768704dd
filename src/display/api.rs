//! Display-configuration capability
//!
//! The reconciler and the CLI talk to the OS display stack through the
//! `DisplayBackend` trait. Mode changes follow a two-phase protocol: stage
//! per-device change requests, then commit everything with one call. This
//! keeps the reconciler a sequence of pure decisions over snapshotted state,
//! with the side effects confined to `commit`.

use anyhow::Result;
use std::collections::BTreeSet;

use crate::profile::MonitorSpec;

/// A concrete mode a device can be driven at, in the panel's native
/// (unrotated) dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMode {
    pub width: u16,
    pub height: u16,
    pub refresh: u16,
    pub bits_per_pixel: u8,
}

impl DisplayMode {
    pub fn pixel_count(&self) -> u32 {
        u32::from(self.width) * u32::from(self.height)
    }
}

/// Full mode descriptor used to request a change: desktop footprint
/// (post-rotation dimensions), position, refresh, orientation, bit depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSettings {
    pub width: u16,
    pub height: u16,
    pub position_x: i32,
    pub position_y: i32,
    pub refresh: u16,
    /// Orientation in degrees: 0, 90, 180, or 270
    pub orientation: u16,
    pub bits_per_pixel: u8,
}

/// A per-device change request awaiting commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedChange {
    /// Remove the device from the active desktop (zero-size mode)
    Detach,
    Configure {
        settings: ModeSettings,
        make_primary: bool,
    },
}

/// Per-device return code of a stage call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Staged,
    Rejected(String),
}

/// One re-enumeration of the device sets. Never cached across calls: the
/// device set can change between calls, e.g. after a hot-plug or `detect`.
#[derive(Debug, Clone, Default)]
pub struct DeviceSnapshot {
    /// Devices actively driving a monitor
    pub connected: BTreeSet<String>,
    /// Every device known to the OS, including administratively detached ones
    pub all_devices: BTreeSet<String>,
    /// The device flagged primary among connected devices, if any
    pub primary: Option<String>,
}

/// OS display-configuration capability
pub trait DisplayBackend {
    /// Re-enumerate connected/all/primary device sets.
    fn snapshot(&mut self) -> Result<DeviceSnapshot>;

    /// The device's presently active mode, or None if it has no active mode.
    fn current_settings(&mut self, device: &str) -> Result<Option<ModeSettings>>;

    /// Every mode the device reports. Enumeration order comes from the OS
    /// and is not otherwise defined.
    fn supported_modes(&mut self, device: &str) -> Result<Vec<DisplayMode>>;

    /// Live state of every active monitor, for layout capture.
    fn active_monitors(&mut self) -> Result<Vec<MonitorSpec>>;

    /// Ask the OS to rescan for physically present but detached displays and
    /// extend the desktop onto them. Expensive (can take over a second), so
    /// callers invoke it lazily.
    fn detect(&mut self) -> Result<bool>;

    /// Stage a change for one device without immediate effect.
    fn stage(&mut self, device: &str, change: StagedChange) -> Result<StageStatus>;

    /// Apply all staged changes in one pass. Returns false if the OS
    /// rejected the batch.
    fn commit(&mut self) -> Result<bool>;
}
