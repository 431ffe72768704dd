//! In-memory display backend for tests
//!
//! Models a device table with attach/detach state and a staged-change queue,
//! so reconciliation tests run without an X server.

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::display::api::{
    DeviceSnapshot, DisplayBackend, DisplayMode, ModeSettings, StageStatus, StagedChange,
};
use crate::profile::MonitorSpec;

#[derive(Debug, Clone)]
pub(crate) struct FakeDevice {
    pub attached: bool,
    pub settings: Option<ModeSettings>,
    pub modes: Vec<DisplayMode>,
    /// If set, `detect` attaches the device with these settings
    pub attach_on_detect: Option<ModeSettings>,
}

impl FakeDevice {
    pub fn attached(settings: ModeSettings, modes: Vec<DisplayMode>) -> Self {
        Self {
            attached: true,
            settings: Some(settings),
            modes,
            attach_on_detect: None,
        }
    }

    pub fn detach(&mut self) {
        self.attached = false;
        self.settings = None;
    }
}

#[derive(Debug)]
pub(crate) struct FakeDisplay {
    pub devices: BTreeMap<String, FakeDevice>,
    pub primary: Option<String>,
    pub commit_result: bool,
    pub commits: usize,
    pub detect_calls: usize,
    /// Devices whose stage calls are rejected
    pub reject: HashSet<String>,
    pending: Vec<(String, StagedChange)>,
}

impl Default for FakeDisplay {
    fn default() -> Self {
        Self {
            devices: BTreeMap::new(),
            primary: None,
            commit_result: true,
            commits: 0,
            detect_calls: 0,
            reject: HashSet::new(),
            pending: Vec::new(),
        }
    }
}

impl DisplayBackend for FakeDisplay {
    fn snapshot(&mut self) -> Result<DeviceSnapshot> {
        let connected: BTreeSet<String> = self
            .devices
            .iter()
            .filter(|(_, d)| d.attached)
            .map(|(name, _)| name.clone())
            .collect();
        Ok(DeviceSnapshot {
            all_devices: self.devices.keys().cloned().collect(),
            connected,
            primary: self.primary.clone(),
        })
    }

    fn current_settings(&mut self, device: &str) -> Result<Option<ModeSettings>> {
        match self.devices.get(device) {
            Some(d) => Ok(d.settings.clone()),
            None => anyhow::bail!("unknown device {device}"),
        }
    }

    fn supported_modes(&mut self, device: &str) -> Result<Vec<DisplayMode>> {
        match self.devices.get(device) {
            Some(d) => Ok(d.modes.clone()),
            None => anyhow::bail!("unknown device {device}"),
        }
    }

    fn active_monitors(&mut self) -> Result<Vec<MonitorSpec>> {
        Ok(self
            .devices
            .iter()
            .filter_map(|(name, d)| {
                let settings = d.settings.as_ref().filter(|_| d.attached)?;
                Some(MonitorSpec {
                    device_name: name.clone(),
                    device_string: name.clone(),
                    width: settings.width,
                    height: settings.height,
                    position_x: settings.position_x,
                    position_y: settings.position_y,
                    refresh_rate: settings.refresh,
                    orientation: settings.orientation,
                    bits_per_pixel: settings.bits_per_pixel,
                    is_primary: self.primary.as_deref() == Some(name.as_str()),
                    enabled: true,
                })
            })
            .collect())
    }

    fn detect(&mut self) -> Result<bool> {
        self.detect_calls += 1;
        for device in self.devices.values_mut() {
            if let Some(settings) = device.attach_on_detect.take() {
                device.attached = true;
                device.settings = Some(settings);
            }
        }
        Ok(true)
    }

    fn stage(&mut self, device: &str, change: StagedChange) -> Result<StageStatus> {
        if self.reject.contains(device) {
            return Ok(StageStatus::Rejected("refused by test backend".to_string()));
        }
        if !self.devices.contains_key(device) {
            anyhow::bail!("unknown device {device}");
        }
        self.pending.push((device.to_string(), change));
        Ok(StageStatus::Staged)
    }

    fn commit(&mut self) -> Result<bool> {
        self.commits += 1;
        let ok = self.commit_result;
        if ok {
            for (name, change) in self.pending.drain(..) {
                let device = self.devices.get_mut(&name).expect("staged unknown device");
                match change {
                    StagedChange::Detach => device.detach(),
                    StagedChange::Configure {
                        settings,
                        make_primary,
                    } => {
                        device.attached = true;
                        device.settings = Some(settings);
                        if make_primary {
                            self.primary = Some(name);
                        }
                    }
                }
            }
        } else {
            self.pending.clear();
        }
        Ok(ok)
    }
}
