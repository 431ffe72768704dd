//! Monitor layout profiles and their on-disk store
//!
//! A profile is a named, ordered list of monitor specifications captured from
//! the live display state. The store is a single JSON file in the per-user
//! config directory; a corrupt or missing file loads as an empty store.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::display::api::DisplayBackend;

/// One monitor's desired configuration within a layout.
///
/// `device_name` is the OS-assigned output name (e.g. `DP-1`) and is stable
/// across reboots for a given port, but the hardware behind it may be absent
/// when the profile is later applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSpec {
    pub device_name: String,
    pub device_string: String,
    pub width: u16,
    pub height: u16,
    pub position_x: i32,
    pub position_y: i32,
    pub refresh_rate: u16,
    /// Orientation in degrees: 0, 90, 180, or 270
    pub orientation: u16,
    pub bits_per_pixel: u8,
    pub is_primary: bool,
    /// False = this monitor should be detached when the profile is applied.
    /// Older profiles predate this field, so it defaults to true.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl MonitorSpec {
    /// Whether the stored layout is portrait: either an explicit rotation
    /// flag or stored height exceeding stored width.
    pub fn is_rotated(&self) -> bool {
        matches!(self.orientation, 90 | 270) || self.height > self.width
    }

    /// Monitor origin in desktop coordinates, the stable identity used for
    /// window-to-monitor association.
    pub fn origin(&self) -> (i32, i32) {
        (self.position_x, self.position_y)
    }
}

impl fmt::Display for MonitorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let primary = if self.is_primary { " [Primary]" } else { "" };
        let disabled = if self.enabled { "" } else { " [DISABLED]" };
        write!(
            f,
            "{}{}{}: {}x{} @ {}Hz, pos({}, {})",
            self.device_name,
            primary,
            disabled,
            self.width,
            self.height,
            self.refresh_rate,
            self.position_x,
            self.position_y
        )
    }
}

/// A saved monitor configuration profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Also the map key in the on-disk store; the key is authoritative.
    #[serde(default)]
    pub name: String,
    pub monitors: Vec<MonitorSpec>,
    #[serde(default = "now_rfc3339")]
    pub created_at: String,
    #[serde(default = "now_rfc3339")]
    pub updated_at: String,
}

fn now_rfc3339() -> String {
    chrono::Local::now().to_rfc3339()
}

/// On-disk shape of the profile store: a name-keyed map whose entry order
/// is the display order, `{"profiles": {name: {...}}}`.
#[derive(Debug, Default, Deserialize)]
struct StoreFile {
    #[serde(default, deserialize_with = "profiles_in_order")]
    profiles: Vec<Profile>,
}

impl Serialize for StoreFile {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        struct ByName<'a>(&'a [Profile]);
        impl Serialize for ByName<'_> {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for profile in self.0 {
                    map.serialize_entry(&profile.name, profile)?;
                }
                map.end()
            }
        }

        let mut outer = serializer.serialize_map(Some(1))?;
        outer.serialize_entry("profiles", &ByName(&self.profiles))?;
        outer.end()
    }
}

/// Deserialize the name-keyed map in document order, taking each profile's
/// name from its key.
fn profiles_in_order<'de, D>(deserializer: D) -> Result<Vec<Profile>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct MapVisitor;

    impl<'de> serde::de::Visitor<'de> for MapVisitor {
        type Value = Vec<Profile>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of profile name to profile")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::MapAccess<'de>,
        {
            let mut profiles = Vec::new();
            while let Some((name, mut profile)) = access.next_entry::<String, Profile>()? {
                profile.name = name;
                profiles.push(profile);
            }
            Ok(profiles)
        }
    }

    deserializer.deserialize_map(MapVisitor)
}

/// Ordered collection of profiles backed by a JSON file
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    profiles: Vec<Profile>,
}

impl ProfileStore {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(crate::constants::config::APP_DIR);
        path.push(crate::constants::config::PROFILES_FILENAME);
        path
    }

    /// Load the store, degrading to an empty collection on missing or
    /// unreadable data.
    pub fn load(path: PathBuf) -> Self {
        let profiles = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<StoreFile>(&contents) {
                Ok(file) => file.profiles,
                Err(e) => {
                    warn!(path = ?path, error = %e, "Profile store is corrupt, starting empty");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        info!("Loaded {} profile(s) from {:?}", profiles.len(), path);
        Self { path, profiles }
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }
        let file = StoreFile {
            profiles: self.profiles.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .context("Failed to serialize profile store")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write profiles to {:?}", self.path))?;
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Capture the live display state under the given name (all monitors
    /// recorded as enabled).
    pub fn save_current_as(
        &mut self,
        name: &str,
        display: &mut dyn DisplayBackend,
    ) -> Result<&Profile> {
        let monitors = display
            .active_monitors()
            .context("Failed to enumerate active monitors")?;
        self.save_with_monitors(name, monitors)
    }

    /// Save a layout under the given name, updating in place if it exists.
    pub fn save_with_monitors(
        &mut self,
        name: &str,
        monitors: Vec<MonitorSpec>,
    ) -> Result<&Profile> {
        let now = now_rfc3339();
        match self.profiles.iter_mut().find(|p| p.name == name) {
            Some(profile) => {
                profile.monitors = monitors;
                profile.updated_at = now;
            }
            None => {
                self.profiles.push(Profile {
                    name: name.to_string(),
                    monitors,
                    created_at: now.clone(),
                    updated_at: now,
                });
            }
        }
        self.save()?;
        info!(profile = name, "Saved profile");
        Ok(self.get(name).unwrap())
    }

    pub fn delete(&mut self, name: &str) -> Result<bool> {
        let before = self.profiles.len();
        self.profiles.retain(|p| p.name != name);
        if self.profiles.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Rename a profile in place, preserving its position in the list.
    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<bool> {
        if self.get(new_name).is_some() {
            return Ok(false);
        }
        match self.profiles.iter_mut().find(|p| p.name == old_name) {
            Some(profile) => {
                profile.name = new_name.to_string();
                profile.updated_at = now_rfc3339();
                self.save()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Swap a profile between two positions in the display order.
    pub fn move_profile(&mut self, from: usize, to: usize) -> Result<bool> {
        if from >= self.profiles.len() || to >= self.profiles.len() {
            return Ok(false);
        }
        self.profiles.swap(from, to);
        self.save()?;
        Ok(true)
    }

    /// Export the whole store to an arbitrary path.
    pub fn export_to(&self, path: &Path) -> Result<()> {
        let file = StoreFile {
            profiles: self.profiles.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .context("Failed to serialize profiles for export")?;
        fs::write(path, json).with_context(|| format!("Failed to export profiles to {:?}", path))?;
        Ok(())
    }

    /// Import profiles from a file, merging with (and overwriting) existing
    /// entries of the same name.
    pub fn import_from(&mut self, path: &Path) -> Result<usize> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read import file {:?}", path))?;
        let file: StoreFile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse import file {:?}", path))?;
        let count = file.profiles.len();
        for imported in file.profiles {
            match self.profiles.iter_mut().find(|p| p.name == imported.name) {
                Some(existing) => *existing = imported,
                None => self.profiles.push(imported),
            }
        }
        self.save()?;
        Ok(count)
    }
}
