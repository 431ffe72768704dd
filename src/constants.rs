//! Application-wide constants
//!
//! This module contains the magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Configuration file locations
pub mod config {
    /// Directory under the per-user config dir
    pub const APP_DIR: &str = "displaysnap";

    /// Profile store filename
    pub const PROFILES_FILENAME: &str = "profiles.json";

    /// Single-slot window position cache filename
    pub const WINDOW_CACHE_FILENAME: &str = "window_cache.json";
}

/// Mode matching scores (see `display::matching`)
pub mod matching {
    /// Base score for a mode whose dimensions equal the target verbatim
    pub const EXACT_MATCH_SCORE: i32 = 1000;

    /// Base score for a mode matching the native (unrotated) dimensions
    pub const NATIVE_MATCH_SCORE: i32 = 900;

    /// Bonus for an exact refresh rate match
    pub const REFRESH_EXACT_BONUS: i32 = 100;

    /// Maximum bonus for a near-miss refresh rate (decays by 1 per Hz off)
    pub const REFRESH_NEAR_BONUS: i32 = 50;
}

/// Window evacuation placement
pub mod evacuate {
    /// Base offset from the primary work area corner
    pub const BASE_OFFSET: i32 = 50;

    /// Stagger step so repeated evacuations do not perfectly overlap
    pub const STAGGER_STEP: i32 = 30;

    /// Number of distinct stagger slots (derived from the window id)
    pub const STAGGER_SLOTS: u32 = 10;

    /// Margin kept between a clamped window and the work area edge
    pub const EDGE_MARGIN: i32 = 10;
}

/// Window eligibility denylists
///
/// Shell furniture that should never be snapshotted, evacuated, or restored.
pub mod denylist {
    /// Window titles belonging to desktop shells
    pub const TITLES: &[&str] = &["Desktop", "xfdesktop", "Plank", "mutter guard window"];

    /// Owning processes for panels, docks, and compositors
    pub const PROCESSES: &[&str] = &[
        "plank",
        "polybar",
        "xfce4-panel",
        "plasmashell",
        "gnome-shell",
        "picom",
        "conky",
    ];
}

/// EWMH client message payloads
pub mod ewmh {
    /// `_NET_WM_STATE` action: remove the named state atoms
    pub const STATE_REMOVE: u32 = 0;

    /// `_NET_WM_STATE` action: add the named state atoms
    pub const STATE_ADD: u32 = 1;

    /// Source indication: direct user action (pager-class client)
    pub const SOURCE_PAGER: u32 = 2;
}

/// Screen size computation for the RandR backend
pub mod screen {
    /// Millimeters per inch times ten (for px → mm at the assumed DPI)
    pub const MM_PER_INCH_X10: u32 = 254;

    /// Assumed DPI when deriving physical screen size from pixels
    pub const ASSUMED_DPI: u32 = 96;
}
