//! Display-configuration engine
//!
//! - **api**: capability types and the `DisplayBackend` trait
//! - **randr**: production backend over X11 RandR
//! - **matching**: mode-matching heuristic
//! - **reconcile**: the reconciliation state machine

pub mod api;
pub mod matching;
pub mod randr;
pub mod reconcile;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{DeviceSnapshot, DisplayBackend, DisplayMode, ModeSettings, StageStatus, StagedChange};
pub use reconcile::{ReconcileOptions, ReconcileOutcome, reconcile};
