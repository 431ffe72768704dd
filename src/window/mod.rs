//! Window position capture, evacuation, and restoration
//!
//! - **api**: capability types and the `WindowBackend` trait
//! - **x11**: production backend over EWMH/ICCCM
//! - **tracker**: snapshot of eligible windows and their monitors
//! - **restore**: evacuate from doomed monitors, repatriate later
//! - **cache**: single-slot snapshot persistence

pub mod api;
pub mod cache;
pub mod restore;
pub mod tracker;
pub mod x11;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{MonitorRect, Rect, ShowState, WindowBackend, WindowInfo};
pub use tracker::WindowSnapshot;
