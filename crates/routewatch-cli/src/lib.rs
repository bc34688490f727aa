//! Routewatch CLI - drive simulation and route replay tools.
//!
//! Binaries:
//! - simulate_drive: emit JSON-line position fixes along a route
//! - replay_route: feed fixes through the tracker and print notifications

pub mod sim;

pub use sim::{simulate_fixes, DetourPath, DrivePath, PolylinePath};
