//! Long-running tasks of the service.

pub mod navigation_loop;
pub mod notification_writer;
pub mod reroute_loop;
