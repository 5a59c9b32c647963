// New-listing discovery
pub mod monitor;

pub use monitor::{ListingMonitor, MonitorCounts, NewListingCallback, RefreshKind};
