pub mod changes;
pub mod config;
pub mod credentials;
pub mod daemon;
pub mod download;
pub mod error;
pub mod logging;
pub mod namespace;
pub mod orchestrator;
pub mod parktable;
pub mod remote;
pub mod walker;
pub mod watcher;

pub use config::Config;
pub use logging::{LogConfig, LogGuard};
pub use parktable::ParkTable;
