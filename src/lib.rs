pub mod config;
pub mod error;
pub mod identity;
pub mod measurement;
pub mod meter;
pub mod mqtt;
pub mod poller;
pub mod projection;

// Re-export commonly used items
pub use config::Config;
pub use error::{AppError, Result};
pub use measurement::{descriptor_table, Descriptor, Rule};
pub use meter::{MeterClient, ProbeInfo, Snapshot};
pub use poller::Poller;
pub use projection::{DailyMaxima, MeasurementValue};
