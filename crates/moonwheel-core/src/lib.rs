//! `moonwheel-core`: shared configuration, region catalog and error types.
//!
//! Every other crate in the workspace depends on this one; it carries no I/O
//! beyond reading the config file at startup.

pub mod config;
pub mod error;
pub mod region;
pub mod types;

pub use config::MoonwheelConfig;
pub use error::{MoonwheelError, Result};
pub use region::{RegionCatalog, RegionProfile};
pub use types::{DeliveryDays, Hemisphere};
