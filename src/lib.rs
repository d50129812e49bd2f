pub mod catalog;
pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod registry;
pub mod storage;
pub mod tracker;
pub mod usage;

pub use error::{EmoteTrackerError, Result};
pub use tracker::EmoteTracker;
