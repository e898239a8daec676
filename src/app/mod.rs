pub mod config;

pub use config::{AdbConfig, CaptureConfig, Config, ViewConfig};
