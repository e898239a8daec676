pub mod app;
pub mod capture;
pub mod device;
pub mod error;
pub mod extract;
pub mod service;

pub use error::{LogscopeError, Result};
pub use service::LogService;
