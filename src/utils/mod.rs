pub mod error;
pub mod telemetry;

pub use error::{AppError, Result};
