pub mod aggregator;
pub mod cache;
pub mod engine;
pub mod exporter;
pub mod rate_limiter;
pub mod registry;

pub use crate::domain::ports::{SourceClient, Storage};
pub use crate::utils::error::Result;
