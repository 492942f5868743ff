pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{cli::LocalStorage, AppConfig};

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use core::aggregator::{Aggregator, AggregatorSettings};
pub use core::engine::{BatchSummary, OutputOptions, Payload, TraceEngine};
pub use core::exporter::ExportFormat;
pub use domain::model::{AggregatedReport, LookupResult, LookupStatus, Module};
pub use domain::phone::PhoneNumber;
pub use utils::error::{Result, TracerError};
