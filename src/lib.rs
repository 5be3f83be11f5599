pub mod application;
pub mod domain;

pub use application::use_cases::checkpoint_converter::{CheckpointConverter, ConversionOptions};
pub use application::use_cases::export_formatter::{ExportFormatter, ExportOptions};
pub use application::use_cases::import_parser::{ImportParser, ParsedImport};
pub use application::use_cases::merge_engine::{compute_stats, merge, MergeStrategy};
pub use domain::error::{AppError, Result};
