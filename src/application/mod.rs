pub mod use_cases;

pub use use_cases::checkpoint_converter::CheckpointConverter;
pub use use_cases::export_formatter::ExportFormatter;
pub use use_cases::import_parser::ImportParser;
