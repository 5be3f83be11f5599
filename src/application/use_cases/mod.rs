pub mod checkpoint_converter;
pub mod export_formatter;
pub mod identifier;
pub mod import_parser;
pub mod merge_engine;
pub mod structural_validator;
pub mod trait_converter;
