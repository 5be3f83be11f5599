pub mod checkpoint;
pub mod error;
pub mod jsonld;
pub mod result;
pub mod rubric;
