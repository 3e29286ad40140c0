pub mod entry;
pub mod postprocess;
pub mod types;
