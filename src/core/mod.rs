pub mod config;
pub mod curation;
pub mod error;
pub mod video;
