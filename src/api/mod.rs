pub mod curator;
pub mod models;

pub use curator::{CurationLayout, Curator};
