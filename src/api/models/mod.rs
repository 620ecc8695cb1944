pub mod report;

pub use report::{CandidateRecord, CategoryReport, RunReport, SkippedCategory};
