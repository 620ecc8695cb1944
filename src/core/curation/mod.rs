pub mod candidate;
pub mod engine;
pub mod gate;
pub mod manifest;
pub mod scoring;
pub mod selector;

pub use candidate::{
    Candidate, CandidateStatus, Category, FrameName, NormalizedScores, RawMetrics, RejectReason,
};
pub use engine::{CategoryInput, CategoryOutcome, CategoryStats, CurationEngine};
pub use gate::QualityGate;
pub use manifest::{is_frame_file, list_frames, SourceManifest};
pub use scoring::{max_raw_sharpness, rank, ScoreAggregator};
pub use selector::{
    CurationSelector, SelectedEntry, SelectionDecision, SelectionPolicy, SelectionSet,
};
