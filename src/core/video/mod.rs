pub mod extractor;
pub mod frame;
pub mod manager;
pub mod mask;
pub mod phash;
pub mod pose;
pub mod providers;

pub use extractor::{FeatureExtractor, GateMetrics, ScoringMetrics};
pub use frame::LumaFrame;
pub use manager::{FrameScoringManager, ScoringStats};
pub use mask::Mask;
pub use phash::{PerceptualHash, PerceptualHasher};
pub use pose::KeypointMap;
pub use providers::{
    AlphaMaskSegmentation, FixedMaskSegmentation, FixedPoseEstimator, FrameImage, PoseEstimator,
    SegmentationProvider, SidecarPoseEstimator,
};
