//! 帧打分管理器：解码、分割、质量门、特征提取

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use rayon::prelude::*;

use super::extractor::FeatureExtractor;
use super::providers::{FrameImage, PoseEstimator, SegmentationProvider};
use crate::core::config::{CategoryProfile, CurationConfig};
use crate::core::curation::{Candidate, Category, FrameName, QualityGate, RejectReason};
use crate::core::error::{ProviderError, Result};

/// 打分统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringStats {
    pub processed_frames: u64,
    pub gated_frames: u64,
}

/// 帧打分管理器
pub struct FrameScoringManager {
    extractor: FeatureExtractor,
    gate: QualityGate,
    pose: Arc<dyn PoseEstimator>,
    segmentation: Arc<dyn SegmentationProvider>,
    frame_count: AtomicU64,
    gated_count: AtomicU64,
}

impl FrameScoringManager {
    pub fn new(
        config: &CurationConfig,
        pose: Arc<dyn PoseEstimator>,
        segmentation: Arc<dyn SegmentationProvider>,
    ) -> Self {
        Self {
            extractor: FeatureExtractor::new(config.features.clone()),
            gate: QualityGate::new(config.gate.clone()),
            pose,
            segmentation,
            frame_count: AtomicU64::new(0),
            gated_count: AtomicU64::new(0),
        }
    }

    /// 两个协作者都必须就绪，否则整个运行不开始
    pub fn ensure_ready(&self) -> Result<()> {
        self.segmentation.ensure_ready()?;
        self.pose.ensure_ready()
    }

    pub fn get_stats(&self) -> ScoringStats {
        ScoringStats {
            processed_frames: self.frame_count.load(Ordering::Relaxed),
            gated_frames: self.gated_count.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.frame_count.store(0, Ordering::Relaxed);
        self.gated_count.store(0, Ordering::Relaxed);
    }

    /// 批量打分，输出顺序与输入一致
    pub fn process_batch(
        &self,
        paths: &[PathBuf],
        category: Category,
        profile: &CategoryProfile,
    ) -> Vec<Candidate> {
        paths
            .par_iter()
            .map(|path| self.score_path(path, category, profile))
            .collect()
    }

    pub fn score_path(&self, path: &Path, category: Category, profile: &CategoryProfile) -> Candidate {
        let Some(name) = FrameName::from_path(path) else {
            self.bump(false);
            return Candidate::unusable(path.to_path_buf(), category, RejectReason::UnparseableName);
        };

        match FrameImage::open(path) {
            Ok(frame) => self.score_named(frame, name, category, profile),
            Err(e) => {
                self.bump(false);
                Candidate::new(path.to_path_buf(), name, category).into_rejected(
                    RejectReason::Unreadable {
                        detail: e.to_string(),
                    },
                )
            }
        }
    }

    pub fn score_frame(
        &self,
        frame: FrameImage,
        category: Category,
        profile: &CategoryProfile,
    ) -> Candidate {
        match FrameName::from_path(&frame.path) {
            Some(name) => self.score_named(frame, name, category, profile),
            None => {
                self.bump(false);
                Candidate::unusable(frame.path, category, RejectReason::UnparseableName)
            }
        }
    }

    fn score_named(
        &self,
        frame: FrameImage,
        name: FrameName,
        category: Category,
        profile: &CategoryProfile,
    ) -> Candidate {
        let mut candidate = Candidate::new(frame.path.clone(), name, category);

        let mask = match self.segment(&frame) {
            Ok(mask) => mask,
            Err(e) => {
                self.bump(false);
                return candidate.into_rejected(RejectReason::SegmentationUnavailable {
                    detail: e.to_string(),
                });
            }
        };

        let luma = frame.luma();
        let gate_metrics = self.extractor.gate_metrics(&luma, &mask);
        candidate.raw.mask_regions = gate_metrics.mask_regions;
        candidate.raw.sharpness = gate_metrics.sharpness;

        if let Err(reason) = self.gate.evaluate(&gate_metrics) {
            debug!("{} gated: {}", candidate.id, reason);
            self.bump(true);
            return candidate.into_rejected(reason);
        }

        let keypoints = match self.pose.estimate(&frame) {
            Ok(keypoints) => keypoints,
            Err(e) => {
                self.bump(false);
                return candidate.into_rejected(RejectReason::PoseUnavailable {
                    detail: e.to_string(),
                });
            }
        };

        let metrics = self
            .extractor
            .scoring_metrics(&luma, &mask, keypoints.as_ref(), profile);
        candidate.raw.brightness = metrics.brightness;
        candidate.raw.pose_visibility = metrics.pose_visibility;
        candidate.perceptual_hash = Some(metrics.hash);

        self.bump(false);
        candidate
    }

    fn segment(&self, frame: &FrameImage) -> std::result::Result<super::Mask, ProviderError> {
        let mask = self.segmentation.segment(frame)?;
        if mask.width != frame.width() || mask.height != frame.height() {
            return Err(ProviderError::MaskSize {
                got_w: mask.width,
                got_h: mask.height,
                want_w: frame.width(),
                want_h: frame.height(),
            });
        }
        let want = mask.width as usize * mask.height as usize;
        if mask.data.len() != want {
            return Err(ProviderError::MaskData {
                got: mask.data.len(),
                want,
            });
        }
        Ok(mask)
    }

    fn bump(&self, gated: bool) {
        self.frame_count.fetch_add(1, Ordering::Relaxed);
        if gated {
            self.gated_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::curation::CandidateStatus;
    use crate::core::video::providers::{FixedMaskSegmentation, FixedPoseEstimator};
    use crate::core::video::{KeypointMap, Mask};
    use image::{DynamicImage, GrayImage, Luma};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn create_frame_with_edges(name: &str, width: u32, height: u32) -> FrameImage {
        let img = GrayImage::from_fn(width, height, |x, y| {
            if x % 4 == 0 || y % 4 == 0 {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        FrameImage::from_image(name, DynamicImage::ImageLuma8(img))
    }

    fn create_uniform_frame(name: &str, width: u32, height: u32, value: u8) -> FrameImage {
        let img = GrayImage::from_pixel(width, height, Luma([value]));
        FrameImage::from_image(name, DynamicImage::ImageLuma8(img))
    }

    fn face_keypoints() -> KeypointMap {
        KeypointMap::new()
            .with("nose", 0.9)
            .with("left_eye", 0.9)
            .with("right_eye", 0.9)
    }

    fn manager_with(
        pose: FixedPoseEstimator,
        segmentation: FixedMaskSegmentation,
    ) -> FrameScoringManager {
        FrameScoringManager::new(
            &CurationConfig::default(),
            Arc::new(pose),
            Arc::new(segmentation),
        )
    }

    #[test]
    fn test_manager_creation() {
        let manager = manager_with(FixedPoseEstimator::new(None), FixedMaskSegmentation::full());
        let stats = manager.get_stats();
        assert_eq!(stats.processed_frames, 0);
        assert_eq!(stats.gated_frames, 0);
        assert!(manager.ensure_ready().is_ok());
    }

    #[test]
    fn test_sharp_frame_is_scored() {
        let manager = manager_with(
            FixedPoseEstimator::new(Some(face_keypoints())),
            FixedMaskSegmentation::full(),
        );
        let profile = CurationConfig::default().categories.face;
        let frame = create_frame_with_edges("clip_frame_000042.png", 64, 64);

        let candidate = manager.score_frame(frame, Category::Face, &profile);
        assert!(candidate.status.is_pending());
        assert_eq!(candidate.source_video, "clip");
        assert_eq!(candidate.frame_index, 42);
        assert_eq!(candidate.raw.mask_regions, 1);
        assert!(candidate.raw.sharpness > 50.0);
        assert!((candidate.raw.pose_visibility - 0.6).abs() < 1e-9);
        assert!(candidate.perceptual_hash.is_some());
    }

    #[test]
    fn test_blurry_frame_gated_without_pose_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let pose = FixedPoseEstimator::with_pattern(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            None
        });
        let manager = manager_with(pose, FixedMaskSegmentation::full());
        let profile = CurationConfig::default().categories.full_body;

        let candidate = manager.score_frame(
            create_uniform_frame("clip_frame_1.png", 32, 32, 128),
            Category::FullBody,
            &profile,
        );

        assert_eq!(candidate.status.reason().map(|r| r.code()), Some("too_blurry"));
        assert_eq!(candidate.final_score, 0.0);
        assert!(candidate.perceptual_hash.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(manager.get_stats().gated_frames, 1);
    }

    #[test]
    fn test_empty_mask_rejected() {
        let manager = manager_with(
            FixedPoseEstimator::new(None),
            FixedMaskSegmentation::with_pattern(|f| Mask::empty(f.width(), f.height())),
        );
        let profile = CurationConfig::default().categories.face;
        let candidate = manager.score_frame(
            create_frame_with_edges("clip_frame_3.png", 32, 32),
            Category::Face,
            &profile,
        );
        assert_eq!(candidate.status, CandidateStatus::Rejected(RejectReason::EmptyMask));
    }

    #[test]
    fn test_mask_size_mismatch_is_segmentation_failure() {
        let manager = manager_with(
            FixedPoseEstimator::new(None),
            FixedMaskSegmentation::with_pattern(|_| Mask::full(2, 2)),
        );
        let profile = CurationConfig::default().categories.face;
        let candidate = manager.score_frame(
            create_frame_with_edges("clip_frame_4.png", 32, 32),
            Category::Face,
            &profile,
        );
        assert_eq!(
            candidate.status.reason().map(|r| r.code()),
            Some("segmentation_unavailable")
        );
    }

    #[test]
    fn test_short_mask_data_is_segmentation_failure() {
        let manager = manager_with(
            FixedPoseEstimator::new(None),
            FixedMaskSegmentation::with_pattern(|f| Mask {
                width: f.width(),
                height: f.height(),
                data: vec![true; 10],
            }),
        );
        let profile = CurationConfig::default().categories.face;
        let candidate = manager.score_frame(
            create_frame_with_edges("clip_frame_5.png", 32, 32),
            Category::Face,
            &profile,
        );
        assert_eq!(
            candidate.status.reason().map(|r| r.code()),
            Some("segmentation_unavailable")
        );
        assert_eq!(candidate.final_score, 0.0);
        assert_eq!(manager.get_stats().processed_frames, 1);
    }

    #[test]
    fn test_unparseable_name_rejected() {
        let manager = manager_with(FixedPoseEstimator::new(None), FixedMaskSegmentation::full());
        let profile = CurationConfig::default().categories.face;
        let candidate = manager.score_frame(
            create_frame_with_edges("random.png", 32, 32),
            Category::Face,
            &profile,
        );
        assert_eq!(
            candidate.status,
            CandidateStatus::Rejected(RejectReason::UnparseableName)
        );
    }

    #[test]
    fn test_batch_preserves_order_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..4 {
            let path = dir.path().join(format!("v_frame_{}.png", i));
            create_frame_with_edges("unused", 32, 32)
                .image
                .save(&path)
                .unwrap();
            paths.push(path);
        }
        paths.push(dir.path().join("v_frame_99.png"));

        let manager = manager_with(
            FixedPoseEstimator::new(Some(face_keypoints())),
            FixedMaskSegmentation::full(),
        );
        let profile = CurationConfig::default().categories.face;
        let results = manager.process_batch(&paths, Category::Face, &profile);

        let indices: Vec<u64> = results.iter().map(|c| c.frame_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 99]);
        assert_eq!(results[4].status.reason().map(|r| r.code()), Some("unreadable"));
        assert_eq!(manager.get_stats().processed_frames, 5);

        manager.reset();
        assert_eq!(manager.get_stats().processed_frames, 0);
    }
}
