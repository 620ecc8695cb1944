use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::candidate::{Candidate, Category};
use super::manifest::SourceManifest;
use super::scoring::{rank, ScoreAggregator};
use super::selector::{CurationSelector, SelectionDecision, SelectionPolicy, SelectionSet};
use crate::core::config::CurationConfig;
use crate::core::error::{CurationError, Result};
use crate::core::video::{FrameImage, FrameScoringManager, PoseEstimator, SegmentationProvider};

/// 一个类别的输入帧
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub category: Category,
    pub frames: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub total: usize,
    /// 特征提取或质量门阶段被拒绝
    pub gated: usize,
    pub accepted: usize,
    /// 选择阶段被拒绝
    pub rejected: usize,
    /// 集合选满后未评估
    pub not_reached: usize,
}

/// 一个类别的完整结果，候选按排名顺序排列
#[derive(Debug, Clone)]
pub struct CategoryOutcome {
    pub category: Category,
    pub candidates: Vec<Candidate>,
    pub selection: SelectionSet,
    pub max_sharpness: f64,
    pub stats: CategoryStats,
}

/// 筛选引擎：打分 -> 归一化 -> 排序 -> 贪心选择
pub struct CurationEngine {
    config: CurationConfig,
    scorer: FrameScoringManager,
    aggregator: ScoreAggregator,
    pool: rayon::ThreadPool,
}

impl CurationEngine {
    pub fn new(
        config: CurationConfig,
        pose: Arc<dyn PoseEstimator>,
        segmentation: Arc<dyn SegmentationProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let workers = config.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| CurationError::WorkerPool(e.to_string()))?;
        debug!("Curation worker pool ready with {} threads", workers);

        Ok(Self {
            scorer: FrameScoringManager::new(&config, pose, segmentation),
            aggregator: ScoreAggregator::new(config.weights),
            config,
            pool,
        })
    }

    pub fn config(&self) -> &CurationConfig {
        &self.config
    }

    pub fn scorer(&self) -> &FrameScoringManager {
        &self.scorer
    }

    pub fn ensure_ready(&self) -> Result<()> {
        self.scorer.ensure_ready()
    }

    /// 所有类别并行处理
    pub fn run(
        &self,
        inputs: Vec<CategoryInput>,
        manifest: &SourceManifest,
    ) -> Result<Vec<CategoryOutcome>> {
        self.pool.install(|| {
            inputs
                .into_par_iter()
                .map(|input| self.curate_paths(input.category, &input.frames, manifest))
                .collect()
        })
    }

    pub fn curate_paths(
        &self,
        category: Category,
        paths: &[PathBuf],
        manifest: &SourceManifest,
    ) -> Result<CategoryOutcome> {
        info!("🖼️ Scoring {} frames for {}", paths.len(), category);
        let profile = self.config.categories.get(category);
        let candidates = self
            .pool
            .install(|| self.scorer.process_batch(paths, category, profile));
        self.curate_candidates(category, candidates, manifest)
    }

    /// 已解码的帧，主要给测试和嵌入式调用方使用
    pub fn curate_frames(
        &self,
        category: Category,
        frames: Vec<FrameImage>,
        manifest: &SourceManifest,
    ) -> Result<CategoryOutcome> {
        let profile = self.config.categories.get(category);
        let candidates = self.pool.install(|| {
            frames
                .into_par_iter()
                .map(|frame| self.scorer.score_frame(frame, category, profile))
                .collect::<Vec<_>>()
        });
        self.curate_candidates(category, candidates, manifest)
    }

    /// 对已打分的候选做归一化、排序与选择，并写回每个候选的最终状态
    pub fn curate_candidates(
        &self,
        category: Category,
        mut candidates: Vec<Candidate>,
        manifest: &SourceManifest,
    ) -> Result<CategoryOutcome> {
        let gated = candidates.iter().filter(|c| !c.status.is_pending()).count();

        let max_sharpness = self.aggregator.normalize(&mut candidates);
        rank(&mut candidates);

        let policy = SelectionPolicy::for_category(&self.config, category);
        let (selection, decisions) = CurationSelector::new(policy, manifest).run(&candidates);

        let mut stats = CategoryStats {
            total: candidates.len(),
            gated,
            ..CategoryStats::default()
        };

        for (candidate, decision) in candidates.iter_mut().zip(decisions) {
            match decision {
                SelectionDecision::Accepted => {
                    candidate.accept()?;
                    stats.accepted += 1;
                }
                SelectionDecision::Rejected(reason) => {
                    debug!("{} rejected: {}", candidate.id, reason);
                    candidate.reject(reason)?;
                    stats.rejected += 1;
                }
                SelectionDecision::NotReached => stats.not_reached += 1,
                SelectionDecision::Gated => {}
            }
        }

        info!(
            "🎯 {}: accepted {}/{} (gated {}, rejected {}, not reached {})",
            category, stats.accepted, stats.total, stats.gated, stats.rejected, stats.not_reached
        );

        Ok(CategoryOutcome {
            category,
            candidates,
            selection,
            max_sharpness,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::curation::{CandidateStatus, RejectReason};
    use crate::core::video::{FixedMaskSegmentation, FixedPoseEstimator, KeypointMap, Mask};
    use image::{DynamicImage, GrayImage, Luma};

    /// 每帧纹理周期不同，保证哈希互不相同
    fn textured_frame(name: &str, period: u32) -> FrameImage {
        let img = GrayImage::from_fn(64, 64, |x, y| {
            if (x / period + y / (period + 1)) % 2 == 0 {
                Luma([230])
            } else {
                Luma([20])
            }
        });
        FrameImage::from_image(name, DynamicImage::ImageLuma8(img))
    }

    fn blocks_mask(width: u32, height: u32, count: u32) -> Mask {
        let mut mask = Mask::empty(width, height);
        for i in 0..count {
            let x0 = i * 12;
            for y in 0..8 {
                for x in x0..x0 + 8 {
                    mask.data[(y * width + x) as usize] = true;
                }
            }
        }
        mask
    }

    fn engine(segmentation: FixedMaskSegmentation) -> CurationEngine {
        let keypoints = KeypointMap::new()
            .with("nose", 0.9)
            .with("left_shoulder", 0.9)
            .with("right_shoulder", 0.9);
        let config = CurationConfig {
            workers: 2,
            ..CurationConfig::default()
        };
        CurationEngine::new(
            config,
            Arc::new(FixedPoseEstimator::new(Some(keypoints))),
            Arc::new(segmentation),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CurationConfig {
            top_n: 0,
            ..CurationConfig::default()
        };
        let result = CurationEngine::new(
            config,
            Arc::new(FixedPoseEstimator::new(None)),
            Arc::new(FixedMaskSegmentation::full()),
        );
        assert!(matches!(result, Err(CurationError::Config(_))));
    }

    #[test]
    fn test_gate_precedence() {
        // 多目标蒙版：即使纹理最锐利也必须被淘汰
        let segmentation = FixedMaskSegmentation::with_pattern(|frame| {
            if frame.path.to_string_lossy().contains("crowd") {
                blocks_mask(frame.width(), frame.height(), 5)
            } else {
                Mask::full(frame.width(), frame.height())
            }
        });
        let engine = engine(segmentation);
        let frames = vec![
            textured_frame("crowd_frame_1.png", 1),
            textured_frame("solo_frame_1.png", 3),
            textured_frame("solo_frame_2.png", 6),
        ];

        let outcome = engine
            .curate_frames(Category::UpperBody, frames, &SourceManifest::new())
            .unwrap();

        let crowd = outcome
            .candidates
            .iter()
            .find(|c| c.source_video == "crowd")
            .unwrap();
        assert_eq!(crowd.final_score, 0.0);
        assert!(crowd.normalized.is_none());
        assert_eq!(
            crowd.status,
            CandidateStatus::Rejected(RejectReason::MaskTopology { regions: 5, max: 3 })
        );
        assert_eq!(outcome.candidates.last().map(|c| c.id.as_str()), Some("crowd_frame_1.png"));
        assert_eq!(outcome.stats.gated, 1);
        assert!(outcome.selection.entries.iter().all(|e| e.source_video == "solo"));
    }

    #[test]
    fn test_statuses_written_back() {
        let engine = engine(FixedMaskSegmentation::full());
        let frames = vec![
            textured_frame("a_frame_1.png", 2),
            textured_frame("b_frame_1.png", 2),
            textured_frame("c_frame_1.png", 5),
        ];

        let outcome = engine
            .curate_frames(Category::Face, frames, &SourceManifest::new())
            .unwrap();

        // a 与 b 像素完全相同：排在后面的那个是全局重复
        assert_eq!(outcome.stats.total, 3);
        assert_eq!(outcome.stats.accepted, 2);
        assert_eq!(outcome.stats.rejected, 1);
        let duplicate = outcome
            .candidates
            .iter()
            .find(|c| matches!(c.status, CandidateStatus::Rejected(_)))
            .unwrap();
        assert_eq!(duplicate.status.reason().map(|r| r.code()), Some("global_duplicate"));
        assert_eq!(outcome.selection.len(), 2);
    }

    #[test]
    fn test_not_reached_stay_pending() {
        let config = CurationConfig {
            top_n: 1,
            workers: 1,
            ..CurationConfig::default()
        };
        let engine = CurationEngine::new(
            config,
            Arc::new(FixedPoseEstimator::new(None)),
            Arc::new(FixedMaskSegmentation::full()),
        )
        .unwrap();
        let frames = vec![
            textured_frame("a_frame_1.png", 2),
            textured_frame("b_frame_1.png", 4),
        ];

        let outcome = engine
            .curate_frames(Category::FullBody, frames, &SourceManifest::new())
            .unwrap();
        assert_eq!(outcome.stats.accepted, 1);
        assert_eq!(outcome.stats.not_reached, 1);
        assert!(outcome.candidates[1].status.is_pending());
    }
}
