use super::frame::{brightness_score, masked_laplacian_variance, LumaFrame};
use super::mask::Mask;
use super::phash::{PerceptualHash, PerceptualHasher};
use super::pose::{pose_visibility, KeypointMap};
use crate::core::config::{CategoryProfile, FeatureConfig};

/// 质量门所需的廉价指标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateMetrics {
    pub mask_regions: usize,
    pub sharpness: f64,
}

/// 通过质量门后才计算的指标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringMetrics {
    pub brightness: f64,
    pub pose_visibility: f64,
    pub hash: PerceptualHash,
}

/// 帧特征提取器，纯函数，无副作用
pub struct FeatureExtractor {
    config: FeatureConfig,
    hasher: PerceptualHasher,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            hasher: PerceptualHasher::new(),
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn mask_topology(&self, mask: &Mask) -> usize {
        mask.count_regions(self.config.min_region_area_ratio)
    }

    pub fn sharpness(&self, luma: &LumaFrame, mask: &Mask) -> f64 {
        masked_laplacian_variance(luma, mask)
    }

    pub fn brightness(&self, luma: &LumaFrame, mask: &Mask) -> f64 {
        let region = self.config.masked_brightness.then_some(mask);
        luma.mean_luma(region)
            .map(|mean| brightness_score(mean, self.config.ideal_brightness))
            .unwrap_or(0.0)
    }

    pub fn pose(&self, keypoints: Option<&KeypointMap>, profile: &CategoryProfile) -> f64 {
        pose_visibility(keypoints, profile, &self.config)
    }

    pub fn perceptual_hash(&self, luma: &LumaFrame) -> PerceptualHash {
        self.hasher.hash(luma)
    }

    pub fn gate_metrics(&self, luma: &LumaFrame, mask: &Mask) -> GateMetrics {
        GateMetrics {
            mask_regions: self.mask_topology(mask),
            sharpness: self.sharpness(luma, mask),
        }
    }

    pub fn scoring_metrics(
        &self,
        luma: &LumaFrame,
        mask: &Mask,
        keypoints: Option<&KeypointMap>,
        profile: &CategoryProfile,
    ) -> ScoringMetrics {
        ScoringMetrics {
            brightness: self.brightness(luma, mask),
            pose_visibility: self.pose(keypoints, profile),
            hash: self.perceptual_hash(luma),
        }
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(FeatureConfig::default())
    }
}
