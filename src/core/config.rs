//! 筛选引擎配置
//!
//! 所有行为差异（权重、阈值、各类别关键点子集、时间分布参数）都是数据，
//! 不是分叉的代码路径。

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::core::curation::Category;
use crate::core::error::{CurationError, Result};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    /// 每个类别最多保留的帧数 N
    pub top_n: usize,
    /// 跨来源去重阈值（汉明距离小于该值视为重复）
    pub global_hash_threshold: u32,
    /// 同来源去重阈值，比全局阈值更大：同一视频的帧需要更大的差异才算不同
    pub intra_source_hash_threshold: u32,
    pub gate: GateConfig,
    pub weights: Weights,
    pub features: FeatureConfig,
    pub temporal: TemporalConfig,
    pub categories: CategoryProfiles,
    /// 并行线程数，0 表示使用 CPU 核心数
    pub workers: usize,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            top_n: 100,
            global_hash_threshold: 3,
            intra_source_hash_threshold: 10,
            gate: GateConfig::default(),
            weights: Weights::default(),
            features: FeatureConfig::default(),
            temporal: TemporalConfig::default(),
            categories: CategoryProfiles::default(),
            workers: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// 蒙版中允许的最大独立大区域数
    pub max_mask_regions: usize,
    /// 原始清晰度下限（拉普拉斯方差）
    pub min_sharpness: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_mask_regions: 3,
            min_sharpness: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub pose: f64,
    pub sharpness: f64,
    pub brightness: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            pose: 0.60,
            sharpness: 0.30,
            brightness: 0.10,
        }
    }
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.pose + self.sharpness + self.brightness
    }
}

/// 姿态可见度的计算方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseScoring {
    /// 置信度超过阈值的关键点所占比例
    #[default]
    VisibleFraction,
    /// 关键点置信度之和除以子集大小
    MeanConfidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub ideal_brightness: f64,
    /// true（默认）时只在蒙版覆盖的像素上计算平均亮度，false 时用整帧
    pub masked_brightness: bool,
    /// 区域面积需超过整图面积的该比例才计入拓扑数
    pub min_region_area_ratio: f64,
    pub visibility_threshold: f32,
    pub pose_scoring: PoseScoring,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            ideal_brightness: 128.0,
            masked_brightness: true,
            min_region_area_ratio: 0.005,
            visibility_threshold: 0.5,
            pose_scoring: PoseScoring::VisibleFraction,
        }
    }
}

/// 同一来源视频的时间分布限制
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    /// 已接收数量达到该值后，下一帧必须落在时间轴的另一侧
    pub spread_after: usize,
    /// 每个来源的硬上限
    pub max_per_source: usize,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            spread_after: 5,
            max_per_source: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryProfile {
    /// 输入/输出目录名
    pub dir_name: String,
    /// 计算姿态可见度所需的关键点
    pub keypoints: Vec<String>,
    /// 出现即扣分的关键点（例如近景里出现脚踝）
    pub penalized_keypoints: Vec<String>,
    pub penalty_factor: f64,
    /// 跳过时间分布与来源上限检查
    pub temporal_exempt: bool,
}

impl Default for CategoryProfile {
    fn default() -> Self {
        Self {
            dir_name: String::new(),
            keypoints: Vec::new(),
            penalized_keypoints: Vec::new(),
            penalty_factor: 0.5,
            temporal_exempt: false,
        }
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryProfiles {
    pub face: CategoryProfile,
    pub upper_body: CategoryProfile,
    pub full_body: CategoryProfile,
}

impl Default for CategoryProfiles {
    fn default() -> Self {
        let face = names(&["nose", "left_eye", "right_eye", "mouth_left", "mouth_right"]);
        let upper = names(&["nose", "left_shoulder", "right_shoulder", "left_hip", "right_hip"]);
        let mut full = upper.clone();
        full.extend(names(&["left_ankle", "right_ankle"]));

        Self {
            face: CategoryProfile {
                dir_name: "face_and_hair".into(),
                keypoints: face,
                temporal_exempt: true,
                ..Default::default()
            },
            upper_body: CategoryProfile {
                dir_name: "upper_body".into(),
                keypoints: upper,
                ..Default::default()
            },
            full_body: CategoryProfile {
                dir_name: "full_body".into(),
                keypoints: full,
                ..Default::default()
            },
        }
    }
}

impl CategoryProfiles {
    pub fn get(&self, category: Category) -> &CategoryProfile {
        match category {
            Category::Face => &self.face,
            Category::UpperBody => &self.upper_body,
            Category::FullBody => &self.full_body,
        }
    }
}

impl CurationConfig {
    /// 从 JSON5 文件加载；缺失的字段使用默认值
    pub fn from_json5_file(path: &Path) -> Result<Self> {
        info!("⚙️ Loading curation config from {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::from_json5_str(&text)
    }

    pub fn from_json5_str(text: &str) -> Result<Self> {
        let config: CurationConfig = json5::from_str(text)
            .map_err(|e| CurationError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }

    /// 在任何打分开始之前校验配置，配置错误属于致命错误
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(CurationError::Config("top_n must be at least 1".into()));
        }

        let w = &self.weights;
        if w.pose < 0.0 || w.sharpness < 0.0 || w.brightness < 0.0 {
            return Err(CurationError::Config(format!(
                "weights must be non-negative, got {:?}",
                w
            )));
        }
        if (w.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(CurationError::Config(format!(
                "weights must sum to 1.0, got {:.6}",
                w.sum()
            )));
        }

        if !self.gate.min_sharpness.is_finite() || self.gate.min_sharpness < 0.0 {
            return Err(CurationError::Config(format!(
                "gate.min_sharpness must be a non-negative number, got {}",
                self.gate.min_sharpness
            )));
        }

        let f = &self.features;
        if !(0.0..1.0).contains(&f.min_region_area_ratio) {
            return Err(CurationError::Config(format!(
                "features.min_region_area_ratio must be in [0, 1), got {}",
                f.min_region_area_ratio
            )));
        }
        if !(0.0..=1.0).contains(&f.visibility_threshold) {
            return Err(CurationError::Config(format!(
                "features.visibility_threshold must be in [0, 1], got {}",
                f.visibility_threshold
            )));
        }
        if f.ideal_brightness <= 0.0 {
            return Err(CurationError::Config(format!(
                "features.ideal_brightness must be positive, got {}",
                f.ideal_brightness
            )));
        }

        if self.temporal.spread_after == 0 {
            return Err(CurationError::Config(
                "temporal.spread_after must be at least 1".into(),
            ));
        }
        if self.temporal.spread_after > self.temporal.max_per_source {
            return Err(CurationError::Config(format!(
                "temporal.spread_after ({}) must not exceed temporal.max_per_source ({})",
                self.temporal.spread_after, self.temporal.max_per_source
            )));
        }

        for category in Category::ALL {
            let profile = self.categories.get(category);
            if profile.dir_name.is_empty() {
                return Err(CurationError::Config(format!(
                    "category {} has no dir_name",
                    category
                )));
            }
            if profile.keypoints.is_empty() {
                return Err(CurationError::Config(format!(
                    "category {} has no keypoints to score",
                    category
                )));
            }
            if !(0.0..=1.0).contains(&profile.penalty_factor) {
                return Err(CurationError::Config(format!(
                    "category {} penalty_factor must be in [0, 1], got {}",
                    category, profile.penalty_factor
                )));
            }
        }

        if self.intra_source_hash_threshold < self.global_hash_threshold {
            warn!(
                "intra_source_hash_threshold ({}) is below global_hash_threshold ({}); same-source filtering is a no-op",
                self.intra_source_hash_threshold, self.global_hash_threshold
            );
        }

        Ok(())
    }
}
