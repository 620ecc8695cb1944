use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::config::{CategoryProfile, FeatureConfig, PoseScoring};

/// 关键点名 -> 置信度
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeypointMap(HashMap<String, f32>);

impl KeypointMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, confidence: f32) -> Self {
        self.0.insert(name.to_string(), confidence);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, confidence: f32) {
        self.0.insert(name.into(), confidence);
    }

    /// 缺失的关键点按 0 处理
    pub fn confidence(&self, name: &str) -> f32 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f32)> for KeypointMap {
    fn from_iter<I: IntoIterator<Item = (String, f32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// 类别关键点子集上的姿态可见度，范围 [0, 1]
///
/// `keypoints` 为 None 表示画面中没有检测到人，得 0 分。
pub fn pose_visibility(
    keypoints: Option<&KeypointMap>,
    profile: &CategoryProfile,
    features: &FeatureConfig,
) -> f64 {
    let Some(keypoints) = keypoints else {
        return 0.0;
    };
    if profile.keypoints.is_empty() {
        return 0.0;
    }

    let threshold = features.visibility_threshold;
    let total = profile.keypoints.len() as f64;

    let score = match features.pose_scoring {
        PoseScoring::VisibleFraction => {
            let visible = profile
                .keypoints
                .iter()
                .filter(|name| keypoints.confidence(name) > threshold)
                .count();
            visible as f64 / total
        }
        PoseScoring::MeanConfidence => {
            let sum: f64 = profile
                .keypoints
                .iter()
                .map(|name| keypoints.confidence(name).clamp(0.0, 1.0) as f64)
                .sum();
            sum / total
        }
    };

    let penalized = profile
        .penalized_keypoints
        .iter()
        .any(|name| keypoints.confidence(name) > threshold);

    if penalized {
        score * profile.penalty_factor
    } else {
        score
    }
}
