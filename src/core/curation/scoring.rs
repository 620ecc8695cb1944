use rayon::prelude::*;

use super::candidate::{Candidate, NormalizedScores};
use crate::core::config::Weights;

/// 通过质量门的候选中最大的原始清晰度；全为 0 时退回 1.0，避免除零
pub fn max_raw_sharpness(candidates: &[Candidate]) -> f64 {
    let max = candidates
        .par_iter()
        .filter(|c| c.status.is_pending())
        .map(|c| c.raw.sharpness)
        .reduce(|| 0.0, f64::max);

    if max > 0.0 {
        max
    } else {
        1.0
    }
}

/// 类别内归一化与加权汇总
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    weights: Weights,
}

impl ScoreAggregator {
    pub fn new(weights: Weights) -> Self {
        Self { weights }
    }

    pub fn combine(&self, scores: &NormalizedScores) -> f64 {
        self.weights.pose * scores.pose_visibility
            + self.weights.sharpness * scores.sharpness
            + self.weights.brightness * scores.brightness
    }

    /// 为所有待定候选写入归一化分数与最终分，返回使用的清晰度分母。
    /// 已拒绝的候选保持 0.0。
    pub fn normalize(&self, candidates: &mut [Candidate]) -> f64 {
        let max_sharpness = max_raw_sharpness(candidates);

        candidates
            .par_iter_mut()
            .filter(|c| c.status.is_pending())
            .for_each(|c| {
                let scores = NormalizedScores {
                    pose_visibility: c.raw.pose_visibility,
                    sharpness: c.raw.sharpness / max_sharpness,
                    brightness: c.raw.brightness,
                };
                let score = self.combine(&scores);
                c.normalized = Some(scores);
                // 0.0 专门表示"被质量门淘汰"，幸存者的分数不能与之混淆
                c.final_score = if score > 0.0 { score } else { f64::MIN_POSITIVE };
            });

        max_sharpness
    }
}

/// 按最终分降序稳定排序，同分保持输入顺序
pub fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
}
