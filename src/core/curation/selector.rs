//! 贪心选择：按排名顺序逐个决定接收/拒绝，直到选满
//!
//! 三级过滤：全局近重复 -> 同源近重复 -> 时间分布配额（脸部类别跳过第三级）。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::candidate::{Candidate, Category, RejectReason};
use super::manifest::SourceManifest;
use crate::core::config::{CurationConfig, TemporalConfig};
use crate::core::video::PerceptualHash;

/// 单个类别的选择参数
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPolicy {
    pub category: Category,
    pub capacity: usize,
    pub global_hash_threshold: u32,
    pub intra_source_hash_threshold: u32,
    /// None 表示该类别不做时间分布检查
    pub temporal: Option<TemporalConfig>,
}

impl SelectionPolicy {
    pub fn for_category(config: &CurationConfig, category: Category) -> Self {
        let profile = config.categories.get(category);
        Self {
            category,
            capacity: config.top_n,
            global_hash_threshold: config.global_hash_threshold,
            intra_source_hash_threshold: config.intra_source_hash_threshold,
            temporal: (!profile.temporal_exempt).then_some(config.temporal),
        }
    }
}

/// 对单个候选的决定
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionDecision {
    Accepted,
    Rejected(RejectReason),
    /// 已被质量门淘汰（或缺少特征），直接跳过
    Gated,
    /// 集合已满，没有评估
    NotReached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedEntry {
    /// 入选名次，从 1 开始
    pub rank: usize,
    /// 在排序后的候选序列中的位置
    pub position: usize,
    pub id: String,
    pub source_video: String,
    pub frame_index: u64,
    pub final_score: f64,
    pub hash: PerceptualHash,
}

/// 一个类别最终入选的帧，按接收顺序排列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSet {
    pub category: Category,
    pub capacity: usize,
    pub entries: Vec<SelectedEntry>,
}

impl SelectionSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }
}

/// 选择器自身持有全部累积状态，对同一排序序列重复运行结果一致
pub struct CurationSelector<'a> {
    policy: SelectionPolicy,
    manifest: &'a SourceManifest,
    accepted: Vec<SelectedEntry>,
    source_hashes: HashMap<String, Vec<PerceptualHash>>,
    source_frame_indices: HashMap<String, Vec<u64>>,
}

impl<'a> CurationSelector<'a> {
    pub fn new(policy: SelectionPolicy, manifest: &'a SourceManifest) -> Self {
        Self {
            policy,
            manifest,
            accepted: Vec::new(),
            source_hashes: HashMap::new(),
            source_frame_indices: HashMap::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.accepted.len() >= self.policy.capacity
    }

    /// 评估下一个候选，接收时更新状态
    pub fn consider(&mut self, position: usize, candidate: &Candidate) -> SelectionDecision {
        if self.is_full() {
            return SelectionDecision::NotReached;
        }
        if candidate.final_score == 0.0 || !candidate.status.is_pending() {
            return SelectionDecision::Gated;
        }
        let Some(hash) = candidate.perceptual_hash else {
            return SelectionDecision::Gated;
        };

        if let Some(reason) = self.check(candidate, &hash) {
            return SelectionDecision::Rejected(reason);
        }

        self.accept(position, candidate, hash);
        SelectionDecision::Accepted
    }

    /// 按顺序遍历全部候选，返回入选集合与逐个决定（与输入一一对应）
    pub fn run(mut self, ranked: &[Candidate]) -> (SelectionSet, Vec<SelectionDecision>) {
        let decisions = ranked
            .iter()
            .enumerate()
            .map(|(position, candidate)| self.consider(position, candidate))
            .collect();
        (self.finish(), decisions)
    }

    pub fn finish(self) -> SelectionSet {
        SelectionSet {
            category: self.policy.category,
            capacity: self.policy.capacity,
            entries: self.accepted,
        }
    }

    fn check(&self, candidate: &Candidate, hash: &PerceptualHash) -> Option<RejectReason> {
        let other_sources = self
            .source_hashes
            .iter()
            .filter(|(source, _)| **source != candidate.source_video)
            .flat_map(|(_, seen)| seen);
        if let Some(distance) = closest_within(other_sources, hash, self.policy.global_hash_threshold) {
            return Some(RejectReason::GlobalDuplicate { distance });
        }

        // 同源碰撞一律记为同源重复，全局阈值更大时也同样生效
        let source_threshold = self
            .policy
            .intra_source_hash_threshold
            .max(self.policy.global_hash_threshold);
        if let Some(seen) = self.source_hashes.get(&candidate.source_video) {
            if let Some(distance) = closest_within(seen, hash, source_threshold) {
                return Some(RejectReason::SourceDuplicate { distance });
            }
        }

        let temporal = self.policy.temporal?;
        let selected = self
            .source_frame_indices
            .get(&candidate.source_video)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let k = selected.len();

        if k >= temporal.max_per_source {
            return Some(RejectReason::SourceCapReached { accepted: k });
        }
        if k < temporal.spread_after {
            return None;
        }

        let avg_index = selected.iter().map(|&i| i as f64).sum::<f64>() / k as f64;
        let total = self
            .manifest
            .total_frames(&candidate.source_video)
            .unwrap_or(0);

        if total == 0 || !passes_spread(candidate.frame_index, avg_index, total) {
            return Some(RejectReason::TemporalReject {
                frame_index: candidate.frame_index,
                avg_index,
                total_frames: total,
            });
        }

        None
    }

    fn accept(&mut self, position: usize, candidate: &Candidate, hash: PerceptualHash) {
        self.accepted.push(SelectedEntry {
            rank: self.accepted.len() + 1,
            position,
            id: candidate.id.clone(),
            source_video: candidate.source_video.clone(),
            frame_index: candidate.frame_index,
            final_score: candidate.final_score,
            hash,
        });
        self.source_hashes
            .entry(candidate.source_video.clone())
            .or_default()
            .push(hash);
        if self.policy.temporal.is_some() {
            self.source_frame_indices
                .entry(candidate.source_video.clone())
                .or_default()
                .push(candidate.frame_index);
        }
    }
}

/// 已选帧集中在前半段时要求新帧落在 (avg+total)/2 之后，否则要求落在 avg/2 之前
pub fn passes_spread(frame_index: u64, avg_index: f64, total_frames: u64) -> bool {
    let total = total_frames as f64;
    let index = frame_index as f64;
    if avg_index < total / 2.0 {
        index > (avg_index + total) / 2.0
    } else {
        index < avg_index / 2.0
    }
}

/// 距离小于阈值的已见哈希中最近的那个距离
fn closest_within<'h>(
    seen: impl IntoIterator<Item = &'h PerceptualHash>,
    hash: &PerceptualHash,
    threshold: u32,
) -> Option<u32> {
    seen.into_iter()
        .map(|s| s.distance(hash))
        .filter(|&d| d < threshold)
        .min()
}
