use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::core::config::CurationConfig;
use crate::core::curation::{
    Candidate, Category, CategoryOutcome, CategoryStats, NormalizedScores, RawMetrics,
};
use crate::core::error::Result;
use crate::core::video::PerceptualHash;

/// 审计记录中的单个候选
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// 排序后的位置，从 1 开始
    pub position: usize,
    pub file: String,
    pub source_video: String,
    pub frame_index: u64,
    pub raw: RawMetrics,
    pub normalized: Option<NormalizedScores>,
    pub final_score: f64,
    pub phash: Option<PerceptualHash>,
    /// pending / accepted / rejected，pending 表示集合选满后未评估
    pub status: String,
    pub reason_code: Option<String>,
    pub reason: Option<String>,
    /// 入选名次（导出文件名前缀）
    pub selected_rank: Option<usize>,
}

impl CandidateRecord {
    pub fn from_candidate(position: usize, candidate: &Candidate, selected_rank: Option<usize>) -> Self {
        let reason = candidate.status.reason();
        Self {
            position,
            file: candidate.id.clone(),
            source_video: candidate.source_video.clone(),
            frame_index: candidate.frame_index,
            raw: candidate.raw,
            normalized: candidate.normalized,
            final_score: candidate.final_score,
            phash: candidate.perceptual_hash,
            status: candidate.status.label().to_string(),
            reason_code: reason.map(|r| r.code().to_string()),
            reason: reason.map(|r| r.to_string()),
            selected_rank,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub dir_name: String,
    pub max_sharpness: f64,
    pub stats: CategoryStats,
    /// 入选文件，按入选顺序
    pub selected: Vec<String>,
    pub candidates: Vec<CandidateRecord>,
}

impl CategoryReport {
    pub fn from_outcome(dir_name: &str, outcome: &CategoryOutcome) -> Self {
        let ranks: BTreeMap<usize, usize> = outcome
            .selection
            .entries
            .iter()
            .map(|e| (e.position, e.rank))
            .collect();

        let candidates = outcome
            .candidates
            .iter()
            .enumerate()
            .map(|(i, c)| CandidateRecord::from_candidate(i + 1, c, ranks.get(&i).copied()))
            .collect();

        Self {
            dir_name: dir_name.to_string(),
            max_sharpness: outcome.max_sharpness,
            stats: outcome.stats,
            selected: outcome.selection.entries.iter().map(|e| e.id.clone()).collect(),
            candidates,
        }
    }
}

/// 因目录缺失或为空而跳过的类别
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCategory {
    pub category: Category,
    pub dir_name: String,
    pub reason: String,
}

/// 一次运行的完整审计记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub config: CurationConfig,
    pub dry_run: bool,
    pub totals: CategoryStats,
    pub categories: BTreeMap<Category, CategoryReport>,
    pub skipped: Vec<SkippedCategory>,
}

impl RunReport {
    pub fn new(config: CurationConfig, dry_run: bool) -> Self {
        Self {
            config,
            dry_run,
            totals: CategoryStats::default(),
            categories: BTreeMap::new(),
            skipped: Vec::new(),
        }
    }

    pub fn add_category(&mut self, category: Category, report: CategoryReport) {
        let s = report.stats;
        self.totals.total += s.total;
        self.totals.gated += s.gated;
        self.totals.accepted += s.accepted;
        self.totals.rejected += s.rejected;
        self.totals.not_reached += s.not_reached;
        self.categories.insert(category, report);
    }

    pub fn skip(&mut self, category: Category, dir_name: &str, reason: impl Into<String>) {
        self.skipped.push(SkippedCategory {
            category,
            dir_name: dir_name.to_string(),
            reason: reason.into(),
        });
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        info!("📝 Report written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::curation::{FrameName, RejectReason};
    use std::path::PathBuf;

    #[test]
    fn test_record_carries_reason() {
        let name = FrameName::parse("v_frame_3.png").unwrap();
        let candidate = Candidate::new(PathBuf::from("v_frame_3.png"), name, Category::Face)
            .into_rejected(RejectReason::EmptyMask);
        let record = CandidateRecord::from_candidate(4, &candidate, None);
        assert_eq!(record.status, "rejected");
        assert_eq!(record.reason_code.as_deref(), Some("empty_mask"));
        assert_eq!(record.reason.as_deref(), Some("Fail: Empty mask"));
    }

    #[test]
    fn test_report_json_uses_category_keys() {
        let mut report = RunReport::new(CurationConfig::default(), false);
        report.add_category(
            Category::UpperBody,
            CategoryReport {
                dir_name: "upper_body".into(),
                max_sharpness: 1.0,
                stats: CategoryStats {
                    total: 3,
                    accepted: 1,
                    ..CategoryStats::default()
                },
                selected: vec!["a_frame_1.png".into()],
                candidates: Vec::new(),
            },
        );
        report.skip(Category::Face, "face_and_hair", "directory missing");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("scoring_results.json");
        report.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["categories"]["upper_body"]["stats"]["accepted"], 1);
        assert_eq!(value["totals"]["total"], 3);
        assert_eq!(value["skipped"][0]["category"], "face");
    }
}
