use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::error::{CurationError, Result};
use crate::core::video::PerceptualHash;

static FRAME_INDEX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)_frame_(\d+)\.(jpg|jpeg|png|webp)$").expect("static frame name pattern")
});

const FRAME_MARKER: &str = "_frame_";

/// 姿态类别，上游分拣时确定，这里不可变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Face,
    UpperBody,
    FullBody,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Face, Category::UpperBody, Category::FullBody];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Face => "face",
            Category::UpperBody => "upper_body",
            Category::FullBody => "full_body",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 从文件名解析出的来源视频与帧序号
/// 命名约定：`<source_video>_frame_<padded index>.<ext>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameName {
    pub source_video: String,
    pub frame_index: u64,
}

impl FrameName {
    pub fn parse(file_name: &str) -> Option<Self> {
        let caps = FRAME_INDEX_RE.captures(file_name)?;
        let frame_index = caps.get(1)?.as_str().parse::<u64>().ok()?;
        // 来源名取第一个 `_frame_` 之前的部分
        let (source_video, _) = file_name.split_once(FRAME_MARKER)?;
        if source_video.is_empty() {
            return None;
        }
        Some(Self {
            source_video: source_video.to_string(),
            frame_index,
        })
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(Self::parse)
    }
}

/// 特征提取得到的原始指标，计算一次后不再修改
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawMetrics {
    pub brightness: f64,
    /// 蒙版内拉普拉斯响应的方差，无上界
    pub sharpness: f64,
    pub pose_visibility: f64,
    /// 面积超过阈值的独立蒙版区域数，只给质量门使用
    pub mask_regions: usize,
}

/// 类别内归一化后的分数，均在 [0,1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedScores {
    pub pose_visibility: f64,
    pub sharpness: f64,
    pub brightness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    Unreadable { detail: String },
    SegmentationUnavailable { detail: String },
    PoseUnavailable { detail: String },
    UnparseableName,
    EmptyMask,
    MaskTopology { regions: usize, max: usize },
    TooBlurry { sharpness: f64, min: f64 },
    GlobalDuplicate { distance: u32 },
    SourceDuplicate { distance: u32 },
    TemporalReject {
        frame_index: u64,
        avg_index: f64,
        total_frames: u64,
    },
    SourceCapReached { accepted: usize },
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::Unreadable { .. } => "unreadable",
            RejectReason::SegmentationUnavailable { .. } => "segmentation_unavailable",
            RejectReason::PoseUnavailable { .. } => "pose_unavailable",
            RejectReason::UnparseableName => "unparseable_name",
            RejectReason::EmptyMask => "empty_mask",
            RejectReason::MaskTopology { .. } => "mask_topology",
            RejectReason::TooBlurry { .. } => "too_blurry",
            RejectReason::GlobalDuplicate { .. } => "global_duplicate",
            RejectReason::SourceDuplicate { .. } => "source_duplicate",
            RejectReason::TemporalReject { .. } => "temporal_reject",
            RejectReason::SourceCapReached { .. } => "source_cap_reached",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Unreadable { detail } => write!(f, "Fail: unreadable image ({})", detail),
            RejectReason::SegmentationUnavailable { detail } => {
                write!(f, "Fail: no segmentation mask ({})", detail)
            }
            RejectReason::PoseUnavailable { detail } => {
                write!(f, "Fail: keypoint data unavailable ({})", detail)
            }
            RejectReason::UnparseableName => {
                write!(f, "Fail: file name does not match <source>_frame_<index>.<ext>")
            }
            RejectReason::EmptyMask => write!(f, "Fail: Empty mask"),
            RejectReason::MaskTopology { regions, max } => {
                write!(f, "Fail: Too many objects ({} > {})", regions, max)
            }
            RejectReason::TooBlurry { sharpness, min } => {
                write!(f, "Fail: Too blurry (sharpness {:.1} < {:.1})", sharpness, min)
            }
            RejectReason::GlobalDuplicate { distance } => {
                write!(f, "Near-duplicate of an accepted frame (distance {})", distance)
            }
            RejectReason::SourceDuplicate { distance } => write!(
                f,
                "Near-duplicate of an accepted frame from the same video (distance {})",
                distance
            ),
            RejectReason::TemporalReject {
                frame_index,
                avg_index,
                total_frames,
            } => {
                if *total_frames == 0 {
                    write!(f, "Temporal spread test impossible: source length unknown")
                } else {
                    write!(
                        f,
                        "Failed temporal spread test (frame {} vs accepted avg {:.1} of {})",
                        frame_index, avg_index, total_frames
                    )
                }
            }
            RejectReason::SourceCapReached { accepted } => {
                write!(f, "Source video cap reached ({} accepted)", accepted)
            }
        }
    }
}

/// 候选状态：只能从 Pending 向前转移一次
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum CandidateStatus {
    #[default]
    Pending,
    Rejected(RejectReason),
    Accepted,
}

impl CandidateStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CandidateStatus::Pending => "pending",
            CandidateStatus::Rejected(_) => "rejected",
            CandidateStatus::Accepted => "accepted",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, CandidateStatus::Pending)
    }

    pub fn reason(&self) -> Option<&RejectReason> {
        match self {
            CandidateStatus::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

/// 一张待筛选的帧
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// 源文件名
    pub id: String,
    pub path: PathBuf,
    pub source_video: String,
    pub frame_index: u64,
    pub category: Category,
    pub raw: RawMetrics,
    /// 被质量门拦下的候选不计算指纹
    pub perceptual_hash: Option<PerceptualHash>,
    pub normalized: Option<NormalizedScores>,
    /// 0.0 表示已被质量门淘汰，而不是质量低
    pub final_score: f64,
    pub status: CandidateStatus,
}

impl Candidate {
    pub fn new(path: PathBuf, name: FrameName, category: Category) -> Self {
        let id = file_name_of(&path);
        Self {
            id,
            path,
            source_video: name.source_video,
            frame_index: name.frame_index,
            category,
            raw: RawMetrics::default(),
            perceptual_hash: None,
            normalized: None,
            final_score: 0.0,
            status: CandidateStatus::Pending,
        }
    }

    /// 连来源信息都拿不到的帧（无法解析文件名等），直接以拒绝状态创建
    pub fn unusable(path: PathBuf, category: Category, reason: RejectReason) -> Self {
        let id = file_name_of(&path);
        let name = FrameName::parse(&id);
        Self {
            id,
            path,
            source_video: name.as_ref().map(|n| n.source_video.clone()).unwrap_or_default(),
            frame_index: name.map(|n| n.frame_index).unwrap_or(0),
            category,
            raw: RawMetrics::default(),
            perceptual_hash: None,
            normalized: None,
            final_score: 0.0,
            status: CandidateStatus::Rejected(reason),
        }
    }

    /// 特征提取阶段就失败的候选：尚未进入选择流程，直接落为拒绝
    pub fn into_rejected(mut self, reason: RejectReason) -> Self {
        self.final_score = 0.0;
        self.normalized = None;
        self.status = CandidateStatus::Rejected(reason);
        self
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.status, CandidateStatus::Accepted)
    }

    pub fn reject(&mut self, reason: RejectReason) -> Result<()> {
        self.transition(CandidateStatus::Rejected(reason))
    }

    pub fn accept(&mut self) -> Result<()> {
        self.transition(CandidateStatus::Accepted)
    }

    fn transition(&mut self, next: CandidateStatus) -> Result<()> {
        if !self.status.is_pending() {
            return Err(CurationError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.label(),
                to: next.label(),
            });
        }
        self.status = next;
        Ok(())
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
