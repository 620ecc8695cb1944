//! 外部协作者：姿态估计与主体分割
//!
//! 真正的模型在进程外运行，这里只约定接口，并提供读取其产物的实现和测试桩。

use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView};
use log::debug;

use super::frame::LumaFrame;
use super::mask::Mask;
use super::pose::KeypointMap;
use crate::core::error::{CurationError, ProviderError, Result};

/// 已解码的候选帧
#[derive(Debug, Clone)]
pub struct FrameImage {
    pub path: PathBuf,
    pub image: DynamicImage,
}

impl FrameImage {
    pub fn open(path: &Path) -> std::result::Result<Self, ProviderError> {
        let image = image::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            image,
        })
    }

    pub fn from_image(path: impl Into<PathBuf>, image: DynamicImage) -> Self {
        Self {
            path: path.into(),
            image,
        }
    }

    pub fn luma(&self) -> LumaFrame {
        LumaFrame::from_image(&self.image)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// 不含扩展名的文件名
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// 姿态估计能力
pub trait PoseEstimator: Send + Sync {
    /// 运行前检查模型/资产是否就绪，失败则整个运行中止
    fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    /// `Ok(None)` 表示画面中没有人
    fn estimate(&self, frame: &FrameImage)
        -> std::result::Result<Option<KeypointMap>, ProviderError>;
}

/// 主体分割能力
pub trait SegmentationProvider: Send + Sync {
    fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    fn segment(&self, frame: &FrameImage) -> std::result::Result<Mask, ProviderError>;
}

/// 读取姿态模型离线产出的 `<stem>.pose.json`
///
/// 文件内容为关键点名到置信度的对象，或 `null`（没有人）。
pub struct SidecarPoseEstimator {
    dir: Option<PathBuf>,
}

impl SidecarPoseEstimator {
    /// 与帧文件放在同一目录
    pub fn new() -> Self {
        Self { dir: None }
    }

    /// 所有 sidecar 集中在一个目录
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn sidecar_path(&self, frame: &FrameImage) -> PathBuf {
        let name = format!("{}.pose.json", frame.stem());
        match &self.dir {
            Some(dir) => dir.join(name),
            None => frame.path.with_file_name(name),
        }
    }
}

impl Default for SidecarPoseEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseEstimator for SidecarPoseEstimator {
    fn ensure_ready(&self) -> Result<()> {
        match &self.dir {
            Some(dir) if !dir.is_dir() => Err(CurationError::MissingAsset(format!(
                "pose directory {}",
                dir.display()
            ))),
            _ => Ok(()),
        }
    }

    fn estimate(
        &self,
        frame: &FrameImage,
    ) -> std::result::Result<Option<KeypointMap>, ProviderError> {
        let path = self.sidecar_path(frame);
        debug!("Reading keypoints from {}", path.display());
        let text = fs::read_to_string(&path)?;
        let keypoints: Option<KeypointMap> = serde_json::from_str(&text)?;
        Ok(keypoints)
    }
}

/// 确定性姿态桩，用于测试和离线演练
pub struct FixedPoseEstimator {
    pattern: Box<dyn Fn(&Path) -> Option<KeypointMap> + Send + Sync>,
}

impl FixedPoseEstimator {
    /// 每帧都返回同一组关键点
    pub fn new(keypoints: Option<KeypointMap>) -> Self {
        Self::with_pattern(move |_| keypoints.clone())
    }

    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(&Path) -> Option<KeypointMap> + Send + Sync + 'static,
    {
        Self {
            pattern: Box::new(pattern),
        }
    }
}

impl PoseEstimator for FixedPoseEstimator {
    fn estimate(
        &self,
        frame: &FrameImage,
    ) -> std::result::Result<Option<KeypointMap>, ProviderError> {
        Ok((self.pattern)(&frame.path))
    }
}

/// 抠图后的 RGBA 帧：alpha > 0 即主体
pub struct AlphaMaskSegmentation {
    threshold: u8,
}

impl AlphaMaskSegmentation {
    pub fn new() -> Self {
        Self { threshold: 0 }
    }
}

impl Default for AlphaMaskSegmentation {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentationProvider for AlphaMaskSegmentation {
    fn segment(&self, frame: &FrameImage) -> std::result::Result<Mask, ProviderError> {
        Mask::from_alpha(&frame.image, self.threshold)
    }
}

/// 确定性分割桩
pub struct FixedMaskSegmentation {
    pattern: Box<dyn Fn(&FrameImage) -> Mask + Send + Sync>,
}

impl FixedMaskSegmentation {
    /// 整帧都是主体
    pub fn full() -> Self {
        Self::with_pattern(|frame| Mask::full(frame.width(), frame.height()))
    }

    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(&FrameImage) -> Mask + Send + Sync + 'static,
    {
        Self {
            pattern: Box::new(pattern),
        }
    }
}

impl SegmentationProvider for FixedMaskSegmentation {
    fn segment(&self, frame: &FrameImage) -> std::result::Result<Mask, ProviderError> {
        Ok((self.pattern)(frame))
    }
}
