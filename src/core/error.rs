use std::path::PathBuf;

use thiserror::Error;

/// 运行级错误：配置错误、外部资产缺失、IO 失败。出现即中止整个运行。
#[derive(Debug, Error)]
pub enum CurationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Required asset missing: {0}")]
    MissingAsset(String),
    #[error("Input root not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error("Invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: &'static str,
        to: &'static str,
    },
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

/// 单帧级错误：外部协作者（姿态/分割）或解码失败。只会让该候选被拒绝。
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed keypoint data: {0}")]
    Keypoints(#[from] serde_json::Error),
    #[error("no alpha channel to use as mask")]
    NoAlpha,
    #[error("mask size {got_w}x{got_h} does not match frame {want_w}x{want_h}")]
    MaskSize {
        got_w: u32,
        got_h: u32,
        want_w: u32,
        want_h: u32,
    },
    #[error("mask holds {got} pixels, expected {want}")]
    MaskData { got: usize, want: usize },
}

pub type Result<T> = std::result::Result<T, CurationError>;
