//! 来源视频清单：每个来源视频的最大帧序号，近似视频长度

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use super::candidate::FrameName;
use crate::core::error::{CurationError, Result};

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// 按扩展名判断是否是帧图片
pub fn is_frame_file(path: &Path) -> bool {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(e) => e.to_lowercase(),
        None => return false,
    };
    FRAME_EXTENSIONS.contains(&ext.as_str())
}

/// 列出目录下（不递归）的帧图片，按文件名排序
pub fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| CurationError::Io(e.into()))?;
        let path = entry.path();
        if path.is_file() && is_frame_file(path) {
            files.push(path.to_path_buf());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceManifest {
    max_index: HashMap<String, u64>,
}

impl SourceManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每个来源取最大帧序号；无法解析的文件名忽略
    pub fn from_file_names<S: AsRef<str> + Sync>(names: &[S]) -> Self {
        let max_index = names
            .par_iter()
            .filter_map(|name| FrameName::parse(name.as_ref()))
            .fold(HashMap::new, |mut acc: HashMap<String, u64>, name| {
                let entry = acc.entry(name.source_video).or_insert(0);
                *entry = (*entry).max(name.frame_index);
                acc
            })
            .reduce(HashMap::new, merge_max);
        Self { max_index }
    }

    pub fn from_paths(paths: &[PathBuf]) -> Self {
        let names: Vec<String> = paths
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect();
        Self::from_file_names(&names)
    }

    /// 递归扫描抽帧输出目录
    pub fn scan_dir(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(CurationError::InputNotFound(root.to_path_buf()));
        }
        let names: Vec<String> = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_frame_file(e.path()))
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        Ok(Self::from_file_names(&names))
    }

    /// 来源视频的总帧数估计；未知时为 None
    pub fn total_frames(&self, source_video: &str) -> Option<u64> {
        self.max_index.get(source_video).copied()
    }

    pub fn insert(&mut self, source_video: impl Into<String>, frame_index: u64) {
        let entry = self.max_index.entry(source_video.into()).or_insert(0);
        *entry = (*entry).max(frame_index);
    }

    pub fn merge(&mut self, other: &SourceManifest) {
        for (source, &index) in &other.max_index {
            self.insert(source.clone(), index);
        }
    }

    pub fn len(&self) -> usize {
        self.max_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.max_index.is_empty()
    }
}

fn merge_max(mut a: HashMap<String, u64>, b: HashMap<String, u64>) -> HashMap<String, u64> {
    for (source, index) in b {
        let entry = a.entry(source).or_insert(0);
        *entry = (*entry).max(index);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_manifest_takes_max_index() {
        let manifest = SourceManifest::from_file_names(&[
            "a_frame_10.jpg",
            "a_frame_100.jpg",
            "b_frame_7.png",
            "a_frame_40.jpg",
            "junk.txt",
        ]);
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.total_frames("a"), Some(100));
        assert_eq!(manifest.total_frames("b"), Some(7));
        assert_eq!(manifest.total_frames("c"), None);
    }

    #[test]
    fn test_merge_and_insert() {
        let mut a = SourceManifest::from_file_names(&["x_frame_5.jpg"]);
        let b = SourceManifest::from_file_names(&["x_frame_9.jpg", "y_frame_1.jpg"]);
        a.merge(&b);
        a.insert("x", 3);
        assert_eq!(a.total_frames("x"), Some(9));
        assert_eq!(a.total_frames("y"), Some(1));
    }

    #[test]
    fn test_scan_dir_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("clipA");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("clipA_frame_000250.jpg"), b"").unwrap();
        fs::write(dir.path().join("clipA_frame_000010.jpg"), b"").unwrap();
        fs::write(dir.path().join("clipA_frame_999999.txt"), b"").unwrap();

        let manifest = SourceManifest::scan_dir(dir.path()).unwrap();
        assert_eq!(manifest.total_frames("clipA"), Some(250));
    }

    #[test]
    fn test_scan_missing_dir() {
        assert!(matches!(
            SourceManifest::scan_dir(Path::new("/no/such/frames")),
            Err(CurationError::InputNotFound(_))
        ));
    }

    #[test]
    fn test_list_frames_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_frame_2.png", "a_frame_9.JPG", "notes.txt", "a_frame_10.jpg"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("sub.jpg")).unwrap();

        let names: Vec<String> = list_frames(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a_frame_10.jpg", "a_frame_9.JPG", "b_frame_2.png"]);
    }
}
