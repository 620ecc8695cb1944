//! 数据集筛选器

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use crate::api::models::report::{CategoryReport, RunReport};
use crate::core::config::CurationConfig;
use crate::core::curation::{
    list_frames, Category, CategoryInput, CategoryOutcome, CurationEngine, SourceManifest,
};
use crate::core::error::{CurationError, Result};
use crate::core::video::{PoseEstimator, SegmentationProvider};

const REPORT_FILE: &str = "scoring_results.json";

/// 输入/输出目录布局
#[derive(Debug, Clone, PartialEq)]
pub struct CurationLayout {
    /// 按类别分好的帧目录的上级目录
    pub input_root: PathBuf,
    /// 导出目录的上级目录，每个类别一个子目录
    pub output_root: PathBuf,
    /// 抽帧原始输出目录，用于估计每个来源视频的长度
    pub manifest_dir: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
}

impl CurationLayout {
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            manifest_dir: None,
            report_path: None,
        }
    }

    pub fn with_manifest_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.manifest_dir = Some(dir.into());
        self
    }

    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    pub fn report_path(&self) -> PathBuf {
        self.report_path
            .clone()
            .unwrap_or_else(|| self.output_root.join(REPORT_FILE))
    }

    pub fn category_input(&self, dir_name: &str) -> PathBuf {
        self.input_root.join(dir_name)
    }

    pub fn category_output(&self, dir_name: &str) -> PathBuf {
        self.output_root.join(dir_name)
    }

    /// 导出会删除并重建输出类别目录，因此输出根不能与输入根重叠
    pub fn check_disjoint(&self, config: &CurationConfig) -> Result<()> {
        let input = resolve_path(&self.input_root)?;
        let output = resolve_path(&self.output_root)?;

        if output.starts_with(&input) {
            return Err(CurationError::Config(format!(
                "output root {} overlaps input root {}",
                self.output_root.display(),
                self.input_root.display()
            )));
        }

        for category in Category::ALL {
            let dir_name = &config.categories.get(category).dir_name;
            if input.starts_with(output.join(dir_name)) {
                return Err(CurationError::Config(format!(
                    "input root {} lies inside export folder {}",
                    self.input_root.display(),
                    self.category_output(dir_name).display()
                )));
            }
        }
        Ok(())
    }
}

/// 规范化路径：最近的已存在祖先走 canonicalize（解析符号链接），其余部分按字面折叠
fn resolve_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    let mut resolved = loop {
        match fs::canonicalize(existing) {
            Ok(canonical) => break canonical,
            Err(_) => {
                let Some(parent) = existing.parent() else {
                    break PathBuf::new();
                };
                if let Some(name) = existing.file_name() {
                    rest.push(name.to_os_string());
                } else if existing.ends_with("..") {
                    rest.push("..".into());
                }
                existing = parent;
            }
        }
    };

    for part in rest.iter().rev() {
        match Path::new(part).components().next() {
            Some(Component::ParentDir) => {
                resolved.pop();
            }
            Some(Component::CurDir) | None => {}
            Some(_) => resolved.push(part),
        }
    }
    Ok(resolved)
}

/// 数据集筛选器：发现输入、打分选择、导出结果、写审计记录
///
/// ```no_run
/// use std::sync::Arc;
/// use curate_lib::api::curator::{CurationLayout, Curator};
/// use curate_lib::core::config::CurationConfig;
/// use curate_lib::core::video::{AlphaMaskSegmentation, SidecarPoseEstimator};
///
/// let curator = Curator::create(
///     CurationConfig::default(),
///     CurationLayout::new("sorted", "curated"),
///     Arc::new(SidecarPoseEstimator::new()),
///     Arc::new(AlphaMaskSegmentation::new()),
/// )?;
/// let report = curator.run()?;
/// println!("accepted {}", report.totals.accepted);
/// # Ok::<(), curate_lib::core::error::CurationError>(())
/// ```
pub struct Curator {
    engine: CurationEngine,
    layout: CurationLayout,
    dry_run: bool,
}

impl Curator {
    pub fn create(
        config: CurationConfig,
        layout: CurationLayout,
        pose: Arc<dyn PoseEstimator>,
        segmentation: Arc<dyn SegmentationProvider>,
    ) -> Result<Self> {
        crate::init_logging();

        layout.check_disjoint(&config)?;

        let engine = CurationEngine::new(config, pose, segmentation)?;
        info!("🎬 Curator: created (top_n = {})", engine.config().top_n);
        Ok(Self {
            engine,
            layout,
            dry_run: false,
        })
    }

    /// 只打分和写审计记录，不导出
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn config(&self) -> &CurationConfig {
        self.engine.config()
    }

    pub fn layout(&self) -> &CurationLayout {
        &self.layout
    }

    pub fn run(&self) -> Result<RunReport> {
        self.engine.ensure_ready()?;

        if !self.layout.input_root.is_dir() {
            return Err(CurationError::InputNotFound(self.layout.input_root.clone()));
        }

        let mut report = RunReport::new(self.config().clone(), self.dry_run);
        let inputs = self.discover(&mut report)?;
        let manifest = self.build_manifest(&inputs)?;
        info!("📋 Manifest covers {} source videos", manifest.len());

        let outcomes = self.engine.run(inputs, &manifest)?;

        for outcome in &outcomes {
            let dir_name = &self.config().categories.get(outcome.category).dir_name;
            if !self.dry_run {
                let copied = self.export(outcome, dir_name)?;
                info!("📦 {}: exported {} frames", outcome.category, copied);
            }
            report.add_category(outcome.category, CategoryReport::from_outcome(dir_name, outcome));
        }

        report.write_json(&self.layout.report_path())?;
        info!(
            "✅ Curation finished: {} accepted of {} candidates",
            report.totals.accepted, report.totals.total
        );
        Ok(report)
    }

    /// 类别目录缺失或为空时记录并跳过，不影响其它类别
    fn discover(&self, report: &mut RunReport) -> Result<Vec<CategoryInput>> {
        let mut inputs = Vec::new();
        for category in Category::ALL {
            let dir_name = &self.config().categories.get(category).dir_name;
            let dir = self.layout.category_input(dir_name);

            if !dir.is_dir() {
                warn!("⚠️ {}: directory {} not found, skipping", category, dir.display());
                report.skip(category, dir_name, "directory not found");
                continue;
            }

            let frames = list_frames(&dir)?;
            if frames.is_empty() {
                warn!("⚠️ {}: no frames in {}, skipping", category, dir.display());
                report.skip(category, dir_name, "no frames");
                continue;
            }

            inputs.push(CategoryInput { category, frames });
        }
        Ok(inputs)
    }

    fn build_manifest(&self, inputs: &[CategoryInput]) -> Result<SourceManifest> {
        match &self.layout.manifest_dir {
            Some(dir) => SourceManifest::scan_dir(dir),
            None => {
                let all: Vec<PathBuf> = inputs.iter().flat_map(|i| i.frames.clone()).collect();
                Ok(SourceManifest::from_paths(&all))
            }
        }
    }

    /// 每次运行都重建导出目录，文件名带入选名次前缀
    fn export(&self, outcome: &CategoryOutcome, dir_name: &str) -> Result<usize> {
        let dest = self.layout.category_output(dir_name);
        if dest.exists() {
            fs::remove_dir_all(&dest)?;
        }
        fs::create_dir_all(&dest)?;

        for entry in &outcome.selection.entries {
            let Some(candidate) = outcome.candidates.get(entry.position) else {
                continue;
            };
            let prefix = format!("{:03}", entry.rank);
            fs::copy(&candidate.path, dest.join(format!("{}_{}", prefix, candidate.id)))?;

            if let Some(caption) = caption_sidecar(&candidate.path) {
                let stem = candidate
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                fs::copy(&caption, dest.join(format!("{}_{}.txt", prefix, stem)))?;
            }
        }

        Ok(outcome.selection.len())
    }
}

impl Drop for Curator {
    fn drop(&mut self) {
        info!("🗑️ Curator: released");
    }
}

fn caption_sidecar(frame: &Path) -> Option<PathBuf> {
    let caption = frame.with_extension("txt");
    caption.is_file().then_some(caption)
}
