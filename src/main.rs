// Curate CLI binary

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use curate_lib::api::{CurationLayout, Curator};
use curate_lib::core::config::CurationConfig;
use curate_lib::core::video::{AlphaMaskSegmentation, SidecarPoseEstimator};

#[derive(Parser)]
#[command(name = "curate")]
#[command(about = "Curate a training set from categorized video frames", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score, select and export frames for every category
    Run {
        /// Root containing one folder per category
        #[arg(short, long)]
        input: PathBuf,
        /// Root receiving the exported folders and the report
        #[arg(short, long)]
        output: PathBuf,
        /// Directory of all extracted frames, used for source video lengths
        #[arg(long)]
        manifest_dir: Option<PathBuf>,
        /// Directory holding <frame>.pose.json keypoint files
        #[arg(long)]
        pose_dir: Option<PathBuf>,
        /// Report path (defaults to <output>/scoring_results.json)
        #[arg(long)]
        report: Option<PathBuf>,
        /// Score and report without exporting
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        overrides: ConfigArgs,
    },

    /// Print the effective configuration as JSON
    ShowConfig {
        #[command(flatten)]
        overrides: ConfigArgs,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// JSON5 configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Frames to keep per category
    #[arg(long)]
    top_n: Option<usize>,
    /// Minimum hash distance between any two kept frames
    #[arg(long)]
    global_threshold: Option<u32>,
    /// Minimum hash distance between kept frames of one source video
    #[arg(long)]
    source_threshold: Option<u32>,
    /// Laplacian variance floor
    #[arg(long)]
    min_sharpness: Option<f64>,
    /// Worker threads (0 = one per CPU)
    #[arg(short, long)]
    workers: Option<usize>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<CurationConfig> {
        let mut config = match &self.config {
            Some(path) => CurationConfig::from_json5_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => CurationConfig::default(),
        };

        if let Some(top_n) = self.top_n {
            config.top_n = top_n;
        }
        if let Some(threshold) = self.global_threshold {
            config.global_hash_threshold = threshold;
        }
        if let Some(threshold) = self.source_threshold {
            config.intra_source_hash_threshold = threshold;
        }
        if let Some(min) = self.min_sharpness {
            config.gate.min_sharpness = min;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    curate_lib::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            output,
            manifest_dir,
            pose_dir,
            report,
            dry_run,
            overrides,
        } => {
            let config = overrides.resolve()?;
            let mut layout = CurationLayout::new(input, output);
            if let Some(dir) = manifest_dir {
                layout = layout.with_manifest_dir(dir);
            }
            if let Some(path) = report {
                layout = layout.with_report_path(path);
            }
            cmd_run(config, layout, pose_dir, dry_run)
        }
        Commands::ShowConfig { overrides } => cmd_show_config(overrides),
    }
}

fn cmd_run(
    config: CurationConfig,
    layout: CurationLayout,
    pose_dir: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    let pose = match pose_dir {
        Some(dir) => SidecarPoseEstimator::in_dir(dir),
        None => SidecarPoseEstimator::new(),
    };

    let curator = Curator::create(
        config,
        layout,
        Arc::new(pose),
        Arc::new(AlphaMaskSegmentation::new()),
    )?
    .with_dry_run(dry_run);
    let report = curator.run()?;

    for (category, summary) in &report.categories {
        println!(
            "{:<12} accepted {:>4} / {:<5} (gated {}, rejected {}, not reached {})",
            category,
            summary.stats.accepted,
            summary.stats.total,
            summary.stats.gated,
            summary.stats.rejected,
            summary.stats.not_reached
        );
    }
    for skipped in &report.skipped {
        println!("{:<12} skipped: {}", skipped.category, skipped.reason);
    }
    println!("Report: {}", curator.layout().report_path().display());

    Ok(())
}

fn cmd_show_config(overrides: ConfigArgs) -> Result<()> {
    let config = overrides.resolve()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(args: &[&str]) -> ConfigArgs {
        let mut argv = vec!["curate", "show-config"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::ShowConfig { overrides } => overrides,
            Commands::Run { .. } => panic!("expected show-config"),
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = overrides(&[
            "--top-n",
            "7",
            "--global-threshold",
            "4",
            "--source-threshold",
            "12",
            "--min-sharpness",
            "80",
            "-w",
            "2",
        ])
        .resolve()
        .unwrap();

        assert_eq!(config.top_n, 7);
        assert_eq!(config.global_hash_threshold, 4);
        assert_eq!(config.intra_source_hash_threshold, 12);
        assert_eq!(config.gate.min_sharpness, 80.0);
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curate.json5");
        std::fs::write(&path, "{ top_n: 40, global_hash_threshold: 5 }").unwrap();
        let path_arg = path.to_string_lossy().to_string();

        let config = overrides(&["-c", &path_arg, "--top-n", "9"])
            .resolve()
            .unwrap();
        assert_eq!(config.top_n, 9);
        assert_eq!(config.global_hash_threshold, 5);
        assert_eq!(config.intra_source_hash_threshold, 10);
    }

    #[test]
    fn test_invalid_override_rejected() {
        assert!(overrides(&["--top-n", "0"]).resolve().is_err());
        assert!(overrides(&["--min-sharpness", "NaN"]).resolve().is_err());
    }

    #[test]
    fn test_run_requires_input_and_output() {
        assert!(Cli::try_parse_from(["curate", "run", "-i", "sorted"]).is_err());
        assert!(Cli::try_parse_from(["curate", "run", "-i", "sorted", "-o", "curated"]).is_ok());
    }
}
