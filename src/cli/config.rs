//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::{
    config::PipelineConfig,
    pipeline::{ProcessOptions, DEFAULT_SHADOW_INTENSITY},
};
use anyhow::{Context, Result};
use tracing::warn;

/// Convert CLI arguments to a validated `PipelineConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the pipeline configuration: the JSON file (or defaults) with CLI overrides applied
    pub(crate) fn from_cli(cli: &Cli) -> Result<PipelineConfig> {
        let mut config = match &cli.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(model) = &cli.model {
            config.segmentation.model_path = Some(model.clone());
        }
        if let Some(strategy) = cli.strategy {
            config.refine_strategy = strategy.into();
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if let Some(model) = &cli.model {
            if !model.is_file() {
                anyhow::bail!("Model file not found: {}", model.display());
            }
        }

        if cli.input.len() > 1 {
            if let Some(output) = &cli.output {
                if output.is_file() {
                    anyhow::bail!(
                        "Multiple inputs need an output directory, {} is a file",
                        output.display()
                    );
                }
            }
        }

        Ok(())
    }

    /// Per-call options when the CLI overrides the configured behaviour
    ///
    /// `None` means the configuration file decides (including its shadow).
    /// An explicit `--shadow-intensity` turns the shadow on.
    pub(crate) fn process_options(cli: &Cli) -> Option<ProcessOptions> {
        let add_shadow = cli.shadow || cli.shadow_intensity.is_some();
        if cli.no_remove && add_shadow {
            warn!("Shadows need background removal; --no-remove disables the shadow");
        }
        (cli.no_remove || add_shadow).then(|| ProcessOptions {
            remove_background: !cli.no_remove,
            add_shadow,
            shadow_intensity: cli.shadow_intensity.unwrap_or(DEFAULT_SHADOW_INTENSITY),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::main_impl::CliRefineStrategy;
    use crate::config::RefineStrategy;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["cutout"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_config_conversion() {
        let cli = parse(&["in.png", "--strategy", "scalar"]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(config.refine_strategy, RefineStrategy::Scalar);
        assert_eq!(config.segmentation.model_path, None);
        assert_eq!(RefineStrategy::from(CliRefineStrategy::Vectorized), RefineStrategy::Vectorized);
    }

    #[test]
    fn test_config_file_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cutout.json");
        std::fs::write(&path, r#"{"refine_strategy": "scalar", "edge_smoothing_radius": 1.5}"#).unwrap();

        let cli = parse(&[
            "in.png",
            "--config",
            path.to_str().unwrap(),
            "--strategy",
            "vectorized",
            "--model",
            "model.onnx",
        ]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(config.refine_strategy, RefineStrategy::Vectorized);
        assert!((config.edge_smoothing_radius - 1.5).abs() < f32::EPSILON);
        assert_eq!(
            config.segmentation.model_path.as_deref(),
            Some(std::path::Path::new("model.onnx"))
        );
    }

    #[test]
    fn test_cli_validation() {
        assert!(CliConfigBuilder::validate_cli(&parse(&["in.png"])).is_ok());
        assert!(CliConfigBuilder::validate_cli(&parse(&["in.png", "-m", "/nonexistent/m.onnx"])).is_err());

        let file = tempfile::NamedTempFile::new().unwrap();
        let cli = parse(&["a.png", "b.png", "-o", file.path().to_str().unwrap()]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());
    }

    #[test]
    fn test_process_options() {
        assert_eq!(CliConfigBuilder::process_options(&parse(&["in.png"])), None);

        let options = CliConfigBuilder::process_options(&parse(&["in.png", "--shadow"])).unwrap();
        assert!(options.remove_background);
        assert!(options.add_shadow);
        assert_eq!(options.shadow_intensity, 70);

        let options = CliConfigBuilder::process_options(&parse(&["in.png", "--no-remove"])).unwrap();
        assert!(!options.remove_background);
        assert!(!options.add_shadow);
    }

    #[test]
    fn test_shadow_intensity_implies_shadow() {
        let options =
            CliConfigBuilder::process_options(&parse(&["in.png", "--shadow-intensity", "120"])).unwrap();
        assert!(options.remove_background);
        assert!(options.add_shadow);
        assert_eq!(options.shadow_intensity, 120);

        let options = CliConfigBuilder::process_options(&parse(&[
            "in.png",
            "--shadow",
            "--shadow-intensity",
            "15",
        ]))
        .unwrap();
        assert_eq!(options.shadow_intensity, 15);
    }
}
