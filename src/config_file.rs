use crate::cli::Args;
use crate::image_processing::EngineConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk configuration: engine tunables plus defaults for CLI options
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigFile {
    pub name: Option<String>,
    pub engine: EngineConfig,
    pub output_path: Option<String>,
    pub size: Option<String>,
    pub model_path: Option<String>,
    pub no_saliency: Option<bool>,
    pub debug: Option<bool>,
    pub report: Option<bool>,
    pub dry_run: Option<bool>,
    pub jobs: Option<usize>,
    pub extensions: Option<String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

impl Args {
    /// Load the config file (if any), merge it under the command line and
    /// return the resulting engine configuration.
    pub fn load_and_merge_config(&mut self) -> Result<EngineConfig> {
        let cli_args: Vec<String> = std::env::args().collect();

        let engine = match self.config_file.clone() {
            Some(config_path) => {
                let config = ConfigFile::load(&config_path)?;
                debug!(path = ?config_path, "Loaded configuration");
                self.merge_from_config(config, &cli_args)
            }
            None => EngineConfig::default(),
        };

        Ok(self.apply_engine_flags(engine))
    }

    /// Copy config values into options the command line left unset
    pub fn merge_from_config(&mut self, config: ConfigFile, cli_args: &[String]) -> EngineConfig {
        let given = |names: &[&str]| flag_given(cli_args, names);

        if !given(&["-o", "--output"]) {
            if let Some(output) = config.output_path {
                self.output_dir = PathBuf::from(output);
            }
        }

        if !given(&["-s", "--size"]) {
            if let Some(size) = config.size {
                self.size = size;
            }
        }

        if self.model_path.is_none() {
            self.model_path = config.model_path.map(PathBuf::from);
        }

        if !given(&["--extensions"]) {
            if let Some(ext) = config.extensions {
                self.extensions_str = ext;
            }
        }

        if !given(&["-j", "--jobs"]) {
            if let Some(jobs) = config.jobs {
                self.jobs = jobs;
            }
        }

        // Boolean flags - only apply if currently false (default)
        if !self.no_saliency {
            self.no_saliency = config.no_saliency.unwrap_or(false);
        }

        if !self.debug {
            self.debug = config.debug.unwrap_or(false);
        }

        if !self.report {
            self.report = config.report.unwrap_or(false);
        }

        if !self.dry_run {
            self.dry_run = config.dry_run.unwrap_or(false);
        }

        config.engine
    }

    /// Command-line switches that map onto engine settings
    pub fn apply_engine_flags(&self, mut engine: EngineConfig) -> EngineConfig {
        if self.no_saliency {
            engine.saliency.enabled = false;
        }
        if self.debug {
            engine.render_debug = true;
        }
        engine
    }
}

/// True when any of `names` appears on the command line, as `-x`, `--name` or `--name=value`
fn flag_given(cli_args: &[String], names: &[&str]) -> bool {
    cli_args.iter().any(|arg| {
        names.iter().any(|name| {
            arg == name
                || (name.starts_with("--") && arg.starts_with(&format!("{}=", name)))
                || (!name.starts_with("--") && arg.starts_with(name) && arg.len() > name.len())
        })
    })
}
