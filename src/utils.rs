use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::cli::Args;
use crate::image_processing::{FocalSource, ImageType};

/// Create a styled progress bar
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Validate command line arguments
pub fn validate_inputs(args: &Args) -> Result<()> {
    for input_path in &args.input_paths {
        if !input_path.exists() {
            return Err(anyhow::anyhow!(
                "Input path does not exist: {}",
                input_path.display()
            ));
        }
        if !input_path.is_dir() && !input_path.is_file() {
            return Err(anyhow::anyhow!(
                "Input path is neither a file nor a directory: {}",
                input_path.display()
            ));
        }
    }

    args.parse_size().map_err(|e| anyhow::anyhow!(e))?;
    args.parse_focal().map_err(|e| anyhow::anyhow!(e))?;

    if args.parse_extensions().is_empty() {
        return Err(anyhow::anyhow!("No valid extensions specified"));
    }

    if args.jobs > 256 {
        return Err(anyhow::anyhow!(
            "Job count too high (max 256), got: {}",
            args.jobs
        ));
    }

    if let Some(model) = &args.model_path {
        if !model.is_file() {
            return Err(anyhow::anyhow!(
                "Face model not found: {}",
                model.display()
            ));
        }
    }

    Ok(())
}

/// Get file extension in lowercase
pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if a file has one of the specified extensions
pub fn has_valid_extension(path: &Path, extensions: &[String]) -> bool {
    if let Some(ext) = get_file_extension(path) {
        extensions.contains(&ext)
    } else {
        false
    }
}

/// Print verbose information if verbose mode is enabled
pub fn verbose_println(verbose: bool, message: &str) {
    if verbose {
        println!("{} {}", style("[VERBOSE]").dim(), message);
    }
}

/// Print warning message
pub fn warn_println(message: &str) {
    println!("{} {}", style("[WARNING]").yellow().bold(), message);
}

/// Calculate processing statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub by_type: HashMap<ImageType, usize>,
    pub by_source: HashMap<FocalSource, usize>,
    pub total_duration: Duration,
}

impl ProcessingStats {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Default::default()
        }
    }

    /// Count one successfully processed image
    pub fn record(&mut self, image_type: Option<ImageType>, source: FocalSource) {
        self.successful += 1;
        if let Some(image_type) = image_type {
            *self.by_type.entry(image_type).or_default() += 1;
        }
        *self.by_source.entry(source).or_default() += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.successful as f64 / self.total_files as f64) * 100.0
        }
    }

    pub fn average_duration(&self) -> Duration {
        if self.total_files == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.total_files as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(1)), "1.000s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
    }

    #[test]
    fn test_has_valid_extension() {
        let extensions = vec!["jpg".to_string(), "png".to_string()];
        assert!(has_valid_extension(Path::new("a/b/photo.JPG"), &extensions));
        assert!(!has_valid_extension(Path::new("photo.gif"), &extensions));
        assert!(!has_valid_extension(Path::new("README"), &extensions));
    }

    #[test]
    fn test_validate_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args {
            input_paths: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        assert!(validate_inputs(&args).is_ok());

        let missing = Args {
            input_paths: vec![PathBuf::from("/definitely/not/here")],
            ..Default::default()
        };
        assert!(validate_inputs(&missing).is_err());

        let bad_focal = Args {
            input_paths: vec![dir.path().to_path_buf()],
            focal: Some("2,2".to_string()),
            ..Default::default()
        };
        assert!(validate_inputs(&bad_focal).is_err());

        let no_model = Args {
            input_paths: vec![dir.path().to_path_buf()],
            model_path: Some(dir.path().join("missing.bin")),
            ..Default::default()
        };
        assert!(validate_inputs(&no_model).is_err());
    }

    #[test]
    fn test_processing_stats() {
        let mut stats = ProcessingStats::new(3);
        stats.record(Some(ImageType::Landscape), FocalSource::Saliency);
        stats.record(Some(ImageType::Landscape), FocalSource::Fallback);
        stats.record(None, FocalSource::Override);
        stats.total_duration = Duration::from_secs(3);

        assert_eq!(stats.successful, 3);
        assert_eq!(stats.by_type[&ImageType::Landscape], 2);
        assert_eq!(stats.by_source[&FocalSource::Override], 1);
        assert!((stats.success_rate() - 100.0).abs() < 1e-9);
        assert_eq!(stats.average_duration(), Duration::from_secs(1));
    }
}
