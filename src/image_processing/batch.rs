use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::classify::ImageType;
use super::resize::CropEngine;
use super::resolver::{FocalPointResolver, FocalSource};
use super::normalize_input;
use crate::geometry::{CropRect, NormalizedPoint};
use crate::utils::{has_valid_extension, ProcessingStats};

/// Batch processing statistics and progress tracking
pub struct BatchProcessor {
    pub total_files: usize,
    pub processed_count: AtomicUsize,
    pub start_time: Instant,
}

impl BatchProcessor {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            processed_count: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Increment processed count and return current count
    pub fn increment(&self) -> usize {
        self.processed_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get current progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_files == 0 {
            1.0
        } else {
            (self.processed_count.load(Ordering::Relaxed) as f64) / (self.total_files as f64)
        }
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Option<Duration> {
        let processed = self.processed_count.load(Ordering::Relaxed);
        if processed == 0 {
            return None;
        }

        let remaining = self.total_files.saturating_sub(processed);
        if remaining == 0 {
            return Some(Duration::ZERO);
        }

        let time_per_item = self.start_time.elapsed() / processed as u32;
        Some(time_per_item * remaining as u32)
    }
}

/// Process multiple files in parallel on the current rayon pool
pub fn process_files_parallel<T, F, P>(
    files: &[PathBuf],
    process_fn: F,
    progress_callback: P,
) -> Vec<Result<T>>
where
    T: Send,
    F: Fn(&Path) -> Result<T> + Send + Sync,
    P: Fn(usize, f64, Option<Duration>) + Send + Sync,
{
    let processor = BatchProcessor::new(files.len());

    files
        .par_iter()
        .map(|file_path| {
            let result = process_fn(file_path);

            let completed = processor.increment();
            progress_callback(completed, processor.progress(), processor.eta());

            result
        })
        .collect()
}

/// Where and how cropped variants are written
#[derive(Debug, Clone)]
pub struct CropJob {
    pub target_width: u32,
    pub target_height: u32,
    pub output_dir: PathBuf,
    /// Pin every image to this focal point instead of detecting one
    pub focal_override: Option<NormalizedPoint>,
    /// Resolve and report without writing any file
    pub dry_run: bool,
}

/// Outcome of one image
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub debug_path: Option<PathBuf>,
    pub source_width: u32,
    pub source_height: u32,
    pub image_type: Option<ImageType>,
    pub source: FocalSource,
    pub focal_point: NormalizedPoint,
    pub crop: CropRect,
    pub faces: usize,
    pub processing_time: Duration,
}

impl ProcessingResult {
    pub fn output_paths(&self) -> Vec<PathBuf> {
        std::iter::once(self.output_path.clone())
            .chain(self.debug_path.clone())
            .collect()
    }
}

/// Decode, resolve, crop and save images, one rayon task per image
pub struct ProcessingEngine {
    resolver: FocalPointResolver,
    cropper: CropEngine,
    job: CropJob,
}

impl ProcessingEngine {
    pub fn new(resolver: FocalPointResolver, job: CropJob) -> Self {
        Self {
            resolver,
            cropper: CropEngine::new(),
            job,
        }
    }

    pub fn job(&self) -> &CropJob {
        &self.job
    }

    /// Process a batch of images, reporting each completion to `progress_callback`
    pub fn process_batch<P>(&self, image_files: &[PathBuf], progress_callback: P) -> Vec<Result<ProcessingResult>>
    where
        P: Fn(usize, f64, Option<Duration>) + Send + Sync,
    {
        self.process_batch_with(image_files, |_, _| {}, progress_callback)
    }

    /// Like [`Self::process_batch`], handing each outcome to `on_file` as soon as
    /// that image is done, before the rest of the batch finishes
    pub fn process_batch_with<F, P>(
        &self,
        image_files: &[PathBuf],
        on_file: F,
        progress_callback: P,
    ) -> Vec<Result<ProcessingResult>>
    where
        F: Fn(&Path, &Result<ProcessingResult>) + Send + Sync,
        P: Fn(usize, f64, Option<Duration>) + Send + Sync,
    {
        process_files_parallel(
            image_files,
            |path| {
                let result = self.process_file(path);
                on_file(path, &result);
                result
            },
            progress_callback,
        )
    }

    /// Process a single image file
    pub fn process_file(&self, input_path: &Path) -> Result<ProcessingResult> {
        let start = Instant::now();
        debug!(path = %input_path.display(), "Processing");

        let decoded = image::open(input_path)
            .with_context(|| format!("Failed to open image: {}", input_path.display()))?;
        let rgb = normalize_input(decoded)
            .with_context(|| format!("Unsupported image: {}", input_path.display()))?;
        let (source_width, source_height) = rgb.dimensions();

        let resolution = self
            .resolver
            .resolve_with_override(&rgb, self.job.focal_override)
            .with_context(|| format!("Failed to resolve focal point: {}", input_path.display()))?;

        let crop = self.cropper.crop_rect(
            source_width,
            source_height,
            self.job.target_width,
            self.job.target_height,
            resolution.point,
        )?;

        let output_path = self.job.output_dir.join(output_filename(
            input_path,
            self.job.target_width,
            self.job.target_height,
        ));
        let debug_path = resolution
            .debug_image
            .as_ref()
            .map(|_| self.job.output_dir.join(debug_filename(input_path)));

        if !self.job.dry_run {
            let cropped = self
                .cropper
                .crop(
                    &rgb,
                    self.job.target_width,
                    self.job.target_height,
                    resolution.point,
                )
                .with_context(|| format!("Failed to crop: {}", input_path.display()))?;
            cropped
                .save(&output_path)
                .with_context(|| format!("Failed to save crop: {}", output_path.display()))?;

            if let (Some(image), Some(path)) = (&resolution.debug_image, &debug_path) {
                image
                    .save(path)
                    .with_context(|| format!("Failed to save debug image: {}", path.display()))?;
            }
        }

        Ok(ProcessingResult {
            input_path: input_path.to_path_buf(),
            output_path,
            debug_path,
            source_width,
            source_height,
            image_type: resolution.image_type,
            source: resolution.source,
            focal_point: resolution.point,
            crop,
            faces: resolution.faces.len(),
            processing_time: start.elapsed(),
        })
    }
}

/// Discover all image files under the input paths, sorted for a stable order
pub fn discover_images(input_paths: &[PathBuf], extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut image_files = Vec::new();

    for input_path in input_paths {
        if input_path.is_file() {
            if has_valid_extension(input_path, extensions) {
                image_files.push(input_path.clone());
            } else {
                warn!(path = %input_path.display(), "Skipping file with unsupported extension");
            }
            continue;
        }

        debug!(dir = %input_path.display(), "Scanning directory");
        let walker = WalkDir::new(input_path).follow_links(false).max_depth(10);

        for entry in walker {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() && has_valid_extension(path, extensions) {
                image_files.push(path.to_path_buf());
            }
        }
    }

    image_files.sort();
    image_files.dedup();

    debug!(count = image_files.len(), "Found image files");
    Ok(image_files)
}

/// `<stem>_<W>x<H>.<ext>`, keeping the input extension
pub fn output_filename(input_path: &Path, width: u32, height: u32) -> String {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let extension = input_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| "png".to_string());
    format!("{}_{}x{}.{}", stem, width, height, extension)
}

/// `<stem>_saliency.png`
pub fn debug_filename(input_path: &Path) -> String {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    format!("{}_saliency.png", stem)
}

/// Calculate comprehensive processing statistics
pub fn calculate_final_stats(results: &[Result<ProcessingResult>], processing_time: Duration) -> ProcessingStats {
    let mut stats = ProcessingStats::new(results.len());
    stats.total_duration = processing_time;

    for result in results.iter().flatten() {
        stats.record(result.image_type, result.source);
    }
    stats.failed = results.len() - stats.successful;
    stats
}
