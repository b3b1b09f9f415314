use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use focalcrop::cli::Args;
use focalcrop::image_processing::batch::{
    calculate_final_stats, discover_images, CropJob, ProcessingEngine, ProcessingResult,
};
use focalcrop::image_processing::{EngineConfig, FocalPointResolver};
use focalcrop::json_output::JsonMessage;
use focalcrop::report::CropReport;
use focalcrop::utils::{
    create_progress_bar, format_duration, validate_inputs, verbose_println, warn_println,
    ProcessingStats,
};

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose && !json { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("focalcrop={}", default_level)));

    // stdout is reserved for JSON lines in --json mode
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn build_resolver(engine_config: EngineConfig, model_path: Option<&Path>) -> Result<FocalPointResolver> {
    let resolver = FocalPointResolver::new(engine_config);
    match model_path {
        Some(model_path) => attach_face_model(resolver, model_path),
        None => Ok(resolver),
    }
}

#[cfg(feature = "rustface")]
fn attach_face_model(resolver: FocalPointResolver, model_path: &Path) -> Result<FocalPointResolver> {
    let cascade = focalcrop::image_processing::RustfaceCascade::from_path(model_path)
        .with_context(|| format!("Failed to load face model: {}", model_path.display()))?;
    info!(model = %model_path.display(), "Face detection enabled");
    Ok(resolver.with_face_cascade(cascade))
}

#[cfg(not(feature = "rustface"))]
fn attach_face_model(_resolver: FocalPointResolver, model_path: &Path) -> Result<FocalPointResolver> {
    Err(anyhow::anyhow!(
        "--model {} given, but focalcrop was built without the `rustface` feature",
        model_path.display()
    ))
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let mut args = Args::parse();
    init_logging(args.verbose, args.json);

    let engine_config = args.load_and_merge_config()?;
    validate_inputs(&args)?;

    let (target_width, target_height) = args.parse_size().map_err(|e| anyhow::anyhow!(e))?;
    let focal_override = args.parse_focal().map_err(|e| anyhow::anyhow!(e))?;
    let extensions = args.parse_extensions();
    let json_mode = args.json;
    let verbose = args.verbose && !json_mode;

    if !json_mode {
        println!("{}", style("focalcrop - content-aware cropping").bold().blue());
        println!();
    }

    if verbose {
        println!("{}", style("Configuration:").bold());
        println!("  Target size: {}x{}", target_width, target_height);
        println!("  Output directory: {}", args.output_dir.display());
        println!("  Extensions: {:?}", extensions);
        println!(
            "  Face model: {}",
            args.model_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string())
        );
        println!(
            "  Saliency: {}",
            if engine_config.saliency.enabled { "enabled" } else { "disabled" }
        );
        if let Some(point) = focal_override {
            println!("  Pinned focal point: {:.3},{:.3}", point.x, point.y);
        }
        if args.dry_run {
            println!("  Dry run mode: enabled (no files will be written)");
        }
        println!();
    }

    let parallel_jobs = if args.jobs == 0 { num_cpus::get() } else { args.jobs };
    rayon::ThreadPoolBuilder::new()
        .num_threads(parallel_jobs)
        .build_global()
        .context("Failed to configure thread pool")?;
    debug!(jobs = parallel_jobs, "Thread pool ready");

    if !args.dry_run {
        std::fs::create_dir_all(&args.output_dir).context("Failed to create output directory")?;
    } else {
        verbose_println(verbose, "Dry run mode: Skipping output directory creation");
    }

    let resolver = build_resolver(engine_config, args.model_path.as_deref())?;
    if !resolver.has_face_detector() && !json_mode {
        verbose_println(verbose, "No face model given, faces will not be detected");
    }

    let engine = ProcessingEngine::new(
        resolver,
        CropJob {
            target_width,
            target_height,
            output_dir: args.output_dir.clone(),
            focal_override,
            dry_run: args.dry_run,
        },
    );

    let image_files = discover_images(&args.input_paths, &extensions)?;
    if image_files.is_empty() {
        if json_mode {
            JsonMessage::summary(0, 0, 0, start_time.elapsed().as_secs_f64());
        } else {
            println!("{}", style("No images found with specified extensions").red());
        }
        return Ok(());
    }
    info!(count = image_files.len(), "Discovered images");

    let total = image_files.len();
    let results = if json_mode {
        engine.process_batch_with(
            &image_files,
            |path, result| match result {
                Ok(processed) => JsonMessage::file_completed(processed).emit(),
                Err(e) => JsonMessage::file_failed(path, format!("{:#}", e)).emit(),
            },
            |completed, _, _| {
                JsonMessage::progress(completed, total, "Processing images");
            },
        )
    } else {
        let progress = create_progress_bar(total as u64);
        progress.set_message("Processing images");
        let results = engine.process_batch(&image_files, |completed, _, _| {
            progress.set_position(completed as u64);
        });
        progress.finish_with_message("done");
        results
    };

    let stats = calculate_final_stats(&results, start_time.elapsed());

    if json_mode {
        JsonMessage::summary(
            stats.total_files,
            stats.successful,
            stats.failed,
            stats.total_duration.as_secs_f64(),
        );
        return Ok(());
    }

    println!();
    for (path, result) in image_files.iter().zip(&results) {
        if let Err(e) = result {
            warn_println(&format!("{}: {:#}", path.display(), e));
        }
    }

    print_summary(&stats, args.dry_run);

    if verbose {
        print_details(&results);
    }

    if args.report {
        let mut report = CropReport::new();
        for processed in results.iter().flatten() {
            report.add(processed);
        }
        report.print();
    }

    Ok(())
}

fn print_summary(stats: &ProcessingStats, dry_run: bool) {
    let header = if dry_run {
        style("Dry Run Results Summary:").bold().cyan()
    } else {
        style("Results Summary:").bold().green()
    };
    println!("{}", header);

    let processed_label = if dry_run { "Would be processed" } else { "Successfully processed" };
    println!("  {}: {}", processed_label, style(stats.successful).bold().green());
    if stats.failed > 0 {
        println!("  Failed: {}", style(stats.failed).bold().red());
    }
    println!(
        "  Total time: {} (avg {} per image)",
        style(format_duration(stats.total_duration)).bold(),
        format_duration(stats.average_duration())
    );

    if !stats.by_type.is_empty() {
        println!();
        println!("{}", style("Image Types:").bold().blue());
        let mut types: Vec<_> = stats.by_type.iter().collect();
        types.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));
        for (image_type, count) in types {
            println!("  {}: {}", image_type, style(count).bold().cyan());
        }
    }

    if !stats.by_source.is_empty() {
        println!();
        println!("{}", style("Focal Point Sources:").bold().blue());
        let mut sources: Vec<_> = stats.by_source.iter().collect();
        sources.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));
        for (source, count) in sources {
            println!("  {}: {}", source, style(count).bold().cyan());
        }
    }
}

fn print_details(results: &[Result<ProcessingResult>]) {
    println!();
    println!("{}", style("Detailed Processing Results:").bold().blue());
    for (i, processed) in results.iter().flatten().enumerate() {
        let filename = processed
            .input_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("unknown");
        let image_type = processed
            .image_type
            .map(|t| t.to_string())
            .unwrap_or_else(|| "pinned".to_string());

        println!(
            "  {}: {} [{}] focal {:.3},{:.3} via {} ({} faces) -> {}",
            style(format!("#{}", i + 1)).dim(),
            style(filename).bold(),
            style(image_type).cyan(),
            processed.focal_point.x,
            processed.focal_point.y,
            processed.source,
            processed.faces,
            style(processed.output_path.display()).dim()
        );
    }
}
