use clap::Parser;
use std::path::PathBuf;

use crate::geometry::NormalizedPoint;

#[derive(Parser, Debug)]
#[command(
    name = "focalcrop",
    about = "Content-aware crop-to-fill for photo collections",
    long_about = "
focalcrop - content-aware thumbnail cropping

Every image is classified (portrait, group, landscape, architecture, macro,
food, document or unknown), a focal point is chosen from face detection,
saliency and low-level image statistics, and the largest crop with the
target aspect ratio is centered on that point and resampled with Lanczos3.

Example Usage:
  # Crop a folder of photos to 400x400 thumbnails
  focalcrop -i ~/Photos -o ~/thumbs -s 400x400

  # Use a SeetaFace frontal model for face-aware crops
  focalcrop -i ~/Photos -o ~/thumbs -s 800x480 --model seeta_fd_frontal_v1.0.bin

  # Pin the focal point for a single image
  focalcrop -i IMG_001.jpg -o ~/thumbs -s 300x200 --focal 0.3,0.4

  # Write saliency debug overlays and print a report
  focalcrop -i ~/Photos -o ~/thumbs --debug --report

  # Machine-readable progress on stdout
  focalcrop -i ~/Photos -o ~/thumbs --json"
)]
pub struct Args {
    /// Input directories or single image files (can be specified multiple times)
    #[arg(short = 'i', long = "input", required = true, value_name = "DIR|FILE")]
    pub input_paths: Vec<PathBuf>,

    /// Output directory for cropped images
    #[arg(short = 'o', long = "output", default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Target size (format: WIDTHxHEIGHT, e.g., 400x400)
    #[arg(short = 's', long = "size", default_value = "400x400", value_name = "WIDTHxHEIGHT")]
    pub size: String,

    /// Face cascade model (SeetaFace frontal detector, .bin)
    #[arg(long = "model", value_name = "FILE")]
    pub model_path: Option<PathBuf>,

    /// Pin the focal point for every image instead of detecting it (format: X,Y in 0..1)
    #[arg(long = "focal", value_name = "X,Y")]
    pub focal: Option<String>,

    /// Skip saliency and go straight to the edge/entropy fallback (faster)
    #[arg(long = "no-saliency")]
    pub no_saliency: bool,

    /// Write <stem>_saliency.png debug overlays next to the crops
    #[arg(long = "debug")]
    pub debug: bool,

    /// Emit newline-delimited JSON messages instead of human-readable output
    #[arg(long = "json")]
    pub json: bool,

    /// Generate processing report table at the end
    #[arg(long = "report")]
    pub report: bool,

    /// Number of parallel processing jobs (0 = auto-detect CPU cores)
    #[arg(short = 'j', long = "jobs", default_value = "0", value_name = "N")]
    pub jobs: usize,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// JSON file with engine settings; command-line flags take precedence
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Comma-separated list of image extensions to process
    #[arg(long = "extensions", default_value = "jpg,jpeg,png,webp,tif,tiff")]
    pub extensions_str: String,

    /// Resolve focal points and report, without writing any file
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

impl Args {
    /// Parse the size string into width and height
    pub fn parse_size(&self) -> Result<(u32, u32), String> {
        let parts: Vec<&str> = self.size.split('x').collect();
        if parts.len() != 2 {
            return Err(format!(
                "Invalid size format '{}'. Use WIDTHxHEIGHT (e.g., 400x400)",
                self.size
            ));
        }

        let width = parts[0]
            .parse::<u32>()
            .map_err(|_| format!("Invalid width: '{}'", parts[0]))?;
        let height = parts[1]
            .parse::<u32>()
            .map_err(|_| format!("Invalid height: '{}'", parts[1]))?;

        if width == 0 || height == 0 {
            return Err("Width and height must be greater than 0".to_string());
        }

        if width > 16384 || height > 16384 {
            return Err("Width and height must be at most 16384 pixels".to_string());
        }

        Ok((width, height))
    }

    /// Parse `--focal X,Y` into a normalized point
    pub fn parse_focal(&self) -> Result<Option<NormalizedPoint>, String> {
        let Some(focal) = &self.focal else {
            return Ok(None);
        };

        let parts: Vec<&str> = focal.split(',').map(str::trim).collect();
        if parts.len() != 2 {
            return Err(format!("Invalid focal point '{}'. Use X,Y (e.g., 0.5,0.3)", focal));
        }

        let mut coords = [0.0f64; 2];
        for (slot, part) in coords.iter_mut().zip(&parts) {
            let value = part
                .parse::<f64>()
                .map_err(|_| format!("Invalid focal coordinate: '{}'", part))?;
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("Focal coordinates must lie in [0, 1], got {}", value));
            }
            *slot = value;
        }

        Ok(Some(NormalizedPoint::new(coords[0], coords[1])))
    }

    /// Parse the extensions string into a vector
    pub fn parse_extensions(&self) -> Vec<String> {
        self.extensions_str
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        let args = Args {
            size: "800x480".to_string(),
            ..Default::default()
        };
        assert_eq!(args.parse_size().unwrap(), (800, 480));
    }

    #[test]
    fn test_parse_size_invalid() {
        for size in ["invalid", "800", "0x480", "20000x10"] {
            let args = Args {
                size: size.to_string(),
                ..Default::default()
            };
            assert!(args.parse_size().is_err(), "{size}");
        }
    }

    #[test]
    fn test_parse_focal() {
        let args = Args {
            focal: Some("0.25, 0.75".to_string()),
            ..Default::default()
        };
        assert_eq!(args.parse_focal().unwrap(), Some(NormalizedPoint::new(0.25, 0.75)));

        assert_eq!(Args::default().parse_focal().unwrap(), None);

        for bad in ["0.5", "a,b", "1.5,0.2", "-0.1,0.5"] {
            let args = Args {
                focal: Some(bad.to_string()),
                ..Default::default()
            };
            assert!(args.parse_focal().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_parse_extensions() {
        let args = Args {
            extensions_str: "JPG, .png , webp ".to_string(),
            ..Default::default()
        };
        assert_eq!(args.parse_extensions(), vec!["jpg", "png", "webp"]);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = Args::try_parse_from([
            "focalcrop", "-i", "a", "-i", "b.jpg", "-s", "300x200", "--focal", "0.1,0.9",
            "--no-saliency", "-j", "4",
        ])
        .unwrap();
        assert_eq!(args.input_paths.len(), 2);
        assert_eq!(args.parse_size().unwrap(), (300, 200));
        assert!(args.no_saliency);
        assert_eq!(args.jobs, 4);
    }
}

// Default implementation for tests
#[cfg(test)]
impl Default for Args {
    fn default() -> Self {
        Self {
            input_paths: vec![],
            output_dir: PathBuf::new(),
            size: "400x400".to_string(),
            model_path: None,
            focal: None,
            no_saliency: false,
            debug: false,
            json: false,
            report: false,
            jobs: 0,
            verbose: false,
            config_file: None,
            extensions_str: "jpg,png".to_string(),
            dry_run: false,
        }
    }
}
