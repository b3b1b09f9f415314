//! Per-image report for `--report`
use prettytable::{format, Cell, Row, Table};
use std::path::Path;

use crate::image_processing::batch::ProcessingResult;

/// One row of the report
#[derive(Debug, Clone)]
pub struct CropEntry {
    pub input_filename: String,
    pub output_filename: String,
    pub size: String,
    pub image_type: String,
    pub source: String,
    pub focal: String,
    pub crop: String,
    pub faces: usize,
}

impl From<&ProcessingResult> for CropEntry {
    fn from(result: &ProcessingResult) -> Self {
        Self {
            input_filename: file_name(&result.input_path),
            output_filename: file_name(&result.output_path),
            size: format!("{}x{}", result.source_width, result.source_height),
            image_type: result
                .image_type
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
            source: result.source.to_string(),
            focal: format!("{:.3}, {:.3}", result.focal_point.x, result.focal_point.y),
            crop: format!(
                "{}x{} @ {},{}",
                result.crop.width, result.crop.height, result.crop.x, result.crop.y
            ),
            faces: result.faces,
        }
    }
}

#[derive(Debug, Default)]
pub struct CropReport {
    pub entries: Vec<CropEntry>,
}

impl CropReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: &ProcessingResult) {
        self.entries.push(CropEntry::from(result));
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);

        table.add_row(Row::new(vec![
            Cell::new("Input"),
            Cell::new("Output"),
            Cell::new("Size"),
            Cell::new("Type"),
            Cell::new("Source"),
            Cell::new("Focal"),
            Cell::new("Crop"),
            Cell::new("Faces"),
        ]));

        for entry in &self.entries {
            table.add_row(Row::new(vec![
                Cell::new(&entry.input_filename),
                Cell::new(&entry.output_filename),
                Cell::new(&entry.size),
                Cell::new(&entry.image_type),
                Cell::new(&entry.source),
                Cell::new(&entry.focal),
                Cell::new(&entry.crop),
                Cell::new(&entry.faces.to_string()),
            ]));
        }

        table
    }

    /// Print the report as a formatted table
    pub fn print(&self) {
        if self.entries.is_empty() {
            return;
        }
        println!("\nCROP REPORT ({} images)\n", self.entries.len());
        self.table().printstd();
        println!();
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CropRect, NormalizedPoint};
    use crate::image_processing::{FocalSource, ImageType};
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_report_rows() {
        let result = ProcessingResult {
            input_path: PathBuf::from("/in/cat.jpg"),
            output_path: PathBuf::from("/out/cat_100x100.jpg"),
            debug_path: None,
            source_width: 640,
            source_height: 480,
            image_type: Some(ImageType::Macro),
            source: FocalSource::Saliency,
            focal_point: NormalizedPoint::new(0.25, 0.5),
            crop: CropRect { x: 0, y: 0, width: 480, height: 480 },
            faces: 0,
            processing_time: Duration::from_millis(12),
        };

        let mut report = CropReport::new();
        report.add(&result);

        let entry = &report.entries[0];
        assert_eq!(entry.input_filename, "cat.jpg");
        assert_eq!(entry.image_type, "macro");
        assert_eq!(entry.source, "saliency");
        assert_eq!(entry.focal, "0.250, 0.500");
        assert_eq!(entry.crop, "480x480 @ 0,0");
        assert_eq!(report.table().len(), 2);
    }
}
