//! Directory sweep and batch analysis.
//!
//! A bounded pool of scoped worker threads pulls drawings from a shared
//! index; each worker has at most one inference in flight. Per-item
//! failures are logged and recorded, never fatal to the batch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::pipeline::analysis::format::has_drawing_extension;
use crate::pipeline::analysis::{AnalysisError, AnalysisResult, DrawingAnalyzer, PerformanceMetrics};
use crate::pipeline::prompt_templates::PromptSelection;

/// Suffix appended to the drawing's file stem for its JSON report.
pub const REPORT_SUFFIX: &str = "_analysis.json";

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot serialize report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

// ──────────────────────────────────────────────
// Sweep & reports
// ──────────────────────────────────────────────

/// Drawing files directly inside `dir`, sorted by path.
pub fn scan_drawings(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let io_err = |source| BatchError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && has_drawing_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// `<output_dir>/<stem>_analysis.json` for a source drawing.
pub fn report_path(output_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "drawing".to_string());
    output_dir.join(format!("{stem}{REPORT_SUFFIX}"))
}

/// Report paths for a batch, one per source, in input order.
///
/// Sources sharing a file stem (`part.png`, `part.pdf`) would overwrite each
/// other's report, so those get the extension folded into the name:
/// `part_png_analysis.json`, `part_pdf_analysis.json`.
pub fn report_paths(output_dir: &Path, sources: &[PathBuf]) -> Vec<PathBuf> {
    let mut stems: HashMap<PathBuf, usize> = HashMap::new();
    for source in sources {
        *stems.entry(report_path(output_dir, source)).or_default() += 1;
    }

    sources
        .iter()
        .map(|source| {
            let plain = report_path(output_dir, source);
            if stems.get(&plain).copied().unwrap_or(0) < 2 {
                return plain;
            }
            let stem = source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "drawing".to_string());
            let ext = source
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            tracing::warn!(
                source = %source.display(),
                "Report name shared with another drawing, using extension-qualified name"
            );
            output_dir.join(format!("{stem}_{ext}{REPORT_SUFFIX}"))
        })
        .collect()
}

#[derive(Serialize)]
struct AnalysisReport<'a> {
    #[serde(flatten)]
    result: &'a AnalysisResult,
    performance: PerformanceMetrics,
}

/// Pretty JSON: the result's fields plus a `performance` object.
pub fn render_report(result: &AnalysisResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&AnalysisReport {
        result,
        performance: result.performance(),
    })
}

/// Write the pretty-printed JSON report for `result`. Returns its path.
pub fn write_report(output_dir: &Path, result: &AnalysisResult) -> Result<PathBuf, BatchError> {
    let path = report_path(output_dir, Path::new(&result.source_identifier));
    write_report_to(&path, result)?;
    Ok(path)
}

/// Write the report for `result` to an explicit path, creating its parent.
pub fn write_report_to(path: &Path, result: &AnalysisResult) -> Result<(), BatchError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| BatchError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = render_report(result).map_err(|source| BatchError::Report {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(path = %path.display(), "Report written");
    Ok(())
}

/// Move a finished drawing into `processed_dir`, keeping its file name.
pub fn move_to_processed(source: &Path, processed_dir: &Path) -> Result<PathBuf, BatchError> {
    std::fs::create_dir_all(processed_dir).map_err(|source| BatchError::Io {
        path: processed_dir.to_path_buf(),
        source,
    })?;
    let file_name = source.file_name().ok_or_else(|| BatchError::Io {
        path: source.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
    })?;
    let target = processed_dir.join(file_name);
    std::fs::rename(source, &target).map_err(|e| BatchError::Io {
        path: source.to_path_buf(),
        source: e,
    })?;
    Ok(target)
}

// ──────────────────────────────────────────────
// Runner
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedDrawing {
    pub source: PathBuf,
    pub report: PathBuf,
    pub dimensions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDrawing {
    pub source: PathBuf,
    pub error: String,
}

/// Outcome of a batch run, both lists in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub processed: Vec<ProcessedDrawing>,
    pub failed: Vec<FailedDrawing>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.processed.len() + self.failed.len()
    }
}

pub struct BatchRunner<'a> {
    analyzer: &'a DrawingAnalyzer,
    selection: PromptSelection,
    output_dir: PathBuf,
    workers: usize,
    processed_dir: Option<PathBuf>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(analyzer: &'a DrawingAnalyzer, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            analyzer,
            selection: PromptSelection::DrawingAnalysis,
            output_dir: output_dir.into(),
            workers: 1,
            processed_dir: None,
        }
    }

    pub fn with_selection(mut self, selection: PromptSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Worker thread count, at least 1.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_processed_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.processed_dir = Some(dir.into());
        self
    }

    /// Analyze every input, writing one report per success.
    pub fn run(&self, inputs: &[PathBuf]) -> BatchSummary {
        let start = Instant::now();
        let next = AtomicUsize::new(0);
        let outcomes: Mutex<Vec<(usize, Result<ProcessedDrawing, FailedDrawing>)>> =
            Mutex::new(Vec::with_capacity(inputs.len()));
        let workers = self.workers.min(inputs.len()).max(1);
        let reports = report_paths(&self.output_dir, inputs);

        tracing::info!(
            drawings = inputs.len(),
            workers,
            output_dir = %self.output_dir.display(),
            "Batch started"
        );

        std::thread::scope(|scope| {
            for worker in 0..workers {
                let next = &next;
                let outcomes = &outcomes;
                let reports = &reports;
                scope.spawn(move || {
                    let _span = tracing::info_span!("batch_worker", worker).entered();
                    loop {
                        let idx = next.fetch_add(1, Ordering::SeqCst);
                        let (Some(path), Some(report)) = (inputs.get(idx), reports.get(idx)) else {
                            break;
                        };
                        let outcome = self.process_one(path, report);
                        if let Ok(mut guard) = outcomes.lock() {
                            guard.push((idx, outcome));
                        }
                    }
                });
            }
        });

        let mut outcomes = outcomes.into_inner().unwrap_or_else(|e| e.into_inner());
        outcomes.sort_by_key(|(idx, _)| *idx);

        let mut summary = BatchSummary::default();
        for (_, outcome) in outcomes {
            match outcome {
                Ok(done) => summary.processed.push(done),
                Err(failed) => summary.failed.push(failed),
            }
        }

        tracing::info!(
            processed = summary.processed.len(),
            failed = summary.failed.len(),
            elapsed_ms = %start.elapsed().as_millis(),
            "Batch complete"
        );
        summary
    }

    fn process_one(&self, path: &Path, report: &Path) -> Result<ProcessedDrawing, FailedDrawing> {
        let fail = |e: BatchError| {
            tracing::warn!(source = %path.display(), error = %e, "Drawing failed, continuing");
            FailedDrawing {
                source: path.to_path_buf(),
                error: e.to_string(),
            }
        };

        let result = self
            .analyzer
            .analyze(path, &self.selection)
            .map_err(|e| fail(e.into()))?;
        write_report_to(report, &result).map_err(fail)?;

        if let Some(processed_dir) = &self.processed_dir {
            if let Err(e) = move_to_processed(path, processed_dir) {
                tracing::warn!(source = %path.display(), error = %e, "Could not move drawing to processed");
            }
        }

        tracing::info!(
            source = %path.display(),
            dimensions = result.dimensions.len(),
            inference_s = result.inference_duration,
            "Drawing processed"
        );
        Ok(ProcessedDrawing {
            source: path.to_path_buf(),
            report: report.to_path_buf(),
            dimensions: result.dimensions.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use image::DynamicImage;

    use super::*;
    use crate::pipeline::analysis::FileImageSource;
    use crate::pipeline::vision::{InferenceError, MockVisionModel};

    fn analyzer(model: Arc<MockVisionModel>) -> DrawingAnalyzer {
        DrawingAnalyzer::new(Arc::new(FileImageSource::default()), model)
    }

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        DynamicImage::new_rgb8(16, 16)
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();
        path
    }

    #[test]
    fn scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "c.pdf", "notes.txt", "d.TIF", "e.bmp", "f.jpeg", "g.tiff"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();

        let names: Vec<String> = scan_drawings(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.pdf", "d.TIF", "e.bmp", "f.jpeg", "g.tiff"]);
    }

    #[test]
    fn scan_missing_dir_is_io_error() {
        let err = scan_drawings(Path::new("/no/such/dir")).unwrap_err();
        assert!(matches!(err, BatchError::Io { .. }));
    }

    #[test]
    fn report_path_uses_stem() {
        let path = report_path(Path::new("/out"), Path::new("/in/piston-42.pdf"));
        assert_eq!(path, Path::new("/out/piston-42_analysis.json"));
    }

    #[test]
    fn shared_stems_get_distinct_report_names() {
        let out = Path::new("/out");
        let sources = vec![
            PathBuf::from("/in/part.png"),
            PathBuf::from("/in/part.PDF"),
            PathBuf::from("/in/bracket.png"),
        ];
        assert_eq!(
            report_paths(out, &sources),
            vec![
                out.join("part_png_analysis.json"),
                out.join("part_pdf_analysis.json"),
                out.join("bracket_analysis.json"),
            ]
        );
    }

    #[test]
    fn batch_keeps_both_reports_for_shared_stem() {
        let dir = tempfile::tempdir().unwrap();
        let png = write_png(dir.path(), "part.png");
        let bmp = dir.path().join("part.bmp");
        DynamicImage::new_rgb8(8, 8)
            .save_with_format(&bmp, image::ImageFormat::Bmp)
            .unwrap();

        let analyzer = analyzer(Arc::new(MockVisionModel::new("R0.125")));
        let out = dir.path().join("out");
        let summary = BatchRunner::new(&analyzer, &out).run(&[png, bmp]);

        assert_eq!(summary.processed.len(), 2);
        assert_ne!(summary.processed[0].report, summary.processed[1].report);
        assert!(out.join("part_png_analysis.json").exists());
        assert!(out.join("part_bmp_analysis.json").exists());
    }

    #[test]
    fn report_contains_result_and_performance() {
        let dir = tempfile::tempdir().unwrap();
        let png = write_png(dir.path(), "piston.png");
        let result = analyzer(Arc::new(MockVisionModel::new("⌀1.250 ±0.001")))
            .analyze(&png, &PromptSelection::QuickScan)
            .unwrap();

        let out = dir.path().join("results");
        let path = write_report(&out, &result).unwrap();
        assert_eq!(path, out.join("piston_analysis.json"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["generated_text"], "⌀1.250 ±0.001");
        assert!(json["dimensions"].as_array().unwrap().len() >= 2);
        assert_eq!(json["performance"]["image_dimensions"][0], 16);
        assert!(json["performance"]["high_confidence_dims"].as_u64().unwrap() >= 2);
    }

    #[test]
    fn batch_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good_a = write_png(dir.path(), "a.png");
        let bad = dir.path().join("b.png");
        std::fs::write(&bad, b"not an image").unwrap();
        let good_c = write_png(dir.path(), "c.png");

        let model = Arc::new(MockVisionModel::new("R0.125"));
        let analyzer = analyzer(model.clone());
        let out = dir.path().join("out");
        let summary = BatchRunner::new(&analyzer, &out)
            .with_workers(2)
            .run(&[good_a.clone(), bad.clone(), good_c.clone()]);

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.processed.len(), 2);
        assert_eq!(summary.processed[0].source, good_a);
        assert_eq!(summary.processed[1].source, good_c);
        assert_eq!(summary.failed[0].source, bad);
        assert_eq!(model.call_count(), 2);
        assert!(out.join("a_analysis.json").exists());
        assert!(!out.join("b_analysis.json").exists());
    }

    #[test]
    fn processed_drawings_are_moved() {
        let dir = tempfile::tempdir().unwrap();
        let png = write_png(dir.path(), "part.png");
        let analyzer = analyzer(Arc::new(MockVisionModel::new("")));
        let processed = dir.path().join("processed");

        let summary = BatchRunner::new(&analyzer, dir.path().join("out"))
            .with_processed_dir(&processed)
            .run(&[png.clone()]);

        assert_eq!(summary.processed.len(), 1);
        assert!(!png.exists());
        assert!(processed.join("part.png").exists());
    }

    #[test]
    fn inference_errors_are_recorded_per_item() {
        let dir = tempfile::tempdir().unwrap();
        let png = write_png(dir.path(), "part.png");
        let analyzer = analyzer(Arc::new(MockVisionModel::failing(InferenceError::NotReachable(
            "http://localhost:11434".into(),
        ))));

        let summary = BatchRunner::new(&analyzer, dir.path().join("out")).run(&[png]);
        assert!(summary.processed.is_empty());
        assert!(summary.failed[0].error.contains("not reachable"));
    }

    #[test]
    fn empty_input_is_empty_summary() {
        let analyzer = analyzer(Arc::new(MockVisionModel::new("")));
        let dir = tempfile::tempdir().unwrap();
        let summary = BatchRunner::new(&analyzer, dir.path()).with_workers(4).run(&[]);
        assert_eq!(summary.total(), 0);
    }
}
