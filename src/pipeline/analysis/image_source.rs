use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};

use super::format::{detect_format, DrawingFormat};
use super::pdfium::{PdfRasterizer, DEFAULT_PDF_SCALE};
use super::LoadError;

/// Loads a drawing from a path into an RGB raster.
pub trait ImageSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<DynamicImage, LoadError>;
}

/// Filesystem-backed source. Raster formats are decoded directly; PDFs go
/// through the configured rasterizer (first page only).
pub struct FileImageSource {
    pdf: Option<Arc<dyn PdfRasterizer>>,
    pdf_scale: f32,
}

impl Default for FileImageSource {
    fn default() -> Self {
        Self::new(DEFAULT_PDF_SCALE)
    }
}

impl FileImageSource {
    /// Source without PDF support.
    pub fn new(pdf_scale: f32) -> Self {
        Self {
            pdf: None,
            pdf_scale,
        }
    }

    pub fn with_pdf_rasterizer(mut self, rasterizer: Arc<dyn PdfRasterizer>) -> Self {
        self.pdf = Some(rasterizer);
        self
    }
}

impl ImageSource for FileImageSource {
    fn load(&self, path: &Path) -> Result<DynamicImage, LoadError> {
        let format = detect_format(path)?;

        let image = match format {
            DrawingFormat::Pdf => {
                let rasterizer = self.pdf.as_ref().ok_or_else(|| LoadError::PdfRendering {
                    path: path.to_path_buf(),
                    reason: "no PDF renderer available".to_string(),
                })?;
                rasterizer.rasterize_first_page(path, self.pdf_scale)?
            }
            _ => {
                let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                image::load_from_memory(&bytes).map_err(|e| LoadError::Decode {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?
            }
        };

        let (width, height) = image.dimensions();
        tracing::debug!(
            path = %path.display(),
            format = format.mime_type(),
            width,
            height,
            "Drawing loaded"
        );
        Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::analysis::pdfium::MockPdfRasterizer;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        DynamicImage::new_rgb8(w, h).save(&path).unwrap();
        path
    }

    #[test]
    fn loads_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "part.png", 40, 30);
        let image = FileImageSource::default().load(&path).unwrap();
        assert_eq!(image.dimensions(), (40, 30));
    }

    #[test]
    fn missing_path_is_not_found() {
        let err = FileImageSource::default()
            .load(Path::new("/no/such/drawing.jpg"))
            .unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }

    #[test]
    fn corrupt_png_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]).unwrap();
        let err = FileImageSource::default().load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }), "{err}");
    }

    #[test]
    fn pdf_without_rasterizer_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.pdf");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();
        let err = FileImageSource::default().load(&path).unwrap_err();
        assert!(matches!(err, LoadError::PdfRendering { .. }));
    }

    #[test]
    fn pdf_goes_through_rasterizer_at_configured_scale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.pdf");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();

        let source = FileImageSource::new(2.0)
            .with_pdf_rasterizer(Arc::new(MockPdfRasterizer::new(50, 40)));
        let image = source.load(&path).unwrap();
        assert_eq!(image.dimensions(), (100, 80));
    }
}
