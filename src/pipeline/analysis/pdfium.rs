//! First-page PDF rasterization via Google PDFium.
//!
//! `PdfiumRasterizer` is stateless (`Send + Sync`). Each call binds a fresh
//! `Pdfium` instance because the upstream type is `!Send`; the OS caches the
//! `dlopen`, so repeat binds are near-free.

use std::path::Path;

use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::LoadError;

/// Maximum dimension (width or height) of a rendered page.
const MAX_DIMENSION_PX: u32 = 4096;

/// Default upscale factor relative to 72 DPI.
pub const DEFAULT_PDF_SCALE: f32 = 2.0;

/// Turns the first page of a PDF into a raster.
pub trait PdfRasterizer: Send + Sync {
    fn rasterize_first_page(&self, path: &Path, scale: f32) -> Result<DynamicImage, LoadError>;
}

pub struct PdfiumRasterizer;

impl PdfiumRasterizer {
    /// Create a renderer, verifying the PDFium library is loadable.
    ///
    /// Discovery order:
    /// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path to library file)
    /// 2. Alongside the running executable
    /// 3. System library search paths
    pub fn new() -> Result<Self, String> {
        let _ = load_pdfium()?;
        Ok(Self)
    }
}

fn load_pdfium() -> Result<Pdfium, String> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path)
            .map_err(|e| format!("Failed to load PDFium from {path}: {e}"))?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let lib_path =
            Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            debug!(dir = %exe_dir.display(), "Loaded PDFium next to executable");
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        format!("PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}")
    })?;
    Ok(Pdfium::new(bindings))
}

/// Pixel size for a page at `scale` (1.0 = 72 DPI), capped at
/// `MAX_DIMENSION_PX` with aspect ratio preserved. Both sides are at least 1.
fn compute_render_dimensions(width_points: f32, height_points: f32, scale: f32) -> (u32, u32) {
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PdfRasterizer for PdfiumRasterizer {
    fn rasterize_first_page(&self, path: &Path, scale: f32) -> Result<DynamicImage, LoadError> {
        let render_err = |reason: String| LoadError::PdfRendering {
            path: path.to_path_buf(),
            reason,
        };

        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let pdfium = load_pdfium().map_err(render_err)?;
        let document = pdfium.load_pdf_from_byte_slice(&bytes, None).map_err(|e| {
            let msg = e.to_string();
            if msg.to_lowercase().contains("password") {
                render_err(format!("PDF is password protected: {msg}"))
            } else {
                render_err(format!("Failed to load PDF: {msg}"))
            }
        })?;

        let pages = document.pages();
        let page = pages
            .get(0)
            .map_err(|_| render_err("PDF has no pages".to_string()))?;

        let width_points = page.width().value;
        let height_points = page.height().value;
        let (target_w, target_h) = compute_render_dimensions(width_points, height_points, scale);

        let uncapped_w = (width_points * scale) as u32;
        if target_w != uncapped_w.max(1) {
            warn!(
                path = %path.display(),
                raw_width = uncapped_w,
                capped_width = target_w,
                "Page dimensions capped to {MAX_DIMENSION_PX}px",
            );
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| render_err(format!("Rendering failed: {e}")))?;

        let image = DynamicImage::ImageRgb8(bitmap.as_image().to_rgb8());
        debug!(
            path = %path.display(),
            width = target_w,
            height = target_h,
            scale,
            "Rendered first PDF page"
        );
        Ok(image)
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Rasterizer that returns a blank page of fixed size, or fails.
pub struct MockPdfRasterizer {
    width: u32,
    height: u32,
    fail: bool,
}

impl MockPdfRasterizer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            width: 0,
            height: 0,
            fail: true,
        }
    }
}

impl PdfRasterizer for MockPdfRasterizer {
    fn rasterize_first_page(&self, path: &Path, scale: f32) -> Result<DynamicImage, LoadError> {
        if self.fail {
            return Err(LoadError::PdfRendering {
                path: path.to_path_buf(),
                reason: "mock rasterizer failure".to_string(),
            });
        }
        let w = ((self.width as f32) * scale).max(1.0) as u32;
        let h = ((self.height as f32) * scale).max(1.0) as u32;
        Ok(DynamicImage::new_rgb8(w, h))
    }
}
