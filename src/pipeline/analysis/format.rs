use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::LoadError;

/// Input files we can turn into a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawingFormat {
    Pdf,
    Jpeg,
    Png,
    Tiff,
    Bmp,
}

impl DrawingFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Tiff => "image/tiff",
            Self::Bmp => "image/bmp",
        }
    }

    pub fn is_raster(&self) -> bool {
        !matches!(self, Self::Pdf)
    }
}

/// File extensions picked up by directory sweeps (compared lowercase).
pub const DRAWING_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "pdf", "tiff", "tif", "bmp"];

pub fn has_drawing_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| DRAWING_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024; // 100MB

/// Detect file format from magic bytes, not the extension.
pub fn detect_format(path: &Path) -> Result<DrawingFormat, LoadError> {
    let io_err = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let metadata = std::fs::metadata(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            io_err(source)
        }
    })?;
    if metadata.len() > MAX_FILE_SIZE {
        return Err(LoadError::TooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
        });
    }

    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut header = [0u8; 8];
    let bytes_read = file.read(&mut header).map_err(io_err)?;

    match &header[..bytes_read] {
        // %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => Ok(DrawingFormat::Pdf),
        [0xFF, 0xD8, 0xFF, ..] => Ok(DrawingFormat::Jpeg),
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(DrawingFormat::Png),
        // II*\0 little-endian, MM\0* big-endian
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(DrawingFormat::Tiff),
        // BM
        [0x42, 0x4D, ..] => Ok(DrawingFormat::Bmp),
        _ => Err(LoadError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}
