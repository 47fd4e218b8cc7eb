//! Page rasterization seam
//!
//! Turns one PDF page into a bitmap for pixel analysis. The shipped
//! implementation probes the document with `lopdf` and delegates the
//! actual rasterization to ImageMagick, so a corrupt document is
//! distinguishable from one that merely has no pages.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::RgbImage;
use thiserror::Error;

/// Rasterization error types
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("unreadable document: {0}")]
    Unreadable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RasterError>;

/// Outcome of rendering one page.
///
/// `NoPages` is a defined sentinel, not an error: the document opened
/// but holds nothing to render. `ToolFailed` covers a parseable document
/// the external rasterizer could not produce a bitmap for.
#[derive(Debug)]
pub enum Rendered {
    /// The page as an 8-bit RGB bitmap
    Page(RgbImage),
    /// The document opened but contains zero pages
    NoPages,
    /// The external tool failed on an otherwise readable document
    ToolFailed(String),
}

/// Renders one page of a PDF document at a given resolution
pub trait PageRasterizer: Send + Sync {
    /// Render `page_index` (0-based) of `path` at `dpi`.
    ///
    /// Must return `Err` only for unreadable/corrupt documents or I/O
    /// failures; "no pages" and tool-level render failures are values.
    fn render(&self, path: &Path, page_index: usize, dpi: u32) -> Result<Rendered>;
}

/// ImageMagick-backed rasterizer.
///
/// Probes the page tree with `lopdf` first: a load failure marks the
/// document unreadable, an empty page tree short-circuits to `NoPages`.
/// Rendering then shells out to `magick -density <dpi> file[page] out.png`
/// with a white background in a scratch directory.
#[derive(Debug, Clone, Default)]
pub struct MagickRasterizer;

impl MagickRasterizer {
    pub fn new() -> Self {
        Self
    }
}

impl PageRasterizer for MagickRasterizer {
    fn render(&self, path: &Path, page_index: usize, dpi: u32) -> Result<Rendered> {
        if !path.exists() {
            return Err(RasterError::FileNotFound(path.to_path_buf()));
        }

        let document = lopdf::Document::load(path)
            .map_err(|e| RasterError::Unreadable(e.to_string()))?;
        if document.get_pages().is_empty() {
            return Ok(Rendered::NoPages);
        }
        drop(document);

        let scratch = tempfile::tempdir()?;
        let output_path = scratch.path().join("page.png");

        let output = Command::new("magick")
            .arg("-density")
            .arg(dpi.to_string())
            .arg("-background")
            .arg("white")
            .arg("-alpha")
            .arg("remove")
            .arg("-alpha")
            .arg("off")
            .arg(format!("{}[{}]", path.display(), page_index))
            .arg(&output_path)
            .output();

        let output = match output {
            Ok(output) => output,
            // The tool itself missing is a tool failure, not document corruption
            Err(e) => return Ok(Rendered::ToolFailed(e.to_string())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(Rendered::ToolFailed(stderr.trim().to_string()));
        }

        match image::open(&output_path) {
            Ok(img) => Ok(Rendered::Page(img.to_rgb8())),
            Err(e) => Ok(Rendered::ToolFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_not_found() {
        let rasterizer = MagickRasterizer::new();
        let result = rasterizer.render(Path::new("/nonexistent/file.pdf"), 0, 72);

        assert!(matches!(result, Err(RasterError::FileNotFound(_))));
    }

    #[test]
    fn test_garbage_document_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf at all").unwrap();

        let rasterizer = MagickRasterizer::new();
        let result = rasterizer.render(&path, 0, 72);

        assert!(matches!(result, Err(RasterError::Unreadable(_))));
    }

    #[test]
    fn test_empty_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pdf");
        std::fs::write(&path, b"").unwrap();

        let rasterizer = MagickRasterizer::new();
        let result = rasterizer.render(&path, 0, 72);

        assert!(matches!(result, Err(RasterError::Unreadable(_))));
    }
}
