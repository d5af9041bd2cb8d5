use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbaImage};
use rfd::FileDialog;
use thiserror::Error;

/// File name offered by the export dialog.
pub const DEFAULT_EXPORT_NAME: &str = "drawing.png";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot export a {width}x{height} surface")]
    InvalidGeometry { width: u32, height: u32 },
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn check_geometry(image: &RgbaImage) -> Result<(), ExportError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ExportError::InvalidGeometry { width, height });
    }
    Ok(())
}

fn write_png_to<W: Write>(image: &RgbaImage, writer: W) -> Result<(), ExportError> {
    check_geometry(image)?;
    PngEncoder::new(writer).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(())
}

/// Encode a rendered surface as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    write_png_to(image, &mut bytes)?;
    Ok(bytes)
}

/// Encode and write a PNG file. Nothing is created when the geometry is invalid.
pub fn write_png(image: &RgbaImage, path: &Path) -> Result<(), ExportError> {
    check_geometry(image)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_png_to(image, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Native save dialog for the PNG export.
pub fn pick_export_path() -> Option<PathBuf> {
    FileDialog::new()
        .set_file_name(DEFAULT_EXPORT_NAME)
        .add_filter("PNG Image", &["png"])
        .save_file()
}
