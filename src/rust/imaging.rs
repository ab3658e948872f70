use std::fs;
use std::path::Path;

use image::{GrayImage, ImageError};
use ndarray::{Array2, ArrayView2};

/// Decodes an image file of any supported format into 8-bit luma, shaped
/// `(height, width)`.
pub fn load_grayscale_image<P: AsRef<Path>>(path: P) -> Result<Array2<u8>, ImageError> {
    let gray = image::open(path.as_ref())?.to_luma8();
    let (width, height) = gray.dimensions();
    let pixels = gray.into_raw();
    Array2::from_shape_vec((height as usize, width as usize), pixels).map_err(|e| {
        ImageError::Parameter(image::error::ParameterError::from_kind(
            image::error::ParameterErrorKind::Generic(e.to_string()),
        ))
    })
}

/// Writes `image` as 8-bit grayscale; the extension of `path` selects the format.
pub fn save_grayscale_image<P: AsRef<Path>>(image: ArrayView2<u8>, path: P) -> Result<(), ImageError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(ImageError::IoError)?;
    }

    let (height, width) = image.dim();
    let gray = GrayImage::from_fn(width as u32, height as u32, |x, y| {
        image::Luma([image[[y as usize, x as usize]]])
    });
    gray.save(path)
}
