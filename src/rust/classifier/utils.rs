use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

/// Maximum intensity of an unsigned 8-bit pixel.
pub(crate) const PIXEL_MAX: f32 = 255.0;

/// Maps unsigned [0, 255] pixels to floating [0, 1].
pub(crate) fn normalize_images(images: ArrayView3<u8>) -> Array3<f32> {
    images.mapv(|p| p as f32 / PIXEL_MAX)
}

pub(crate) fn normalize_image(image: ArrayView2<u8>) -> Array2<f32> {
    image.mapv(|p| p as f32 / PIXEL_MAX)
}

/// Inverse of [`normalize_image`]. Values are rounded to the nearest intensity
/// and clamped, so a normalized pixel always maps back to the byte it came from.
pub(crate) fn denormalize_image(image: ArrayView2<f32>) -> Array2<u8> {
    image.mapv(|p| (p * PIXEL_MAX).round().clamp(0.0, PIXEL_MAX) as u8)
}

/// Index of the largest score; the first one wins on ties.
pub(crate) fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    #[test]
    fn test_normalize_range() {
        let image = Array::from_shape_fn((28, 28), |(r, c)| ((r * 28 + c) % 256) as u8);
        let normalized = normalize_image(image.view());
        assert!(normalized.iter().all(|&p| (0.0..=1.0).contains(&p)));
        assert_eq!(normalized[[0, 0]], 0.0);
    }

    #[test]
    fn test_denormalize_restores_every_byte() {
        let image = Array::from_shape_fn((16, 16), |(r, c)| (r * 16 + c) as u8);
        let restored = denormalize_image(normalize_image(image.view()).view());
        assert_eq!(restored, image);
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[]), None);
    }
}
