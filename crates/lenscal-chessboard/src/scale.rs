use image::imageops::{resize, FilterType};
use image::GrayImage;
use nalgebra::Point2;
use std::borrow::Cow;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum ScaleError {
    #[error("detection scale must be finite and positive (got {0})")]
    InvalidFactor(f32),
}

/// Detection-time resampling factor.
///
/// Corners are searched on a frame resized by `factor`; positions found
/// there must be mapped back with [`DetectionScale::to_full_resolution`]
/// before they are paired with object points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionScale {
    factor: f32,
}

impl Default for DetectionScale {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

impl DetectionScale {
    pub fn new(factor: f32) -> Result<Self, ScaleError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ScaleError::InvalidFactor(factor));
        }
        Ok(Self { factor })
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn is_identity(&self) -> bool {
        self.factor == 1.0
    }

    /// Dimensions of a `width x height` frame after resampling (at least 1x1).
    pub fn scaled_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = |v: u32| ((v as f64 * self.factor as f64).round() as u32).max(1);
        (scale(width), scale(height))
    }

    /// Resample `image` for detection; a factor of 1 borrows the input.
    pub fn downscale<'a>(&self, image: &'a GrayImage) -> Cow<'a, GrayImage> {
        if self.is_identity() {
            return Cow::Borrowed(image);
        }
        let (w, h) = self.scaled_dimensions(image.width(), image.height());
        Cow::Owned(resize(image, w, h, FilterType::Triangle))
    }

    /// Map detection-scale positions back to full-resolution pixels (`p / factor`).
    pub fn to_full_resolution(&self, points: &[Point2<f32>]) -> Vec<Point2<f64>> {
        let inv = 1.0 / self.factor as f64;
        points
            .iter()
            .map(|p| Point2::new(p.x as f64 * inv, p.y as f64 * inv))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rejects_non_positive_factors() {
        assert!(DetectionScale::new(0.0).is_err());
        assert!(DetectionScale::new(-0.5).is_err());
        assert!(DetectionScale::new(f32::NAN).is_err());
        assert!(DetectionScale::new(0.5).is_ok());
    }

    #[test]
    fn half_scale_points_double() {
        let scale = DetectionScale::new(0.5).unwrap();
        let full = scale.to_full_resolution(&[Point2::new(10.0, 20.5), Point2::new(0.0, 3.25)]);
        assert_relative_eq!(full[0].x, 20.0);
        assert_relative_eq!(full[0].y, 41.0);
        assert_relative_eq!(full[1].y, 6.5);
    }

    #[test]
    fn identity_scale_is_pass_through() {
        let scale = DetectionScale::default();
        let img = GrayImage::new(64, 48);
        assert!(matches!(scale.downscale(&img), Cow::Borrowed(_)));
        let pts = [Point2::new(12.5f32, 7.0)];
        assert_eq!(scale.to_full_resolution(&pts), vec![Point2::new(12.5, 7.0)]);
    }

    #[test]
    fn downscale_resizes_frame() {
        let scale = DetectionScale::new(0.5).unwrap();
        let img = GrayImage::new(641, 480);
        let small = scale.downscale(&img);
        assert_eq!((small.width(), small.height()), (321, 240));
    }
}
