use crate::{UndistortError, UndistortionMap};
use image::{ImageBuffer, Pixel};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Applies a precomputed [`UndistortionMap`] to live frames.
///
/// Sampling is bilinear; taps falling outside the source frame read the
/// constant border value.
#[derive(Clone, Debug)]
pub struct LiveCorrector {
    map: UndistortionMap,
    border: u8,
}

impl LiveCorrector {
    pub fn new(map: UndistortionMap) -> Self {
        Self { map, border: 0 }
    }

    /// Border value used for every channel (default 0, black).
    pub fn with_border(mut self, border: u8) -> Self {
        self.border = border;
        self
    }

    pub fn map(&self) -> &UndistortionMap {
        &self.map
    }

    /// Correct `frame` into a newly allocated image.
    pub fn correct<P>(
        &self,
        frame: &ImageBuffer<P, Vec<u8>>,
    ) -> Result<ImageBuffer<P, Vec<u8>>, UndistortError>
    where
        P: Pixel<Subpixel = u8>,
    {
        let mut out = ImageBuffer::new(self.map.width(), self.map.height());
        self.correct_into(frame, &mut out)?;
        Ok(out)
    }

    /// Correct `frame` into `out`, reusing its buffer.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "trace",
            skip(self, frame, out),
            fields(width = frame.width(), height = frame.height())
        )
    )]
    pub fn correct_into<P>(
        &self,
        frame: &ImageBuffer<P, Vec<u8>>,
        out: &mut ImageBuffer<P, Vec<u8>>,
    ) -> Result<(), UndistortError>
    where
        P: Pixel<Subpixel = u8>,
    {
        let (w, h) = (self.map.width(), self.map.height());
        for img in [(frame.width(), frame.height()), (out.width(), out.height())] {
            if img != (w, h) {
                return Err(UndistortError::SizeMismatch {
                    expected_width: w,
                    expected_height: h,
                    actual_width: img.0,
                    actual_height: img.1,
                });
            }
        }

        let channels = P::CHANNEL_COUNT as usize;
        let src = Source {
            data: frame.as_raw(),
            width: w as i32,
            height: h as i32,
            channels,
            border: self.border as f32,
        };
        let (map_x, map_y) = (self.map.map_x(), self.map.map_y());
        let dst: &mut [u8] = out;

        for (i, px) in dst.chunks_exact_mut(channels).enumerate() {
            src.sample_bilinear(map_x[i], map_y[i], px);
        }
        Ok(())
    }
}

struct Source<'a> {
    data: &'a [u8],
    width: i32,
    height: i32,
    channels: usize,
    border: f32,
}

impl Source<'_> {
    #[inline]
    fn get(&self, x: i32, y: i32, c: usize) -> f32 {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return self.border;
        }
        self.data[(y as usize * self.width as usize + x as usize) * self.channels + c] as f32
    }

    #[inline]
    fn sample_bilinear(&self, x: f32, y: f32, out: &mut [u8]) {
        // No tap of a coordinate outside [-1, size] lands in the frame.
        let inside = |v: f32, size: i32| v >= -1.0 && v <= size as f32;
        if !inside(x, self.width) || !inside(y, self.height) {
            out.fill(self.border as u8);
            return;
        }
        let x0 = x.floor() as i32;
        let y0 = y.floor() as i32;
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        for (c, o) in out.iter_mut().enumerate() {
            let p00 = self.get(x0, y0, c);
            let p10 = self.get(x0 + 1, y0, c);
            let p01 = self.get(x0, y0 + 1, c);
            let p11 = self.get(x0 + 1, y0 + 1, c);

            let a = p00 + fx * (p10 - p00);
            let b = p01 + fx * (p11 - p01);
            *o = (a + fy * (b - a)).round().clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_undistortion_map;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use lenscal_core::IntrinsicModel;
    use nalgebra::Matrix3;

    fn identity_corrector(w: u32, h: u32) -> LiveCorrector {
        let (cx, cy) = ((w as f64 - 1.0) / 2.0, (h as f64 - 1.0) / 2.0);
        let k = Matrix3::new(100.0, 0.0, cx, 0.0, 100.0, cy, 0.0, 0.0, 1.0);
        let model = IntrinsicModel::new(w, h, k, vec![0.0; 5]).unwrap();
        LiveCorrector::new(build_undistortion_map(&model))
    }

    #[test]
    fn identity_map_reproduces_frame() {
        let corrector = identity_corrector(16, 12);
        let frame = RgbImage::from_fn(16, 12, |x, y| Rgb([(x * 10) as u8, (y * 20) as u8, 7]));
        let out = corrector.correct(&frame).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn rejects_mismatched_frames() {
        let corrector = identity_corrector(16, 12);
        let err = corrector.correct(&GrayImage::new(8, 8)).unwrap_err();
        assert_eq!(
            err,
            UndistortError::SizeMismatch {
                expected_width: 16,
                expected_height: 12,
                actual_width: 8,
                actual_height: 8
            }
        );
    }

    #[test]
    fn bilinear_midpoint_and_constant_border() {
        let src = Source {
            data: &[0, 100, 200, 50],
            width: 2,
            height: 2,
            channels: 1,
            border: 0.0,
        };
        let mut px = [0u8];
        src.sample_bilinear(0.5, 0.0, &mut px);
        assert_eq!(px[0], 50);
        src.sample_bilinear(0.5, 0.5, &mut px);
        assert_eq!(px[0], 88);
        src.sample_bilinear(-5.0, 0.0, &mut px);
        assert_eq!(px[0], 0);
    }

    #[test]
    fn far_and_non_finite_coordinates_read_the_border() {
        let src = Source {
            data: &[10, 20, 30, 40],
            width: 2,
            height: 2,
            channels: 1,
            border: 7.0,
        };
        let mut px = [0u8];
        for (x, y) in [
            (f32::MAX, 0.0),
            (0.0, -f32::MAX),
            (3.0e9, 3.0e9),
            (f32::NAN, 0.5),
            (0.5, f32::INFINITY),
        ] {
            src.sample_bilinear(x, y, &mut px);
            assert_eq!(px[0], 7, "({x}, {y})");
        }
        // Just outside the frame still blends with the edge pixel.
        src.sample_bilinear(-0.5, 0.0, &mut px);
        assert_eq!(px[0], 9);
    }

    #[test]
    fn configurable_border_fills_outside_samples() {
        let k = Matrix3::new(50.0, 0.0, 7.5, 0.0, 50.0, 5.5, 0.0, 0.0, 1.0);
        let model = IntrinsicModel::new(16, 12, k, vec![0.0; 5]).unwrap();
        // Zooming out samples beyond the source frame near the edges.
        let wide = Matrix3::new(10.0, 0.0, 7.5, 0.0, 10.0, 5.5, 0.0, 0.0, 1.0);
        let map = crate::build_undistortion_map_with(&model, &wide, model.image_size()).unwrap();
        let corrector = LiveCorrector::new(map).with_border(255);
        let out = corrector.correct(&GrayImage::new(16, 12)).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Luma([255]));
        assert_eq!(*out.get_pixel(8, 6), Luma([0]));
    }
}
