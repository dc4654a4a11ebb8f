use crate::ChessboardDetector;
use image::GrayImage;
use lenscal_core::BoardGeometry;
use nalgebra::Point2;

#[cfg(feature = "image")]
use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor};
#[cfg(feature = "image")]
use lenscal_core::Corner;
#[cfg(feature = "tracing")]
use tracing::instrument;

/// Locates the interior corners of a chessboard in a grayscale frame.
///
/// `Some(points)` holds exactly `board.corner_count()` points in row-major
/// order (consistent with [`BoardGeometry::object_points`]). `None` means the
/// pattern was not found in this frame, which is an expected outcome.
pub trait CornerDetector {
    fn detect(&self, image: &GrayImage, board: BoardGeometry) -> Option<Vec<Point2<f32>>>;
}

impl<D: CornerDetector + ?Sized> CornerDetector for &D {
    fn detect(&self, image: &GrayImage, board: BoardGeometry) -> Option<Vec<Point2<f32>>> {
        (**self).detect(image, board)
    }
}

impl<D: CornerDetector + ?Sized> CornerDetector for Box<D> {
    fn detect(&self, image: &GrayImage, board: BoardGeometry) -> Option<Vec<Point2<f32>>> {
        (**self).detect(image, board)
    }
}

/// Reasonable default settings for the `chess-corners` ChESS detector.
#[cfg(feature = "image")]
pub fn default_chess_config() -> ChessConfig {
    let mut cfg = ChessConfig::single_scale();
    cfg.params.threshold_rel = 0.2;
    cfg.params.nms_radius = 2;
    cfg
}

#[cfg(feature = "image")]
fn adapt_chess_corner(c: &CornerDescriptor) -> Corner {
    Corner::new(c.x, c.y, c.orientation, c.response)
}

/// ChESS response corners followed by the grid ordering of [`ChessboardDetector`].
#[cfg(feature = "image")]
pub struct ChessCornerDetector {
    pub chess: ChessConfig,
    pub grid: ChessboardDetector,
}

#[cfg(feature = "image")]
impl ChessCornerDetector {
    pub fn new(chess: ChessConfig, grid: ChessboardDetector) -> Self {
        Self { chess, grid }
    }

    /// Raw ChESS corners of `image`.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, image),
            fields(width = image.width(), height = image.height())
        )
    )]
    pub fn corners(&self, image: &GrayImage) -> Vec<Corner> {
        find_chess_corners_image(image, &self.chess)
            .iter()
            .map(adapt_chess_corner)
            .collect()
    }
}

#[cfg(feature = "image")]
impl Default for ChessCornerDetector {
    fn default() -> Self {
        Self::new(default_chess_config(), ChessboardDetector::default())
    }
}

#[cfg(feature = "image")]
impl CornerDetector for ChessCornerDetector {
    fn detect(&self, image: &GrayImage, board: BoardGeometry) -> Option<Vec<Point2<f32>>> {
        let corners = self.corners(image);
        self.grid.detect_from_corners(&corners, board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<Point2<f32>>);

    impl CornerDetector for Fixed {
        fn detect(&self, _: &GrayImage, board: BoardGeometry) -> Option<Vec<Point2<f32>>> {
            (self.0.len() == board.corner_count()).then(|| self.0.clone())
        }
    }

    #[test]
    fn trait_objects_and_references_delegate() {
        let board = BoardGeometry::new(2, 1).unwrap();
        let fixed = Fixed(vec![Point2::new(1.0, 2.0), Point2::new(3.0, 4.0)]);
        let img = GrayImage::new(4, 4);

        let boxed: Box<dyn CornerDetector> = Box::new(Fixed(fixed.0.clone()));
        assert_eq!(boxed.detect(&img, board), fixed.detect(&img, board));
        assert_eq!((&fixed).detect(&img, board).map(|p| p.len()), Some(2));
    }

    #[cfg(feature = "image")]
    #[test]
    fn blank_frame_is_a_miss() {
        let board = BoardGeometry::new(9, 6).unwrap();
        let img = GrayImage::from_pixel(160, 120, image::Luma([128]));
        assert!(ChessCornerDetector::default().detect(&img, board).is_none());
    }
}
