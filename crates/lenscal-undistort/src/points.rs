use lenscal_core::IntrinsicModel;
use nalgebra::Point2;

/// Map observed (distorted) pixels to where the ideal pinhole camera with
/// the same matrix would have imaged them.
pub fn undistort_points(model: &IntrinsicModel, points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let camera = model.camera();
    points.iter().map(|p| camera.undistort_pixel(p)).collect()
}
