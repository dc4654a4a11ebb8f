use approx::assert_relative_eq;
use lenscal_core::{
    estimate_homography, BoardGeometry, CalibrationSample, Distortion, IntrinsicModel,
    PinholeCamera,
};
use nalgebra::{Isometry3, Point2, Translation3, UnitQuaternion, Vector3};

fn pose() -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(-3.0, -4.0, 16.0),
        UnitQuaternion::from_scaled_axis(Vector3::new(0.25, -0.2, 0.1)),
    )
}

#[test]
fn pinhole_views_of_the_board_are_homographies() {
    let board = BoardGeometry::new(9, 6).unwrap();
    let camera = PinholeCamera::new(700.0, 690.0, 319.5, 239.5, Distortion::NONE);
    let pose = pose();

    let object = board.object_points();
    let pixels: Vec<Point2<f64>> = object
        .iter()
        .map(|p| camera.project(&pose.transform_point(p)))
        .collect();
    let sample = CalibrationSample::for_board(&board, pixels.clone()).unwrap();
    assert_eq!(sample.len(), 54);

    let plane: Vec<Point2<f64>> = object.iter().map(|p| Point2::new(p.x, p.y)).collect();
    let h = estimate_homography(&plane, &pixels).expect("homography");
    for (src, dst) in plane.iter().zip(&pixels) {
        let mapped = h.apply(src);
        assert_relative_eq!(mapped.x, dst.x, epsilon = 1e-6);
        assert_relative_eq!(mapped.y, dst.y, epsilon = 1e-6);
    }
}

#[test]
fn model_camera_undoes_its_own_distortion() {
    let k = PinholeCamera::new(650.0, 655.0, 319.5, 239.5, Distortion::NONE).matrix();
    let model = IntrinsicModel::new(640, 480, k, vec![-0.25, 0.07, 0.0, 0.0, -0.01]).unwrap();
    let camera = model.camera();

    let observed = camera.project(&pose().transform_point(&nalgebra::Point3::new(2.0, 3.0, 0.0)));
    let undistorted = camera.undistort_pixel(&observed);
    let (x, y) = camera.pixel_to_normalized(&undistorted);
    let redistorted = {
        let (xd, yd) = model.distortion().distort(x, y);
        camera.normalized_to_pixel(xd, yd)
    };
    assert_relative_eq!(redistorted.x, observed.x, epsilon = 1e-6);
    assert_relative_eq!(redistorted.y, observed.y, epsilon = 1e-6);
}
