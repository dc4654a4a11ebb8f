//! Closed-form initialisation: per-sample homographies, focal lengths with a
//! known principal point, and per-sample board poses.

use crate::SolveError;
use lenscal_core::{estimate_homography, CalibrationSample, Homography};
use nalgebra::{
    DMatrix, DVector, Isometry3, Matrix3, Point2, Rotation3, Translation3, UnitQuaternion, Vector3,
};

/// Plane-to-image homography of one sample (board `z = 0`).
pub fn sample_homography(sample: &CalibrationSample) -> Option<Homography> {
    let board: Vec<Point2<f64>> = sample
        .object_points()
        .iter()
        .map(|p| Point2::new(p.x, p.y))
        .collect();
    estimate_homography(&board, sample.image_points())
}

/// Smallest perspective ratio (see [`perspective_ratio`]) of a tilted view.
const MIN_PERSPECTIVE_RATIO: f64 = 1e-4;

/// Size of the perspective row `(h31, h32)` relative to the first two
/// columns of a normalised homography. Zero for a fronto-parallel board.
fn perspective_ratio(hn: &Matrix3<f64>) -> f64 {
    let c1 = hn.column(0).norm();
    let c2 = hn.column(1).norm();
    let denom = c1.max(c2);
    if !(denom > 0.0) {
        return 0.0;
    }
    hn[(2, 0)].hypot(hn[(2, 1)]) / denom
}

/// Focal lengths `(fx, fy)` from plane homographies with the principal point
/// fixed at `(cx, cy)`.
///
/// With the principal point moved to the origin, the image of the absolute
/// conic is `diag(1/fx^2, 1/fy^2, 1)` and every homography contributes the
/// two orthonormality constraints on its first two columns. `scale` is a
/// characteristic image dimension used to condition the system.
///
/// Fronto-parallel views carry no perspective and leave the focal lengths
/// unobservable; if every view is (numerically) fronto-parallel the
/// result is [`SolveError::DegenerateViews`].
pub fn focal_from_homographies(
    homographies: &[Homography],
    cx: f64,
    cy: f64,
    scale: f64,
) -> Result<(f64, f64), SolveError> {
    if homographies.is_empty() {
        return Err(SolveError::DegenerateViews("no homographies"));
    }
    let s = if scale > 0.0 { scale } else { 1.0 };
    let norm = Matrix3::new(
        1.0 / s, 0.0, -cx / s, //
        0.0, 1.0 / s, -cy / s, //
        0.0, 0.0, 1.0,
    );

    let max_tilt = homographies
        .iter()
        .map(|h| perspective_ratio(&(norm * h.h)))
        .fold(0.0_f64, f64::max);
    if !(max_tilt > MIN_PERSPECTIVE_RATIO) {
        return Err(SolveError::DegenerateViews(
            "all views are fronto-parallel; tilt the board",
        ));
    }

    let n = homographies.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 2);
    let mut b = DVector::<f64>::zeros(2 * n);
    for (k, h) in homographies.iter().enumerate() {
        let hn = norm * h.h;
        let fro = hn.norm();
        if !fro.is_finite() || fro < 1e-12 {
            return Err(SolveError::DegenerateViews("singular homography"));
        }
        let m = hn / fro;
        let (h11, h21, h31) = (m[(0, 0)], m[(1, 0)], m[(2, 0)]);
        let (h12, h22, h32) = (m[(0, 1)], m[(1, 1)], m[(2, 1)]);

        // h1^T B h2 = 0
        a[(2 * k, 0)] = h11 * h12;
        a[(2 * k, 1)] = h21 * h22;
        b[2 * k] = -h31 * h32;
        // h1^T B h1 = h2^T B h2
        a[(2 * k + 1, 0)] = h11 * h11 - h12 * h12;
        a[(2 * k + 1, 1)] = h21 * h21 - h22 * h22;
        b[2 * k + 1] = -(h31 * h31 - h32 * h32);
    }

    let svd = a.svd(true, true);
    let sv_max = svd.singular_values.max();
    let sv_min = svd.singular_values.min();
    if !(sv_max > 0.0) || sv_min <= 1e-9 * sv_max {
        return Err(SolveError::DegenerateViews(
            "views do not constrain the focal lengths (too little tilt)",
        ));
    }
    let sol = svd
        .solve(&b, 1e-15)
        .map_err(|_| SolveError::DegenerateViews("focal length system is singular"))?;

    let (ia, ib) = (sol[0], sol[1]);
    if !(ia > 0.0 && ib > 0.0) || !ia.is_finite() || !ib.is_finite() {
        return Err(SolveError::DegenerateViews(
            "focal length initialisation is not physical",
        ));
    }
    Ok((s / ia.sqrt(), s / ib.sqrt()))
}

/// Board-to-camera pose from a plane homography and a camera matrix.
///
/// The rotation is projected back onto SO(3) and the board is placed in
/// front of the camera (`t.z > 0`).
pub fn pose_from_homography(
    k: &Matrix3<f64>,
    h: &Homography,
) -> Result<Isometry3<f64>, SolveError> {
    let k_inv = k
        .try_inverse()
        .ok_or(SolveError::DegenerateViews("camera matrix is singular"))?;

    let k_inv_h1 = k_inv * h.h.column(0);
    let k_inv_h2 = k_inv * h.h.column(1);
    let h3 = h.h.column(2).into_owned();

    let mean_norm = 0.5 * (k_inv_h1.norm() + k_inv_h2.norm());
    if !mean_norm.is_finite() || mean_norm < 1e-12 {
        return Err(SolveError::DegenerateViews("degenerate homography"));
    }
    let mut lambda = 1.0 / mean_norm;
    if (k_inv * h3).z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1: Vector3<f64> = k_inv_h1 * lambda;
    let r2: Vector3<f64> = k_inv_h2 * lambda;
    let r3 = r1.cross(&r2);
    let r_mat = Matrix3::from_columns(&[r1, r2, r3]);

    let svd = r_mat.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(SolveError::DegenerateViews("rotation SVD failed"));
    };
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    let t: Vector3<f64> = (k_inv * h3) * lambda;
    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth));
    Ok(Isometry3::from_parts(Translation3::from(t), rot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lenscal_core::{BoardGeometry, Distortion, PinholeCamera};

    fn view(cam: &PinholeCamera, pose: &Isometry3<f64>) -> CalibrationSample {
        let board = BoardGeometry::new(7, 5).unwrap();
        let pixels = board
            .object_points()
            .iter()
            .map(|p| cam.project(&pose.transform_point(p)))
            .collect();
        CalibrationSample::for_board(&board, pixels).unwrap()
    }

    fn pose(rx: f64, ry: f64, t: Vector3<f64>) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(t),
            UnitQuaternion::from_scaled_axis(Vector3::new(rx, ry, 0.1)),
        )
    }

    #[test]
    fn recovers_focal_and_pose_without_distortion() {
        let cam = PinholeCamera::new(820.0, 790.0, 319.5, 239.5, Distortion::NONE);
        let poses = [
            pose(0.3, -0.2, Vector3::new(-2.0, -3.0, 14.0)),
            pose(-0.25, 0.3, Vector3::new(-3.0, -2.0, 16.0)),
            pose(0.1, 0.35, Vector3::new(-2.5, -2.5, 13.0)),
        ];
        let hs: Vec<Homography> = poses
            .iter()
            .map(|p| sample_homography(&view(&cam, p)).expect("homography"))
            .collect();

        let (fx, fy) = focal_from_homographies(&hs, 319.5, 239.5, 560.0).expect("focal");
        assert_relative_eq!(fx, 820.0, max_relative = 1e-6);
        assert_relative_eq!(fy, 790.0, max_relative = 1e-6);

        let recovered = pose_from_homography(&cam.matrix(), &hs[0]).expect("pose");
        assert_relative_eq!(
            recovered.translation.vector,
            poses[0].translation.vector,
            epsilon = 1e-6
        );
        assert!(recovered.rotation.angle_to(&poses[0].rotation) < 1e-6);
    }

    #[test]
    fn fronto_parallel_views_are_degenerate() {
        let cam = PinholeCamera::new(800.0, 800.0, 319.5, 239.5, Distortion::NONE);
        let flat = Isometry3::from_parts(
            Translation3::new(-3.0, -2.0, 15.0),
            UnitQuaternion::identity(),
        );
        let h = sample_homography(&view(&cam, &flat)).expect("homography");
        let err = focal_from_homographies(&[h, h, h], 319.5, 239.5, 560.0).unwrap_err();
        assert!(matches!(err, SolveError::DegenerateViews(_)));
    }
}
