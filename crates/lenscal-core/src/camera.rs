use crate::ModelError;
use nalgebra::{Matrix3, Point2, Point3};
use serde::{Deserialize, Serialize};

/// Fixed-point iterations used to invert the distortion polynomial.
const UNDISTORT_ITERS: usize = 20;

/// Radial/tangential lens distortion in the OpenCV rational layout
/// `(k1, k2, p1, p2[, k3[, k4, k5, k6]])`.
///
/// With `k4 = k5 = k6 = 0` this is the plain Brown–Conrady polynomial.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
    pub k4: f64,
    pub k5: f64,
    pub k6: f64,
}

impl Distortion {
    pub const NONE: Distortion = Distortion {
        k1: 0.0,
        k2: 0.0,
        p1: 0.0,
        p2: 0.0,
        k3: 0.0,
        k4: 0.0,
        k5: 0.0,
        k6: 0.0,
    };

    /// Radial-only polynomial `(k1, k2, k3)`.
    pub fn radial(k1: f64, k2: f64, k3: f64) -> Self {
        Self {
            k1,
            k2,
            k3,
            ..Self::NONE
        }
    }

    /// Parse an OpenCV-style coefficient vector.
    ///
    /// Accepted lengths are 4, 5, 8, 12 and 14. Thin-prism and tilt terms
    /// (indices 8 and up) are not modelled and must be zero.
    pub fn from_coeffs(coeffs: &[f64]) -> Result<Self, ModelError> {
        if !matches!(coeffs.len(), 4 | 5 | 8 | 12 | 14) {
            return Err(ModelError::UnsupportedDistortionLength(coeffs.len()));
        }
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::NonFinite);
        }
        if coeffs.iter().skip(8).any(|&c| c != 0.0) {
            return Err(ModelError::UnsupportedDistortionTerms);
        }
        let at = |i: usize| coeffs.get(i).copied().unwrap_or(0.0);
        Ok(Self {
            k1: at(0),
            k2: at(1),
            p1: at(2),
            p2: at(3),
            k3: at(4),
            k4: at(5),
            k5: at(6),
            k6: at(7),
        })
    }

    /// Coefficient vector in OpenCV order, truncated/padded to `len` entries.
    pub fn to_coeffs(&self, len: usize) -> Vec<f64> {
        let all = [
            self.k1, self.k2, self.p1, self.p2, self.k3, self.k4, self.k5, self.k6,
        ];
        (0..len).map(|i| all.get(i).copied().unwrap_or(0.0)).collect()
    }

    pub fn is_rational(&self) -> bool {
        self.k4 != 0.0 || self.k5 != 0.0 || self.k6 != 0.0
    }

    /// Apply the forward model to an ideal normalized point.
    #[inline]
    pub fn distort(&self, x: f64, y: f64) -> (f64, f64) {
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = (1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6)
            / (1.0 + self.k4 * r2 + self.k5 * r4 + self.k6 * r6);
        let xy = x * y;
        let xd = x * radial + 2.0 * self.p1 * xy + self.p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * xy;
        (xd, yd)
    }

    /// Invert [`Distortion::distort`] by fixed-point iteration.
    pub fn undistort(&self, xd: f64, yd: f64) -> (f64, f64) {
        let (mut x, mut y) = (xd, yd);
        for _ in 0..UNDISTORT_ITERS {
            let r2 = x * x + y * y;
            let r4 = r2 * r2;
            let r6 = r4 * r2;
            let inv_radial = (1.0 + self.k4 * r2 + self.k5 * r4 + self.k6 * r6)
                / (1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6);
            let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            x = (xd - dx) * inv_radial;
            y = (yd - dy) * inv_radial;
        }
        (x, y)
    }
}

/// Pinhole camera with lens distortion.
///
/// `skew` is the `K[0][1]` entry; calibration keeps it at zero, but matrices
/// read from disk may carry one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PinholeCamera {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    #[serde(default)]
    pub skew: f64,
    pub distortion: Distortion,
}

impl PinholeCamera {
    /// Zero-skew camera.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, distortion: Distortion) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            skew: 0.0,
            distortion,
        }
    }

    pub fn from_matrix(k: &Matrix3<f64>, distortion: Distortion) -> Self {
        Self {
            skew: k[(0, 1)],
            ..Self::new(k[(0, 0)], k[(1, 1)], k[(0, 2)], k[(1, 2)], distortion)
        }
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, self.skew, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Project a camera-frame point to pixels.
    ///
    /// No cheirality check is done; use [`PinholeCamera::try_project`] when
    /// points may lie behind the camera.
    #[inline]
    pub fn project(&self, p_cam: &Point3<f64>) -> Point2<f64> {
        let x = p_cam.x / p_cam.z;
        let y = p_cam.y / p_cam.z;
        let (xd, yd) = self.distortion.distort(x, y);
        self.normalized_to_pixel(xd, yd)
    }

    pub fn try_project(&self, p_cam: &Point3<f64>) -> Option<Point2<f64>> {
        if p_cam.z <= f64::EPSILON {
            return None;
        }
        Some(self.project(p_cam))
    }

    #[inline]
    pub fn normalized_to_pixel(&self, x: f64, y: f64) -> Point2<f64> {
        Point2::new(self.fx * x + self.skew * y + self.cx, self.fy * y + self.cy)
    }

    #[inline]
    pub fn pixel_to_normalized(&self, p: &Point2<f64>) -> (f64, f64) {
        let y = (p.y - self.cy) / self.fy;
        ((p.x - self.cx - self.skew * y) / self.fx, y)
    }

    /// Map an observed (distorted) pixel to where an ideal pinhole camera
    /// with the same matrix would have imaged it.
    pub fn undistort_pixel(&self, p: &Point2<f64>) -> Point2<f64> {
        let (xd, yd) = self.pixel_to_normalized(p);
        let (x, y) = self.distortion.undistort(xd, yd);
        self.normalized_to_pixel(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn undistort_inverts_distort() {
        let d = Distortion {
            k1: -0.28,
            k2: 0.07,
            p1: 0.001,
            p2: -0.0005,
            k3: 0.0,
            ..Distortion::NONE
        };
        for &(x, y) in &[(0.0, 0.0), (0.1, -0.2), (-0.35, 0.25), (0.4, 0.3)] {
            let (xd, yd) = d.distort(x, y);
            let (xu, yu) = d.undistort(xd, yd);
            assert_relative_eq!(xu, x, epsilon = 1e-6);
            assert_relative_eq!(yu, y, epsilon = 1e-6);
        }
    }

    #[test]
    fn coefficient_layouts() {
        let d = Distortion::from_coeffs(&[0.1, 0.2, 0.0, 0.0]).unwrap();
        assert_eq!(d.k2, 0.2);
        assert_eq!(d.k3, 0.0);
        assert_eq!(d.to_coeffs(5), vec![0.1, 0.2, 0.0, 0.0, 0.0]);

        assert_eq!(
            Distortion::from_coeffs(&[0.1, 0.2, 0.3]),
            Err(ModelError::UnsupportedDistortionLength(3))
        );
        let mut twelve = vec![0.0; 12];
        twelve[9] = 0.5;
        assert_eq!(
            Distortion::from_coeffs(&twelve),
            Err(ModelError::UnsupportedDistortionTerms)
        );
    }

    #[test]
    fn skew_survives_the_matrix_round_trip() {
        let k = Matrix3::new(500.0, 2.5, 320.0, 0.0, 400.0, 240.0, 0.0, 0.0, 1.0);
        let cam = PinholeCamera::from_matrix(&k, Distortion::NONE);
        assert_eq!(cam.skew, 2.5);
        assert_eq!(cam.matrix(), k);

        let p = Point2::new(410.0, 100.0);
        let (x, y) = cam.pixel_to_normalized(&p);
        let back = cam.normalized_to_pixel(x, y);
        assert_relative_eq!(back.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-9);

        let q = k * nalgebra::Vector3::new(x, y, 1.0);
        assert_relative_eq!(q.x, p.x, epsilon = 1e-9);
    }

    #[test]
    fn projection_uses_principal_point() {
        let cam = PinholeCamera::new(500.0, 400.0, 320.0, 240.0, Distortion::NONE);
        let p = cam.project(&Point3::new(0.0, 0.0, 2.0));
        assert_relative_eq!(p.x, 320.0);
        assert_relative_eq!(p.y, 240.0);
        let q = cam.project(&Point3::new(1.0, -1.0, 2.0));
        assert_relative_eq!(q.x, 570.0);
        assert_relative_eq!(q.y, 40.0);
        assert!(cam.try_project(&Point3::new(0.0, 0.0, -1.0)).is_none());
    }
}
