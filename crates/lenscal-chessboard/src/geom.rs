/// Compute the absolute difference between two angles (radians),
/// normalized into `[0, PI]`.
pub fn angle_diff_abs(a: f32, b: f32) -> f32 {
    let two_pi = 2.0 * std::f32::consts::PI;
    // Normalize angle difference to [-PI, PI).
    let mut diff = (b - a).rem_euclid(two_pi);
    if diff >= std::f32::consts::PI {
        diff -= two_pi;
    }
    diff.abs()
}

/// Angle between an undirected axis `axis_angle` (defined modulo PI) and a
/// directed vector angle `vec_angle`, in `[0, PI/2]`.
pub fn axis_vec_diff(axis_angle: f32, vec_angle: f32) -> f32 {
    let diff_abs = angle_diff_abs(axis_angle, vec_angle);
    diff_abs.min(std::f32::consts::PI - diff_abs)
}

/// Check whether two undirected axes (angles modulo PI) are approximately
/// orthogonal within `tolerance`.
pub fn is_orthogonal(reference_angle: f32, other_angle: f32, tolerance: f32) -> bool {
    let diff = axis_vec_diff(reference_angle, other_angle);
    (std::f32::consts::FRAC_PI_2 - diff).abs() <= tolerance.abs()
}

/// Dominant grid axis angle from corner orientations.
///
/// Chessboard corner orientations alternate between the two diagonals, so
/// they are averaged in quadruple-angle space where both diagonals coincide.
/// The result is the grid row axis, defined modulo `PI/2`.
pub fn dominant_grid_axis(orientations: impl IntoIterator<Item = (f32, f32)>) -> Option<f32> {
    let (mut sx, mut sy, mut wsum) = (0.0f32, 0.0f32, 0.0f32);
    for (theta, weight) in orientations {
        let w = weight.max(0.0);
        if w <= 0.0 || !theta.is_finite() {
            continue;
        }
        sx += w * (4.0 * theta).cos();
        sy += w * (4.0 * theta).sin();
        wsum += w;
    }
    if wsum <= 0.0 {
        return None;
    }
    let (mx, my) = (sx / wsum, sy / wsum);
    if mx * mx + my * my < 1e-6 {
        return None;
    }
    let diagonal = 0.25 * my.atan2(mx);
    Some(diagonal + std::f32::consts::FRAC_PI_4)
}
