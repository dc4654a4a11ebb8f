use approx::assert_relative_eq;
use lenscal_core::{
    BoardGeometry, CalibrationSample, Distortion, ImageSize, PinholeCamera, SampleSet,
};
use lenscal_optim::{CalibrationSolver, SolveError};
use nalgebra::{Isometry3, Point2, Translation3, UnitQuaternion, Vector3};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

fn ground_truth() -> PinholeCamera {
    PinholeCamera::new(
        800.0,
        780.0,
        (WIDTH as f64 - 1.0) * 0.5,
        (HEIGHT as f64 - 1.0) * 0.5,
        Distortion::radial(-0.21, 0.06, 0.0),
    )
}

/// Board poses that keep a 9x6 grid (unit squares) inside a 640x480 frame.
fn poses() -> Vec<Isometry3<f64>> {
    let tilts = [
        (0.35, 0.0, 0.05),
        (-0.3, 0.1, -0.1),
        (0.0, 0.35, 0.0),
        (0.1, -0.35, 0.15),
        (0.25, 0.25, -0.05),
        (-0.2, -0.25, 0.1),
    ];
    tilts
        .iter()
        .enumerate()
        .map(|(k, &(rx, ry, rz))| {
            Isometry3::from_parts(
                Translation3::new(
                    -2.5 + 0.2 * (k as f64 - 2.5),
                    -4.0 + 0.1 * (k as f64 - 2.5),
                    18.0 + 0.5 * k as f64,
                ),
                UnitQuaternion::from_scaled_axis(Vector3::new(rx, ry, rz)),
            )
        })
        .collect()
}

fn project_all(cam: &PinholeCamera, board: &BoardGeometry, poses: &[Isometry3<f64>]) -> SampleSet {
    poses
        .iter()
        .map(|pose| {
            let pixels: Vec<Point2<f64>> = board
                .object_points()
                .iter()
                .map(|p| cam.project(&pose.transform_point(p)))
                .collect();
            for p in &pixels {
                assert!(p.x > 0.0 && p.x < WIDTH as f64 && p.y > 0.0 && p.y < HEIGHT as f64);
            }
            CalibrationSample::for_board(board, pixels).unwrap()
        })
        .collect()
}

#[test]
fn recovers_synthetic_camera() {
    let board = BoardGeometry::new(9, 6).unwrap();
    let gt = ground_truth();
    let samples = project_all(&gt, &board, &poses());

    let calib = CalibrationSolver::default()
        .solve(&samples, ImageSize::new(WIDTH, HEIGHT))
        .expect("calibration succeeds");

    assert!(calib.rms >= 0.0);
    assert!(calib.rms < 1e-3, "rms {}", calib.rms);
    assert_eq!(calib.per_sample_rms.len(), samples.len());

    let model = &calib.model;
    assert_relative_eq!(model.fx(), gt.fx, max_relative = 1e-3);
    assert_relative_eq!(model.fy(), gt.fy, max_relative = 1e-3);
    assert_eq!(model.cx(), gt.cx);
    assert_eq!(model.cy(), gt.cy);

    let coeffs = model.distortion_coeffs();
    assert_eq!(coeffs.len(), 5);
    assert_relative_eq!(coeffs[0], -0.21, epsilon = 2e-2);
    assert_eq!(coeffs[2], 0.0);
    assert_eq!(coeffs[3], 0.0);

    // k2/k3 trade off at small radii; compare the polynomial itself.
    for &(x, y) in &[(0.1, 0.05), (-0.15, 0.2), (0.2, -0.1)] {
        let (ex, ey) = gt.distortion.distort(x, y);
        let (ax, ay) = model.distortion().distort(x, y);
        assert!((ex - ax).abs() < 1e-5 && (ey - ay).abs() < 1e-5);
    }
}

#[test]
fn noisy_observations_give_a_small_positive_error() {
    let board = BoardGeometry::new(9, 6).unwrap();
    let gt = ground_truth();
    let clean = project_all(&gt, &board, &poses());

    // Deterministic +-0.2 px perturbation.
    let noisy: SampleSet = clean
        .iter()
        .enumerate()
        .map(|(s, sample)| {
            let pts = sample
                .image_points()
                .iter()
                .enumerate()
                .map(|(k, p)| {
                    let phase = (s * 31 + k * 7) as f64;
                    Point2::new(p.x + 0.2 * phase.sin(), p.y + 0.2 * phase.cos())
                })
                .collect();
            CalibrationSample::for_board(&board, pts).unwrap()
        })
        .collect();

    let calib = CalibrationSolver::default()
        .solve(&noisy, ImageSize::new(WIDTH, HEIGHT))
        .expect("calibration succeeds");
    assert!(calib.rms > 0.0 && calib.rms < 0.5, "rms {}", calib.rms);
    assert_relative_eq!(calib.model.fx(), gt.fx, max_relative = 2e-2);
}

#[test]
fn identical_fronto_parallel_views_fail() {
    let board = BoardGeometry::new(9, 6).unwrap();
    let gt = PinholeCamera::new(800.0, 800.0, 319.5, 239.5, Distortion::NONE);
    let flat = Isometry3::translation(-2.5, -4.0, 15.0);
    let samples = project_all(&gt, &board, &[flat, flat, flat, flat]);

    let err = CalibrationSolver::default()
        .solve(&samples, ImageSize::new(WIDTH, HEIGHT))
        .unwrap_err();
    assert!(matches!(err, SolveError::DegenerateViews(_)), "{err:?}");
}

#[test]
fn exhausted_evaluation_budget_never_returns_an_unconverged_model() {
    let board = BoardGeometry::new(9, 6).unwrap();
    let samples = project_all(&ground_truth(), &board, &poses());

    let mut solver = CalibrationSolver::default();
    solver.config.options.max_iters = 1;
    match solver.solve(&samples, ImageSize::new(WIDTH, HEIGHT)) {
        Ok(calib) => assert!(calib.report.converged, "{:?}", calib.report),
        Err(err) => assert!(matches!(err, SolveError::Diverged { .. }), "{err:?}"),
    }
}

#[test]
fn converged_solve_reports_its_termination() {
    let board = BoardGeometry::new(9, 6).unwrap();
    let samples = project_all(&ground_truth(), &board, &poses());

    let calib = CalibrationSolver::default()
        .solve(&samples, ImageSize::new(WIDTH, HEIGHT))
        .expect("calibration succeeds");
    assert!(calib.report.converged);
    assert!(calib.report.termination.was_successful());
    assert!(calib.report.final_cost <= calib.report.initial_cost);
}
