use crate::init::{focal_from_homographies, pose_from_homography, sample_homography};
use crate::problem::fd_step;
use crate::{LevenbergMarquardt, NllsProblem, SolveError, SolveOptions, SolveReport};
#[cfg(test)]
use crate::Termination;
use lenscal_core::{
    CalibrationSample, Distortion, ImageSize, IntrinsicModel, PinholeCamera, SampleSet,
};
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector, Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Number of entries in the full intrinsic block `[fx, fy, cx, cy, k1, k2, p1, p2, k3]`.
const FULL_INTRINSICS: usize = 9;
const POSE_DIM: usize = 6;

const FX: usize = 0;
const FY: usize = 1;
const CX: usize = 2;
const CY: usize = 3;
const K1: usize = 4;
const K2: usize = 5;
const P1: usize = 6;
const P2: usize = 7;
const K3: usize = 8;

/// Which intrinsic parameters stay at their initial value.
///
/// The defaults hold the principal point at the image centre and the
/// tangential coefficients at zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConstraints {
    pub fix_principal_point: bool,
    pub zero_tangential: bool,
    pub fix_k3: bool,
}

impl Default for ModelConstraints {
    fn default() -> Self {
        Self {
            fix_principal_point: true,
            zero_tangential: true,
            fix_k3: false,
        }
    }
}

impl ModelConstraints {
    /// Indices into the full intrinsic block that are optimised.
    fn free_intrinsics(&self) -> Vec<usize> {
        let mut free = vec![FX, FY];
        if !self.fix_principal_point {
            free.extend([CX, CY]);
        }
        free.extend([K1, K2]);
        if !self.zero_tangential {
            free.extend([P1, P2]);
        }
        if !self.fix_k3 {
            free.push(K3);
        }
        free
    }
}

/// Joint refinement of intrinsics and one board pose per sample.
///
/// Parameter layout: the free intrinsic entries (see [`ModelConstraints`])
/// followed by `(rvec, t)` per sample, `rvec` being an axis-angle vector.
#[derive(Debug, Clone)]
pub struct PlanarIntrinsicsProblem<'a> {
    samples: &'a [CalibrationSample],
    base: [f64; FULL_INTRINSICS],
    free: Vec<usize>,
    num_residuals: usize,
}

impl<'a> PlanarIntrinsicsProblem<'a> {
    pub fn new(
        samples: &'a [CalibrationSample],
        initial: &PinholeCamera,
        constraints: ModelConstraints,
    ) -> Self {
        let d = initial.distortion;
        Self {
            samples,
            base: [
                initial.fx, initial.fy, initial.cx, initial.cy, d.k1, d.k2, d.p1, d.p2, d.k3,
            ],
            free: constraints.free_intrinsics(),
            num_residuals: samples.iter().map(|s| 2 * s.len()).sum(),
        }
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    fn pose_offset(&self, sample: usize) -> usize {
        self.free.len() + POSE_DIM * sample
    }

    /// Pack a camera and per-sample poses into a parameter vector.
    pub fn pack(&self, camera: &PinholeCamera, poses: &[Isometry3<f64>]) -> DVector<f64> {
        let d = camera.distortion;
        let full = [
            camera.fx, camera.fy, camera.cx, camera.cy, d.k1, d.k2, d.p1, d.p2, d.k3,
        ];
        let mut x = DVector::zeros(self.num_params());
        for (slot, &idx) in self.free.iter().enumerate() {
            x[slot] = full[idx];
        }
        for (i, pose) in poses.iter().enumerate() {
            let o = self.pose_offset(i);
            let w = pose.rotation.scaled_axis();
            let t = pose.translation.vector;
            x.rows_mut(o, POSE_DIM)
                .copy_from_slice(&[w.x, w.y, w.z, t.x, t.y, t.z]);
        }
        x
    }

    pub fn camera(&self, x: &DVector<f64>) -> PinholeCamera {
        let mut full = self.base;
        for (slot, &idx) in self.free.iter().enumerate() {
            full[idx] = x[slot];
        }
        PinholeCamera::new(
            full[FX],
            full[FY],
            full[CX],
            full[CY],
            Distortion {
                k1: full[K1],
                k2: full[K2],
                p1: full[P1],
                p2: full[P2],
                k3: full[K3],
                ..Distortion::NONE
            },
        )
    }

    pub fn pose(&self, x: &DVector<f64>, sample: usize) -> Isometry3<f64> {
        let o = self.pose_offset(sample);
        let w = Vector3::new(x[o], x[o + 1], x[o + 2]);
        let t = Vector3::new(x[o + 3], x[o + 4], x[o + 5]);
        Isometry3::from_parts(Translation3::from(t), UnitQuaternion::from_scaled_axis(w))
    }

    pub fn poses(&self, x: &DVector<f64>) -> Vec<Isometry3<f64>> {
        (0..self.samples.len()).map(|i| self.pose(x, i)).collect()
    }

    /// Residual rows `(projected - observed)` of one sample, written into `out`.
    fn sample_residuals(
        camera: &PinholeCamera,
        pose: &Isometry3<f64>,
        sample: &CalibrationSample,
        out: &mut [f64],
    ) {
        for (k, (obj, img)) in sample.correspondences().enumerate() {
            let proj = camera.project(&pose.transform_point(obj));
            out[2 * k] = proj.x - img.x;
            out[2 * k + 1] = proj.y - img.y;
        }
    }

    /// Row offset of each sample's residual block.
    fn row_offsets(&self) -> Vec<usize> {
        self.samples
            .iter()
            .scan(0, |acc, s| {
                let start = *acc;
                *acc += 2 * s.len();
                Some(start)
            })
            .collect()
    }
}

impl NllsProblem for PlanarIntrinsicsProblem<'_> {
    fn num_params(&self) -> usize {
        self.free.len() + POSE_DIM * self.samples.len()
    }

    fn num_residuals(&self) -> usize {
        self.num_residuals
    }

    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let camera = self.camera(x);
        let mut r = DVector::zeros(self.num_residuals);
        let mut offset = 0;
        for (i, sample) in self.samples.iter().enumerate() {
            let rows = 2 * sample.len();
            let pose = self.pose(x, i);
            Self::sample_residuals(
                &camera,
                &pose,
                sample,
                &mut r.as_mut_slice()[offset..offset + rows],
            );
            offset += rows;
        }
        r
    }

    /// Forward differences; a pose column only touches its own sample's rows.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let base = self.residuals(x);
        let mut j = DMatrix::zeros(self.num_residuals, self.num_params());
        let mut x_pert = x.clone();

        for k in 0..self.free.len() {
            let h = fd_step(x[k]);
            x_pert[k] = x[k] + h;
            let r_plus = self.residuals(&x_pert);
            j.set_column(k, &((r_plus - &base) / h));
            x_pert[k] = x[k];
        }

        let camera = self.camera(x);
        let offsets = self.row_offsets();
        for (i, sample) in self.samples.iter().enumerate() {
            let rows = 2 * sample.len();
            let row0 = offsets[i];
            let mut block = vec![0.0; rows];
            for p in 0..POSE_DIM {
                let col = self.pose_offset(i) + p;
                let h = fd_step(x[col]);
                x_pert[col] = x[col] + h;
                let pose = self.pose(&x_pert, i);
                Self::sample_residuals(&camera, &pose, sample, &mut block);
                for (row, value) in block.iter().enumerate() {
                    j[(row0 + row, col)] = (value - base[row0 + row]) / h;
                }
                x_pert[col] = x[col];
            }
        }

        j
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub constraints: ModelConstraints,
    pub options: SolveOptions,
    /// Fewest samples accepted for a solve.
    pub min_samples: usize,
    /// Length of the persisted distortion vector (`k1 k2 p1 p2 k3` by default).
    pub distortion_len: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            constraints: ModelConstraints::default(),
            options: SolveOptions::default(),
            min_samples: 3,
            distortion_len: 5,
        }
    }
}

/// Result of a successful calibration.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub model: IntrinsicModel,
    /// Root mean square reprojection error over all points, in pixels.
    pub rms: f64,
    pub per_sample_rms: Vec<f64>,
    /// Board-to-camera pose of every sample, in board grid units.
    pub poses: Vec<Isometry3<f64>>,
    pub report: SolveReport,
}

/// Estimates camera intrinsics from a set of planar board samples.
#[derive(Debug, Clone, Default)]
pub struct CalibrationSolver {
    pub config: SolverConfig,
}

impl CalibrationSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, samples, image_size),
            fields(num_samples = samples.len(), size = %image_size)
        )
    )]
    pub fn solve(
        &self,
        samples: &SampleSet,
        image_size: ImageSize,
    ) -> Result<Calibration, SolveError> {
        if image_size.is_empty() {
            return Err(SolveError::ImageSize {
                width: image_size.width,
                height: image_size.height,
            });
        }
        let need = self.config.min_samples.max(1);
        if samples.len() < need {
            return Err(SolveError::NotEnoughSamples {
                got: samples.len(),
                need,
            });
        }
        if samples.iter().any(|s| s.len() < 4) {
            return Err(SolveError::DegenerateViews("a sample has fewer than 4 points"));
        }

        let (cx, cy) = image_size.center();
        let homographies = samples
            .iter()
            .map(sample_homography)
            .collect::<Option<Vec<_>>>()
            .ok_or(SolveError::DegenerateViews("homography estimation failed"))?;
        let scale = 0.5 * (image_size.width as f64 + image_size.height as f64);
        let (fx0, fy0) = focal_from_homographies(&homographies, cx, cy, scale)?;
        debug!("initial focal lengths fx={fx0:.2} fy={fy0:.2}");

        let initial = PinholeCamera::new(fx0, fy0, cx, cy, Distortion::NONE);
        let k0 = initial.matrix();
        let poses0 = homographies
            .iter()
            .map(|h| pose_from_homography(&k0, h))
            .collect::<Result<Vec<_>, _>>()?;

        let problem =
            PlanarIntrinsicsProblem::new(samples.as_slice(), &initial, self.config.constraints);
        let x0 = problem.pack(&initial, &poses0);
        let lm = LevenbergMarquardt::new(self.config.options);
        let (x, report) = lm.minimize(&problem, x0);

        let residuals = problem.residuals(&x);
        let total_points = samples.total_points().max(1);
        let rms = (residuals.norm_squared() / total_points as f64).sqrt();

        let camera = problem.camera(&x);
        check_solution(&report, rms, &camera)?;

        let mut per_sample_rms = Vec::with_capacity(samples.len());
        let mut offset = 0;
        for sample in samples {
            let rows = 2 * sample.len();
            let sq: f64 = residuals.rows(offset, rows).norm_squared();
            per_sample_rms.push((sq / sample.len() as f64).sqrt());
            offset += rows;
        }

        let model = IntrinsicModel::from_camera(image_size, &camera, self.config.distortion_len)?;
        info!(
            "calibrated {} samples: rms {:.4} px, fx={:.2} fy={:.2} ({:?} after {} iterations)",
            samples.len(),
            rms,
            camera.fx,
            camera.fy,
            report.termination,
            report.iterations
        );

        Ok(Calibration {
            model,
            rms,
            per_sample_rms,
            poses: problem.poses(&x),
            report,
        })
    }
}

/// A solve is only usable when LM met a tolerance and the refined camera
/// is physical.
fn check_solution(
    report: &SolveReport,
    rms: f64,
    camera: &PinholeCamera,
) -> Result<(), SolveError> {
    let d = &camera.distortion;
    let physical = camera.fx > 0.0
        && camera.fy > 0.0
        && [camera.fx, camera.fy, d.k1, d.k2, d.k3]
            .iter()
            .all(|v| v.is_finite());
    if !report.converged || !rms.is_finite() || !physical {
        warn!(
            "calibration did not converge: {:?} after {} evaluations, rms {:.4} px",
            report.termination, report.iterations, rms
        );
        return Err(SolveError::Diverged {
            iterations: report.iterations,
            rms,
        });
    }
    Ok(())
}
