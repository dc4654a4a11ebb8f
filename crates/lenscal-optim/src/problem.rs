use nalgebra::{DMatrix, DVector};

/// Nonlinear least-squares problem `min 0.5 * ||r(x)||^2`.
pub trait NllsProblem {
    /// Number of parameters in the optimization vector.
    fn num_params(&self) -> usize;
    /// Number of residual rows in the problem.
    fn num_residuals(&self) -> usize;

    /// Residuals for the current parameters.
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Jacobian `dr/dx`; forward differences unless overridden.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        forward_difference_jacobian(self, x)
    }
}

/// Relative forward-difference step for parameter value `v`.
#[inline]
pub fn fd_step(v: f64) -> f64 {
    1e-7 * v.abs().max(1.0)
}

/// Dense forward-difference Jacobian of `problem` at `x`.
pub fn forward_difference_jacobian<P: NllsProblem + ?Sized>(
    problem: &P,
    x: &DVector<f64>,
) -> DMatrix<f64> {
    let base = problem.residuals(x);
    let mut j = DMatrix::zeros(base.len(), x.len());
    let mut x_pert = x.clone();

    for k in 0..x.len() {
        let h = fd_step(x[k]);
        x_pert[k] = x[k] + h;
        let r_plus = problem.residuals(&x_pert);
        j.set_column(k, &((r_plus - &base) / h));
        x_pert[k] = x[k];
    }

    j
}
