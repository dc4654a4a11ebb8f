use crate::NllsProblem;
use levenberg_marquardt::{
    LeastSquaresProblem, LevenbergMarquardt as MinpackLm, TerminationReason,
};
use log::debug;
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveOptions {
    /// Evaluation budget in MINPACK units: at most `max_iters * (n + 1)`
    /// residual evaluations for `n` parameters.
    pub max_iters: usize,
    /// Relative tolerance on the cost reduction.
    pub ftol: f64,
    /// Relative tolerance on the parameter update.
    pub xtol: f64,
    /// Orthogonality tolerance between residuals and Jacobian columns.
    pub gtol: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    ResidualsZero,
    /// Relative cost and/or step tolerance reached.
    Converged { ftol: bool, xtol: bool },
    GradientTolerance,
    /// Evaluation budget exhausted before any tolerance was met.
    MaxEvaluations,
    NonFiniteCost,
    /// The solver hit a numerical limit (tolerances below machine precision,
    /// unusable residuals or Jacobian).
    Numerical,
    InvalidProblem,
}

impl Termination {
    pub fn was_successful(self) -> bool {
        matches!(
            self,
            Termination::ResidualsZero
                | Termination::Converged { .. }
                | Termination::GradientTolerance
        )
    }
}

impl From<&TerminationReason> for Termination {
    fn from(reason: &TerminationReason) -> Self {
        match reason {
            TerminationReason::ResidualsZero => Termination::ResidualsZero,
            TerminationReason::Converged { ftol, xtol } => Termination::Converged {
                ftol: *ftol,
                xtol: *xtol,
            },
            TerminationReason::Orthogonal => Termination::GradientTolerance,
            TerminationReason::LostPatience => Termination::MaxEvaluations,
            TerminationReason::Numerical(_) | TerminationReason::User(_) => {
                Termination::Numerical
            }
            _ => Termination::InvalidProblem,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveReport {
    /// Residual evaluations spent by the solver.
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub converged: bool,
    pub termination: Termination,
}

/// Exposes an [`NllsProblem`] to the `levenberg-marquardt` crate.
struct LmAdapter<'a, P: NllsProblem + ?Sized> {
    problem: &'a P,
    params: DVector<f64>,
}

impl<P: NllsProblem + ?Sized> LeastSquaresProblem<f64, Dyn, Dyn> for LmAdapter<'_, P> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        Some(self.problem.residuals(&self.params))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        Some(self.problem.jacobian(&self.params))
    }
}

/// MINPACK-style Levenberg-Marquardt (the `levenberg-marquardt` crate)
/// over any [`NllsProblem`].
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    pub options: SolveOptions,
}

fn cost_of(r: &DVector<f64>) -> f64 {
    0.5 * r.norm_squared()
}

impl LevenbergMarquardt {
    pub fn new(options: SolveOptions) -> Self {
        Self { options }
    }

    pub fn minimize<P: NllsProblem + ?Sized>(
        &self,
        problem: &P,
        x0: DVector<f64>,
    ) -> (DVector<f64>, SolveReport) {
        let opts = &self.options;
        let initial_cost = cost_of(&problem.residuals(&x0));
        if !initial_cost.is_finite() {
            debug!("LM not started: initial cost is {initial_cost}");
            let report = SolveReport {
                iterations: 0,
                initial_cost,
                final_cost: initial_cost,
                converged: false,
                termination: Termination::NonFiniteCost,
            };
            return (x0, report);
        }

        let lm = MinpackLm::new()
            .with_ftol(opts.ftol)
            .with_xtol(opts.xtol)
            .with_gtol(opts.gtol)
            .with_patience(opts.max_iters.max(1));
        let adapter = LmAdapter {
            problem,
            params: x0,
        };
        let (adapter, report) = lm.minimize(adapter);

        let final_cost = report.objective_function;
        let termination = if final_cost.is_finite() {
            Termination::from(&report.termination)
        } else {
            Termination::NonFiniteCost
        };
        debug!(
            "LM finished after {} evaluations: cost {:.6e} -> {:.6e} ({:?})",
            report.number_of_evaluations, initial_cost, final_cost, report.termination
        );

        (
            adapter.params,
            SolveReport {
                iterations: report.number_of_evaluations,
                initial_cost,
                final_cost,
                converged: termination.was_successful(),
                termination,
            },
        )
    }
}
