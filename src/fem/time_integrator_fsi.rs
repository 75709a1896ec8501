use super::time_integrator::{explicit_estimate, MassMode, StepKind};
use super::{AleVelocity, MassOperator, StiffnessOperator, TimeIntegrator};
use crate::base::{CorrectorScope, IntegratorError, IntegratorResult};
use russell_lab::Vector;

impl<'a, S, M> TimeIntegrator<'a, S, M>
where
    S: StiffnessOperator,
    M: MassOperator,
{
    /// Advances the solution by one IMEX step on a moving mesh (fluid-structure interaction)
    ///
    /// The mass operator is reassembled; the convection is evaluated explicitly with the mesh
    /// velocity `ale` at the estimate selected by [crate::base::AleExtrapolation], thus only
    /// one linear system is solved. The solution before the call is written to `solution_prev`.
    pub fn make_time_step_fsi(&mut self, dt: f64, ale: &AleVelocity, solution_prev: &mut Vector) -> IntegratorResult<()> {
        self.begin_fsi("make_time_step_fsi", dt, solution_prev, StepKind::Predictor)?;
        let result = match explicit_estimate(self.config, &self.data, dt) {
            Ok(estimate) => self.single_solve_step(dt, estimate, Some(ale), MassMode::Reassemble, false),
            Err(e) => Err(e),
        };
        self.end_step(result, dt, StepKind::Predictor)
    }

    /// Repeats the last FSI step with the stiffness evaluated at the current solution
    ///
    /// Requires a preceding [TimeIntegrator::make_time_step_fsi] (or corrector) in the same
    /// step, with the same `dt`. The system is solved again from the same base `uⁿ` with the
    /// updated mesh velocity; the mass is reused or reassembled according to
    /// [crate::base::CorrectorScope]. The solution before the call is written to `solution_prev`.
    ///
    /// A failed corrector may be repeated because the accepted predictor is kept.
    pub fn make_time_step_fsi2(&mut self, dt: f64, ale: &AleVelocity, solution_prev: &mut Vector) -> IntegratorResult<()> {
        if !self.data.fsi_predicted {
            return Err(IntegratorError::InvalidState {
                operation: "make_time_step_fsi2 (without a preceding make_time_step_fsi)",
                state: self.data.state,
            });
        }
        if dt != self.data.dt {
            return Err(IntegratorError::Configuration(format!(
                "dt = {:?} of the corrector must be equal to dt = {:?} of the predictor",
                dt, self.data.dt
            )));
        }
        self.begin_fsi("make_time_step_fsi2", dt, solution_prev, StepKind::Corrector)?;
        let mass_mode = match self.config.corrector_scope {
            CorrectorScope::Stiffness => MassMode::Reuse,
            CorrectorScope::StiffnessAndMass => MassMode::Reassemble,
        };
        let estimate = self.data.solution.clone();
        let result = self.single_solve_step(dt, estimate, Some(ale), mass_mode, true);
        self.end_step(result, dt, StepKind::Corrector)
    }

    /// Checks the preconditions of the FSI steps and saves the current solution
    fn begin_fsi(
        &mut self,
        operation: &'static str,
        dt: f64,
        solution_prev: &mut Vector,
        kind: StepKind,
    ) -> IntegratorResult<()> {
        let ndof = self.data.ndof();
        if solution_prev.dim() != ndof {
            return Err(IntegratorError::Dimension {
                expected: ndof,
                actual: solution_prev.dim(),
            });
        }
        self.begin_step(operation, dt, kind)?;
        solution_prev.as_mut_data().copy_from_slice(self.data.solution.as_data());
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
