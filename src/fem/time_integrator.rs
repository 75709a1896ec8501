use super::system_operator::{add_mat_vec, combine_matrices};
use super::{CheckpointStore, NewtonControl, StepData, StepStats};
use super::{AleVelocity, DirectSolver, LinearSolveService, MassOperator, OperatorOutput, StiffnessOperator, SystemOperator};
use crate::base::{coo_check, coo_mat_vec, AleExtrapolation, FixedDofs, IntegratorError, IntegratorResult};
use crate::base::{IntegratorState, Scheme, SchemeConfig};
use crate::StrError;
use russell_lab::{vec_add, vec_norm, vec_scale, vec_update, Norm, Vector};
use russell_sparse::CooMatrix;
use std::mem;

/// Selects how the mass operator is used in a single-solve step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MassMode {
    /// Refreshes the right-hand side; the matrix is reassembled only on moving meshes
    Refresh,

    /// Reassembles the matrix and the right-hand side
    Reassemble,

    /// Reuses the matrix and right-hand side of the last step (no assembly)
    Reuse,
}

/// Selects how a successful step is committed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StepKind {
    /// Implicit step (linear or Newton)
    Implicit,

    /// Single-pass FSI step (a corrector may follow)
    Predictor,

    /// FSI corrector replacing the result of the previous pass from the same base
    Corrector,
}

/// Holds the buffers computed by a successful step before they are committed
pub(crate) struct StepUpdate {
    pub(crate) solution: Vector,
    pub(crate) system: SystemOperator,
    pub(crate) mass_matrix: CooMatrix,
    pub(crate) mass_rhs: Vector,
    pub(crate) history: Option<Vector>,

    /// Stiffness matrix of the last assembly within the step
    pub(crate) stiffness_matrix: Option<CooMatrix>,

    /// Stiffness output evaluated at `solution` (None if θ = 1)
    pub(crate) stiffness_at_solution: Option<OperatorOutput>,

    /// Mesh velocity of the step (None for implicit steps)
    pub(crate) ale: Option<AleVelocity>,
}

/// Implements the θ-method time integrator with Newton iterations and IMEX steps on moving meshes
///
/// The integrator borrows the stiffness and mass operators, owns the linear solver, the solution
/// vectors, the combined system and a single-slot checkpoint. A step either fully completes
/// (state `Converged`) or fully fails (state `Failed`, nothing else modified).
///
/// # Example
///
/// ```
/// use nstime::prelude::*;
/// use russell_lab::Vector;
/// use std::error::Error;
///
/// fn main() -> Result<(), Box<dyn Error>> {
///     // operators of the heat equation on (0,1) with u(0) = u(1) = 0
///     let mesh = Mesh1d::uniform(0.0, 1.0, 10)?;
///     let mut stiffness = ConvectionDiffusion1d::new(&mesh, 1.0, 0.0);
///     let mut mass = Mass1d::new(&mesh, 1.0, false);
///
///     // configuration: backward Euler
///     let mut config = SchemeConfig::new();
///     config.set_theta(1.0).set_dt(0.01);
///
///     // integrator
///     let fixed_dofs = FixedDofs::from_components(&[&[0.0, 0.0]]);
///     let mut integrator = TimeIntegrator::new(&config, &mut stiffness, &mut mass, fixed_dofs)?;
///     integrator.initialize()?;
///
///     // initial condition and one step
///     let u0 = Vector::from(&vec![1.0; 9]);
///     integrator.set_solution_vector(&u0)?;
///     integrator.make_time_step(0.01)?;
///     assert_eq!(integrator.state(), IntegratorState::Converged);
///     assert!(integrator.solution_vector()[4] < 1.0);
///     Ok(())
/// }
/// ```
pub struct TimeIntegrator<'a, S, M>
where
    S: StiffnessOperator,
    M: MassOperator,
{
    /// Holds the configuration parameters
    pub(crate) config: &'a SchemeConfig,

    /// Holds the spatial operator
    pub(crate) stiffness: &'a mut S,

    /// Holds the mass operator
    pub(crate) mass: &'a mut M,

    /// Holds the linear solve service
    pub(crate) solver: Box<dyn LinearSolveService + 'a>,

    /// Holds all mutable buffers (the checkpointed data)
    pub(crate) data: StepData,

    /// Holds the single-slot checkpoint
    checkpoint: CheckpointStore,

    /// Holds the Newton statistics of the last step
    pub(crate) stats: StepStats,

    /// Total number of linear solves of all steps
    n_iterations_total: usize,

    /// Total number of converged steps
    n_converged_total: usize,
}

impl<'a, S, M> TimeIntegrator<'a, S, M>
where
    S: StiffnessOperator,
    M: MassOperator,
{
    /// Allocates a new instance using the default direct solver
    pub fn new(config: &'a SchemeConfig, stiffness: &'a mut S, mass: &'a mut M, fixed_dofs: FixedDofs) -> IntegratorResult<Self> {
        TimeIntegrator::new_with_solver(config, stiffness, mass, fixed_dofs, Box::new(DirectSolver::default()))
    }

    /// Allocates a new instance with a given linear solve service
    pub fn new_with_solver(
        config: &'a SchemeConfig,
        stiffness: &'a mut S,
        mass: &'a mut M,
        fixed_dofs: FixedDofs,
        solver: Box<dyn LinearSolveService + 'a>,
    ) -> IntegratorResult<Self> {
        if let Some(msg) = config.validate() {
            return Err(IntegratorError::Configuration(msg));
        }
        let ndof = stiffness.num_dofs();
        Ok(TimeIntegrator {
            config,
            stiffness,
            mass,
            solver,
            data: StepData::new(ndof, fixed_dofs, config.dt),
            checkpoint: CheckpointStore::new(),
            stats: StepStats::default(),
            n_iterations_total: 0,
            n_converged_total: 0,
        })
    }

    /// Allocates the buffers and assembles the mass operator
    ///
    /// May be called again to reset the integrator (the checkpoint is kept).
    pub fn initialize(&mut self) -> IntegratorResult<()> {
        let ndof = self.check_num_dofs()?;
        let mut data = StepData::new(ndof, self.data.fixed_dofs.clone(), self.config.dt);
        let (mm, bm) = mass_output(&mut *self.mass, &data.solution, &data.fixed_dofs, None, true)?;
        data.mass_matrix = Some(mm);
        data.mass_rhs_old = bm.clone();
        data.mass_rhs = bm;
        data.state = IntegratorState::Initialized;
        self.data = data;
        self.stats = StepStats::default();
        NewtonControl::new(self.config).print_header();
        Ok(())
    }

    /// Sets the current solution (e.g., the initial condition)
    ///
    /// The previous solution is also set to `solution`; thus the history of the previous
    /// steps is discarded. Leaves the `Failed` state.
    pub fn set_solution_vector(&mut self, solution: &Vector) -> IntegratorResult<()> {
        match self.data.state {
            IntegratorState::Initialized | IntegratorState::Converged | IntegratorState::Failed => (),
            state => {
                return Err(IntegratorError::InvalidState {
                    operation: "set_solution_vector",
                    state,
                })
            }
        }
        let ndof = self.check_num_dofs()?;
        if solution.dim() != ndof {
            return Err(IntegratorError::Dimension {
                expected: ndof,
                actual: solution.dim(),
            });
        }
        let data = &mut self.data;
        data.solution = solution.clone();
        data.solution_old = solution.clone();
        data.mass_rhs_old = data.mass_rhs.clone();
        data.invalidate_solution_caches();
        if data.state == IntegratorState::Failed {
            data.state = IntegratorState::Converged;
        }
        Ok(())
    }

    /// Replaces the prescribed values of the fixed DOFs (the layout must not change)
    pub fn set_fixed_dofs(&mut self, fixed_dofs: &FixedDofs) -> IntegratorResult<()> {
        self.data
            .fixed_dofs
            .refresh(fixed_dofs)
            .map_err(|e| IntegratorError::Configuration(e.to_string()))
    }

    /// Returns an access to the prescribed values of the fixed DOFs for in-place updates
    pub fn fixed_dofs_mut(&mut self) -> &mut FixedDofs {
        &mut self.data.fixed_dofs
    }

    /// Returns the prescribed values of the fixed DOFs
    pub fn fixed_dofs(&self) -> &FixedDofs {
        &self.data.fixed_dofs
    }

    /// Advances the solution by one time step
    ///
    /// Runs one linear solve (ImplicitLinear), Newton iterations (ImplicitNonlinear), or the
    /// linear θ-step with the mass reassembled and the stiffness evaluated at the explicit
    /// estimate (ImexAle).
    ///
    /// A failed step leaves every buffer untouched; thus the step may be repeated from the
    /// `Failed` state (e.g., with a smaller `dt`).
    pub fn make_time_step(&mut self, dt: f64) -> IntegratorResult<()> {
        self.begin_step("make_time_step", dt, StepKind::Implicit)?;
        let result = match self.config.scheme {
            Scheme::ImplicitLinear => {
                let estimate = self.data.solution.clone();
                self.single_solve_step(dt, estimate, None, MassMode::Refresh, false)
            }
            Scheme::ImplicitNonlinear => self.newton_step(dt),
            Scheme::ImexAle => match explicit_estimate(self.config, &self.data, dt) {
                Ok(estimate) => self.single_solve_step(dt, estimate, None, MassMode::Reassemble, false),
                Err(e) => Err(e),
            },
        };
        self.end_step(result, dt, StepKind::Implicit)
    }

    /// Assembles the combined system at a given state without changing the solution
    ///
    /// The base of the time derivative is [TimeIntegrator::solution_vector_old]. The linear and
    /// IMEX schemes produce the solution form `A·u = b`; the nonlinear scheme produces the
    /// correction form `J·δu = -R(u)`. If `assemble_matrix` is false, the operators only
    /// compute their right-hand sides, the previous combined matrix is kept, and the cached
    /// mass and stiffness matrices are used in the matrix-vector products.
    pub fn assemble(&mut self, state: &Vector, fixed_dofs: &FixedDofs, assemble_matrix: bool) -> IntegratorResult<()> {
        match self.data.state {
            IntegratorState::Initialized | IntegratorState::Converged | IntegratorState::Failed => (),
            state => {
                return Err(IntegratorError::InvalidState {
                    operation: "assemble",
                    state,
                })
            }
        }
        let ndof = self.data.ndof();
        if state.dim() != ndof {
            return Err(IntegratorError::Dimension {
                expected: ndof,
                actual: state.dim(),
            });
        }
        if !fixed_dofs.same_layout(&self.data.fixed_dofs) {
            return Err(IntegratorError::Configuration(
                "the layout of the fixed DOFs must not change".to_string(),
            ));
        }
        if !assemble_matrix && self.data.system.matrix.is_none() {
            return Err(IntegratorError::Assembly(
                "the combined matrix must be assembled before it can be reused",
            ));
        }

        // history term at the base of the last step
        let theta = self.config.theta;
        let dt = self.data.dt;
        let data = &mut self.data;
        if theta < 1.0 && data.history.is_none() {
            data.history = history_term(
                theta,
                &mut *self.stiffness,
                None,
                &data.solution_old,
                &data.fixed_dofs,
                data.ale_velocity.as_ref(),
            )?;
        }

        // operators
        let reassemble_mass = assemble_matrix && self.mass.moving_mesh();
        let (mm, bm) = mass_output(&mut *self.mass, state, fixed_dofs, data.mass_matrix.as_ref(), reassemble_mass)?;
        let kf = self
            .stiffness
            .assemble(state, fixed_dofs, assemble_matrix)
            .map_err(IntegratorError::Assembly)?;
        check_rhs(&kf.rhs, ndof)?;
        let kk = if assemble_matrix {
            let kk = kf.matrix().map_err(IntegratorError::Assembly)?;
            coo_check(kk, ndof).map_err(IntegratorError::Assembly)?;
            kk
        } else {
            data.stiffness_matrix
                .as_ref()
                .ok_or(IntegratorError::Assembly("the stiffness matrix has not been assembled yet"))?
        };

        // combined system
        let base = Base {
            solution: &data.solution_old,
            mass_rhs: &data.mass_rhs_old,
            history: data.history.as_ref(),
        };
        let (matrix, rhs) = match self.config.scheme {
            Scheme::ImplicitNonlinear => {
                let mut rhs = newton_residual(theta, dt, &mm, kk, &kf.rhs, state, &bm, &base)?;
                vec_scale(&mut rhs, -1.0);
                let matrix = if assemble_matrix {
                    let tangent = self
                        .stiffness
                        .assemble_tangent(state, fixed_dofs)
                        .map_err(IntegratorError::Assembly)?;
                    let tt = tangent.as_ref().unwrap_or(kk);
                    Some(combine_matrices(ndof, &mm, 1.0 / dt, tt, theta).map_err(IntegratorError::Assembly)?)
                } else {
                    None
                };
                (matrix, rhs)
            }
            Scheme::ImplicitLinear | Scheme::ImexAle => {
                let rhs = linear_rhs(theta, dt, &mm, &kf.rhs, &bm, &base)?;
                let matrix = if assemble_matrix {
                    Some(combine_matrices(ndof, &mm, 1.0 / dt, kk, theta).map_err(IntegratorError::Assembly)?)
                } else {
                    None
                };
                (matrix, rhs)
            }
        };

        // commit
        if let Some(matrix) = matrix {
            data.system.matrix = Some(matrix);
        }
        data.system.rhs = rhs;
        if assemble_matrix {
            data.stiffness_matrix = kf.matrix;
            if reassemble_mass {
                data.mass_matrix = Some(mm);
            }
        }
        Ok(())
    }

    /// Saves a deep copy of all the buffers, replacing the previous checkpoint
    pub fn save_state(&mut self) -> IntegratorResult<()> {
        if self.data.state == IntegratorState::Uninitialized {
            return Err(IntegratorError::InvalidState {
                operation: "save_state",
                state: self.data.state,
            });
        }
        self.checkpoint.save(&self.data);
        Ok(())
    }

    /// Restores the buffers from the checkpoint, which is consumed
    pub fn recover_state(&mut self) -> IntegratorResult<()> {
        let checkpoint = self.checkpoint.take().ok_or(IntegratorError::NoCheckpoint)?;
        self.data = checkpoint.into_data();
        Ok(())
    }

    /// Returns true if a checkpoint is available
    pub fn has_checkpoint(&self) -> bool {
        !self.checkpoint.is_empty()
    }

    /// Returns the current solution
    pub fn solution_vector(&self) -> &Vector {
        &self.data.solution
    }

    /// Returns the solution at the beginning of the last step
    pub fn solution_vector_old(&self) -> &Vector {
        &self.data.solution_old
    }

    /// Returns the combined system of the last assembly
    pub fn system(&self) -> &SystemOperator {
        &self.data.system
    }

    /// Returns the lifecycle state
    pub fn state(&self) -> IntegratorState {
        self.data.state
    }

    /// Returns the number of (free) DOFs
    pub fn num_dofs(&self) -> usize {
        self.data.ndof()
    }

    /// Returns the current time
    pub fn time(&self) -> f64 {
        self.data.time
    }

    /// Returns the time increment of the last step
    pub fn dt(&self) -> f64 {
        self.data.dt
    }

    /// Returns the time increment of the step before the last one
    pub fn dt_old(&self) -> f64 {
        self.data.dt_old
    }

    /// Returns the number of accepted steps
    pub fn n_steps(&self) -> usize {
        self.data.n_steps
    }

    /// Returns the Newton statistics of the last step (successful or not)
    pub fn last_step_stats(&self) -> &StepStats {
        &self.stats
    }

    /// Returns the total number of linear solves and the total number of converged steps
    pub fn totals(&self) -> (usize, usize) {
        (self.n_iterations_total, self.n_converged_total)
    }

    /// Returns an access to the stiffness operator (e.g., to update its parameters)
    pub fn stiffness_mut(&mut self) -> &mut S {
        &mut *self.stiffness
    }

    /// Returns an access to the mass operator (e.g., to move the mesh)
    pub fn mass_mut(&mut self) -> &mut M {
        &mut *self.mass
    }

    /// Checks that both operators have the same number of DOFs
    fn check_num_dofs(&self) -> IntegratorResult<usize> {
        let ndof = self.stiffness.num_dofs();
        let ndof_mass = self.mass.num_dofs();
        if ndof_mass != ndof {
            return Err(IntegratorError::Configuration(format!(
                "the stiffness operator has {} DOFs but the mass operator has {}",
                ndof, ndof_mass
            )));
        }
        if ndof != self.data.ndof() {
            return Err(IntegratorError::Configuration(format!(
                "the operators have {} DOFs but the integrator was initialized with {}",
                ndof,
                self.data.ndof()
            )));
        }
        Ok(ndof)
    }

    /// Checks the preconditions of a step and sets the Stepping state
    pub(crate) fn begin_step(&mut self, operation: &'static str, dt: f64, kind: StepKind) -> IntegratorResult<()> {
        if !self.data.state.can_step() {
            return Err(IntegratorError::InvalidState {
                operation,
                state: self.data.state,
            });
        }
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(IntegratorError::Configuration(format!(
                "dt = {:?} is incorrect; it must be > 0.0",
                dt
            )));
        }
        self.data.state = IntegratorState::Stepping;
        let time = if kind == StepKind::Corrector {
            self.data.time_old + dt
        } else {
            self.data.time + dt
        };
        NewtonControl::new(self.config).print_timestep(self.data.n_steps, time, dt);
        Ok(())
    }

    /// Commits a successful step or sets the Failed state
    pub(crate) fn end_step(&mut self, result: IntegratorResult<StepUpdate>, dt: f64, kind: StepKind) -> IntegratorResult<()> {
        self.n_iterations_total += self.stats.n_iterations;
        let update = match result {
            Ok(update) => update,
            Err(e) => {
                // a corrector refers to the last attempted predictor
                if kind != StepKind::Corrector {
                    self.data.fsi_predicted = false;
                }
                self.data.state = IntegratorState::Failed;
                return Err(e);
            }
        };
        self.n_converged_total += 1;
        let data = &mut self.data;
        if kind == StepKind::Corrector {
            data.solution = update.solution;
            data.mass_rhs = update.mass_rhs;
            data.time = data.time_old + dt;
        } else {
            data.solution_old = mem::replace(&mut data.solution, update.solution);
            data.mass_rhs_old = mem::replace(&mut data.mass_rhs, update.mass_rhs);
            data.history = update.history;
            data.dt_old = if data.n_steps == 0 { dt } else { data.dt };
            data.time_old = data.time;
            data.time += dt;
            data.n_steps += 1;
        }
        data.dt = dt;
        data.system = update.system;
        data.mass_matrix = Some(update.mass_matrix);
        data.stiffness_matrix = update.stiffness_matrix;
        data.stiffness_at_solution = update.stiffness_at_solution;
        data.ale_velocity = update.ale;
        data.fsi_predicted = kind != StepKind::Implicit;
        data.state = IntegratorState::Converged;
        Ok(())
    }

    /// Performs a step with one linear solve and the stiffness evaluated at an explicit estimate
    ///
    /// With `corrector`, the step restarts from the base of the last step instead of the current solution.
    pub(crate) fn single_solve_step(
        &mut self,
        dt: f64,
        estimate: Vector,
        ale: Option<&AleVelocity>,
        mass_mode: MassMode,
        corrector: bool,
    ) -> IntegratorResult<StepUpdate> {
        self.stats = StepStats::default();
        let theta = self.config.theta;
        let moving = self.mass.moving_mesh();
        let data = &self.data;
        let ndof = data.ndof();
        let fixed_dofs = &data.fixed_dofs;

        // base of the time derivative
        let (base_solution, base_mass_rhs) = if corrector {
            (&data.solution_old, &data.mass_rhs_old)
        } else {
            (&data.solution, &data.mass_rhs)
        };
        let history = if corrector {
            match &data.history {
                Some(h) => Some(h.clone()),
                None => history_term(theta, &mut *self.stiffness, None, base_solution, fixed_dofs, None)?,
            }
        } else {
            history_term(
                theta,
                &mut *self.stiffness,
                data.stiffness_at_solution.as_ref(),
                base_solution,
                fixed_dofs,
                data.ale_velocity.as_ref(),
            )?
        };

        // mass
        let (mm, bm) = match mass_mode {
            MassMode::Refresh => mass_output(&mut *self.mass, &estimate, fixed_dofs, data.mass_matrix.as_ref(), moving)?,
            MassMode::Reassemble => mass_output(&mut *self.mass, &estimate, fixed_dofs, None, true)?,
            MassMode::Reuse => match &data.mass_matrix {
                Some(mm) => (mm.clone(), data.mass_rhs.clone()),
                None => mass_output(&mut *self.mass, &estimate, fixed_dofs, None, true)?,
            },
        };

        // stiffness at the estimate
        let kf = match ale {
            Some(ale) => self.stiffness.assemble_ale(&estimate, fixed_dofs, ale, true),
            None => self.stiffness.assemble(&estimate, fixed_dofs, true),
        }
        .map_err(IntegratorError::Assembly)?;
        let kk = kf.matrix().map_err(IntegratorError::Assembly)?;
        coo_check(kk, ndof).map_err(IntegratorError::Assembly)?;
        check_rhs(&kf.rhs, ndof)?;

        // system
        let base = Base {
            solution: base_solution,
            mass_rhs: base_mass_rhs,
            history: history.as_ref(),
        };
        let matrix = combine_matrices(ndof, &mm, 1.0 / dt, kk, theta).map_err(IntegratorError::Assembly)?;
        let rhs = linear_rhs(theta, dt, &mm, &kf.rhs, &bm, &base)?;

        // solve
        let solution = self.solver.solve(&matrix, &rhs)?;

        // stiffness at the new solution for the history term of the next step
        let stiffness_at_solution = if theta < 1.0 {
            let output = match ale {
                Some(ale) => self.stiffness.assemble_ale(&solution, fixed_dofs, ale, true),
                None => self.stiffness.assemble(&solution, fixed_dofs, true),
            }
            .map_err(IntegratorError::Assembly)?;
            Some(output)
        } else {
            None
        };
        self.stats = StepStats {
            n_iterations: 1,
            norm_rr: Vec::new(),
            converged: true,
        };
        Ok(StepUpdate {
            solution,
            system: SystemOperator {
                matrix: Some(matrix),
                rhs,
            },
            mass_matrix: mm,
            mass_rhs: bm,
            history,
            stiffness_matrix: kf.matrix,
            stiffness_at_solution,
            ale: ale.cloned(),
        })
    }

    /// Performs the Newton iterations of the nonlinear θ-step
    fn newton_step(&mut self, dt: f64) -> IntegratorResult<StepUpdate> {
        self.stats = StepStats::default();
        let config = self.config;
        let theta = config.theta;
        let moving = self.mass.moving_mesh();
        let data = &self.data;
        let ndof = data.ndof();
        let fixed_dofs = &data.fixed_dofs;

        // base of the time derivative
        let history = history_term(
            theta,
            &mut *self.stiffness,
            data.stiffness_at_solution.as_ref(),
            &data.solution,
            fixed_dofs,
            data.ale_velocity.as_ref(),
        )?;
        let base = Base {
            solution: &data.solution,
            mass_rhs: &data.mass_rhs,
            history: history.as_ref(),
        };

        // mass (constant within the step)
        let (mm, bm) = mass_output(&mut *self.mass, &data.solution, fixed_dofs, data.mass_matrix.as_ref(), moving)?;

        // iterations
        let mut control = NewtonControl::new(config);
        let mut u = data.solution.clone();
        for iteration in 0..=config.n_max_iterations {
            // stiffness and tangent at the current guess
            let kf = self
                .stiffness
                .assemble(&u, fixed_dofs, true)
                .map_err(IntegratorError::Assembly)?;
            let kk = kf.matrix().map_err(IntegratorError::Assembly)?;
            coo_check(kk, ndof).map_err(IntegratorError::Assembly)?;
            check_rhs(&kf.rhs, ndof)?;
            let tangent = self
                .stiffness
                .assemble_tangent(&u, fixed_dofs)
                .map_err(IntegratorError::Assembly)?;
            let tt = tangent.as_ref().unwrap_or(kk);

            // residual and Jacobian
            let mut mrr = newton_residual(theta, dt, &mm, kk, &kf.rhs, &u, &bm, &base)?;
            control.analyze(iteration, vec_norm(&mrr, Norm::Euc));
            control.print_iteration();
            self.stats = control.stats().clone();
            vec_scale(&mut mrr, -1.0);
            let jj = combine_matrices(ndof, &mm, 1.0 / dt, tt, theta).map_err(IntegratorError::Assembly)?;

            // check
            if control.converged() {
                return Ok(StepUpdate {
                    solution: u,
                    system: SystemOperator {
                        matrix: Some(jj),
                        rhs: mrr,
                    },
                    mass_matrix: mm,
                    mass_rhs: bm,
                    history,
                    stiffness_matrix: kf.matrix.clone(),
                    stiffness_at_solution: Some(kf),
                    ale: None,
                });
            }
            if control.diverging() || iteration == config.n_max_iterations {
                return Err(IntegratorError::NonlinearDivergence {
                    iterations: iteration,
                    residual: control.relative_residual(),
                });
            }

            // update
            let mdu = self.solver.solve(&jj, &mrr)?;
            vec_update(&mut u, 1.0, &mdu).map_err(IntegratorError::Assembly)?;
        }
        Err(IntegratorError::NonlinearDivergence {
            iterations: config.n_max_iterations,
            residual: control.relative_residual(),
        })
    }
}

/// Holds the quantities at the base of the time derivative
pub(crate) struct Base<'b> {
    /// Solution `uⁿ`
    pub(crate) solution: &'b Vector,

    /// Mass right-hand side `b_Mⁿ`
    pub(crate) mass_rhs: &'b Vector,

    /// History term `Kⁿ·uⁿ - Fⁿ` (not needed if θ = 1)
    pub(crate) history: Option<&'b Vector>,
}

/// Computes the explicit estimate `u*` used by the IMEX steps
///
/// Returns `uⁿ` or the linear extrapolation `uⁿ + (Δt/Δtⁿ)(uⁿ - uⁿ⁻¹)`; the extrapolation
/// needs at least one previous step.
pub(crate) fn explicit_estimate(config: &SchemeConfig, data: &StepData, dt: f64) -> IntegratorResult<Vector> {
    let mut estimate = data.solution.clone();
    if config.ale_extrapolation == AleExtrapolation::Linear && data.n_steps > 0 && data.dt > 0.0 {
        let r = dt / data.dt;
        vec_add(&mut estimate, 1.0 + r, &data.solution, -r, &data.solution_old).map_err(IntegratorError::Assembly)?;
    }
    Ok(estimate)
}

/// Computes the history term `Kⁿ·uⁿ - Fⁿ` or returns None if θ = 1
///
/// Uses the cached stiffness output if available (it must have been evaluated at `base`);
/// otherwise assembles the operator at `base` with the mesh velocity of the step that
/// produced `base`.
fn history_term<S: StiffnessOperator>(
    theta: f64,
    stiffness: &mut S,
    cached: Option<&OperatorOutput>,
    base: &Vector,
    fixed_dofs: &FixedDofs,
    ale: Option<&AleVelocity>,
) -> IntegratorResult<Option<Vector>> {
    if theta == 1.0 {
        return Ok(None);
    }
    let fresh;
    let output = match cached {
        Some(output) if output.matrix.is_some() => output,
        _ => {
            fresh = match ale {
                Some(ale) => stiffness.assemble_ale(base, fixed_dofs, ale, true),
                None => stiffness.assemble(base, fixed_dofs, true),
            }
            .map_err(IntegratorError::Assembly)?;
            &fresh
        }
    };
    let ndof = base.dim();
    let kk = output.matrix().map_err(IntegratorError::Assembly)?;
    coo_check(kk, ndof).map_err(IntegratorError::Assembly)?;
    check_rhs(&output.rhs, ndof)?;
    let mut history = Vector::new(ndof);
    coo_mat_vec(&mut history, 1.0, kk, base).map_err(IntegratorError::Assembly)?;
    vec_update(&mut history, -1.0, &output.rhs).map_err(IntegratorError::Assembly)?;
    Ok(Some(history))
}

/// Assembles the mass operator and returns `(M, b_M)`
///
/// The cached matrix is reused unless `reassemble` is true or there is no cached matrix.
fn mass_output<M: MassOperator>(
    mass: &mut M,
    state: &Vector,
    fixed_dofs: &FixedDofs,
    cached: Option<&CooMatrix>,
    reassemble: bool,
) -> IntegratorResult<(CooMatrix, Vector)> {
    let ndof = state.dim();
    let compute_matrix = reassemble || cached.is_none();
    let OperatorOutput { matrix, rhs } = mass
        .assemble(state, fixed_dofs, compute_matrix)
        .map_err(IntegratorError::Assembly)?;
    check_rhs(&rhs, ndof)?;
    let mm = match (compute_matrix, matrix, cached) {
        (true, Some(mm), _) => mm,
        (false, _, Some(mm)) => mm.clone(),
        _ => return Err(IntegratorError::Assembly("the operator matrix has not been assembled")),
    };
    coo_check(&mm, ndof).map_err(IntegratorError::Assembly)?;
    Ok((mm, rhs))
}

/// Checks the dimension of an operator right-hand side
fn check_rhs(rhs: &Vector, ndof: usize) -> IntegratorResult<()> {
    if rhs.dim() != ndof {
        return Err(IntegratorError::Assembly(
            "the operator right-hand side must have dimension equal to the number of DOFs",
        ));
    }
    Ok(())
}

/// Computes the right-hand side of the linear θ-step
///
/// ```text
/// b = M·uⁿ/Δt + θ·Fⁿ⁺¹ - (1-θ)·(Kⁿ·uⁿ - Fⁿ) + (b_Mⁿ⁺¹ - b_Mⁿ)/Δt
/// ```
pub(crate) fn linear_rhs(
    theta: f64,
    dt: f64,
    mm: &CooMatrix,
    ff: &Vector,
    bm: &Vector,
    base: &Base,
) -> IntegratorResult<Vector> {
    calc_linear_rhs(theta, dt, mm, ff, bm, base).map_err(IntegratorError::Assembly)
}

fn calc_linear_rhs(theta: f64, dt: f64, mm: &CooMatrix, ff: &Vector, bm: &Vector, base: &Base) -> Result<Vector, StrError> {
    let mut b = Vector::new(ff.dim());
    add_mat_vec(&mut b, 1.0 / dt, mm, base.solution)?;
    vec_update(&mut b, theta, ff)?;
    vec_update(&mut b, 1.0 / dt, bm)?;
    vec_update(&mut b, -1.0 / dt, base.mass_rhs)?;
    if theta < 1.0 {
        let history = base.history.ok_or("the history term is required if θ < 1")?;
        vec_update(&mut b, -(1.0 - theta), history)?;
    }
    Ok(b)
}

/// Computes the residual of the nonlinear θ-step
///
/// ```text
/// R(u) = M·(u - uⁿ)/Δt + θ·(K(u)·u - F(u)) + (1-θ)·(Kⁿ·uⁿ - Fⁿ) - (b_Mⁿ⁺¹ - b_Mⁿ)/Δt
/// ```
pub(crate) fn newton_residual(
    theta: f64,
    dt: f64,
    mm: &CooMatrix,
    kk: &CooMatrix,
    ff: &Vector,
    u: &Vector,
    bm: &Vector,
    base: &Base,
) -> IntegratorResult<Vector> {
    calc_newton_residual(theta, dt, mm, kk, ff, u, bm, base).map_err(IntegratorError::Assembly)
}

fn calc_newton_residual(
    theta: f64,
    dt: f64,
    mm: &CooMatrix,
    kk: &CooMatrix,
    ff: &Vector,
    u: &Vector,
    bm: &Vector,
    base: &Base,
) -> Result<Vector, StrError> {
    let ndof = u.dim();
    let mut du = Vector::new(ndof);
    vec_add(&mut du, 1.0, u, -1.0, base.solution)?;
    let mut rr = Vector::new(ndof);
    add_mat_vec(&mut rr, 1.0 / dt, mm, &du)?;
    add_mat_vec(&mut rr, theta, kk, u)?;
    vec_update(&mut rr, -theta, ff)?;
    if theta < 1.0 {
        let history = base.history.ok_or("the history term is required if θ < 1")?;
        vec_update(&mut rr, 1.0 - theta, history)?;
    }
    vec_update(&mut rr, -1.0 / dt, bm)?;
    vec_update(&mut rr, 1.0 / dt, base.mass_rhs)?;
    Ok(rr)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{explicit_estimate, linear_rhs, newton_residual, Base, TimeIntegrator};
    use crate::base::{AleExtrapolation, FixedDofs, IntegratorError, IntegratorState, Scheme, SchemeConfig};
    use crate::fem::StepData;
    use crate::samples::{ConvectionDiffusion1d, CubicReaction, LumpedMass, Mass1d, Mesh1d};
    use russell_lab::{approx_eq, Vector};
    use russell_sparse::{CooMatrix, Sym};

    fn scalar(value: f64) -> CooMatrix {
        let mut a = CooMatrix::new(1, 1, 1, Sym::No).unwrap();
        a.put(0, 0, value).unwrap();
        a
    }

    #[test]
    fn linear_rhs_works() {
        let mm = scalar(2.0);
        let ff = Vector::from(&[3.0]);
        let bm = Vector::from(&[1.0]);
        let solution = Vector::from(&[4.0]);
        let mass_rhs = Vector::from(&[0.5]);
        let history = Vector::from(&[5.0]);
        let base = Base {
            solution: &solution,
            mass_rhs: &mass_rhs,
            history: Some(&history),
        };
        // 2·4/0.1 + 0.5·3 + 1/0.1 - 0.5/0.1 - 0.5·5
        let b = linear_rhs(0.5, 0.1, &mm, &ff, &bm, &base).unwrap();
        approx_eq(b[0], 84.0, 1e-13);

        // θ = 1 does not need the history
        let base = Base {
            solution: &solution,
            mass_rhs: &mass_rhs,
            history: None,
        };
        let b = linear_rhs(1.0, 0.1, &mm, &ff, &bm, &base).unwrap();
        approx_eq(b[0], 88.0, 1e-13);
        assert_eq!(
            linear_rhs(0.5, 0.1, &mm, &ff, &bm, &base).err(),
            Some(IntegratorError::Assembly("the history term is required if θ < 1"))
        );
    }

    #[test]
    fn newton_residual_works() {
        let mm = scalar(2.0);
        let kk = scalar(3.0);
        let ff = Vector::from(&[3.0]);
        let bm = Vector::from(&[1.0]);
        let u = Vector::from(&[4.5]);
        let solution = Vector::from(&[4.0]);
        let mass_rhs = Vector::from(&[0.5]);
        let history = Vector::from(&[5.0]);
        let base = Base {
            solution: &solution,
            mass_rhs: &mass_rhs,
            history: Some(&history),
        };
        // 2·0.5/0.1 + 0.5·(3·4.5 - 3) + 0.5·5 - 1/0.1 + 0.5/0.1
        let rr = newton_residual(0.5, 0.1, &mm, &kk, &ff, &u, &bm, &base).unwrap();
        approx_eq(rr[0], 12.75, 1e-13);
    }

    #[test]
    fn explicit_estimate_works() {
        let mut config = SchemeConfig::new();
        let mut data = StepData::new(1, FixedDofs::new(&[]), 0.1);
        data.solution = Vector::from(&[2.0]);
        data.solution_old = Vector::from(&[1.0]);

        // no previous step
        config.set_ale_extrapolation(AleExtrapolation::Linear);
        assert_eq!(explicit_estimate(&config, &data, 0.05).unwrap().as_data(), &[2.0]);

        // linear extrapolation with the ratio of time increments
        data.n_steps = 1;
        approx_eq(explicit_estimate(&config, &data, 0.05).unwrap()[0], 2.5, 1e-15);
        approx_eq(explicit_estimate(&config, &data, 0.2).unwrap()[0], 4.0, 1e-15);

        // previous solution
        config.set_ale_extrapolation(AleExtrapolation::Previous);
        assert_eq!(explicit_estimate(&config, &data, 0.05).unwrap().as_data(), &[2.0]);
    }

    #[test]
    fn initialize_and_set_solution_work() {
        let config = SchemeConfig::new();
        let mut stiffness = CubicReaction::new(1.0, &[0.0, 0.0]);
        let mut mass = LumpedMass::new(2, 1.0);
        let mut integrator = TimeIntegrator::new(&config, &mut stiffness, &mut mass, FixedDofs::new(&[])).unwrap();
        assert_eq!(integrator.state(), IntegratorState::Uninitialized);
        assert_eq!(integrator.dt(), config.dt);
        integrator.initialize().unwrap();
        assert_eq!(integrator.state(), IntegratorState::Initialized);
        assert!(integrator.system().matrix().is_none());
        assert_eq!(integrator.num_dofs(), 2);

        // the previous solution is also set
        let u = Vector::from(&[1.0, 2.0]);
        integrator.set_solution_vector(&u).unwrap();
        assert_eq!(integrator.solution_vector().as_data(), &[1.0, 2.0]);
        assert_eq!(integrator.solution_vector_old().as_data(), &[1.0, 2.0]);
        assert_eq!(integrator.state(), IntegratorState::Initialized);

        // a step updates the time and the increments
        integrator.make_time_step(0.1).unwrap();
        integrator.make_time_step(0.2).unwrap();
        approx_eq(integrator.time(), 0.3, 1e-15);
        assert_eq!(integrator.dt(), 0.2);
        assert_eq!(integrator.dt_old(), 0.1);
        assert_eq!(integrator.n_steps(), 2);

        // initialize again resets everything
        integrator.initialize().unwrap();
        assert_eq!(integrator.time(), 0.0);
        assert_eq!(integrator.n_steps(), 0);
        assert_eq!(integrator.solution_vector().as_data(), &[0.0, 0.0]);
    }

    #[test]
    fn set_fixed_dofs_captures_errors() {
        let mesh = Mesh1d::uniform(0.0, 1.0, 4).unwrap();
        let mut stiffness = ConvectionDiffusion1d::new(&mesh, 1.0, 0.0);
        let mut mass = Mass1d::new(&mesh, 1.0, false);
        let mut config = SchemeConfig::new();
        config.set_scheme(Scheme::ImplicitLinear).set_theta(1.0);
        let fixed = FixedDofs::from_components(&[&[0.0, 0.0]]);
        let mut integrator = TimeIntegrator::new(&config, &mut stiffness, &mut mass, fixed).unwrap();
        integrator.initialize().unwrap();
        assert_eq!(
            integrator.set_fixed_dofs(&FixedDofs::from_components(&[&[1.0]])).err(),
            Some(IntegratorError::Configuration(
                "cannot refresh fixed DOFs with a different layout".to_string()
            ))
        );
        integrator
            .set_fixed_dofs(&FixedDofs::from_components(&[&[1.0, 1.0]]))
            .unwrap();
        assert_eq!(integrator.fixed_dofs().value(0, 1), Ok(1.0));

        // the steady state with u = 1 on both sides is u = 1
        for _ in 0..50 {
            integrator.make_time_step(1.0).unwrap();
        }
        for i in 0..3 {
            approx_eq(integrator.solution_vector()[i], 1.0, 1e-10);
        }
    }
}
