//! Makes available common structures needed to run a time integration
//!
//! You may write `use nstime::prelude::*` in your code and obtain
//! access to commonly used functionality.

pub use crate::base::{AleExtrapolation, CorrectorScope, FixedDofs, IntegratorError, IntegratorResult};
pub use crate::base::{IntegratorState, Scheme, SchemeConfig};
pub use crate::fem::{AleVelocity, DirectSolver, LinearSolveService, MassOperator, OperatorOutput, SolverFailure};
pub use crate::fem::{StepStats, StiffnessOperator, SystemOperator, TimeIntegrator};
pub use crate::samples::{ConvectionDiffusion1d, CubicReaction, LumpedMass, Mass1d, Mesh1d};
