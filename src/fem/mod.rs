//! Implements the time integrator and the contracts of its collaborators

mod checkpoint;
mod control_newton;
mod linear_solver;
mod operators;
mod step_data;
mod system_operator;
mod time_integrator;
mod time_integrator_fsi;
pub use crate::fem::checkpoint::*;
pub use crate::fem::control_newton::*;
pub use crate::fem::linear_solver::*;
pub use crate::fem::operators::*;
pub use crate::fem::step_data::*;
pub use crate::fem::system_operator::*;
pub use crate::fem::time_integrator::*;
