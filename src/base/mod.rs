//! Implements the base structures for the time integrator

mod enums;
mod errors;
mod fixed_dofs;
mod scheme_config;
mod sparse;
pub use crate::base::enums::*;
pub use crate::base::errors::*;
pub use crate::base::fixed_dofs::*;
pub use crate::base::scheme_config::*;
pub use crate::base::sparse::*;
