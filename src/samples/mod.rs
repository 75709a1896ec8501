//! Implements reference operators for one-dimensional problems

mod convection_diffusion_1d;
mod cubic_reaction;
mod mass_1d;
mod mesh_1d;
pub use crate::samples::convection_diffusion_1d::*;
pub use crate::samples::cubic_reaction::*;
pub use crate::samples::mass_1d::*;
pub use crate::samples::mesh_1d::*;
