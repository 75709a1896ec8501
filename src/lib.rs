//! Time integration and nonlinear-solve orchestration for incompressible flow
//!
//! The [fem::TimeIntegrator] advances the solution of a spatially-discretized
//! system `M du/dt + K(u) u = F(u)` using the θ-method, resolves the convection
//! nonlinearity with Newton iterations, performs implicit-explicit (IMEX) steps
//! on moving (ALE) meshes and keeps a single-slot checkpoint for coupling loops.
//!
//! The stiffness and mass operators and the linear solver are external
//! collaborators given through the traits in [fem]. Reference operators for
//! one-dimensional problems are available in [samples].

/// Defines a type alias for the error type as a static string
pub type StrError = &'static str;

pub mod base;
pub mod fem;
pub mod prelude;
pub mod samples;
