use serde::{Deserialize, Serialize};

/// Selects the time integration scheme
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scheme {
    /// θ-method with a single linear solve per step
    ImplicitLinear,

    /// θ-method with Newton iterations on the residual
    ImplicitNonlinear,

    /// Implicit mass/diffusion with explicit mesh-velocity (ALE) convection
    ImexAle,
}

/// Selects the explicit estimate used to evaluate the ALE convection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AleExtrapolation {
    /// Uses the solution at the previous time: `u* = uₙ`
    Previous,

    /// Extrapolates linearly from the two most recent steps:
    /// `u* = uₙ + (Δt/Δtₒₗ𝒹)·(uₙ - uₙ₋₁)`
    Linear,
}

/// Selects what is re-assembled by the IMEX corrector pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrectorScope {
    /// Only the stiffness operator is re-evaluated; the mass matrix of the predictor is reused
    Stiffness,

    /// Both the stiffness and the mass operators are re-evaluated
    StiffnessAndMass,
}

/// Holds the lifecycle state of the time integrator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegratorState {
    /// The integrator has been allocated but `initialize` has not been called yet
    Uninitialized,

    /// The operators have been checked and the mass matrix cached (if static)
    Initialized,

    /// A step is being computed
    Stepping,

    /// The last step has been accepted
    Converged,

    /// The last step failed and nothing else was modified
    ///
    /// A new step (e.g., with a smaller time increment), `recover_state` or
    /// `set_solution_vector` leave this state.
    Failed,
}

impl IntegratorState {
    /// Returns whether a new time step can be started
    pub fn can_step(&self) -> bool {
        matches!(
            self,
            IntegratorState::Initialized | IntegratorState::Converged | IntegratorState::Failed
        )
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
