use super::{AleExtrapolation, CorrectorScope, Scheme};
use crate::StrError;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Defines the smallest allowed tolerance (SchemeConfig)
pub const SCHEME_MIN_TOL: f64 = 1e-15;

/// Holds the time-stepping parameters
///
/// The configuration is validated when the [crate::fem::TimeIntegrator] is allocated
/// and borrowed immutably afterwards.
///
/// # Notes
///
/// * `theta` -- θ-method parameter with `0 ≤ θ ≤ 1`; θ = 1 is backward Euler and θ = 0.5 is Crank-Nicolson
/// * `dt` -- Default time increment; used by `assemble` before the first step
/// * `tol_rel_residual` -- Relative tolerance `‖R‖/‖R₀‖` of the Newton iterations
/// * `tol_abs_residual` -- Absolute tolerance `‖R‖` of the Newton iterations
/// * `n_max_iterations` -- Maximum number of Newton iterations (linear solves) per step
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemeConfig {
    /// Time integration scheme
    pub scheme: Scheme,

    /// Coefficient θ for the θ-method; 0 ≤ θ ≤ 1
    pub theta: f64,

    /// Default time increment Δt
    pub dt: f64,

    /// Relative tolerance for the residual vector
    pub tol_rel_residual: f64,

    /// Absolute tolerance for the residual vector
    pub tol_abs_residual: f64,

    /// Maximum number of iterations
    pub n_max_iterations: usize,

    /// Explicit estimate used by the ALE convection
    pub ale_extrapolation: AleExtrapolation,

    /// Operators re-assembled by the IMEX corrector
    pub corrector_scope: CorrectorScope,

    /// Verbose mode during timesteps
    pub verbose_timesteps: bool,

    /// Verbose mode during iterations
    pub verbose_iterations: bool,
}

impl SchemeConfig {
    /// Allocates a new instance with default values
    pub fn new() -> Self {
        SchemeConfig {
            scheme: Scheme::ImplicitLinear,
            theta: 0.5,
            dt: 0.1,
            tol_rel_residual: 1e-8,
            tol_abs_residual: 1e-12,
            n_max_iterations: 10,
            ale_extrapolation: AleExtrapolation::Previous,
            corrector_scope: CorrectorScope::Stiffness,
            verbose_timesteps: false,
            verbose_iterations: false,
        }
    }

    /// Sets the time integration scheme
    pub fn set_scheme(&mut self, scheme: Scheme) -> &mut Self {
        self.scheme = scheme;
        self
    }

    /// Sets the θ-method parameter
    pub fn set_theta(&mut self, theta: f64) -> &mut Self {
        self.theta = theta;
        self
    }

    /// Sets the default time increment
    pub fn set_dt(&mut self, dt: f64) -> &mut Self {
        self.dt = dt;
        self
    }

    /// Sets the relative tolerance of the Newton iterations
    pub fn set_tol_rel_residual(&mut self, tol: f64) -> &mut Self {
        self.tol_rel_residual = tol;
        self
    }

    /// Sets the absolute tolerance of the Newton iterations
    pub fn set_tol_abs_residual(&mut self, tol: f64) -> &mut Self {
        self.tol_abs_residual = tol;
        self
    }

    /// Sets the maximum number of Newton iterations
    pub fn set_n_max_iterations(&mut self, n: usize) -> &mut Self {
        self.n_max_iterations = n;
        self
    }

    /// Sets the explicit estimate used by the ALE convection
    pub fn set_ale_extrapolation(&mut self, option: AleExtrapolation) -> &mut Self {
        self.ale_extrapolation = option;
        self
    }

    /// Sets the operators re-assembled by the IMEX corrector
    pub fn set_corrector_scope(&mut self, scope: CorrectorScope) -> &mut Self {
        self.corrector_scope = scope;
        self
    }

    /// Sets the verbose mode for timesteps and iterations
    pub fn set_verbose(&mut self, timesteps: bool, iterations: bool) -> &mut Self {
        self.verbose_timesteps = timesteps;
        self.verbose_iterations = iterations;
        self
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if !(self.theta >= 0.0 && self.theta <= 1.0) {
            return Some(format!("theta = {:?} is incorrect; it must be 0.0 ≤ θ ≤ 1.0", self.theta));
        }
        if !(self.dt > 0.0) {
            return Some(format!("dt = {:?} is incorrect; it must be > 0.0", self.dt));
        }
        if !(self.tol_rel_residual >= SCHEME_MIN_TOL) {
            return Some(format!(
                "tol_rel_residual = {:?} is incorrect; it must be ≥ {:e}",
                self.tol_rel_residual, SCHEME_MIN_TOL
            ));
        }
        if !(self.tol_abs_residual >= SCHEME_MIN_TOL) {
            return Some(format!(
                "tol_abs_residual = {:?} is incorrect; it must be ≥ {:e}",
                self.tol_abs_residual, SCHEME_MIN_TOL
            ));
        }
        if self.n_max_iterations < 1 {
            return Some(format!(
                "n_max_iterations = {} is incorrect; it must be ≥ 1",
                self.n_max_iterations
            ));
        }
        None // all good
    }

    /// Reads a JSON file containing the configuration
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn read_json<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let input = File::open(path).map_err(|_| "cannot open file")?;
        let buffered = BufReader::new(input);
        let config = serde_json::from_reader(buffered).map_err(|_| "cannot parse JSON file")?;
        Ok(config)
    }

    /// Writes a JSON file with the configuration
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn write_json<P>(&self, full_path: &P) -> Result<(), StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        if let Some(p) = path.parent() {
            fs::create_dir_all(p).map_err(|_| "cannot create directory")?;
        }
        let mut file = File::create(&path).map_err(|_| "cannot create file")?;
        serde_json::to_writer_pretty(&mut file, &self).map_err(|_| "cannot write file")?;
        Ok(())
    }
}

impl Default for SchemeConfig {
    fn default() -> Self {
        SchemeConfig::new()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
