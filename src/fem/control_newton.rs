use crate::base::SchemeConfig;

/// Holds the statistics of the Newton iterations of the last step
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepStats {
    /// Number of linear solves performed in the step
    pub n_iterations: usize,

    /// Residual norms ‖R‖₂ computed at each iteration (the first one is ‖R₀‖₂)
    pub norm_rr: Vec<f64>,

    /// Whether the step converged
    pub converged: bool,
}

impl StepStats {
    /// Returns the relative residual norm of the last iteration
    pub fn relative_residual(&self) -> f64 {
        match (self.norm_rr.first(), self.norm_rr.last()) {
            (Some(first), Some(last)) if *first > 0.0 => last / first,
            _ => 0.0,
        }
    }
}

/// Controls the convergence of the Newton iterations
///
/// Converges when `‖R‖/‖R₀‖ < tol_rel` or `‖R‖ < tol_abs`. Diverges when the residual
/// is not finite or grows for two consecutive iterations. Reaching the maximum number
/// of iterations without convergence is also reported as divergence by the caller.
pub struct NewtonControl<'a> {
    config: &'a SchemeConfig,
    iteration: usize,
    norm_rr0: f64,
    norm_rr_prev: f64,
    norm_rr: f64,
    n_growing: usize,
    converged: bool,
    diverging: bool,
    stats: StepStats,
}

impl<'a> NewtonControl<'a> {
    /// Allocates a new instance
    pub fn new(config: &'a SchemeConfig) -> Self {
        NewtonControl {
            config,
            iteration: 0,
            norm_rr0: 0.0,
            norm_rr_prev: 0.0,
            norm_rr: 0.0,
            n_growing: 0,
            converged: false,
            diverging: false,
            stats: StepStats::default(),
        }
    }

    /// Analyzes the residual norm of a new iteration
    pub fn analyze(&mut self, iteration: usize, norm_rr: f64) {
        self.iteration = iteration;
        self.norm_rr = norm_rr;
        self.stats.norm_rr.push(norm_rr);
        self.stats.n_iterations = iteration;

        // NaN or Inf
        if !norm_rr.is_finite() {
            self.converged = false;
            self.diverging = true;
            return;
        }

        // first iteration
        if iteration == 0 {
            self.norm_rr0 = norm_rr;
            self.norm_rr_prev = norm_rr;
            self.n_growing = 0;
            self.converged = norm_rr < self.config.tol_abs_residual;
            self.diverging = false;
            self.stats.converged = self.converged;
            return;
        }

        // subsequent iterations
        if norm_rr > self.norm_rr_prev {
            self.n_growing += 1;
        } else {
            self.n_growing = 0;
        }
        self.norm_rr_prev = norm_rr;
        self.converged = norm_rr < self.config.tol_abs_residual || self.relative_residual() < self.config.tol_rel_residual;
        self.diverging = !self.converged && self.n_growing >= 2;
        self.stats.converged = self.converged;
    }

    /// Returns the relative residual ‖R‖/‖R₀‖
    pub fn relative_residual(&self) -> f64 {
        if self.norm_rr0 > 0.0 {
            self.norm_rr / self.norm_rr0
        } else {
            0.0
        }
    }

    /// Returns whether the iterations converged
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Returns whether the iterations are diverging
    pub fn diverging(&self) -> bool {
        self.diverging
    }

    /// Returns the statistics collected so far
    pub fn stats(&self) -> &StepStats {
        &self.stats
    }

    /// Prints the header of the table with timestep and iteration data
    pub fn print_header(&self) {
        if self.config.verbose_timesteps || self.config.verbose_iterations {
            println!("Legend:");
            println!("✅ : converged");
            println!("👍 : converging");
            println!("🥵 : diverging");
            println!("😱 : found NaN or Inf\n");
            println!(
                "{:>8} {:>13} {:>13} {:>5} {:>8}   {:>8}  ",
                "timestep", "t", "Δt", "iter", "|R|", "|R|/|R₀|"
            );
        }
    }

    /// Prints timestep data
    pub fn print_timestep(&self, timestep: usize, t: f64, dt: f64) {
        if !self.config.verbose_timesteps {
            return;
        }
        println!(
            "{:>8} {:>13.6e} {:>13.6e} {:>5} {:>8}   {:>8}  ",
            timestep + 1,
            t,
            dt,
            ".",
            ".",
            "."
        );
    }

    /// Prints iteration data
    pub fn print_iteration(&self) {
        if !self.config.verbose_iterations {
            return;
        }
        let icon = if !self.norm_rr.is_finite() {
            "😱"
        } else if self.converged {
            "✅"
        } else if self.iteration == 0 {
            "  "
        } else if self.diverging || self.norm_rr > self.norm_rr0 {
            "🥵"
        } else {
            "👍"
        };
        println!(
            "{:>8} {:>13} {:>13} {:>5} {:>8.2e}{} {:>8.2e}  ",
            ".",
            ".",
            ".",
            self.iteration,
            self.norm_rr,
            icon,
            self.relative_residual(),
        );
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{NewtonControl, StepStats};
    use crate::base::SchemeConfig;

    #[test]
    fn converges_on_relative_residual() {
        let mut config = SchemeConfig::new();
        config.set_tol_rel_residual(1e-6).set_tol_abs_residual(1e-15);
        let mut control = NewtonControl::new(&config);
        control.analyze(0, 10.0);
        assert!(!control.converged());
        assert!(!control.diverging());
        control.analyze(1, 1e-2);
        assert!(!control.converged());
        control.analyze(2, 1e-6);
        assert_eq!(control.relative_residual(), 1e-7);
        assert!(control.converged());
        let stats = control.stats();
        assert_eq!(stats.n_iterations, 2);
        assert_eq!(stats.norm_rr, vec![10.0, 1e-2, 1e-6]);
        assert!(stats.converged);
        assert_eq!(stats.relative_residual(), 1e-7);
    }

    #[test]
    fn converges_on_absolute_residual() {
        let config = SchemeConfig::new();
        let mut control = NewtonControl::new(&config);
        control.analyze(0, 0.0);
        assert!(control.converged());
        assert_eq!(control.relative_residual(), 0.0);
    }

    #[test]
    fn detects_divergence() {
        let config = SchemeConfig::new();
        let mut control = NewtonControl::new(&config);
        control.analyze(0, 1.0);
        control.analyze(1, 2.0); // growing once
        assert!(!control.diverging());
        control.analyze(2, 1.5); // reset
        assert!(!control.diverging());
        control.analyze(3, 1.6);
        assert!(!control.diverging());
        control.analyze(4, 1.7); // growing twice
        assert!(control.diverging());

        let mut control = NewtonControl::new(&config);
        control.analyze(0, 1.0);
        control.analyze(1, f64::NAN);
        assert!(control.diverging());
        assert!(!control.converged());
    }

    #[test]
    fn print_works() {
        let mut config = SchemeConfig::new();
        config.set_verbose(true, true);
        let mut control = NewtonControl::new(&config);
        control.print_header();
        control.print_timestep(0, 0.1, 0.1);
        control.analyze(0, 1.0);
        control.print_iteration();
        control.analyze(1, 1e-12);
        control.print_iteration();
    }

    #[test]
    fn step_stats_works() {
        let stats = StepStats::default();
        assert_eq!(stats.relative_residual(), 0.0);
        let stats = StepStats {
            n_iterations: 1,
            norm_rr: vec![4.0, 1.0],
            converged: true,
        };
        assert_eq!(stats.relative_residual(), 0.25);
    }
}
