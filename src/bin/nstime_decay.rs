use nstime::prelude::*;
use nstime::StrError;
use russell_lab::Vector;
use serde::Serialize;
use std::f64::consts::PI;
use std::fs::{self, File};
use std::path::Path;
use structopt::StructOpt;

/// Command line options
#[derive(StructOpt, Debug)]
#[structopt(
    name = "nstime_decay",
    about = "Runs the decay of sin(πx) (heat or viscous Burgers equation) with the θ-method"
)]
struct Options {
    /// Number of elements
    #[structopt(long, default_value = "50")]
    nelem: usize,

    /// Time increment
    #[structopt(long, default_value = "0.01")]
    dt: f64,

    /// Final time
    #[structopt(long, default_value = "0.1")]
    t_fin: f64,

    /// θ-method parameter
    #[structopt(long, default_value = "0.5")]
    theta: f64,

    /// Scheme: linear, nonlinear, or imex
    #[structopt(long, default_value = "linear")]
    scheme: String,

    /// Diffusivity (or viscosity)
    #[structopt(long, default_value = "1.0")]
    kappa: f64,

    /// Solves the viscous Burgers equation instead of the heat equation
    #[structopt(long)]
    burgers: bool,

    /// Relative tolerance of the Newton iterations
    #[structopt(long, default_value = "1e-8")]
    tol: f64,

    /// Maximum number of Newton iterations
    #[structopt(long, default_value = "10")]
    max_its: usize,

    /// Reads the configuration from a JSON file (overrides the options above)
    #[structopt(long)]
    config: Option<String>,

    /// Writes the results to a JSON file
    #[structopt(long)]
    output: Option<String>,

    /// Shows the timesteps and iterations
    #[structopt(short, long)]
    verbose: bool,
}

/// Holds the results written to the output file
#[derive(Serialize)]
struct Results {
    scheme: Scheme,
    theta: f64,
    dt: f64,
    time: f64,
    n_steps: usize,
    n_iterations_total: usize,
    x: Vec<f64>,
    u: Vec<f64>,
    error_max: Option<f64>,
}

fn parse_scheme(name: &str) -> Result<Scheme, StrError> {
    match name {
        "linear" => Ok(Scheme::ImplicitLinear),
        "nonlinear" => Ok(Scheme::ImplicitNonlinear),
        "imex" => Ok(Scheme::ImexAle),
        _ => Err("scheme must be linear, nonlinear, or imex"),
    }
}

fn main() -> Result<(), StrError> {
    // parse options
    let options = Options::from_args();

    // configuration
    let config = match &options.config {
        Some(path) => SchemeConfig::read_json(path)?,
        None => {
            let mut config = SchemeConfig::new();
            config
                .set_scheme(parse_scheme(&options.scheme)?)
                .set_theta(options.theta)
                .set_dt(options.dt)
                .set_tol_rel_residual(options.tol)
                .set_n_max_iterations(options.max_its)
                .set_verbose(options.verbose, options.verbose);
            config
        }
    };

    // operators
    let mesh = Mesh1d::uniform(0.0, 1.0, options.nelem)?;
    let mut stiffness = if options.burgers {
        ConvectionDiffusion1d::new_burgers(&mesh, options.kappa)
    } else {
        ConvectionDiffusion1d::new(&mesh, options.kappa, 0.0)
    };
    let mut mass = Mass1d::new(&mesh, 1.0, false);

    // integrator
    let fixed_dofs = FixedDofs::from_components(&[&[0.0, 0.0]]);
    let mut integrator =
        TimeIntegrator::new(&config, &mut stiffness, &mut mass, fixed_dofs).map_err(|_| "invalid configuration")?;
    integrator.initialize().map_err(|_| "cannot initialize the integrator")?;

    // initial condition
    let x = mesh.interior_coordinates();
    let u0 = Vector::from(&x.iter().map(|x| f64::sin(PI * x)).collect::<Vec<_>>());
    integrator
        .set_solution_vector(&u0)
        .map_err(|_| "cannot set the initial condition")?;

    // time loop
    let dt = config.dt;
    while integrator.time() + dt <= options.t_fin + 1e-12 {
        if let Err(e) = integrator.make_time_step(dt) {
            println!("ERROR: {}", e);
            return Err("the time step failed");
        }
    }

    // error of the heat equation with respect to exp(-κπ²t)·sin(πx)
    let time = integrator.time();
    let u = integrator.solution_vector().as_data().clone();
    let error_max = if options.burgers {
        None
    } else {
        let decay = f64::exp(-options.kappa * PI * PI * time);
        Some(
            x.iter()
                .zip(u.iter())
                .fold(0.0, |acc, (x, u)| f64::max(acc, f64::abs(u - decay * f64::sin(PI * x)))),
        )
    };

    // results
    let (n_iterations_total, _) = integrator.totals();
    let results = Results {
        scheme: config.scheme,
        theta: config.theta,
        dt,
        time,
        n_steps: integrator.n_steps(),
        n_iterations_total,
        x,
        u,
        error_max,
    };
    println!("t = {:?}, steps = {}, iterations = {}", time, results.n_steps, n_iterations_total);
    if let Some(err) = error_max {
        println!("max error = {:.6e}", err);
    }
    if let Some(path) = &options.output {
        let path = Path::new(path);
        if let Some(p) = path.parent() {
            fs::create_dir_all(p).map_err(|_| "cannot create directory")?;
        }
        let mut file = File::create(path).map_err(|_| "cannot create file")?;
        serde_json::to_writer_pretty(&mut file, &results).map_err(|_| "cannot write file")?;
        println!("results written to {}", path.display());
    }
    Ok(())
}
