use nstime::prelude::*;
use nstime::StrError;
use russell_lab::Vector;
use std::f64::consts::PI;

// Decay of a sine wave in the heat equation
//
// TEST GOAL
//
// This test verifies the θ-method (backward Euler and Crank-Nicolson) with the
// linear scheme against the analytical solution u(x,t) = exp(-π²t)·sin(πx)
//
// MESH
//
// 50 linear elements on (0, 1)
//
// INITIAL CONDITIONS
//
// u(x,0) = sin(πx)
//
// BOUNDARY CONDITIONS
//
// u(0,t) = u(1,t) = 0
//
// CONFIGURATION AND PARAMETERS
//
// κ = 1, ρ = 1 (consistent mass), t_fin = 0.1

const T_FIN: f64 = 0.1;

/// Runs the simulation and returns the maximum nodal error at t_fin
fn run(theta: f64, dt: f64) -> Result<f64, StrError> {
    let mesh = Mesh1d::uniform(0.0, 1.0, 50)?;
    let mut stiffness = ConvectionDiffusion1d::new(&mesh, 1.0, 0.0);
    let mut mass = Mass1d::new(&mesh, 1.0, false);
    let mut config = SchemeConfig::new();
    config.set_scheme(Scheme::ImplicitLinear).set_theta(theta).set_dt(dt);

    let fixed_dofs = FixedDofs::from_components(&[&[0.0, 0.0]]);
    let mut integrator =
        TimeIntegrator::new(&config, &mut stiffness, &mut mass, fixed_dofs).map_err(|_| "cannot allocate")?;
    integrator.initialize().map_err(|_| "cannot initialize")?;

    let x = mesh.interior_coordinates();
    let u0 = Vector::from(&x.iter().map(|x| f64::sin(PI * x)).collect::<Vec<_>>());
    integrator.set_solution_vector(&u0).map_err(|_| "cannot set solution")?;

    let n_steps = f64::round(T_FIN / dt) as usize;
    for _ in 0..n_steps {
        integrator.make_time_step(dt).map_err(|_| "step failed")?;
    }
    assert_eq!(integrator.n_steps(), n_steps);
    assert_eq!(integrator.state(), IntegratorState::Converged);
    assert!(f64::abs(integrator.time() - T_FIN) < 1e-12);

    let decay = f64::exp(-PI * PI * integrator.time());
    let u = integrator.solution_vector();
    let error = x
        .iter()
        .enumerate()
        .fold(0.0, |acc, (i, x)| f64::max(acc, f64::abs(u[i] - decay * f64::sin(PI * x))));
    Ok(error)
}

#[test]
fn test_heat_decay_backward_euler() -> Result<(), StrError> {
    let e1 = run(1.0, 0.02)?;
    let e2 = run(1.0, 0.01)?;
    let e3 = run(1.0, 0.005)?;
    println!("backward Euler errors: {:.4e} {:.4e} {:.4e}", e1, e2, e3);

    // first order: the error is roughly halved with dt
    assert!(e2 < e1 && e3 < e2);
    assert!(e2 / e1 > 0.4 && e2 / e1 < 0.65);
    assert!(e3 / e2 > 0.4 && e3 / e2 < 0.65);
    assert!(e3 < 0.015);
    Ok(())
}

#[test]
fn test_heat_decay_crank_nicolson() -> Result<(), StrError> {
    let e_cn = run(0.5, 0.01)?;
    let e_be = run(1.0, 0.005)?;
    println!("Crank-Nicolson error: {:.4e}", e_cn);
    assert!(e_cn < 1e-3);
    assert!(e_cn < e_be);
    Ok(())
}
