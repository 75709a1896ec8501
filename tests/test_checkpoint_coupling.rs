use nstime::base::coo_entries;
use nstime::prelude::*;
use nstime::StrError;
use russell_lab::Vector;
use std::f64::consts::PI;

// Save and recover the integrator state in a coupling loop
//
// TEST GOAL
//
// This test verifies that recovering the checkpoint restores all buffers bit-for-bit
// and that a coupling loop (save, step, recover, step again) reproduces a plain
// time loop exactly
//
// MESH
//
// 16 linear elements on (0, 1)
//
// INITIAL CONDITIONS
//
// u(x,0) = sin(πx)
//
// BOUNDARY CONDITIONS
//
// u(0,t) = 0 and u(1,t) = g(t), changed by the coupling iterations
//
// CONFIGURATION AND PARAMETERS
//
// κ = 0.1, c = 1, θ = 0.5, Δt = 0.01

fn initial_values(mesh: &Mesh1d) -> Vector {
    let x = mesh.interior_coordinates();
    Vector::from(&x.iter().map(|x| f64::sin(PI * x)).collect::<Vec<_>>())
}

fn config(scheme: Scheme) -> SchemeConfig {
    let mut config = SchemeConfig::new();
    config.set_scheme(scheme).set_theta(0.5).set_dt(0.01);
    config
}

#[test]
fn test_recover_restores_all_buffers() -> Result<(), StrError> {
    let mesh = Mesh1d::uniform(0.0, 1.0, 16)?;
    let config = config(Scheme::ImplicitNonlinear);
    let mut stiffness = ConvectionDiffusion1d::new_burgers(&mesh, 0.1);
    let mut mass = Mass1d::new(&mesh, 1.0, false);
    let fixed_dofs = FixedDofs::from_components(&[&[0.0, 0.0]]);
    let mut integrator =
        TimeIntegrator::new(&config, &mut stiffness, &mut mass, fixed_dofs).map_err(|_| "cannot allocate")?;
    integrator.initialize().map_err(|_| "cannot initialize")?;
    integrator
        .set_solution_vector(&initial_values(&mesh))
        .map_err(|_| "cannot set solution")?;

    // recovering without a checkpoint fails
    assert!(!integrator.has_checkpoint());
    assert_eq!(integrator.recover_state().err(), Some(IntegratorError::NoCheckpoint));

    // three steps, then save
    for _ in 0..3 {
        integrator.make_time_step(0.01).map_err(|_| "step failed")?;
    }
    integrator.save_state().map_err(|_| "cannot save")?;
    assert!(integrator.has_checkpoint());
    let solution = integrator.solution_vector().as_data().clone();
    let solution_old = integrator.solution_vector_old().as_data().clone();
    let matrix = coo_entries(integrator.system().matrix().ok_or("matrix must be available")?);
    let rhs = integrator.system().rhs().as_data().clone();
    let time = integrator.time();

    // two more steps with a different boundary value change everything
    integrator
        .fixed_dofs_mut()
        .set_value(0, 1, 0.25)
        .map_err(|_| "cannot set value")?;
    for _ in 0..2 {
        integrator.make_time_step(0.02).map_err(|_| "step failed")?;
    }
    assert_ne!(integrator.solution_vector().as_data(), &solution);
    assert_eq!(integrator.n_steps(), 5);

    // recover
    integrator.recover_state().map_err(|_| "cannot recover")?;
    assert_eq!(integrator.solution_vector().as_data(), &solution);
    assert_eq!(integrator.solution_vector_old().as_data(), &solution_old);
    assert_eq!(
        coo_entries(integrator.system().matrix().ok_or("matrix must be available")?),
        matrix
    );
    assert_eq!(integrator.system().rhs().as_data(), &rhs);
    assert_eq!(integrator.time(), time);
    assert_eq!(integrator.n_steps(), 3);
    assert_eq!(integrator.dt(), 0.01);
    assert_eq!(integrator.fixed_dofs().value(0, 1)?, 0.0);
    assert_eq!(integrator.state(), IntegratorState::Converged);

    // the checkpoint is consumed
    assert!(!integrator.has_checkpoint());
    assert_eq!(integrator.recover_state().err(), Some(IntegratorError::NoCheckpoint));
    Ok(())
}

#[test]
fn test_coupling_loop_reproduces_plain_steps() -> Result<(), StrError> {
    let mesh = Mesh1d::uniform(0.0, 1.0, 16)?;
    let u0 = initial_values(&mesh);
    let config = config(Scheme::ImplicitLinear);
    let dt = config.dt;
    let boundary_value = |t: f64| 0.5 * f64::sin(2.0 * PI * t);

    // plain time loop with the converged boundary value
    let mut stiffness_a = ConvectionDiffusion1d::new(&mesh, 0.1, 1.0);
    let mut mass_a = Mass1d::new(&mesh, 1.0, false);
    let fixed_a = FixedDofs::from_components(&[&[0.0, 0.0]]);
    let mut plain = TimeIntegrator::new(&config, &mut stiffness_a, &mut mass_a, fixed_a).map_err(|_| "cannot allocate")?;
    plain.initialize().map_err(|_| "cannot initialize")?;
    plain.set_solution_vector(&u0).map_err(|_| "cannot set solution")?;

    // coupling loop: the boundary value is "computed" by another solver, starting
    // from a wrong guess and reaching the converged value at the last iteration
    let mut stiffness_b = ConvectionDiffusion1d::new(&mesh, 0.1, 1.0);
    let mut mass_b = Mass1d::new(&mesh, 1.0, false);
    let fixed_b = FixedDofs::from_components(&[&[0.0, 0.0]]);
    let mut coupled =
        TimeIntegrator::new(&config, &mut stiffness_b, &mut mass_b, fixed_b).map_err(|_| "cannot allocate")?;
    coupled.initialize().map_err(|_| "cannot initialize")?;
    coupled.set_solution_vector(&u0).map_err(|_| "cannot set solution")?;

    let n_coupling = 3;
    for step in 0..5 {
        let t_new = (step + 1) as f64 * dt;
        let g = boundary_value(t_new);

        plain.fixed_dofs_mut().set_value(0, 1, g)?;
        plain.make_time_step(dt).map_err(|_| "plain step failed")?;

        coupled.save_state().map_err(|_| "cannot save")?;
        for k in 0..n_coupling {
            let guess = g * (k + 1) as f64 / n_coupling as f64;
            coupled.fixed_dofs_mut().set_value(0, 1, guess)?;
            coupled.make_time_step(dt).map_err(|_| "coupled step failed")?;
            if k + 1 < n_coupling {
                coupled.recover_state().map_err(|_| "cannot recover")?;
                coupled.save_state().map_err(|_| "cannot save")?;
            }
        }

        assert_eq!(coupled.n_steps(), step + 1);
        assert_eq!(coupled.time(), plain.time());
        assert_eq!(coupled.solution_vector().as_data(), plain.solution_vector().as_data());
    }
    let (_, n_converged) = coupled.totals();
    assert_eq!(n_converged, 5 * n_coupling);
    Ok(())
}
