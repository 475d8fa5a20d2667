// Example: bouncing_ball.rs
// Simulates a ball dropped onto the smoothed contact law and recovers its
// contact stiffness from the recorded force.
//
// Usage:
//     cargo run --example bouncing_ball -- [stiffness]

use std::env;

use contact_calib::models::ball::BouncingBall;
use contact_calib::{calibrate_ball, default_configs, BallModelParams, CalibrationParams};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut params = BallModelParams::default();
    if let Some(arg) = env::args().nth(1) {
        params.stiffness = arg.parse()?;
    }

    let ball = BouncingBall::new(&params);
    let traj = ball.simulate(
        params.initial_height,
        params.initial_speed,
        params.duration,
        params.num_steps,
    );
    let lowest = traj.heights.iter().cloned().fold(f64::INFINITY, f64::min);
    let peak_force = traj.forces.iter().cloned().fold(f64::NAN, f64::max);
    println!("Simulated {} samples over {} s", traj.len(), params.duration);
    println!("  deepest penetration: {:.4} m", -lowest);
    println!("  peak contact force:  {:.1} N", peak_force);
    println!("  static equilibrium:  {:.6} m", ball.equilibrium_height()?);

    let true_stiffness = params.stiffness;
    let outcome = calibrate_ball(
        default_configs::fast(),
        CalibrationParams {
            model_params: Some(Box::new(params)),
        },
    )?;
    println!(
        "\nCalibrated stiffness {:.3} N/m (true {:.1}), objective {:.3e}, {}",
        outcome.params[0], true_stiffness, outcome.objective, outcome.status
    );
    Ok(())
}
