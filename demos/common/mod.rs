// Shared synthetic gait data for the demos.

use std::f64::consts::PI;

use contact_calib::{
    compare_contact, CalibrationParams, ComparisonRow, ForceSignal, PlanarFootModel, State,
    StateTrajectory,
};

pub const STANCE_DURATION: f64 = 0.6;

pub fn foot_model() -> anyhow::Result<PlanarFootModel> {
    Ok(PlanarFootModel::foot_with_contacts(6, 70.0, 5e7)?)
}

/// Heel-to-toe roll over one stance phase.
pub fn stance_trajectory(num_states: usize) -> anyhow::Result<StateTrajectory> {
    let omega = 2.0 * PI / STANCE_DURATION;
    let states = (0..num_states)
        .map(|i| {
            let t = STANCE_DURATION * i as f64 / (num_states - 1) as f64;
            let rz = -0.15 + 0.3 * t / STANCE_DURATION;
            let ty = 0.03 + 0.01 * (omega * t).cos();
            let vy = -0.01 * omega * (omega * t).sin();
            State::new(t, vec![rz, 0.3 * t, ty], vec![0.3 / STANCE_DURATION, 0.3, vy])
        })
        .collect();
    Ok(StateTrajectory::new(states, 3, 3)?)
}

/// Reference force generated by the model itself at parameters `x`.
pub fn reference_signal(trajectory: &StateTrajectory, x: &[f64]) -> anyhow::Result<ForceSignal> {
    let mut rows: Vec<ComparisonRow> = Vec::new();
    compare_contact(
        foot_model()?,
        trajectory.clone(),
        ForceSignal::zero(0.0, STANCE_DURATION)?,
        x,
        CalibrationParams::default(),
        &mut rows,
    )?;
    let samples: Vec<(f64, f64)> = rows.iter().map(|r| (r.time, r.simulation)).collect();
    Ok(ForceSignal::from_samples(&samples)?)
}
