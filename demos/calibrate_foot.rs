// Example: calibrate_foot.rs
// End-to-end contact calibration on synthetic stance data: the reference force
// is produced by the model itself at known parameters, then recovered.
//
// Usage:
//     cargo run --example calibrate_foot -- [config.toml] [comparison.csv]

mod common;

use std::env;

use contact_calib::{
    calibrate_contact, compare_contact, default_configs, CalibrationParams, CsvComparisonWriter,
    OptimizationConfig,
};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    let config = match args.get(1) {
        Some(path) => OptimizationConfig::from_toml_file(path)?,
        None => default_configs::fast(),
    };

    let trajectory = common::stance_trajectory(121)?;
    let truth: Vec<f64> = [
        vec![0.40, 0.38, 0.36, 0.34, 0.32, 0.30],
        vec![0.50, 0.45, 0.40, 0.40, 0.45, 0.50],
    ]
    .concat();
    let signal = common::reference_signal(&trajectory, &truth)?;

    println!("Calibrating {} contacts over {} states", 6, trajectory.len());
    let (outcome, physical) = calibrate_contact(
        common::foot_model()?,
        trajectory.clone(),
        signal.clone(),
        config,
        CalibrationParams::default(),
        None,
    )?;

    println!("\nStatus: {}", outcome.status);
    println!("Objective: {:.6e} after {} evaluations", outcome.objective, outcome.evaluations);
    println!("{:>8} {:>12} {:>14}", "contact", "height (m)", "stiffness (N/m)");
    for (i, (h, k)) in physical
        .marker_heights
        .iter()
        .zip(&physical.stiffnesses)
        .enumerate()
    {
        println!("{:>8} {:>12.5} {:>14.4e}", i, h, k);
    }

    let csv_path = args.get(2).map(String::as_str).unwrap_or("contact_comparison.csv");
    let mut writer = CsvComparisonWriter::create(csv_path)?;
    let summary = compare_contact(
        common::foot_model()?,
        trajectory,
        signal,
        &outcome.params,
        CalibrationParams::default(),
        &mut writer,
    )?;
    println!(
        "\nComparison written to {} (RMSE {:.3} N, peak sim {:.1} N, peak exp {:.1} N)",
        csv_path, summary.rmse, summary.peak_simulation, summary.peak_experiment
    );
    Ok(())
}
