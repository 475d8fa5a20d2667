// Example: plot_contact_comparison.rs
// Calibrates the synthetic stance problem and plots simulated against
// reference vertical force.
//
// Usage:
//     cargo run --example plot_contact_comparison
//
// The output image will be written to contact_comparison.svg in the working directory.

mod common;

use contact_calib::{
    calibrate_contact, compare_contact, default_configs, CalibrationParams, ComparisonRow,
};
use plotters::prelude::*;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let trajectory = common::stance_trajectory(121)?;
    let truth: Vec<f64> = [vec![0.35; 6], vec![0.45; 6]].concat();
    let signal = common::reference_signal(&trajectory, &truth)?;

    let (outcome, _) = calibrate_contact(
        common::foot_model()?,
        trajectory.clone(),
        signal.clone(),
        default_configs::fast(),
        CalibrationParams::default(),
        None,
    )?;
    println!("{} with objective {:.4e}", outcome.status, outcome.objective);

    let mut rows: Vec<ComparisonRow> = Vec::new();
    let summary = compare_contact(
        common::foot_model()?,
        trajectory,
        signal,
        &outcome.params,
        CalibrationParams::default(),
        &mut rows,
    )?;

    let y_max = summary
        .peak_simulation
        .max(summary.peak_experiment)
        .max(1.0)
        * 1.1;
    let t_max = rows.last().map(|r| r.time).unwrap_or(common::STANCE_DURATION);

    let root = SVGBackend::new("contact_comparison.svg", (1280, 768)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(
            format!("Vertical contact force | RMSE {:.2} N", summary.rmse),
            ("sans-serif", 30),
        )
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..t_max, 0.0..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc("Force (N)")
        .draw()?;

    chart
        .draw_series(rows.iter().map(|r| Circle::new((r.time, r.experiment), 2, BLUE.filled())))?
        .label("experiment")
        .legend(|(x, y)| Circle::new((x, y), 3, BLUE.filled()));
    chart
        .draw_series(LineSeries::new(rows.iter().map(|r| (r.time, r.simulation)), &RED))?
        .label("simulation")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    println!("Chart saved to contact_comparison.svg");
    Ok(())
}
