use contact_calib::{calibrate_ball, default_configs, CalibrationParams, OptimizationConfig};

fn describe(name: &str, config: &OptimizationConfig, use_case: &str) {
    println!("{}:", name);
    println!("   Strategy: {:?}", config.strategy);
    println!("   Tolerance: {:.1e}", config.tolerance);
    println!("   Population size: {}", config.pop_size);
    println!("   Max generations: {}", config.max_gen);
    println!("   Total evaluations budget: {}", config.cmaes.total_evals_budget);
    println!(
        "   Restarts: {} IPOP, {} BIPOP",
        config.cmaes.ipop_restarts, config.cmaes.bipop_restarts
    );
    println!(
        "   L-BFGS-B refinement: {} ({} iterations)",
        config.cmaes.lbfgsb_enabled, config.cmaes.lbfgsb_max_iterations
    );
    println!("   Use case: {}\n", use_case);
}

fn main() {
    println!("contact-calib Default Configuration Examples\n");

    describe("1. Fast Configuration", &default_configs::fast(), "Development, quick prototyping");
    describe("2. Production Configuration", &default_configs::production(), "Final fits");
    describe("3. Research Configuration", &default_configs::research(), "Exhaustive search");
    describe("4. Minimal Configuration", &default_configs::minimal(), "Unit tests, debugging");

    println!("Calibrating the bouncing ball with each preset:");
    for (name, config) in [
        ("minimal", default_configs::minimal()),
        ("fast", default_configs::fast()),
        ("gradient", OptimizationConfig::gradient()),
    ] {
        match calibrate_ball(config, CalibrationParams::ball()) {
            Ok(outcome) => println!(
                "   {:<8} stiffness = {:>9.3} N/m, objective = {:.3e}, {} ({} evaluations)",
                name, outcome.params[0], outcome.objective, outcome.status, outcome.evaluations
            ),
            Err(e) => println!("   {:<8} failed: {}", name, e),
        }
    }
}
