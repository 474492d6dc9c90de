use clap::Subcommand;
use evergreen_core::Config;
use serde_json::json;

#[derive(Subcommand)]
pub enum GrowthAction {
    /// Show the stage a set of signals would reach
    Preview {
        /// Study-hour target used to derive points per stage
        #[arg(long)]
        target: Option<f64>,
        /// Study hours scored
        #[arg(long, default_value_t = 0.0)]
        hours: f64,
        /// Pomodoro laps scored
        #[arg(long, default_value_t = 0)]
        laps: u32,
        /// Completed tasks scored
        #[arg(long, default_value_t = 0)]
        tasks: u32,
    },
}

pub fn run(action: GrowthAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        GrowthAction::Preview {
            target,
            hours,
            laps,
            tasks,
        } => {
            let config = Config::load()?;
            let mut engine = config.growth.build_engine()?;
            if let Some(target) = target {
                engine.set_target(target)?;
            }
            engine.update(hours, laps, tasks);

            super::print_json(&json!({
                "score": engine.score(),
                "stage": engine.current_stage(),
                "total_stages": engine.total_stages(),
                "points_per_stage": engine.points_per_stage(),
                "progress_to_next": engine.progress_to_next(),
                "asset": engine.current_asset(),
                "fully_grown": engine.is_fully_grown(),
            }))?;
        }
    }
    Ok(())
}
