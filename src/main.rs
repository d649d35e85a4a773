use std::process::ExitCode;

use neural_flow::Simulation;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let simulation = match std::env::args_os().nth(1) {
        Some(path) => match Simulation::from_preset(&path) {
            Ok(simulation) => {
                log::info!("Loaded preset {}", path.to_string_lossy());
                simulation
            }
            Err(e) => {
                log::error!("Cannot load preset {}: {}", path.to_string_lossy(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Simulation::new(),
    };

    match simulation.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
