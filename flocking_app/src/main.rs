use std::{error::Error, fs, io};

use clap_serde_derive::{clap::Parser, ClapSerde};
use flocking_core::{
    birdwatcher::Birdwatcher,
    flock::Flock,
    math_helpers::deg_to_rad,
    options::{Boundary, Distance, RuleParams, RunOptions, TrackerType, WorldSize},
};
use tracing::info;

mod cliargs;
use cliargs::{Args, BoundaryKind, Config};

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    // Parse whole args with clap
    let mut args = Args::parse();

    // Get config file, merging what clap parsed on top of it
    let config = match fs::read_to_string(&args.config_path) {
        Ok(text) => {
            let file_config = toml::from_str::<<Config as ClapSerde>::Opt>(&text)
                .map_err(|err| format!("Error in configuration file:\n{err}"))?;
            Config::from(file_config).merge(&mut args.config)
        }
        Err(_) => Config::from(&mut args.config),
    };

    let run_options = run_options(&config);
    let mut flock = Flock::initialize(run_options.init_boids, &run_options)?;
    let mut bird_watcher = Birdwatcher::new(run_options.sample_rate);

    info!(ticks = config.ticks, "simulation started");
    for _ in 0..config.ticks {
        flock.update(&run_options);
        bird_watcher.watch(&flock);
    }

    let written = bird_watcher.pop_data_write(io::stdout().lock())?;
    info!(samples = written.len(), ticks = flock.tick(), "simulation finished");

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn run_options(config: &Config) -> RunOptions {
    RunOptions {
        init_boids: config.no_boids,
        seed: (config.seed != 0).then_some(config.seed),
        time_step: config.time_step,
        min_speed: config.min_speed,
        max_speed: config.max_speed,
        cohesion: RuleParams::new(
            config.cohesion_coefficient,
            config.cohesion_distance,
            deg_to_rad(config.cohesion_fov),
        ),
        separation: RuleParams::new(
            config.separation_coefficient,
            config.separation_distance,
            deg_to_rad(config.separation_fov),
        ),
        alignment: RuleParams::new(
            config.alignment_coefficient,
            config.alignment_distance,
            deg_to_rad(config.alignment_fov),
        ),
        world: WorldSize::new(config.width, config.height),
        boundary: match config.boundary {
            BoundaryKind::Toroidal => Boundary::Toroidal,
            BoundaryKind::Reflective => Boundary::Reflective,
            BoundaryKind::Repulsive => Boundary::Repulsive {
                force: config.wall_force,
            },
        },
        distance: if config.toroidal_distance {
            Distance::EucToroidal
        } else {
            Distance::EucEnclosed
        },
        tracker_type: if config.spathash {
            TrackerType::SpatHash
        } else {
            TrackerType::Naive
        },
        parallel: config.parallel,
        sample_rate: config.sample_rate,
        ..Default::default()
    }
}
