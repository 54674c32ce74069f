use birdwatcher::{Birdwatcher, BoidData};
use error::FlockError;
use flock::Flock;
use options::RunOptions;

pub mod boid;
pub mod error;
pub mod flock;

pub mod birdwatcher;
pub mod math_helpers;
pub mod options;

/// Runs a headless simulation of `run_options.init_boids` boids for `no_iter` ticks
/// and returns every sample the birdwatcher took along the way.
pub fn flock_base(no_iter: u64, run_options: &RunOptions) -> Result<Vec<BoidData>, FlockError> {
    let mut flock = Flock::initialize(run_options.init_boids, run_options)?;
    let mut bird_watcher = Birdwatcher::new(run_options.sample_rate);

    (0..no_iter).for_each(|_| {
        flock.update(run_options);
        bird_watcher.watch(&flock);
    });

    Ok(bird_watcher.pop_data())
}
